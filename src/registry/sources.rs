//! Video source registry
//!
//! Ordered collection of frame stores, one per capture source. The set of
//! sources is fixed at startup.

use super::error::PushError;
use super::store::FrameStore;

/// Frame stores indexed by source number
#[derive(Debug)]
pub struct SourceRegistry {
    stores: Vec<FrameStore>,
    /// Frame width reported by `/stream/info`
    width: u32,
    /// Frame height reported by `/stream/info`
    height: u32,
}

impl SourceRegistry {
    /// Create `count` stores of `capacity` frames each
    pub fn new(count: usize, capacity: usize, width: u32, height: u32) -> Self {
        Self {
            stores: (0..count).map(|_| FrameStore::new(capacity)).collect(),
            width,
            height,
        }
    }

    /// Build a registry from already constructed stores
    pub fn from_stores(stores: Vec<FrameStore>, width: u32, height: u32) -> Self {
        Self {
            stores,
            width,
            height,
        }
    }

    /// Number of sources
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Whether there are no sources
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Frame width
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Get the store for a source
    pub fn get(&self, index: usize) -> Option<&FrameStore> {
        self.stores.get(index)
    }

    /// Get the store for a source mutably
    pub fn get_mut(&mut self, index: usize) -> Option<&mut FrameStore> {
        self.stores.get_mut(index)
    }

    /// Store a captured payload for a source
    pub fn push(&mut self, index: usize, payload: &[u8]) -> Result<u64, PushError> {
        self.stores
            .get_mut(index)
            .ok_or(PushError::UnknownSource(index))?
            .push(payload)
    }

    /// Iterate over all stores in index order
    pub fn iter(&self) -> impl Iterator<Item = &FrameStore> {
        self.stores.iter()
    }
}
