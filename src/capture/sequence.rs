//! Source that cycles through a directory of JPEG files

use std::path::{Path, PathBuf};

use bytes::Bytes;

use super::jpeg;
use super::FrameSource;
use crate::error::CaptureError;

/// Loops over the `.jpg`/`.jpeg` files of a directory in name order
#[derive(Debug)]
pub struct ImageSequenceSource {
    dir: PathBuf,
    frames: Vec<Bytes>,
    next: usize,
    width: u32,
    height: u32,
}

impl ImageSequenceSource {
    /// Load every JPEG in `dir`
    ///
    /// Files that do not start with a JPEG marker are skipped. Fails if
    /// none remain.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let dir = dir.as_ref().to_path_buf();

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file() && has_jpeg_extension(path))
            .collect();
        paths.sort();

        let mut frames = Vec::with_capacity(paths.len());
        for path in paths {
            let data = std::fs::read(&path)?;
            if !jpeg::is_jpeg(&data) {
                tracing::warn!(path = %path.display(), "Skipping file without JPEG marker");
                continue;
            }
            frames.push(Bytes::from(data));
        }

        let Some(first) = frames.first() else {
            return Err(CaptureError::NoImages(dir.display().to_string()));
        };
        let (width, height) = jpeg::dimensions(first).unwrap_or((0, 0));

        tracing::debug!(dir = %dir.display(), frames = frames.len(), width, height, "Loaded images");

        Ok(Self {
            dir,
            frames,
            next: 0,
            width,
            height,
        })
    }

    /// Number of images in the loop
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false once opened
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn capture(&mut self) -> Result<Bytes, CaptureError> {
        let frame = self.frames.get(self.next).cloned().ok_or(CaptureError::NoFrame)?;
        self.next = (self.next + 1) % self.frames.len();
        Ok(frame)
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn name(&self) -> String {
        self.dir.display().to_string()
    }
}

fn has_jpeg_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
}
