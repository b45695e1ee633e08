//! Minimal JPEG inspection

/// Start-of-image marker
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
/// End-of-image marker
pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// Whether `data` starts with a JPEG start-of-image marker
pub fn is_jpeg(data: &[u8]) -> bool {
    data.starts_with(&JPEG_SOI)
}

/// Read width and height from the first start-of-frame segment
pub fn dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if !is_jpeg(data) {
        return None;
    }

    let mut i = JPEG_SOI.len();
    while i + 4 <= data.len() {
        if data[i] != 0xFF {
            return None;
        }
        let marker = data[i + 1];

        // Fill bytes and standalone markers carry no length
        if marker == 0xFF {
            i += 1;
            continue;
        }
        if marker == 0x01 || (0xD0..=0xD8).contains(&marker) {
            i += 2;
            continue;
        }

        let len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        if is_start_of_frame(marker) {
            // length(2) precision(1) height(2) width(2)
            if i + 9 > data.len() {
                return None;
            }
            let height = u16::from_be_bytes([data[i + 5], data[i + 6]]);
            let width = u16::from_be_bytes([data[i + 7], data[i + 8]]);
            return Some((u32::from(width), u32::from(height)));
        }
        // Scan data reached without a frame header
        if marker == 0xDA || len < 2 {
            return None;
        }
        i += 2 + len;
    }
    None
}

fn is_start_of_frame(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF)
}

#[cfg(test)]
pub(crate) fn fake_jpeg(width: u16, height: u16, body: &[u8]) -> Vec<u8> {
    let mut out = JPEG_SOI.to_vec();
    // APP0 with two bytes of payload
    out.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00]);
    // Baseline SOF0, one component
    out.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 0x08]);
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&[0x01, 0x01, 0x11, 0x00]);
    out.extend_from_slice(body);
    out.extend_from_slice(&JPEG_EOI);
    out
}
