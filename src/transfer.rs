//! Pitch-normalizing row copies between CPU buffers and mapped textures.
//!
//! CPU buffers are tightly packed BGRA. A mapped texture may pad every row up
//! to the driver's alignment, so rows are copied one by one unless both sides
//! are packed, in which case one contiguous copy is enough.
use crate::error::Error;

/// Bytes per BGRA pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Byte length of `width` packed BGRA pixels.
#[inline]
#[must_use]
pub const fn packed_row_len(width: u32) -> usize {
    width as usize * BYTES_PER_PIXEL
}

/// Byte length of a packed `width` x `height` BGRA image.
#[inline]
#[must_use]
pub const fn packed_len(width: u32, height: u32) -> usize {
    packed_row_len(width) * height as usize
}

/// Minimum byte length of a buffer holding `rows` rows of `row_len` bytes
/// spaced `pitch` bytes apart. The last row does not need its padding.
#[inline]
#[must_use]
pub const fn span_len(pitch: usize, row_len: usize, rows: usize) -> usize {
    if rows == 0 { 0 } else { pitch * (rows - 1) + row_len }
}

/// Copies `rows` rows of `row_len` bytes from `source` to `destination`.
///
/// `source_pitch` and `destination_pitch` are the byte distances between row
/// starts on each side.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if a pitch is shorter than a row or a
/// buffer is too small. Nothing is copied in that case.
pub fn copy_rows(
    source: &[u8],
    source_pitch: usize,
    destination: &mut [u8],
    destination_pitch: usize,
    row_len: usize,
    rows: usize,
) -> Result<(), Error> {
    if source_pitch < row_len || destination_pitch < row_len {
        return Err(Error::InvalidArgument("row pitch is shorter than a row"));
    }
    if source.len() < span_len(source_pitch, row_len, rows) {
        return Err(Error::InvalidArgument("source buffer is too small"));
    }
    if destination.len() < span_len(destination_pitch, row_len, rows) {
        return Err(Error::InvalidArgument("destination buffer is too small"));
    }

    if source_pitch == row_len && destination_pitch == row_len {
        let len = row_len * rows;
        destination[..len].copy_from_slice(&source[..len]);
        return Ok(());
    }

    for row in 0..rows {
        let from = row * source_pitch;
        let to = row * destination_pitch;
        destination[to..to + row_len].copy_from_slice(&source[from..from + row_len]);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_copy_is_contiguous() {
        let source: Vec<u8> = (0..32).collect();
        let mut destination = vec![0; 32];

        copy_rows(&source, 8, &mut destination, 8, 8, 4).unwrap();

        assert_eq!(destination, source);
    }

    #[test]
    fn padded_destination_keeps_padding() {
        let source: Vec<u8> = (1..=16).collect();
        let mut destination = vec![0xAA; 12 * 2];

        copy_rows(&source, 8, &mut destination, 12, 8, 2).unwrap();

        assert_eq!(&destination[0..8], &source[0..8]);
        assert_eq!(&destination[8..12], &[0xAA; 4]);
        assert_eq!(&destination[12..20], &source[8..16]);
    }

    #[test]
    fn padded_source_is_packed() {
        let mut source = vec![0xFF; 12 * 3];
        for row in 0..3 {
            for i in 0..8 {
                source[row * 12 + i] = (row * 8 + i) as u8;
            }
        }
        let mut destination = vec![0; 24];

        copy_rows(&source, 12, &mut destination, 8, 8, 3).unwrap();

        assert_eq!(destination, (0..24).collect::<Vec<u8>>());
    }

    #[test]
    fn last_row_needs_no_padding() {
        let source = vec![7; 8];
        let mut destination = vec![0; 12 + 8];

        copy_rows(&source, 4, &mut destination, 12, 4, 2).unwrap();

        assert_eq!(&destination[12..16], &[7; 4]);
    }

    #[test]
    fn short_buffers_are_rejected_untouched() {
        let source = vec![1; 15];
        let mut destination = vec![0; 16];

        assert!(copy_rows(&source, 8, &mut destination, 8, 8, 2).is_err());
        assert!(copy_rows(&[1; 16], 4, &mut destination, 8, 8, 2).is_err());
        assert!(destination.iter().all(|byte| *byte == 0));
    }

    #[test]
    fn sizes() {
        assert_eq!(packed_row_len(3), 12);
        assert_eq!(packed_len(3, 2), 24);
        assert_eq!(span_len(16, 12, 0), 0);
        assert_eq!(span_len(16, 12, 3), 44);
    }
}
