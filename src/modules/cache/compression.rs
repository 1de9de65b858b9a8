//! LZ4 block compression for warm entries.
//!
//! Frames carry a 4-byte little-endian length prefix for the uncompressed
//! size so decompression can allocate once.

use bytes::Bytes;

/// Compress `data`, returning `None` unless the frame is strictly smaller.
#[must_use]
pub fn compress(data: &[u8]) -> Option<Bytes> {
    let frame = lz4_flex::compress_prepend_size(data);
    (frame.len() < data.len()).then(|| Bytes::from(frame))
}

/// Restore a frame produced by [`compress`].
///
/// # Errors
///
/// Returns the codec's message if the frame is corrupt.
pub fn decompress(frame: &[u8]) -> Result<Bytes, String> {
    lz4_flex::decompress_size_prepended(frame)
        .map(Bytes::from)
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repetitive_data_shrinks() {
        let data = b"abcdefgh".repeat(512);
        let frame = compress(&data).unwrap();
        assert!(frame.len() < data.len());
        assert_eq!(decompress(&frame).unwrap(), Bytes::from(data));
    }

    #[test]
    fn test_incompressible_data_rejected() {
        let data: Vec<u8> = (0..64u32).map(|i| (i.wrapping_mul(2654435761) >> 24) as u8).collect();
        assert!(compress(&data).is_none());
    }

    #[test]
    fn test_corrupt_frame() {
        assert!(decompress(&[10, 0, 0, 0, 0xf0]).is_err());
    }
}
