//! zlib payload compression for large cache values.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::error::{CacheError, CacheResult};

/// Compress `bytes` with zlib.
pub(crate) fn compress(bytes: &[u8]) -> CacheResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| CacheError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| CacheError::Compression(e.to_string()))
}

/// Inflate a zlib payload produced by [`compress`].
pub(crate) fn decompress(bytes: &[u8]) -> CacheResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CacheError::Decompression(e.to_string()))?;
    Ok(out)
}

/// Fraction of bytes saved: `1 - compressed / original`.
pub(crate) fn savings_ratio(original: usize, compressed: usize) -> f64 {
    if original == 0 {
        return 0.0;
    }
    1.0 - compressed as f64 / original as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repetitive_payload_shrinks() {
        let payload = "context ".repeat(500);
        let packed = compress(payload.as_bytes()).unwrap();
        assert!(packed.len() < payload.len() / 4);
        assert_eq!(decompress(&packed).unwrap(), payload.as_bytes());
    }

    #[test]
    fn test_garbage_fails_to_decompress() {
        assert!(matches!(
            decompress(b"definitely not zlib"),
            Err(CacheError::Decompression(_))
        ));
    }

    #[test]
    fn test_savings_ratio() {
        assert_eq!(savings_ratio(0, 0), 0.0);
        assert!((savings_ratio(100, 70) - 0.3).abs() < 1e-9);
    }
}
