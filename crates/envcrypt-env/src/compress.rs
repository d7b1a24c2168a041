//! zstd compression of canonical documents
//!
//! Decompression is bounded: output beyond `limit` bytes is treated as
//! corruption rather than buffered.

use std::io::Read;

use zeroize::Zeroizing;

use envcrypt_core::{EnvcryptError, EnvcryptResult};

/// zstd level used when no configuration is supplied
pub const DEFAULT_LEVEL: i32 = 3;

/// Largest canonical document accepted, in bytes (1 MiB)
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 1024 * 1024;

pub fn compress(data: &[u8], level: i32) -> EnvcryptResult<Vec<u8>> {
    zstd::encode_all(data, level)
        .map_err(|e| EnvcryptError::Serialization(format!("zstd compress: {e}")))
}

pub fn decompress(data: &[u8], limit: usize) -> EnvcryptResult<Zeroizing<Vec<u8>>> {
    let decoder = zstd::stream::read::Decoder::new(data)
        .map_err(|e| EnvcryptError::Corruption(format!("zstd decoder: {e}")))?;

    let mut out = Zeroizing::new(Vec::new());
    decoder
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| EnvcryptError::Corruption(format!("zstd decompress: {e}")))?;

    if out.len() > limit {
        return Err(EnvcryptError::Corruption(format!(
            "decompressed document exceeds {limit} bytes"
        )));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let data = b"A=1\nB=2\nC=3\n".repeat(50);
        let packed = compress(&data, DEFAULT_LEVEL).unwrap();
        assert!(packed.len() < data.len());

        let unpacked = decompress(&packed, DEFAULT_MAX_DOCUMENT_BYTES).unwrap();
        assert_eq!(unpacked.as_slice(), data.as_slice());
    }

    #[test]
    fn test_empty_input() {
        let packed = compress(b"", DEFAULT_LEVEL).unwrap();
        assert!(decompress(&packed, DEFAULT_MAX_DOCUMENT_BYTES).unwrap().is_empty());
    }

    #[test]
    fn test_garbage_is_corruption() {
        let err = decompress(b"definitely not zstd", DEFAULT_MAX_DOCUMENT_BYTES).unwrap_err();
        assert!(matches!(err, EnvcryptError::Corruption(_)));
    }

    #[test]
    fn test_truncated_frame_is_corruption() {
        let data = b"SECRET=value\n".repeat(100);
        let packed = compress(&data, DEFAULT_LEVEL).unwrap();
        let err = decompress(&packed[..packed.len() / 2], DEFAULT_MAX_DOCUMENT_BYTES).unwrap_err();
        assert!(matches!(err, EnvcryptError::Corruption(_)));
    }

    #[test]
    fn test_limit_enforced() {
        let data = vec![b'x'; 4096];
        let packed = compress(&data, DEFAULT_LEVEL).unwrap();

        assert!(decompress(&packed, 4096).is_ok());
        let err = decompress(&packed, 4095).unwrap_err();
        assert!(matches!(err, EnvcryptError::Corruption(_)));
    }
}
