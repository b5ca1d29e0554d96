//! This module contains the pure, stateless kernels for Zstandard compression
//! and decompression of page payloads.
//!
//! It is a safe, panic-free wrapper around the `zstd` crate. Frames carry the
//! zstd content checksum, and decompression never produces more than the
//! caller's expected length, so a corrupted frame cannot balloon memory.

use std::io::{Read, Write};
use zstd::stream::{Decoder, Encoder};

use crate::error::PagesSerdeError;

/// Output buffer reserved before the decoder has produced anything.
const MAX_PREALLOCATED_BYTES: usize = 1 << 20;

//==================================================================================
// 1. Public API
//==================================================================================

/// The worst-case compressed size for `input_len` bytes.
pub fn max_compressed_len(input_len: usize) -> usize {
    zstd::zstd_safe::compress_bound(input_len)
}

/// Compresses `input_bytes`, appending one complete zstd frame to `output_buf`.
/// Returns the number of bytes appended.
pub fn compress_into(
    input_bytes: &[u8],
    output_buf: &mut Vec<u8>,
    level: i32,
) -> Result<usize, PagesSerdeError> {
    let start = output_buf.len();
    output_buf.reserve(max_compressed_len(input_bytes.len()));

    // We use the streaming Encoder, which writes directly to the output buffer.
    let mut encoder = Encoder::new(&mut *output_buf, level)
        .map_err(|e| PagesSerdeError::CompressionError(e.to_string()))?;
    encoder
        .include_checksum(true)
        .map_err(|e| PagesSerdeError::CompressionError(e.to_string()))?;
    encoder
        .write_all(input_bytes)
        .map_err(|e| PagesSerdeError::CompressionError(e.to_string()))?;

    // `finish` is essential to finalize the Zstd frame.
    encoder
        .finish()
        .map_err(|e| PagesSerdeError::CompressionError(e.to_string()))?;

    Ok(output_buf.len() - start)
}

/// Decompresses one zstd frame that must expand to exactly `expected_len` bytes.
///
/// `expected_len` comes from an untrusted header, so it only caps the output:
/// the buffer grows with the bytes the decoder actually produces.
pub fn decompress_exact(
    input_bytes: &[u8],
    expected_len: usize,
) -> Result<Vec<u8>, PagesSerdeError> {
    let decoder = Decoder::new(input_bytes)
        .map_err(|e| PagesSerdeError::CompressionError(e.to_string()))?
        .single_frame();

    // One byte past the limit is enough to detect an oversized frame.
    let limit = (expected_len as u64).saturating_add(1);
    let mut decompressed = Vec::with_capacity(expected_len.min(MAX_PREALLOCATED_BYTES));
    decoder
        .take(limit)
        .read_to_end(&mut decompressed)
        .map_err(|e| PagesSerdeError::CompressionError(e.to_string()))?;

    if decompressed.len() != expected_len {
        return Err(PagesSerdeError::CompressionError(format!(
            "Decompressed size does not match header. Expected {}, got {}.",
            expected_len,
            decompressed.len()
        )));
    }

    Ok(decompressed)
}

//==================================================================================
// 2. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zstd_roundtrip_simple_text() {
        let original_bytes =
            b"hello world, this is a test of zstd compression. hello world, this is a test."
                .to_vec();

        let mut compressed = Vec::new();
        let written = compress_into(&original_bytes, &mut compressed, 3).unwrap();
        assert_eq!(written, compressed.len());

        let decompressed = decompress_exact(&compressed, original_bytes.len()).unwrap();
        assert_eq!(original_bytes, decompressed);
    }

    #[test]
    fn test_zstd_highly_compressible_data() {
        let original_bytes = vec![42u8; 10_000];
        let mut compressed = Vec::new();
        compress_into(&original_bytes, &mut compressed, 5).unwrap();

        assert!(compressed.len() < 64);
        assert!(compressed.len() <= max_compressed_len(original_bytes.len()));
        assert_eq!(
            decompress_exact(&compressed, original_bytes.len()).unwrap(),
            original_bytes
        );
    }

    #[test]
    fn test_compress_appends_after_existing_bytes() {
        let mut buf = vec![1, 2, 3];
        let written = compress_into(b"abcabcabc", &mut buf, 3).unwrap();
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(
            decompress_exact(&buf[3..3 + written], 9).unwrap(),
            b"abcabcabc".to_vec()
        );
    }

    #[test]
    fn test_wrong_expected_length_is_rejected() {
        let original_bytes = vec![7u8; 1000];
        let mut compressed = Vec::new();
        compress_into(&original_bytes, &mut compressed, 3).unwrap();

        assert!(matches!(
            decompress_exact(&compressed, 999),
            Err(PagesSerdeError::CompressionError(_))
        ));
        assert!(matches!(
            decompress_exact(&compressed, 1001),
            Err(PagesSerdeError::CompressionError(_))
        ));
    }

    #[test]
    fn test_zstd_decompress_invalid_data() {
        let result = decompress_exact(&[1, 2, 3, 4, 5], 16);
        assert!(matches!(result, Err(PagesSerdeError::CompressionError(_))));
    }

    #[test]
    fn test_untrusted_expected_length_does_not_drive_allocation() {
        // Would overflow any up-front reservation.
        let huge = usize::MAX / 2;
        assert!(matches!(
            decompress_exact(&[0x28, 0xB5, 0x2F, 0xFD, 0, 0, 0, 0], huge),
            Err(PagesSerdeError::CompressionError(_))
        ));

        let mut compressed = Vec::new();
        compress_into(&[5u8; 100], &mut compressed, 3).unwrap();
        match decompress_exact(&compressed, huge) {
            Err(PagesSerdeError::CompressionError(msg)) => assert!(msg.contains("got 100")),
            other => panic!("expected CompressionError, got {:?}", other),
        }
    }
}
