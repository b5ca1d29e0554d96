// In: src/compression.rs

//! The compressor/decompressor capability consumed by the buffered strategy,
//! and its default zstd implementation.
//!
//! Both traits are stateless: one instance is shared by every page a strategy
//! serializes, across threads.

use std::fmt;

use crate::error::PagesSerdeError;
use crate::kernels::zstd;

//==================================================================================
// 1. Capability Traits
//==================================================================================

pub trait Compressor: Send + Sync + fmt::Debug {
    /// A short identifier for logs and metrics.
    fn name(&self) -> &'static str;

    /// Upper bound on the output of `compress` for `uncompressed_len` input bytes.
    fn max_compressed_length(&self, uncompressed_len: usize) -> usize;

    /// Compresses `input`, appending to `output`. Returns the number of bytes appended.
    fn compress(&self, input: &[u8], output: &mut Vec<u8>) -> Result<usize, PagesSerdeError>;
}

pub trait Decompressor: Send + Sync + fmt::Debug {
    /// Decompresses `input`, which must expand to exactly `expected_len` bytes.
    /// Malformed input and length mismatches are `CompressionError`s.
    fn decompress(&self, input: &[u8], expected_len: usize) -> Result<Vec<u8>, PagesSerdeError>;
}

//==================================================================================
// 2. Zstd Implementation
//==================================================================================

#[derive(Debug, Clone, Copy)]
pub struct ZstdCompressor {
    level: i32,
}

impl ZstdCompressor {
    pub fn new(level: i32) -> Self {
        Self { level }
    }

    pub fn level(&self) -> i32 {
        self.level
    }
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Compressor for ZstdCompressor {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn max_compressed_length(&self, uncompressed_len: usize) -> usize {
        zstd::max_compressed_len(uncompressed_len)
    }

    fn compress(&self, input: &[u8], output: &mut Vec<u8>) -> Result<usize, PagesSerdeError> {
        zstd::compress_into(input, output, self.level)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZstdDecompressor;

impl Decompressor for ZstdDecompressor {
    fn decompress(&self, input: &[u8], expected_len: usize) -> Result<Vec<u8>, PagesSerdeError> {
        zstd::decompress_exact(input, expected_len)
    }
}
