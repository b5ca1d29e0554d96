//! This module is the public entry point for all stateless, low-level
//! byte kernels used by the block codecs and the buffered strategy.

pub mod leb128;
pub mod zstd;
