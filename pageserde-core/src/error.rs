// In: src/error.rs

//! This module defines the single, unified error type for the page serde layer.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.
//!
//! Every variant is fatal for the page that produced it. Nothing in this crate
//! retries, and a malformed page is never partially returned.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PagesSerdeError {
    // =========================================================================
    // === Semantic Errors (the taxonomy callers dispatch on)
    // =========================================================================
    /// Bad magic, version or markers, truncated header or payload, length
    /// mismatch, trailing bytes, or column data that fails validation.
    #[error("Page frame format error: {0}")]
    FrameFormatError(String),

    /// An encoding tag with no registered codec, or a column type that has no
    /// encoding. Reported separately but counted as a format error.
    #[error("Unsupported block encoding: {0}")]
    UnsupportedEncoding(String),

    /// Decompression rejected its input, produced the wrong number of bytes,
    /// or the decompressed bytes failed the checksum.
    #[error("Compression failed: {0}")]
    CompressionError(String),

    /// Decryption or authentication failed (tampered payload or wrong key),
    /// or the cipher was destroyed or never configured.
    #[error("Cipher operation failed: {0}")]
    CipherError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal logic error (this is a bug): {0}")]
    InternalError(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error from the caller-supplied sink or source, propagated unmodified.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error originating from the Arrow library.
    #[error("Arrow operation failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// An error from the Serde JSON library, raised while parsing configuration.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl PagesSerdeError {
    /// `true` for errors that mean the bytes themselves are not a page this
    /// reader understands.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            PagesSerdeError::FrameFormatError(_) | PagesSerdeError::UnsupportedEncoding(_)
        )
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PagesSerdeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_encoding_counts_as_format_error() {
        assert!(PagesSerdeError::UnsupportedEncoding("LongDecimal".into()).is_format_error());
        assert!(PagesSerdeError::FrameFormatError("bad magic".into()).is_format_error());
        assert!(!PagesSerdeError::CipherError("tag mismatch".into()).is_format_error());
        assert!(!PagesSerdeError::CompressionError("short".into()).is_format_error());
    }

    #[test]
    fn test_io_error_converts_unmodified() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "peer closed");
        let err: PagesSerdeError = io.into();
        match err {
            PagesSerdeError::Io(inner) => assert_eq!(inner.kind(), std::io::ErrorKind::BrokenPipe),
            other => panic!("expected Io, got {:?}", other),
        }
    }
}
