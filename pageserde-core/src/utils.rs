//! This module provides a set of shared, low-level I/O helpers used by every
//! frame reader in the crate.
//!
//! Its primary responsibilities include:
//! 1.  Turning an unexpected end of stream *inside* a frame into a
//!     `FrameFormatError` (truncation), while any other I/O error is passed
//!     through unmodified as `PagesSerdeError::Io`.
//! 2.  Reading length-prefixed byte ranges without trusting the declared length
//!     for the up-front allocation.
//! 3.  Little-endian fixed-width integer reads.

use std::io::{ErrorKind, Read};

use crate::error::PagesSerdeError;

//==================================================================================
// 1. Core Utility Functions
//==================================================================================

/// Fills `buf` from `source`. An early end of stream is reported as a truncated
/// `what`.
pub fn read_exact_framed<R: Read + ?Sized>(
    source: &mut R,
    buf: &mut [u8],
    what: &str,
) -> Result<(), PagesSerdeError> {
    source.read_exact(buf).map_err(|e| truncation_or_io(e, what))
}

/// Reads exactly `len` bytes into a new vector.
///
/// The vector grows with the bytes actually delivered, so a corrupted length
/// cannot force a large allocation on its own.
pub fn read_bounded<R: Read + ?Sized>(
    source: &mut R,
    len: usize,
    what: &str,
) -> Result<Vec<u8>, PagesSerdeError> {
    let mut buf = Vec::new();
    let read = (&mut *source)
        .take(len as u64)
        .read_to_end(&mut buf)
        .map_err(|e| truncation_or_io(e, what))?;
    if read != len {
        return Err(PagesSerdeError::FrameFormatError(format!(
            "truncated {}: expected {} bytes, got {}",
            what, len, read
        )));
    }
    Ok(buf)
}

/// Reads a frame magic number. Returns `None` if the stream ended cleanly
/// before the first byte, which is how a sequence of frames ends.
pub fn read_magic_or_eof<R: Read + ?Sized>(
    source: &mut R,
) -> Result<Option<[u8; 4]>, PagesSerdeError> {
    let mut magic = [0u8; 4];
    let mut filled = 0;
    while filled < magic.len() {
        match source.read(&mut magic[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(PagesSerdeError::FrameFormatError(format!(
                    "truncated magic number: got {} of 4 bytes",
                    filled
                )))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(PagesSerdeError::Io(e)),
        }
    }
    Ok(Some(magic))
}

pub fn read_u8<R: Read + ?Sized>(source: &mut R, what: &str) -> Result<u8, PagesSerdeError> {
    let mut buf = [0u8; 1];
    read_exact_framed(source, &mut buf, what)?;
    Ok(buf[0])
}

pub fn read_u16_le<R: Read + ?Sized>(source: &mut R, what: &str) -> Result<u16, PagesSerdeError> {
    let mut buf = [0u8; 2];
    read_exact_framed(source, &mut buf, what)?;
    Ok(u16::from_le_bytes(buf))
}

pub fn read_u32_le<R: Read + ?Sized>(source: &mut R, what: &str) -> Result<u32, PagesSerdeError> {
    let mut buf = [0u8; 4];
    read_exact_framed(source, &mut buf, what)?;
    Ok(u32::from_le_bytes(buf))
}

/// Converts an in-memory length to the `u32` used on the wire.
pub fn wire_len(len: usize, what: &str) -> Result<u32, PagesSerdeError> {
    u32::try_from(len).map_err(|_| {
        PagesSerdeError::FrameFormatError(format!(
            "{} of {} bytes does not fit the 32-bit length field",
            what, len
        ))
    })
}

fn truncation_or_io(err: std::io::Error, what: &str) -> PagesSerdeError {
    if err.kind() == ErrorKind::UnexpectedEof {
        PagesSerdeError::FrameFormatError(format!("truncated {}", what))
    } else {
        PagesSerdeError::Io(err)
    }
}
