//! This module contains the pure, stateless kernels for LEB128 (Little-Endian
//! Base 128) variable-length integer encoding and decoding.
//!
//! The block codecs use it for the length prefix of every encoding tag. Reads
//! work against any `std::io::Read` so the same kernel serves in-memory buffers
//! and streaming sources. It is fully panic-free.

use std::io::{Read, Write};

use num_traits::{PrimInt, Unsigned};

use crate::error::PagesSerdeError;
use crate::utils::read_u8;

//==================================================================================
// 1. Public API for Single-Value Operations
//==================================================================================

/// Encodes a single unsigned integer into a LEB128 byte sequence, appending to a buffer.
pub fn encode_one<T>(value: T, buffer: &mut Vec<u8>) -> Result<(), PagesSerdeError>
where
    T: PrimInt + Unsigned,
{
    let zero = T::zero();
    let seven_bit_mask = T::from(0x7F).ok_or_else(|| {
        PagesSerdeError::InternalError("Failed to create 7-bit mask for type".to_string())
    })?;

    let mut current_value = value;
    loop {
        let mut byte = (current_value & seven_bit_mask).to_u8().ok_or_else(|| {
            PagesSerdeError::InternalError("Failed to convert generic integer to u8".to_string())
        })?;
        current_value = current_value >> 7;
        if current_value != zero {
            byte |= 0x80;
        }
        buffer.push(byte);

        if current_value == zero {
            return Ok(());
        }
    }
}

/// Encodes a single unsigned integer straight into a writer.
pub fn write_one<T, W>(value: T, writer: &mut W) -> Result<(), PagesSerdeError>
where
    T: PrimInt + Unsigned,
    W: Write + ?Sized,
{
    // At most 19 bytes for a u128.
    let mut scratch = Vec::with_capacity(19);
    encode_one(value, &mut scratch)?;
    writer.write_all(&scratch)?;
    Ok(())
}

/// Decodes a single unsigned integer from a reader.
pub fn read_one<T, R>(reader: &mut R) -> Result<T, PagesSerdeError>
where
    T: PrimInt + Unsigned,
    R: Read + ?Sized,
{
    let mut result = T::zero();
    let mut shift = 0;
    let total_bits = std::mem::size_of::<T>() * 8;

    loop {
        let byte = read_u8(reader, "LEB128 value")?;

        // Check if adding these 7 bits would overflow the type's capacity.
        if shift >= total_bits {
            return Err(PagesSerdeError::FrameFormatError(
                "LEB128 integer overflow during decoding".to_string(),
            ));
        }

        let seven_bit_payload = T::from(byte & 0x7F).ok_or_else(|| {
            PagesSerdeError::InternalError("Failed to create 7-bit payload from byte".to_string())
        })?;
        result = result | (seven_bit_payload << shift);

        if byte & 0x80 == 0 {
            // The last byte must not carry bits beyond the type's width.
            if shift + 7 > total_bits && (byte >> (total_bits - shift)) > 0 {
                return Err(PagesSerdeError::FrameFormatError(
                    "LEB128 integer overflow during decoding".to_string(),
                ));
            }
            return Ok(result);
        }

        shift += 7;
    }
}
