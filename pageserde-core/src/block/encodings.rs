//! The built-in block encodings.
//!
//! Every encoding writes the same preamble:
//!
//! ```text
//! u32   position count
//! u8    0 = no nulls, 1 = packed validity bitmap follows
//! [..]  ceil(n / 8) bitmap bytes, LSB first (only if the flag is 1)
//! ```
//!
//! followed by its values:
//! * primitive: `n` native values, little-endian
//! * boolean: `ceil(n / 8)` packed value bytes
//! * variable width: `n + 1` `i32` offsets rebased to start at zero, then the value bytes
//!
//! Byte order: values are written in native order and the format assumes a
//! little-endian host, like the rest of the Arrow buffers we hand around.

use std::fmt;
use std::io::{Read, Write};
use std::marker::PhantomData;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, GenericByteArray, PrimitiveArray};
use arrow::buffer::{BooleanBuffer, Buffer, NullBuffer, OffsetBuffer, ScalarBuffer};
use arrow::datatypes::{ArrowPrimitiveType, ByteArrayType};
use arrow::util::bit_util;
use bytemuck::Pod;

use super::BlockEncoding;
use crate::error::PagesSerdeError;
use crate::types::BlockType;
use crate::utils::{read_bounded, read_exact_framed, read_u32_le, read_u8, wire_len};

/// Most positions a single decoded block may claim.
pub const MAX_BLOCK_POSITIONS: usize = 1 << 26;

/// Values are read in slices of this many elements so the buffer only grows as
/// far as the source actually delivers.
const READ_CHUNK_VALUES: usize = 64 * 1024;

const NO_NULLS: u8 = 0;
const HAS_NULLS: u8 = 1;

//==================================================================================
// 1. Primitive Encoding
//==================================================================================

/// Fixed-width numeric and temporal columns.
pub struct PrimitiveBlockEncoding<T: ArrowPrimitiveType> {
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ArrowPrimitiveType> PrimitiveBlockEncoding<T> {
    pub fn new(block_type: BlockType) -> Self {
        Self {
            name: block_type.to_string(),
            _marker: PhantomData,
        }
    }
}

impl<T: ArrowPrimitiveType> fmt::Debug for PrimitiveBlockEncoding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimitiveBlockEncoding")
            .field("name", &self.name)
            .finish()
    }
}

impl<T> BlockEncoding for PrimitiveBlockEncoding<T>
where
    T: ArrowPrimitiveType,
    T::Native: Pod,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn write_block(&self, block: &dyn Array, sink: &mut dyn Write) -> Result<(), PagesSerdeError> {
        let array = downcast::<PrimitiveArray<T>>(block, &self.name)?;
        write_preamble(array.len(), array.nulls(), sink)?;
        let values: &[T::Native] = array.values();
        sink.write_all(bytemuck::cast_slice(values))?;
        Ok(())
    }

    fn read_block(&self, source: &mut dyn Read) -> Result<ArrayRef, PagesSerdeError> {
        let (len, nulls) = read_preamble(source)?;
        let values = read_pod_values::<T::Native>(source, len)?;
        let array = PrimitiveArray::<T>::try_new(ScalarBuffer::from(values), nulls)
            .map_err(|e| invalid_block(&self.name, e))?;
        Ok(Arc::new(array))
    }
}

//==================================================================================
// 2. Boolean Encoding
//==================================================================================

#[derive(Debug, Default)]
pub struct BooleanBlockEncoding;

impl BlockEncoding for BooleanBlockEncoding {
    fn name(&self) -> &str {
        "Boolean"
    }

    fn write_block(&self, block: &dyn Array, sink: &mut dyn Write) -> Result<(), PagesSerdeError> {
        let array = downcast::<BooleanArray>(block, self.name())?;
        write_preamble(array.len(), array.nulls(), sink)?;
        write_packed_bits(array.values(), sink)
    }

    fn read_block(&self, source: &mut dyn Read) -> Result<ArrayRef, PagesSerdeError> {
        let (len, nulls) = read_preamble(source)?;
        let values = read_packed_bits(source, len, "boolean values")?;
        Ok(Arc::new(BooleanArray::new(values, nulls)))
    }
}

//==================================================================================
// 3. Variable-Width Encoding (Utf8, Binary)
//==================================================================================

pub struct VariableWidthBlockEncoding<T: ByteArrayType<Offset = i32>> {
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ByteArrayType<Offset = i32>> VariableWidthBlockEncoding<T> {
    pub fn new(block_type: BlockType) -> Self {
        Self {
            name: block_type.to_string(),
            _marker: PhantomData,
        }
    }
}

impl<T: ByteArrayType<Offset = i32>> fmt::Debug for VariableWidthBlockEncoding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableWidthBlockEncoding")
            .field("name", &self.name)
            .finish()
    }
}

impl<T: ByteArrayType<Offset = i32>> BlockEncoding for VariableWidthBlockEncoding<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_block(&self, block: &dyn Array, sink: &mut dyn Write) -> Result<(), PagesSerdeError> {
        let array = downcast::<GenericByteArray<T>>(block, &self.name)?;
        write_preamble(array.len(), array.nulls(), sink)?;

        // A sliced array's offsets start mid-buffer; rebase them to zero.
        let offsets: &[i32] = array.value_offsets();
        let base = offsets[0];
        let end = offsets[offsets.len() - 1];
        if base == 0 {
            sink.write_all(bytemuck::cast_slice(offsets))?;
        } else {
            let rebased: Vec<i32> = offsets.iter().map(|offset| offset - base).collect();
            sink.write_all(bytemuck::cast_slice(&rebased))?;
        }
        sink.write_all(&array.value_data()[base as usize..end as usize])?;
        Ok(())
    }

    fn read_block(&self, source: &mut dyn Read) -> Result<ArrayRef, PagesSerdeError> {
        let (len, nulls) = read_preamble(source)?;
        let offsets = read_pod_values::<i32>(source, len + 1)?;

        if offsets[0] != 0 {
            return Err(PagesSerdeError::FrameFormatError(format!(
                "{} block offsets must start at 0, got {}",
                self.name, offsets[0]
            )));
        }
        if offsets.windows(2).any(|pair| pair[1] < pair[0]) {
            return Err(PagesSerdeError::FrameFormatError(format!(
                "{} block offsets are not monotonic",
                self.name
            )));
        }

        let data_len = offsets[len] as usize;
        let values = read_bounded(source, data_len, "variable-width values")?;

        // Offsets were validated above, so `OffsetBuffer::new` cannot panic.
        let array = GenericByteArray::<T>::try_new(
            OffsetBuffer::new(ScalarBuffer::from(offsets)),
            Buffer::from_vec(values),
            nulls,
        )
        .map_err(|e| invalid_block(&self.name, e))?;
        Ok(Arc::new(array))
    }
}

//==================================================================================
// 4. Private Helpers
//==================================================================================

fn downcast<'a, A: Array + 'static>(
    block: &'a dyn Array,
    encoding: &str,
) -> Result<&'a A, PagesSerdeError> {
    block.as_any().downcast_ref::<A>().ok_or_else(|| {
        PagesSerdeError::InternalError(format!(
            "{:?} block handed to the {} encoding",
            block.data_type(),
            encoding
        ))
    })
}

fn invalid_block(encoding: &str, err: arrow::error::ArrowError) -> PagesSerdeError {
    PagesSerdeError::FrameFormatError(format!("invalid {} block: {}", encoding, err))
}

fn write_preamble(
    len: usize,
    nulls: Option<&NullBuffer>,
    sink: &mut dyn Write,
) -> Result<(), PagesSerdeError> {
    sink.write_all(&wire_len(len, "block position count")?.to_le_bytes())?;
    match nulls.filter(|nulls| nulls.null_count() > 0) {
        Some(nulls) => {
            sink.write_all(&[HAS_NULLS])?;
            write_packed_bits(nulls.inner(), sink)
        }
        None => {
            sink.write_all(&[NO_NULLS])?;
            Ok(())
        }
    }
}

fn read_preamble(
    source: &mut dyn Read,
) -> Result<(usize, Option<NullBuffer>), PagesSerdeError> {
    let len = read_u32_le(source, "block position count")? as usize;
    if len > MAX_BLOCK_POSITIONS {
        return Err(PagesSerdeError::FrameFormatError(format!(
            "block claims {} positions, limit is {}",
            len, MAX_BLOCK_POSITIONS
        )));
    }

    let nulls = match read_u8(source, "null flag")? {
        NO_NULLS => None,
        HAS_NULLS => Some(NullBuffer::new(read_packed_bits(source, len, "validity bitmap")?)),
        other => {
            return Err(PagesSerdeError::FrameFormatError(format!(
                "unknown null flag {}",
                other
            )))
        }
    };
    Ok((len, nulls))
}

/// Writes exactly `ceil(len / 8)` bytes, re-aligning the bits if the buffer is
/// sliced at a non-byte offset.
fn write_packed_bits(bits: &BooleanBuffer, sink: &mut dyn Write) -> Result<(), PagesSerdeError> {
    let packed = bits.sliced();
    let byte_len = bit_util::ceil(bits.len(), 8);
    sink.write_all(&packed.as_slice()[..byte_len])?;
    Ok(())
}

fn read_packed_bits(
    source: &mut dyn Read,
    len: usize,
    what: &str,
) -> Result<BooleanBuffer, PagesSerdeError> {
    let bytes = read_bounded(source, bit_util::ceil(len, 8), what)?;
    Ok(BooleanBuffer::new(Buffer::from_vec(bytes), 0, len))
}

fn read_pod_values<T: Pod>(source: &mut dyn Read, len: usize) -> Result<Vec<T>, PagesSerdeError> {
    let mut values: Vec<T> = Vec::with_capacity(len.min(READ_CHUNK_VALUES));
    while values.len() < len {
        let start = values.len();
        let chunk = (len - start).min(READ_CHUNK_VALUES);
        values.resize(start + chunk, T::zeroed());
        read_exact_framed(
            source,
            bytemuck::cast_slice_mut(&mut values[start..]),
            "block values",
        )?;
    }
    Ok(values)
}

//==================================================================================
// 5. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{
        BinaryArray, Date32Array, Float64Array, Int32Array, Int8Array, StringArray, UInt64Array,
    };
    use arrow::datatypes::{
        Date32Type, Float64Type, GenericBinaryType, GenericStringType, Int32Type, Int8Type,
        UInt64Type,
    };

    fn roundtrip(encoding: &dyn BlockEncoding, block: &dyn Array) -> ArrayRef {
        let mut bytes = Vec::new();
        encoding.write_block(block, &mut bytes).unwrap();
        let mut source: &[u8] = &bytes;
        let decoded = encoding.read_block(&mut source).unwrap();
        assert!(source.is_empty(), "decoder left {} trailing bytes", source.len());
        decoded
    }

    #[test]
    fn test_primitive_blocks_with_and_without_nulls() {
        let ints = Int32Array::from(vec![Some(1), None, Some(-3), Some(i32::MAX)]);
        let decoded = roundtrip(&PrimitiveBlockEncoding::<Int32Type>::new(BlockType::Int32), &ints);
        assert_eq!(decoded.as_ref(), &ints as &dyn Array);

        let floats = Float64Array::from(vec![0.5, -0.0, f64::INFINITY]);
        let decoded =
            roundtrip(&PrimitiveBlockEncoding::<Float64Type>::new(BlockType::Float64), &floats);
        assert_eq!(decoded.as_ref(), &floats as &dyn Array);
        assert_eq!(decoded.null_count(), 0);

        let bytes = Int8Array::from(vec![i8::MIN, 0, i8::MAX]);
        let decoded = roundtrip(&PrimitiveBlockEncoding::<Int8Type>::new(BlockType::Int8), &bytes);
        assert_eq!(decoded.as_ref(), &bytes as &dyn Array);

        let dates = Date32Array::from(vec![Some(19_000), None]);
        let decoded =
            roundtrip(&PrimitiveBlockEncoding::<Date32Type>::new(BlockType::Date32), &dates);
        assert_eq!(decoded.as_ref(), &dates as &dyn Array);
    }

    #[test]
    fn test_sliced_primitive_block() {
        let base = UInt64Array::from((0..100u64).map(Some).collect::<Vec<_>>());
        let sliced = base.slice(13, 37);
        let decoded =
            roundtrip(&PrimitiveBlockEncoding::<UInt64Type>::new(BlockType::UInt64), &sliced);
        assert_eq!(decoded.len(), 37);
        assert_eq!(decoded.as_ref(), &sliced as &dyn Array);
    }

    #[test]
    fn test_boolean_block_at_unaligned_offset() {
        let base = BooleanArray::from(vec![
            Some(true),
            None,
            Some(false),
            Some(true),
            Some(true),
            None,
            Some(false),
            Some(true),
            Some(false),
            Some(true),
        ]);
        let sliced = base.slice(3, 6);
        let decoded = roundtrip(&BooleanBlockEncoding, &sliced);
        assert_eq!(decoded.as_ref(), &sliced as &dyn Array);
    }

    #[test]
    fn test_sliced_string_block_is_rebased() {
        let base =
            StringArray::from(vec![Some("alpha"), None, Some("beta"), Some(""), Some("gamma")]);
        let sliced = base.slice(2, 3);
        let encoding = VariableWidthBlockEncoding::<GenericStringType<i32>>::new(BlockType::Utf8);
        let decoded = roundtrip(&encoding, &sliced);
        assert_eq!(decoded.as_ref(), &sliced as &dyn Array);
    }

    #[test]
    fn test_binary_block() {
        let binary = BinaryArray::from(vec![Some(&b"\x00\xff"[..]), None, Some(&b""[..])]);
        let encoding = VariableWidthBlockEncoding::<GenericBinaryType<i32>>::new(BlockType::Binary);
        let decoded = roundtrip(&encoding, &binary);
        assert_eq!(decoded.as_ref(), &binary as &dyn Array);
    }

    #[test]
    fn test_invalid_utf8_is_format_error() {
        let binary = BinaryArray::from(vec![Some(&b"\xff\xfe"[..])]);
        let mut bytes = Vec::new();
        VariableWidthBlockEncoding::<GenericBinaryType<i32>>::new(BlockType::Binary)
            .write_block(&binary, &mut bytes)
            .unwrap();

        let mut source: &[u8] = &bytes;
        let result = VariableWidthBlockEncoding::<GenericStringType<i32>>::new(BlockType::Utf8)
            .read_block(&mut source);
        assert!(matches!(result, Err(PagesSerdeError::FrameFormatError(_))));
    }

    #[test]
    fn test_non_monotonic_offsets_are_rejected() {
        let strings = StringArray::from(vec!["ab", "cd"]);
        let mut bytes = Vec::new();
        let encoding = VariableWidthBlockEncoding::<GenericStringType<i32>>::new(BlockType::Utf8);
        encoding.write_block(&strings, &mut bytes).unwrap();

        // preamble (4 + 1), offsets [0, 2, 4]: make the middle offset 9.
        bytes[9..13].copy_from_slice(&9i32.to_le_bytes());
        let mut source: &[u8] = &bytes;
        assert!(matches!(
            encoding.read_block(&mut source),
            Err(PagesSerdeError::FrameFormatError(msg)) if msg.contains("monotonic")
        ));
    }

    #[test]
    fn test_huge_position_count_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.push(NO_NULLS);
        let mut source: &[u8] = &bytes;
        let encoding = PrimitiveBlockEncoding::<Int32Type>::new(BlockType::Int32);
        let result = encoding.read_block(&mut source);
        assert!(matches!(result, Err(PagesSerdeError::FrameFormatError(_))));
    }

    #[test]
    fn test_truncated_values_are_format_error() {
        let ints = Int32Array::from(vec![1, 2, 3]);
        let mut bytes = Vec::new();
        let encoding = PrimitiveBlockEncoding::<Int32Type>::new(BlockType::Int32);
        encoding.write_block(&ints, &mut bytes).unwrap();
        bytes.truncate(bytes.len() - 1);

        let mut source: &[u8] = &bytes;
        assert!(matches!(
            encoding.read_block(&mut source),
            Err(PagesSerdeError::FrameFormatError(_))
        ));
    }

    #[test]
    fn test_wrong_block_type_is_internal_error() {
        let strings = StringArray::from(vec!["a"]);
        let mut bytes = Vec::new();
        let result = PrimitiveBlockEncoding::<Int32Type>::new(BlockType::Int32)
            .write_block(&strings, &mut bytes);
        assert!(matches!(result, Err(PagesSerdeError::InternalError(_))));
    }
}
