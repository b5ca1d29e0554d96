// In: src/block/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Block Codec Capability
// ====================================================================================
//
// The serde strategies never look inside a column. They hand each block to a
// `BlockEncodingSerde`, which writes an encoding tag followed by whatever bytes
// the matching `BlockEncoding` produces, and on read dispatches on that tag.
//
//   [Strategy] --write_block(block, sink)--> [BlockEncodingSerde]
//                                               |-- tag: LEB128 len + UTF-8 name
//                                               `-- BlockEncoding::write_block
//
//   [Strategy] <--read_block(source)-------- [BlockEncodingSerde]
//                                               |-- read tag, look up encoding
//                                               `-- BlockEncoding::read_block
//
// `BlockEncodingManager` is the default registry; callers with their own column
// types register extra encodings or provide their own `BlockEncodingSerde`.
// ====================================================================================

use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef};
use hashbrown::HashMap;

use crate::error::PagesSerdeError;
use crate::kernels::leb128;
use crate::types::BlockType;
use crate::utils::read_bounded;

pub mod encodings;

pub use encodings::{BooleanBlockEncoding, PrimitiveBlockEncoding, VariableWidthBlockEncoding};

/// Longest encoding tag a reader accepts.
pub const MAX_ENCODING_NAME_LEN: usize = 64;

//==================================================================================
// 1. Capability Traits
//==================================================================================

/// Encodes and decodes one column type. The bytes it writes must be
/// self-delimiting: `read_block` consumes exactly what `write_block` produced.
pub trait BlockEncoding: Send + Sync + fmt::Debug {
    /// The encoding tag written in front of every block of this type.
    fn name(&self) -> &str;

    fn write_block(&self, block: &dyn Array, sink: &mut dyn Write) -> Result<(), PagesSerdeError>;

    fn read_block(&self, source: &mut dyn Read) -> Result<ArrayRef, PagesSerdeError>;
}

/// Tag-dispatching codec used by the serde strategies.
pub trait BlockEncodingSerde: Send + Sync + fmt::Debug {
    /// Writes the block's encoding tag followed by its encoded bytes.
    fn write_block(&self, block: &dyn Array, sink: &mut dyn Write) -> Result<(), PagesSerdeError>;

    /// Reads an encoding tag and decodes the block with the matching encoding.
    fn read_block(&self, source: &mut dyn Read) -> Result<ArrayRef, PagesSerdeError>;
}

//==================================================================================
// 2. The Default Registry
//==================================================================================

/// A registry of `BlockEncoding`s keyed by tag.
#[derive(Debug, Default)]
pub struct BlockEncodingManager {
    encodings: HashMap<String, Arc<dyn BlockEncoding>>,
}

impl BlockEncodingManager {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding an encoding for every `BlockType`.
    pub fn with_default_encodings() -> Self {
        use arrow::datatypes::{
            Date32Type, Date64Type, Float32Type, Float64Type, GenericBinaryType,
            GenericStringType, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type,
            UInt32Type, UInt64Type, UInt8Type,
        };

        let defaults: Vec<Arc<dyn BlockEncoding>> = vec![
            Arc::new(PrimitiveBlockEncoding::<Int8Type>::new(BlockType::Int8)),
            Arc::new(PrimitiveBlockEncoding::<Int16Type>::new(BlockType::Int16)),
            Arc::new(PrimitiveBlockEncoding::<Int32Type>::new(BlockType::Int32)),
            Arc::new(PrimitiveBlockEncoding::<Int64Type>::new(BlockType::Int64)),
            Arc::new(PrimitiveBlockEncoding::<UInt8Type>::new(BlockType::UInt8)),
            Arc::new(PrimitiveBlockEncoding::<UInt16Type>::new(BlockType::UInt16)),
            Arc::new(PrimitiveBlockEncoding::<UInt32Type>::new(BlockType::UInt32)),
            Arc::new(PrimitiveBlockEncoding::<UInt64Type>::new(BlockType::UInt64)),
            Arc::new(PrimitiveBlockEncoding::<Float32Type>::new(BlockType::Float32)),
            Arc::new(PrimitiveBlockEncoding::<Float64Type>::new(BlockType::Float64)),
            Arc::new(PrimitiveBlockEncoding::<Date32Type>::new(BlockType::Date32)),
            Arc::new(PrimitiveBlockEncoding::<Date64Type>::new(BlockType::Date64)),
            Arc::new(BooleanBlockEncoding),
            Arc::new(VariableWidthBlockEncoding::<GenericStringType<i32>>::new(
                BlockType::Utf8,
            )),
            Arc::new(VariableWidthBlockEncoding::<GenericBinaryType<i32>>::new(
                BlockType::Binary,
            )),
        ];

        let mut manager = Self::new();
        for encoding in defaults {
            manager
                .encodings
                .insert(encoding.name().to_string(), encoding);
        }
        manager
    }

    /// Adds an encoding. Tags are unique; registering a tag twice is rejected.
    pub fn register(&mut self, encoding: Arc<dyn BlockEncoding>) -> Result<(), PagesSerdeError> {
        let name = encoding.name().to_string();
        if name.is_empty() || name.len() > MAX_ENCODING_NAME_LEN {
            return Err(PagesSerdeError::InvalidConfig(format!(
                "encoding tag '{}' must be 1..={} bytes",
                name, MAX_ENCODING_NAME_LEN
            )));
        }
        if self.encodings.contains_key(&name) {
            return Err(PagesSerdeError::InvalidConfig(format!(
                "encoding '{}' is already registered",
                name
            )));
        }
        self.encodings.insert(name, encoding);
        Ok(())
    }

    pub fn encoding(&self, name: &str) -> Option<&Arc<dyn BlockEncoding>> {
        self.encodings.get(name)
    }

    fn encoding_for_block(
        &self,
        block: &dyn Array,
    ) -> Result<&Arc<dyn BlockEncoding>, PagesSerdeError> {
        let tag = BlockType::from_arrow_type(block.data_type())?.to_string();
        self.encodings
            .get(&tag)
            .ok_or(PagesSerdeError::UnsupportedEncoding(tag))
    }
}

impl BlockEncodingSerde for BlockEncodingManager {
    fn write_block(&self, block: &dyn Array, sink: &mut dyn Write) -> Result<(), PagesSerdeError> {
        let encoding = self.encoding_for_block(block)?;
        let name = encoding.name();
        leb128::write_one(name.len() as u32, sink)?;
        sink.write_all(name.as_bytes())?;
        encoding.write_block(block, sink)
    }

    fn read_block(&self, source: &mut dyn Read) -> Result<ArrayRef, PagesSerdeError> {
        let name_len = leb128::read_one::<u32, _>(source)? as usize;
        if name_len == 0 || name_len > MAX_ENCODING_NAME_LEN {
            return Err(PagesSerdeError::FrameFormatError(format!(
                "encoding tag length {} is out of range 1..={}",
                name_len, MAX_ENCODING_NAME_LEN
            )));
        }
        let name_bytes = read_bounded(source, name_len, "encoding tag")?;
        let name = String::from_utf8(name_bytes)
            .map_err(|e| PagesSerdeError::FrameFormatError(format!("encoding tag: {}", e)))?;

        let encoding = self
            .encodings
            .get(&name)
            .ok_or(PagesSerdeError::UnsupportedEncoding(name))?;
        encoding.read_block(source)
    }
}

//==================================================================================
// 3. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, LargeStringArray, StringArray};

    #[test]
    fn test_tagged_roundtrip_through_registry() {
        let manager = BlockEncodingManager::with_default_encodings();
        let block: ArrayRef = Arc::new(StringArray::from(vec![Some("x"), None, Some("yz")]));

        let mut bytes = Vec::new();
        manager.write_block(block.as_ref(), &mut bytes).unwrap();
        assert_eq!(bytes[0] as usize, "Utf8".len());
        assert_eq!(&bytes[1..5], b"Utf8");

        let mut source: &[u8] = &bytes;
        let decoded = manager.read_block(&mut source).unwrap();
        assert_eq!(&decoded, &block);
        assert!(source.is_empty());
    }

    #[test]
    fn test_unknown_tag_is_unsupported_encoding() {
        let manager = BlockEncodingManager::with_default_encodings();
        let mut bytes = Vec::new();
        leb128::write_one(11u32, &mut bytes).unwrap();
        bytes.extend_from_slice(b"LongDecimal");
        bytes.extend_from_slice(&[0; 8]);

        let mut source: &[u8] = &bytes;
        let err = manager.read_block(&mut source).unwrap_err();
        assert!(matches!(
            err,
            PagesSerdeError::UnsupportedEncoding(ref tag) if tag == "LongDecimal"
        ));
    }

    #[test]
    fn test_oversized_tag_length_is_format_error() {
        let manager = BlockEncodingManager::with_default_encodings();
        let mut bytes = Vec::new();
        leb128::write_one(100_000u32, &mut bytes).unwrap();

        let mut source: &[u8] = &bytes;
        assert!(matches!(
            manager.read_block(&mut source),
            Err(PagesSerdeError::FrameFormatError(_))
        ));
    }

    #[test]
    fn test_unregistered_block_type_cannot_be_written() {
        let empty = BlockEncodingManager::new();
        let block = Int64Array::from(vec![1, 2]);
        let mut bytes = Vec::new();
        assert!(matches!(
            empty.write_block(&block, &mut bytes),
            Err(PagesSerdeError::UnsupportedEncoding(ref tag)) if tag == "Int64"
        ));

        let manager = BlockEncodingManager::with_default_encodings();
        let large_block = LargeStringArray::from(vec!["wide"]);
        assert!(manager.write_block(&large_block, &mut bytes).unwrap_err().is_format_error());
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut manager = BlockEncodingManager::with_default_encodings();
        let result = manager.register(Arc::new(BooleanBlockEncoding));
        assert!(matches!(result, Err(PagesSerdeError::InvalidConfig(_))));
    }
}
