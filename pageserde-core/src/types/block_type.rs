//! This module defines the canonical, type-safe representation of the column
//! types this crate can encode, and the mapping between those types and the
//! encoding tags that appear on the wire.

use std::fmt;
use std::str::FromStr;

use arrow::datatypes::DataType as ArrowDataType;

use crate::error::PagesSerdeError;

/// The column types with a built-in block encoding.
///
/// The `Display` form of each variant is its encoding tag. Tags are part of the
/// serialized format and must never be renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Date32,
    Date64,
    Boolean,
    Utf8,
    Binary,
}

impl BlockType {
    /// Every built-in type, in tag order.
    pub const ALL: [BlockType; 15] = [
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::UInt8,
        Self::UInt16,
        Self::UInt32,
        Self::UInt64,
        Self::Float32,
        Self::Float64,
        Self::Date32,
        Self::Date64,
        Self::Boolean,
        Self::Utf8,
        Self::Binary,
    ];

    /// Converts an Arrow `DataType` into a `BlockType`.
    pub fn from_arrow_type(arrow_type: &ArrowDataType) -> Result<Self, PagesSerdeError> {
        match arrow_type {
            ArrowDataType::Int8 => Ok(Self::Int8),
            ArrowDataType::Int16 => Ok(Self::Int16),
            ArrowDataType::Int32 => Ok(Self::Int32),
            ArrowDataType::Int64 => Ok(Self::Int64),
            ArrowDataType::UInt8 => Ok(Self::UInt8),
            ArrowDataType::UInt16 => Ok(Self::UInt16),
            ArrowDataType::UInt32 => Ok(Self::UInt32),
            ArrowDataType::UInt64 => Ok(Self::UInt64),
            ArrowDataType::Float32 => Ok(Self::Float32),
            ArrowDataType::Float64 => Ok(Self::Float64),
            ArrowDataType::Date32 => Ok(Self::Date32),
            ArrowDataType::Date64 => Ok(Self::Date64),
            ArrowDataType::Boolean => Ok(Self::Boolean),
            ArrowDataType::Utf8 => Ok(Self::Utf8),
            ArrowDataType::Binary => Ok(Self::Binary),
            dt => Err(PagesSerdeError::UnsupportedEncoding(format!(
                "no block encoding for Arrow type {:?}",
                dt
            ))),
        }
    }

    /// Converts a `BlockType` back into an Arrow `DataType`.
    pub fn to_arrow_type(&self) -> ArrowDataType {
        match self {
            Self::Int8 => ArrowDataType::Int8,
            Self::Int16 => ArrowDataType::Int16,
            Self::Int32 => ArrowDataType::Int32,
            Self::Int64 => ArrowDataType::Int64,
            Self::UInt8 => ArrowDataType::UInt8,
            Self::UInt16 => ArrowDataType::UInt16,
            Self::UInt32 => ArrowDataType::UInt32,
            Self::UInt64 => ArrowDataType::UInt64,
            Self::Float32 => ArrowDataType::Float32,
            Self::Float64 => ArrowDataType::Float64,
            Self::Date32 => ArrowDataType::Date32,
            Self::Date64 => ArrowDataType::Date64,
            Self::Boolean => ArrowDataType::Boolean,
            Self::Utf8 => ArrowDataType::Utf8,
            Self::Binary => ArrowDataType::Binary,
        }
    }

    /// Returns `true` for types whose values are stored as offsets plus bytes.
    pub fn is_variable_width(&self) -> bool {
        matches!(self, Self::Utf8 | Self::Binary)
    }
}

/// Provides the encoding tag for a `BlockType`.
impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Matches the Arrow `DataType` debug names.
        write!(f, "{:?}", self)
    }
}

impl FromStr for BlockType {
    type Err = PagesSerdeError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|block_type| block_type.to_string() == tag)
            .ok_or_else(|| PagesSerdeError::UnsupportedEncoding(tag.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_parse_back() {
        for block_type in BlockType::ALL {
            let tag = block_type.to_string();
            assert_eq!(tag.parse::<BlockType>().unwrap(), block_type);
            assert_eq!(
                BlockType::from_arrow_type(&block_type.to_arrow_type()).unwrap(),
                block_type
            );
        }
    }

    #[test]
    fn test_unknown_tag_is_unsupported_encoding() {
        let err = "LongDecimal".parse::<BlockType>().unwrap_err();
        assert!(matches!(
            err,
            PagesSerdeError::UnsupportedEncoding(ref tag) if tag == "LongDecimal"
        ));
    }

    #[test]
    fn test_unsupported_arrow_type() {
        let err = BlockType::from_arrow_type(&ArrowDataType::Float16).unwrap_err();
        assert!(err.is_format_error());
    }
}
