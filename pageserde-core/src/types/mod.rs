//! This module defines the strongly-typed column representations used by the
//! block codecs.
//!
//! It currently includes the canonical `BlockType` enum, whose display form is
//! the encoding tag written in front of every serialized block.

pub mod block_type;

pub use block_type::BlockType;
