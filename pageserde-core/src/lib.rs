//! This file is the root of the `pageserde` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of the library (`pages_serde`,
//!     `block`, `kernels`, etc.) so the Rust compiler knows they exist.
//! 2.  Re-exporting the types an engine needs to serialize pages for exchange
//!     and spill, so callers rarely have to name a submodule.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
mod observability; // Make macros available throughout the crate

pub mod block;
pub mod cipher;
pub mod compression;
pub mod config;
pub mod error;
pub mod kernels;
pub mod page;
pub mod pages_serde;
pub mod types;

mod utils;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================
pub use block::{BlockEncoding, BlockEncodingManager, BlockEncodingSerde};
pub use cipher::{AesSpillCipher, SpillCipher};
pub use compression::{Compressor, Decompressor, ZstdCompressor, ZstdDecompressor};
pub use config::PagesSerdeConfig;
pub use error::{PagesSerdeError, Result};
pub use page::Page;
pub use pages_serde::{
    write_pages, BufferedPagesSerde, DirectPagesSerde, PageReader, PagesSerde, PagesSerdeFactory,
    SerdeKind, SerdeProfile, SerializedPage,
};
pub use types::BlockType;
