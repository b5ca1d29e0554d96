// In: src/pages_serde/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: Page Serde Strategies
// ====================================================================================
//
// A `PagesSerde` turns a `Page` into bytes on a sink and back. There are exactly
// two strategies and the set is closed:
//
//   Buffered: encode the whole page into one buffer, then optionally compress,
//             then optionally encrypt. One `SerializedPage` frame (magic PGSB).
//   Direct:   encode column by column straight to the sink. No transforms.
//             One direct frame (magic PGSD).
//
// The strategies hold only shared, immutable capabilities (`Arc<dyn ..>`), so a
// single instance serves every page of an execution context on any thread.
// `PagesSerdeFactory` decides which one to build; callers never need to.
// ====================================================================================

use std::io::{Read, Write};

use arrow::array::ArrayRef;

use crate::block::BlockEncodingSerde;
use crate::error::PagesSerdeError;
use crate::page::Page;
use crate::utils::read_magic_or_eof;

//==================================================================================
// 1. Module Declarations
//==================================================================================

pub mod buffered;
pub mod direct;
pub mod factory;
pub mod format;
pub mod stream;


//==================================================================================
// 2. Public API Re-exports
//==================================================================================

pub use self::buffered::BufferedPagesSerde;
pub use self::direct::DirectPagesSerde;
pub use self::factory::PagesSerdeFactory;
pub use self::format::{PageCodecMarkers, PageHeader, SerializedPage};
pub use self::stream::{write_pages, PageReader};

/// Which strategy a `PagesSerde` is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerdeKind {
    Buffered,
    Direct,
}

/// The observable behavior of a constructed strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SerdeProfile {
    pub kind: SerdeKind,
    /// Pages written by this strategy may be compressed.
    pub compressed: bool,
    /// Pages written by this strategy are encrypted.
    pub encrypted: bool,
}

//==================================================================================
// 3. The Strategy Family
//==================================================================================

#[derive(Debug, Clone)]
pub enum PagesSerde {
    Buffered(BufferedPagesSerde),
    Direct(DirectPagesSerde),
}

impl PagesSerde {
    /// Writes one page frame to `sink`. Returns the number of bytes written.
    pub fn serialize<W: Write + ?Sized>(
        &self,
        page: &Page,
        sink: &mut W,
    ) -> Result<usize, PagesSerdeError> {
        match self {
            PagesSerde::Buffered(serde) => serde.serialize(page)?.write_to(sink),
            PagesSerde::Direct(serde) => serde.serialize(page, sink),
        }
    }

    /// Reads one page frame from `source`. An empty source is a truncated frame.
    pub fn deserialize<R: Read + ?Sized>(&self, source: &mut R) -> Result<Page, PagesSerdeError> {
        self.try_deserialize(source)?.ok_or_else(|| {
            PagesSerdeError::FrameFormatError("truncated page magic number: no bytes".to_string())
        })
    }

    /// Reads one page frame, or returns `None` if `source` is already at a
    /// clean end of stream.
    pub fn try_deserialize<R: Read + ?Sized>(
        &self,
        source: &mut R,
    ) -> Result<Option<Page>, PagesSerdeError> {
        let Some(magic) = read_magic_or_eof(source)? else {
            return Ok(None);
        };
        let page = match self {
            PagesSerde::Buffered(serde) => {
                let serialized = SerializedPage::read_after_magic(magic, source)?;
                serde.deserialize(&serialized)?
            }
            PagesSerde::Direct(serde) => serde.read_after_magic(magic, source)?,
        };
        Ok(Some(page))
    }

    pub fn profile(&self) -> SerdeProfile {
        match self {
            PagesSerde::Buffered(serde) => SerdeProfile {
                kind: SerdeKind::Buffered,
                compressed: serde.is_compressed(),
                encrypted: serde.is_encrypted(),
            },
            PagesSerde::Direct(_) => SerdeProfile {
                kind: SerdeKind::Direct,
                compressed: false,
                encrypted: false,
            },
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, PagesSerde::Direct(_))
    }

    pub fn is_compressed(&self) -> bool {
        self.profile().compressed
    }

    pub fn is_encrypted(&self) -> bool {
        self.profile().encrypted
    }
}

impl From<BufferedPagesSerde> for PagesSerde {
    fn from(serde: BufferedPagesSerde) -> Self {
        PagesSerde::Buffered(serde)
    }
}

impl From<DirectPagesSerde> for PagesSerde {
    fn from(serde: DirectPagesSerde) -> Self {
        PagesSerde::Direct(serde)
    }
}

//==================================================================================
// 4. Shared Decoding Helpers
//==================================================================================

/// Reads one tagged block and checks it holds the page's row count.
pub(crate) fn read_page_block(
    block_serde: &dyn BlockEncodingSerde,
    source: &mut dyn Read,
    position_count: usize,
    channel: usize,
) -> Result<ArrayRef, PagesSerdeError> {
    let block = block_serde.read_block(source)?;
    if block.len() != position_count {
        return Err(PagesSerdeError::FrameFormatError(format!(
            "block {} has {} positions, page header says {}",
            channel,
            block.len(),
            position_count
        )));
    }
    Ok(block)
}

/// Caps up-front allocation driven by a column count read from the wire.
pub(crate) const MAX_PREALLOCATED_CHANNELS: usize = 1024;
