// In: src/pages_serde/direct.rs

//! The direct-streaming strategy: a page is written column by column straight
//! to the caller's sink, so peak memory is one encoded column rather than the
//! whole page. There is no compression and no encryption in this format.
//!
//! Frame: magic `PGSD`, `u16` version, `u32` rows, `u32` columns, then per
//! column a `u32` length and that many bytes of tagged block encoding.

use std::io::{Read, Write};
use std::sync::Arc;

use crate::block::BlockEncodingSerde;
use crate::error::PagesSerdeError;
use crate::page::Page;
use crate::pages_serde::format::{check_magic, DIRECT_FORMAT_VERSION, DIRECT_MAGIC};
use crate::pages_serde::{read_page_block, MAX_PREALLOCATED_CHANNELS};
use crate::utils::{read_bounded, read_exact_framed, read_u16_le, read_u32_le, wire_len};

/// magic(4) + version(2) + rows(4) + columns(4)
pub const DIRECT_HEADER_LEN: usize = 14;

#[derive(Debug, Clone)]
pub struct DirectPagesSerde {
    block_serde: Arc<dyn BlockEncodingSerde>,
}

impl DirectPagesSerde {
    pub fn new(block_serde: Arc<dyn BlockEncodingSerde>) -> Self {
        Self { block_serde }
    }

    /// Streams `page` into `sink`. Returns the number of bytes written.
    pub fn serialize<W: Write + ?Sized>(
        &self,
        page: &Page,
        sink: &mut W,
    ) -> Result<usize, PagesSerdeError> {
        let mut header = [0u8; DIRECT_HEADER_LEN];
        header[0..4].copy_from_slice(DIRECT_MAGIC);
        header[4..6].copy_from_slice(&DIRECT_FORMAT_VERSION.to_le_bytes());
        header[6..10].copy_from_slice(&wire_len(page.position_count(), "row count")?.to_le_bytes());
        let columns = wire_len(page.channel_count(), "column count")?;
        header[10..14].copy_from_slice(&columns.to_le_bytes());
        sink.write_all(&header)?;

        let mut written = DIRECT_HEADER_LEN;
        let mut scratch = Vec::new();
        for block in page.blocks() {
            scratch.clear();
            self.block_serde.write_block(block.as_ref(), &mut scratch)?;
            let len = wire_len(scratch.len(), "encoded column")?;
            sink.write_all(&len.to_le_bytes())?;
            sink.write_all(&scratch)?;
            written += 4 + scratch.len();
        }

        log_metric!(
            "event" = "serialize",
            "strategy" = "direct",
            "rows" = page.position_count(),
            "columns" = page.channel_count(),
            "frame_bytes" = written,
            "peak_column_bytes" = scratch.capacity()
        );

        Ok(written)
    }

    /// Reads one direct frame from `source`.
    pub fn deserialize<R: Read + ?Sized>(&self, source: &mut R) -> Result<Page, PagesSerdeError> {
        let mut magic = [0u8; 4];
        read_exact_framed(source, &mut magic, "page magic number")?;
        self.read_after_magic(magic, source)
    }

    pub(crate) fn read_after_magic<R: Read + ?Sized>(
        &self,
        magic: [u8; 4],
        source: &mut R,
    ) -> Result<Page, PagesSerdeError> {
        check_magic(&magic, DIRECT_MAGIC, "direct")?;

        let version = read_u16_le(source, "direct page version")?;
        if version != DIRECT_FORMAT_VERSION {
            return Err(PagesSerdeError::FrameFormatError(format!(
                "Unsupported direct page version: expected {}, got {}",
                DIRECT_FORMAT_VERSION, version
            )));
        }
        let position_count = read_u32_le(source, "direct page row count")? as usize;
        let channel_count = read_u32_le(source, "direct page column count")? as usize;

        let mut blocks = Vec::with_capacity(channel_count.min(MAX_PREALLOCATED_CHANNELS));
        for channel in 0..channel_count {
            let len = read_u32_le(source, "encoded column length")? as usize;
            let column = read_bounded(source, len, "encoded column")?;

            let mut cursor: &[u8] = &column;
            blocks.push(read_page_block(
                self.block_serde.as_ref(),
                &mut cursor,
                position_count,
                channel,
            )?);
            if !cursor.is_empty() {
                return Err(PagesSerdeError::FrameFormatError(format!(
                    "column {} declares {} bytes but its encoding used {}",
                    channel,
                    len,
                    len - cursor.len()
                )));
            }
        }

        log_metric!(
            "event" = "deserialize",
            "strategy" = "direct",
            "rows" = position_count,
            "columns" = channel_count
        );

        Page::with_position_count(position_count, blocks)
    }
}
