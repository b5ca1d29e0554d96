// In: src/pages_serde/buffered.rs

//! The buffered strategy: a whole page is encoded into one contiguous buffer,
//! which is then compressed and encrypted as a unit.
//!
//! Write order is always encode, compress, encrypt. Read order is the exact
//! inverse. Compressing ciphertext would gain nothing, so encryption is last.

use std::borrow::Cow;
use std::sync::Arc;

use crate::block::BlockEncodingSerde;
use crate::cipher::SpillCipher;
use crate::compression::{Compressor, Decompressor};
use crate::error::PagesSerdeError;
use crate::page::Page;
use crate::pages_serde::format::{PageCodecMarkers, SerializedPage, MAX_LOGICAL_PAGE_BYTES};
use crate::pages_serde::{read_page_block, MAX_PREALLOCATED_CHANNELS};
use crate::utils::{read_u32_le, wire_len};

#[derive(Debug, Clone)]
pub struct BufferedPagesSerde {
    block_serde: Arc<dyn BlockEncodingSerde>,
    compressor: Option<Arc<dyn Compressor>>,
    decompressor: Option<Arc<dyn Decompressor>>,
    cipher: Option<Arc<dyn SpillCipher>>,
    min_compression_ratio: Option<f64>,
}

impl BufferedPagesSerde {
    /// A strategy with no compression and no encryption.
    pub fn new(block_serde: Arc<dyn BlockEncodingSerde>) -> Self {
        Self {
            block_serde,
            compressor: None,
            decompressor: None,
            cipher: None,
            min_compression_ratio: None,
        }
    }

    pub fn with_compression(
        mut self,
        compressor: Arc<dyn Compressor>,
        decompressor: Arc<dyn Decompressor>,
    ) -> Self {
        self.compressor = Some(compressor);
        self.decompressor = Some(decompressor);
        self
    }

    /// Keep a compressed payload only if `compressed / logical <= ratio`.
    pub fn with_min_compression_ratio(mut self, ratio: Option<f64>) -> Self {
        self.min_compression_ratio = ratio;
        self
    }

    pub fn with_cipher(mut self, cipher: Option<Arc<dyn SpillCipher>>) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn is_compressed(&self) -> bool {
        self.compressor.is_some()
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    //==============================================================================
    // Serialize
    //==============================================================================

    pub fn serialize(&self, page: &Page) -> Result<SerializedPage, PagesSerdeError> {
        let logical = self.encode_page(page)?;
        let uncompressed_size = logical.len();
        if uncompressed_size > MAX_LOGICAL_PAGE_BYTES {
            return Err(PagesSerdeError::FrameFormatError(format!(
                "encoded page of {} bytes exceeds the limit of {} bytes",
                uncompressed_size, MAX_LOGICAL_PAGE_BYTES
            )));
        }
        let checksum = crc32fast::hash(&logical);
        let mut markers = PageCodecMarkers::empty();

        let mut payload = match &self.compressor {
            Some(compressor) => {
                let mut compressed =
                    Vec::with_capacity(compressor.max_compressed_length(uncompressed_size));
                compressor.compress(&logical, &mut compressed)?;
                if self.keeps_compressed(compressed.len(), uncompressed_size) {
                    markers |= PageCodecMarkers::COMPRESSED;
                    compressed
                } else {
                    log::trace!(
                        "{} output of {} bytes misses the ratio for {} logical bytes; storing raw",
                        compressor.name(),
                        compressed.len(),
                        uncompressed_size
                    );
                    logical
                }
            }
            None => logical,
        };

        if let Some(cipher) = &self.cipher {
            payload = cipher.encrypt(&payload)?;
            markers |= PageCodecMarkers::ENCRYPTED;
        }

        log_metric!(
            "event" = "serialize",
            "strategy" = "buffered",
            "rows" = page.position_count(),
            "logical_bytes" = uncompressed_size,
            "payload_bytes" = payload.len(),
            "compressed" = markers.is_compressed(),
            "encrypted" = markers.is_encrypted()
        );

        SerializedPage::new(
            page.position_count(),
            markers,
            uncompressed_size,
            checksum,
            payload,
        )
    }

    fn keeps_compressed(&self, compressed_len: usize, logical_len: usize) -> bool {
        match self.min_compression_ratio {
            None => true,
            Some(ratio) => (compressed_len as f64) <= ratio * (logical_len as f64),
        }
    }

    /// `u32` row count, `u32` column count, then each block with its encoding
    /// tag. The row count repeats the header's so the checksum and the cipher
    /// cover it.
    fn encode_page(&self, page: &Page) -> Result<Vec<u8>, PagesSerdeError> {
        let mut logical = Vec::with_capacity(8 + page.retained_size_in_bytes());
        logical.extend_from_slice(&wire_len(page.position_count(), "row count")?.to_le_bytes());
        logical.extend_from_slice(&wire_len(page.channel_count(), "column count")?.to_le_bytes());
        for block in page.blocks() {
            self.block_serde.write_block(block.as_ref(), &mut logical)?;
        }
        Ok(logical)
    }

    //==============================================================================
    // Deserialize
    //==============================================================================

    pub fn deserialize(&self, serialized: &SerializedPage) -> Result<Page, PagesSerdeError> {
        let header = serialized.header();
        let expected_len = serialized.uncompressed_size();
        let mut bytes = Cow::Borrowed(serialized.payload());

        if header.is_encrypted() {
            let cipher = self.cipher.as_ref().ok_or_else(|| {
                PagesSerdeError::CipherError(
                    "page is encrypted but no cipher is configured".to_string(),
                )
            })?;
            bytes = Cow::Owned(cipher.decrypt(&bytes)?);
        }

        if header.is_compressed() {
            let decompressor = self.decompressor.as_ref().ok_or_else(|| {
                PagesSerdeError::CompressionError(
                    "page is compressed but no decompressor is configured".to_string(),
                )
            })?;
            bytes = Cow::Owned(decompressor.decompress(&bytes, expected_len)?);
            if crc32fast::hash(&bytes) != header.checksum {
                return Err(PagesSerdeError::CompressionError(
                    "checksum mismatch after decompression".to_string(),
                ));
            }
        } else {
            if bytes.len() != expected_len {
                return Err(PagesSerdeError::FrameFormatError(format!(
                    "page payload is {} bytes, header says {}",
                    bytes.len(),
                    expected_len
                )));
            }
            if crc32fast::hash(&bytes) != header.checksum {
                return Err(PagesSerdeError::FrameFormatError(
                    "page checksum mismatch".to_string(),
                ));
            }
        }

        let page = self.decode_page(serialized.position_count(), &bytes)?;

        log_metric!(
            "event" = "deserialize",
            "strategy" = "buffered",
            "rows" = page.position_count(),
            "payload_bytes" = serialized.payload().len(),
            "logical_bytes" = expected_len
        );

        Ok(page)
    }

    fn decode_page(&self, position_count: usize, logical: &[u8]) -> Result<Page, PagesSerdeError> {
        let mut cursor = logical;
        let encoded_rows = read_u32_le(&mut cursor, "row count")? as usize;
        if encoded_rows != position_count {
            return Err(PagesSerdeError::FrameFormatError(format!(
                "page header says {} rows, encoded page has {}",
                position_count, encoded_rows
            )));
        }
        let channel_count = read_u32_le(&mut cursor, "column count")? as usize;

        let mut blocks = Vec::with_capacity(channel_count.min(MAX_PREALLOCATED_CHANNELS));
        for channel in 0..channel_count {
            blocks.push(read_page_block(
                self.block_serde.as_ref(),
                &mut cursor,
                position_count,
                channel,
            )?);
        }

        if !cursor.is_empty() {
            return Err(PagesSerdeError::FrameFormatError(format!(
                "{} trailing bytes after the last block",
                cursor.len()
            )));
        }

        Page::with_position_count(position_count, blocks)
    }
}
