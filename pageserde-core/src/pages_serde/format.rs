// In: src/pages_serde/format.rs

//! Defines the on-wire structures and constants for both page frame formats.
//! This is the single source of truth for the buffered `SerializedPage` frame:
//! writing, reading, and peeking at its header without touching the payload.

use std::io::{Read, Write};

use bitflags::bitflags;

use crate::error::PagesSerdeError;
use crate::utils::{read_bounded, read_exact_framed, read_u16_le, read_u32_le, read_u8, wire_len};

//==================================================================================
// 1. Format Constants
//==================================================================================

/// Opens every buffered page frame.
pub const BUFFERED_MAGIC: &[u8; 4] = b"PGSB";
/// Opens every direct-streaming page frame.
pub const DIRECT_MAGIC: &[u8; 4] = b"PGSD";

pub const BUFFERED_FORMAT_VERSION: u16 = 1;
pub const DIRECT_FORMAT_VERSION: u16 = 1;

/// magic(4) + version(2) + rows(4) + markers(1) + logical(4) + crc(4) + payload len(4)
pub const BUFFERED_HEADER_LEN: usize = 23;

/// Largest logical page a reader accepts. Bounds the decompression buffer.
pub const MAX_LOGICAL_PAGE_BYTES: usize = 1 << 30;

bitflags! {
    /// Which transforms were applied to a stored payload.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PageCodecMarkers: u8 {
        const COMPRESSED = 0b0000_0001;
        const ENCRYPTED  = 0b0000_0010;
    }
}

impl PageCodecMarkers {
    pub fn is_compressed(self) -> bool {
        self.contains(Self::COMPRESSED)
    }

    pub fn is_encrypted(self) -> bool {
        self.contains(Self::ENCRYPTED)
    }
}

//==================================================================================
// 2. Header
//==================================================================================

/// The fixed-size header of a buffered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub position_count: u32,
    pub markers: PageCodecMarkers,
    /// Length of the encoded page before compression and encryption.
    pub uncompressed_size: u32,
    /// CRC32 of the encoded page before compression and encryption.
    pub checksum: u32,
    /// Length of the stored payload that follows the header.
    pub payload_len: u32,
}

impl PageHeader {
    pub fn is_compressed(&self) -> bool {
        self.markers.is_compressed()
    }

    pub fn is_encrypted(&self) -> bool {
        self.markers.is_encrypted()
    }

    fn write_to<W: Write + ?Sized>(&self, sink: &mut W) -> Result<(), PagesSerdeError> {
        let mut buf = [0u8; BUFFERED_HEADER_LEN];
        buf[0..4].copy_from_slice(BUFFERED_MAGIC);
        buf[4..6].copy_from_slice(&BUFFERED_FORMAT_VERSION.to_le_bytes());
        buf[6..10].copy_from_slice(&self.position_count.to_le_bytes());
        buf[10] = self.markers.bits();
        buf[11..15].copy_from_slice(&self.uncompressed_size.to_le_bytes());
        buf[15..19].copy_from_slice(&self.checksum.to_le_bytes());
        buf[19..23].copy_from_slice(&self.payload_len.to_le_bytes());
        sink.write_all(&buf)?;
        Ok(())
    }

    /// Reads the header fields that follow an already-consumed magic number.
    fn read_after_magic<R: Read + ?Sized>(source: &mut R) -> Result<Self, PagesSerdeError> {
        let version = read_u16_le(source, "page header version")?;
        if version != BUFFERED_FORMAT_VERSION {
            return Err(PagesSerdeError::FrameFormatError(format!(
                "Unsupported buffered page version: expected {}, got {}",
                BUFFERED_FORMAT_VERSION, version
            )));
        }

        let position_count = read_u32_le(source, "page header row count")?;

        let marker_bits = read_u8(source, "page header markers")?;
        let markers = PageCodecMarkers::from_bits(marker_bits).ok_or_else(|| {
            PagesSerdeError::FrameFormatError(format!(
                "Unknown codec marker bits: {:#010b}",
                marker_bits
            ))
        })?;

        let uncompressed_size = read_u32_le(source, "page header logical size")?;
        if uncompressed_size as usize > MAX_LOGICAL_PAGE_BYTES {
            return Err(PagesSerdeError::FrameFormatError(format!(
                "Logical page size {} exceeds the limit of {} bytes",
                uncompressed_size, MAX_LOGICAL_PAGE_BYTES
            )));
        }

        let checksum = read_u32_le(source, "page header checksum")?;
        let payload_len = read_u32_le(source, "page header payload length")?;

        if markers.is_empty() && payload_len != uncompressed_size {
            return Err(PagesSerdeError::FrameFormatError(format!(
                "Raw page payload length {} does not match logical size {}",
                payload_len, uncompressed_size
            )));
        }

        Ok(Self {
            position_count,
            markers,
            uncompressed_size,
            checksum,
            payload_len,
        })
    }
}

//==================================================================================
// 3. SerializedPage
//==================================================================================

/// A page after encoding and the configured transforms, ready for transport or
/// spill. The header says exactly which transforms a reader must undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedPage {
    header: PageHeader,
    payload: Vec<u8>,
}

impl SerializedPage {
    pub(crate) fn new(
        position_count: usize,
        markers: PageCodecMarkers,
        uncompressed_size: usize,
        checksum: u32,
        payload: Vec<u8>,
    ) -> Result<Self, PagesSerdeError> {
        let header = PageHeader {
            position_count: wire_len(position_count, "row count")?,
            markers,
            uncompressed_size: wire_len(uncompressed_size, "logical page")?,
            checksum,
            payload_len: wire_len(payload.len(), "page payload")?,
        };
        Ok(Self { header, payload })
    }

    pub fn header(&self) -> &PageHeader {
        &self.header
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn position_count(&self) -> usize {
        self.header.position_count as usize
    }

    pub fn uncompressed_size(&self) -> usize {
        self.header.uncompressed_size as usize
    }

    pub fn is_compressed(&self) -> bool {
        self.header.is_compressed()
    }

    pub fn is_encrypted(&self) -> bool {
        self.header.is_encrypted()
    }

    /// Total size of the frame on the wire.
    pub fn frame_len(&self) -> usize {
        BUFFERED_HEADER_LEN + self.payload.len()
    }

    /// Writes the complete frame. Returns the number of bytes written.
    pub fn write_to<W: Write + ?Sized>(&self, sink: &mut W) -> Result<usize, PagesSerdeError> {
        self.header.write_to(sink)?;
        sink.write_all(&self.payload)?;
        Ok(self.frame_len())
    }

    /// Reads one complete frame.
    pub fn read_from<R: Read + ?Sized>(source: &mut R) -> Result<Self, PagesSerdeError> {
        let mut magic = [0u8; 4];
        read_exact_framed(source, &mut magic, "page magic number")?;
        Self::read_after_magic(magic, source)
    }

    /// Reads the rest of a frame whose magic number the caller already consumed.
    pub(crate) fn read_after_magic<R: Read + ?Sized>(
        magic: [u8; 4],
        source: &mut R,
    ) -> Result<Self, PagesSerdeError> {
        check_magic(&magic, BUFFERED_MAGIC, "buffered")?;
        let header = PageHeader::read_after_magic(source)?;
        let payload = read_bounded(source, header.payload_len as usize, "page payload")?;
        Ok(Self { header, payload })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PagesSerdeError> {
        let mut bytes = Vec::with_capacity(self.frame_len());
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    /// Parses a frame that must occupy all of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PagesSerdeError> {
        let mut cursor = bytes;
        let page = Self::read_from(&mut cursor)?;
        if !cursor.is_empty() {
            return Err(PagesSerdeError::FrameFormatError(format!(
                "{} trailing bytes after page frame",
                cursor.len()
            )));
        }
        Ok(page)
    }

    /// Parses only the header of a frame, leaving the payload untouched.
    pub fn peek_header(bytes: &[u8]) -> Result<PageHeader, PagesSerdeError> {
        let mut cursor = bytes;
        let mut magic = [0u8; 4];
        read_exact_framed(&mut cursor, &mut magic, "page magic number")?;
        check_magic(&magic, BUFFERED_MAGIC, "buffered")?;
        PageHeader::read_after_magic(&mut cursor)
    }
}

pub(crate) fn check_magic(
    found: &[u8; 4],
    expected: &[u8; 4],
    format_name: &str,
) -> Result<(), PagesSerdeError> {
    if found == expected {
        return Ok(());
    }
    Err(PagesSerdeError::FrameFormatError(format!(
        "Invalid {} page magic number: expected {:?}, got {:?}",
        format_name,
        String::from_utf8_lossy(expected),
        String::from_utf8_lossy(found)
    )))
}

//==================================================================================
// 4. Unit Tests
//==================================================================================
