//! Binary layout codec for the VER2 container format
//!
//! Pure and stateless: the header and directory-record functions here are
//! the only code that touches the on-disk byte layout. All multi-byte
//! integers are little-endian for compatibility with other VER2 tools.

use crate::error::{ImgError, Result};
use crate::types::NameEncoding;
use byteorder::{ByteOrder, LittleEndian};

/// Alignment unit for all on-disk offsets and lengths, in bytes.
pub const BLOCK_SIZE: u64 = 2048;

/// Four-byte magic at the start of every archive.
pub const MAGIC: [u8; 4] = *b"VER2";

/// Size of the fixed archive header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Size of one directory record in bytes.
pub const RECORD_SIZE: usize = 32;

/// Size of the zero-padded name field inside a record.
pub const NAME_SIZE: usize = 24;

/// One decoded directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    /// Content offset in blocks.
    pub offset_blocks: u32,
    /// Content capacity in blocks.
    pub length_blocks: u16,
    /// Entry name with original casing.
    pub name: String,
}

/// Encode the archive header for `entry_count` entries.
///
/// The on-disk count field is 32 bits wide but only the low 16 bits are
/// ever populated; the high bytes stay zero.
pub fn encode_header(entry_count: u16) -> [u8; HEADER_SIZE] {
    let mut buf = [0u8; HEADER_SIZE];
    buf[..4].copy_from_slice(&MAGIC);
    LittleEndian::write_u32(&mut buf[4..8], u32::from(entry_count));
    buf
}

/// Decode the archive header, returning the entry count.
pub fn decode_header(buf: &[u8]) -> Result<u32> {
    if buf.len() < HEADER_SIZE {
        return Err(ImgError::Format(format!(
            "truncated header: {} bytes",
            buf.len()
        )));
    }
    if buf[..4] != MAGIC {
        return Err(ImgError::Format(format!("bad magic: {:02x?}", &buf[..4])));
    }
    Ok(LittleEndian::read_u32(&buf[4..8]))
}

/// Encode one directory record.
///
/// Names longer than 24 encoded bytes are silently truncated; this is a
/// precision loss inherited from the format, not a validation failure.
pub fn encode_record(
    offset_blocks: u32,
    length_blocks: u16,
    name: &str,
    encoding: NameEncoding,
) -> [u8; RECORD_SIZE] {
    let mut buf = [0u8; RECORD_SIZE];
    LittleEndian::write_u32(&mut buf[0..4], offset_blocks);
    LittleEndian::write_u16(&mut buf[4..6], length_blocks);
    // bytes 6..8 are reserved and stay zero
    let raw = encoding.encode(name);
    let n = raw.len().min(NAME_SIZE);
    buf[8..8 + n].copy_from_slice(&raw[..n]);
    buf
}

/// Decode one directory record.
///
/// The name is the sub-slice up to the first zero byte; an empty name is a
/// format error.
pub fn decode_record(buf: &[u8], encoding: NameEncoding) -> Result<DirectoryRecord> {
    if buf.len() < RECORD_SIZE {
        return Err(ImgError::Format(format!(
            "truncated directory record: {} bytes",
            buf.len()
        )));
    }
    let offset_blocks = LittleEndian::read_u32(&buf[0..4]);
    let length_blocks = LittleEndian::read_u16(&buf[4..6]);
    let raw = &buf[8..8 + NAME_SIZE];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
    if end == 0 {
        return Err(ImgError::Format("empty entry name in directory".into()));
    }
    Ok(DirectoryRecord {
        offset_blocks,
        length_blocks,
        name: encoding.decode(&raw[..end]),
    })
}

/// Number of whole blocks needed to hold `len` bytes.
pub fn blocks_for(len: u64) -> u64 {
    len.div_ceil(BLOCK_SIZE)
}

/// Number of blocks occupied by the header plus `entry_count` directory
/// records. Entry content starts at the first block past this.
pub fn directory_blocks(entry_count: u32) -> u64 {
    blocks_for(HEADER_SIZE as u64 + u64::from(entry_count) * RECORD_SIZE as u64)
}
