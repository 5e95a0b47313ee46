//! Fixed-size binary header at offset 0 of every archive file.
//!
//! Layout (64 bytes, little-endian):
//!
//! ```text
//! 0..4    magic "MTA1"
//! 4..6    container format version (u16)
//! 6       schema file version tag (u8)
//! 7       reserved
//! 8..16   tree blob offset (u64)
//! 16..24  tree blob length (u64)
//! 24..56  blake3 checksum of the tree blob
//! 56..64  reserved
//! ```

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::constants::{FORMAT_VERSION, HEADER_LEN, MAGIC, MAX_TREE_BYTES};
use crate::error::{ArchiveError, Result};
use crate::types::FileVersion;

/// Decoded archive header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub file_version: FileVersion,
    pub tree_offset: u64,
    pub tree_len: u64,
    pub tree_checksum: [u8; 32],
}

impl Header {
    /// Header for a freshly created archive whose tree blob starts right
    /// after the header.
    pub fn new(file_version: FileVersion) -> Self {
        Self {
            file_version,
            tree_offset: HEADER_LEN as u64,
            tree_len: 0,
            tree_checksum: [0u8; 32],
        }
    }
}

/// Encoder/decoder for [`Header`].
pub struct HeaderCodec;

impl HeaderCodec {
    pub fn encode(header: &Header) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..6].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf[6] = header.file_version.tag();
        buf[8..16].copy_from_slice(&header.tree_offset.to_le_bytes());
        buf[16..24].copy_from_slice(&header.tree_len.to_le_bytes());
        buf[24..56].copy_from_slice(&header.tree_checksum);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Header> {
        if bytes.len() < HEADER_LEN {
            return Err(ArchiveError::CorruptFormat {
                reason: format!("header truncated at {} bytes", bytes.len()),
            });
        }
        if bytes[0..4] != MAGIC {
            return Err(ArchiveError::CorruptFormat {
                reason: "bad magic bytes".into(),
            });
        }
        let format_version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if format_version != FORMAT_VERSION {
            return Err(ArchiveError::CorruptFormat {
                reason: format!("unsupported container format version {format_version}"),
            });
        }
        let file_version = FileVersion::from_tag(bytes[6]).ok_or_else(|| {
            ArchiveError::CorruptFormat {
                reason: format!("unknown file version tag {}", bytes[6]),
            }
        })?;
        let mut tree_offset = [0u8; 8];
        tree_offset.copy_from_slice(&bytes[8..16]);
        let mut tree_len = [0u8; 8];
        tree_len.copy_from_slice(&bytes[16..24]);
        let tree_len = u64::from_le_bytes(tree_len);
        if tree_len > MAX_TREE_BYTES {
            return Err(ArchiveError::CorruptFormat {
                reason: format!("tree length {tree_len} exceeds limit"),
            });
        }
        let mut tree_checksum = [0u8; 32];
        tree_checksum.copy_from_slice(&bytes[24..56]);
        Ok(Header {
            file_version,
            tree_offset: u64::from_le_bytes(tree_offset),
            tree_len,
            tree_checksum,
        })
    }

    pub fn write(file: &mut File, header: &Header) -> Result<()> {
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&Self::encode(header))?;
        Ok(())
    }

    pub fn read(file: &mut File) -> Result<Header> {
        let mut buf = [0u8; HEADER_LEN];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut buf).map_err(|_| ArchiveError::CorruptFormat {
            reason: "file too short for header".into(),
        })?;
        Self::decode(&buf)
    }
}
