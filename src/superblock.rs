//! Fixed-size container header at offset 0.
//!
//! Layout (little-endian, padded to [`SUPERBLOCK_SIZE`]):
//!
//! | Off | Size | Field           |
//! |-----|------|-----------------|
//! |   0 |    4 | magic `H5IO`    |
//! |   4 |    4 | format version  |
//! |   8 |   16 | container UUID  |
//! |  24 |    8 | index offset    |
//! |  32 |    8 | index size      |
//! |  40 |    4 | index CRC32     |
//! |  44 |    4 | flags           |
//! |  48 |    8 | modified (unix) |
//! |  56 |    8 | reserved        |

use byteorder::{ByteOrder, LittleEndian};
use chrono::Utc;
use std::io::{self, Read, Write};
use thiserror::Error;
use uuid::Uuid;

pub const MAGIC: &[u8; 4] = b"H5IO";
pub const VERSION: u32 = 1;
pub const SUPERBLOCK_SIZE: usize = 64;

#[derive(Error, Debug)]
pub enum SuperblockError {
    #[error("not an h5io container (magic {0:02x?})")]
    InvalidMagic([u8; 4]),
    #[error("container format version {0} is not supported (expected {VERSION})")]
    UnsupportedVersion(u32),
    #[error("reserved header bytes are not zero")]
    DirtyReserved,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub uuid:         Uuid,
    pub index_offset: u64,
    pub index_size:   u64,
    pub index_crc32:  u32,
    pub flags:        u32,
    /// Unix seconds of the last successful close.
    pub modified:     i64,
}

impl Default for Superblock {
    fn default() -> Self {
        Self::new()
    }
}

impl Superblock {
    /// Fresh header for a new container; the index fields are patched in
    /// once the index block has been written.
    pub fn new() -> Self {
        Superblock {
            uuid:         Uuid::new_v4(),
            index_offset: 0,
            index_size:   0,
            index_crc32:  0,
            flags:        0,
            modified:     Utc::now().timestamp(),
        }
    }

    pub fn encode(&self) -> [u8; SUPERBLOCK_SIZE] {
        let mut buf = [0u8; SUPERBLOCK_SIZE];
        buf[0..4].copy_from_slice(MAGIC);
        LittleEndian::write_u32(&mut buf[4..8], VERSION);
        buf[8..24].copy_from_slice(self.uuid.as_bytes());
        LittleEndian::write_u64(&mut buf[24..32], self.index_offset);
        LittleEndian::write_u64(&mut buf[32..40], self.index_size);
        LittleEndian::write_u32(&mut buf[40..44], self.index_crc32);
        LittleEndian::write_u32(&mut buf[44..48], self.flags);
        LittleEndian::write_i64(&mut buf[48..56], self.modified);
        buf
    }

    pub fn decode(buf: &[u8; SUPERBLOCK_SIZE]) -> Result<Self, SuperblockError> {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[0..4]);
        if &magic != MAGIC {
            return Err(SuperblockError::InvalidMagic(magic));
        }
        let version = LittleEndian::read_u32(&buf[4..8]);
        if version != VERSION {
            return Err(SuperblockError::UnsupportedVersion(version));
        }
        if buf[56..].iter().any(|&b| b != 0) {
            return Err(SuperblockError::DirtyReserved);
        }
        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&buf[8..24]);
        Ok(Superblock {
            uuid:         Uuid::from_bytes(uuid),
            index_offset: LittleEndian::read_u64(&buf[24..32]),
            index_size:   LittleEndian::read_u64(&buf[32..40]),
            index_crc32:  LittleEndian::read_u32(&buf[40..44]),
            flags:        LittleEndian::read_u32(&buf[44..48]),
            modified:     LittleEndian::read_i64(&buf[48..56]),
        })
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.encode())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self, SuperblockError> {
        let mut buf = [0u8; SUPERBLOCK_SIZE];
        reader.read_exact(&mut buf)?;
        Self::decode(&buf)
    }

    /// Stamp the modification time; called right before the header is patched.
    pub fn touch(&mut self) {
        self.modified = Utc::now().timestamp();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_survives_encode_decode() {
        let mut sb = Superblock::new();
        sb.index_offset = 4096;
        sb.index_size = 311;
        sb.index_crc32 = 0xdead_beef;
        let buf = sb.encode();
        assert_eq!(buf.len(), SUPERBLOCK_SIZE);
        assert_eq!(Superblock::decode(&buf).unwrap(), sb);
    }

    #[test]
    fn rejects_foreign_magic() {
        let mut buf = Superblock::new().encode();
        buf[0] = b'X';
        assert!(matches!(Superblock::decode(&buf), Err(SuperblockError::InvalidMagic(_))));
    }

    #[test]
    fn rejects_future_versions() {
        let mut buf = Superblock::new().encode();
        LittleEndian::write_u32(&mut buf[4..8], VERSION + 1);
        assert!(matches!(Superblock::decode(&buf), Err(SuperblockError::UnsupportedVersion(2))));
    }

    #[test]
    fn short_reads_fail() {
        let buf = Superblock::new().encode();
        assert!(matches!(Superblock::read(&buf[..40]), Err(SuperblockError::Io(_))));
    }
}
