//! Self-describing payload blocks.
//!
//! Each dataset payload and the INDEX are written as a header followed by the
//! stored (possibly compressed) bytes.  The CRC32 covers the stored bytes and
//! is checked before decompression; the original size is checked after.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;
use std::io::{self, Read, Write};

use crate::codec::{get_codec, get_codec_by_byte, CodecError, Compression};

pub const BLOCK_MAGIC: u32 = 0x4B4C_4235; // "5BLK"
pub const BLOCK_HEADER_SIZE: usize = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockType {
    Data  = 1,
    Index = 2,
}

impl BlockType {
    fn from_byte(b: u8) -> io::Result<Self> {
        match b {
            1 => Ok(BlockType::Data),
            2 => Ok(BlockType::Index),
            _ => Err(io::Error::new(io::ErrorKind::InvalidData, format!("unknown block type {b}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlockHeader {
    pub magic: u32,
    pub block_type: BlockType,
    pub codec: u8,
    pub level: i8,
    pub flags: u8,
    pub orig_size: u64,
    pub stored_size: u64,
    pub checksum: u32,
}

impl BlockHeader {
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.magic)?;
        writer.write_u8(self.block_type as u8)?;
        writer.write_u8(self.codec)?;
        writer.write_i8(self.level)?;
        writer.write_u8(self.flags)?;
        writer.write_u64::<LittleEndian>(self.orig_size)?;
        writer.write_u64::<LittleEndian>(self.stored_size)?;
        writer.write_u32::<LittleEndian>(self.checksum)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != BLOCK_MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad block magic"));
        }
        Ok(Self {
            magic,
            block_type: BlockType::from_byte(reader.read_u8()?)?,
            codec: reader.read_u8()?,
            level: reader.read_i8()?,
            flags: reader.read_u8()?,
            orig_size: reader.read_u64::<LittleEndian>()?,
            stored_size: reader.read_u64::<LittleEndian>()?,
            checksum: reader.read_u32::<LittleEndian>()?,
        })
    }
}

pub fn encode_block(
    block_type: BlockType,
    data: &[u8],
    compression: Compression,
) -> Result<(BlockHeader, Vec<u8>), CodecError> {
    let codec = get_codec(compression.codec);
    let stored = codec.compress(data, compression.level)?;
    let mut hasher = Hasher::new();
    hasher.update(&stored);
    let header = BlockHeader {
        magic: BLOCK_MAGIC,
        block_type,
        codec: compression.codec as u8,
        level: compression.level.clamp(i8::MIN as i32, i8::MAX as i32) as i8,
        flags: 0,
        orig_size: data.len() as u64,
        stored_size: stored.len() as u64,
        checksum: hasher.finalize(),
    };
    Ok((header, stored))
}

pub fn decode_block(header: &BlockHeader, payload: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    if hasher.finalize() != header.checksum {
        return Err(CodecError::Decompression("Checksum mismatch".to_string()));
    }
    let codec = get_codec_by_byte(header.codec)?;
    let data = codec.decompress(payload)?;
    if data.len() as u64 != header.orig_size {
        return Err(CodecError::Decompression(format!(
            "decoded {} bytes, header declares {}",
            data.len(),
            header.orig_size
        )));
    }
    Ok(data)
}
