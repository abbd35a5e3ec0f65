//! Dataset payload compression.
//!
//! Every data block records the codec that produced it as a single byte.  The
//! byte values below are part of the on-disk format and are never reused.
//! A reader that meets an unknown codec byte fails; there is no fallback.

use std::fmt;
use std::io;
use std::str::FromStr;
use thiserror::Error;

// ── CodecId ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CodecId {
    None = 0,
    Zstd = 1,
    Lz4  = 2,
}

impl CodecId {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(CodecId::None),
            1 => Some(CodecId::Zstd),
            2 => Some(CodecId::Lz4),
            _ => None,
        }
    }

    /// Human-readable name (for diagnostics and the CLI).
    pub fn name(self) -> &'static str {
        match self {
            CodecId::None => "none",
            CodecId::Zstd => "zstd",
            CodecId::Lz4  => "lz4",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(CodecId::None),
            "zstd" => Some(CodecId::Zstd),
            "lz4"  => Some(CodecId::Lz4),
            _      => None,
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CodecId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CodecId::from_name(s).ok_or_else(|| format!("unknown codec '{s}'"))
    }
}

// ── Compression settings ─────────────────────────────────────────────────────

/// Highest accepted user-facing compression level.
pub const MAX_LEVEL: u8 = 9;

/// Codec + level applied to a dataset when it is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compression {
    pub codec: CodecId,
    pub level: i32,
}

impl Compression {
    pub const NONE: Compression = Compression { codec: CodecId::None, level: 0 };

    /// Map a 0–9 level onto a codec.  Level 0 always stores verbatim.
    pub fn from_level(codec: CodecId, level: u8) -> Self {
        if level == 0 {
            Self::NONE
        } else {
            Compression { codec, level: i32::from(level.min(MAX_LEVEL)) }
        }
    }

    pub fn is_none(&self) -> bool {
        self.codec == CodecId::None
    }
}

impl Default for Compression {
    fn default() -> Self {
        Compression::from_level(CodecId::Zstd, 4)
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
    #[error("Unknown codec byte {0:#04x}")]
    UnknownCodec(u8),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait Codec: Send + Sync {
    fn codec_id(&self) -> CodecId;
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
}

pub struct NoneCodec;
impl Codec for NoneCodec {
    fn codec_id(&self) -> CodecId { CodecId::None }
    fn compress(&self, data: &[u8], _: i32) -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
    fn decompress(&self, data: &[u8])        -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
}

pub struct ZstdCodec;
impl Codec for ZstdCodec {
    fn codec_id(&self) -> CodecId { CodecId::Zstd }
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError> {
        zstd::encode_all(data, level).map_err(|e| CodecError::Compression(e.to_string()))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::decode_all(data).map_err(|e| CodecError::Decompression(e.to_string()))
    }
}

pub struct Lz4Codec;
impl Codec for Lz4Codec {
    fn codec_id(&self) -> CodecId { CodecId::Lz4 }
    fn compress(&self, data: &[u8], _: i32) -> Result<Vec<u8>, CodecError> {
        Ok(lz4_flex::compress_prepend_size(data))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        lz4_flex::decompress_size_prepended(data)
            .map_err(|e| CodecError::Decompression(e.to_string()))
    }
}

// ── Factory ──────────────────────────────────────────────────────────────────

pub fn get_codec(id: CodecId) -> Box<dyn Codec> {
    match id {
        CodecId::None => Box::new(NoneCodec),
        CodecId::Zstd => Box::new(ZstdCodec),
        CodecId::Lz4  => Box::new(Lz4Codec),
    }
}

/// Resolve an on-disk codec byte.  Unknown bytes are a hard error.
pub fn get_codec_by_byte(b: u8) -> Result<Box<dyn Codec>, CodecError> {
    CodecId::from_byte(b).map(get_codec).ok_or(CodecError::UnknownCodec(b))
}
