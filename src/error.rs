//! Crate-wide error type.
//!
//! Every failure is surfaced to the immediate caller; nothing is retried.
//! The in-memory tree is only persisted when a container closes, so an error
//! raised while dispatching a value never reaches the file.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::codec::CodecError;
use crate::superblock::SuperblockError;

#[derive(Error, Debug)]
pub enum Error {
    // ── Dispatcher errors ────────────────────────────────────────────────────
    #[error("unsupported type {kind} (in {path})")]
    UnsupportedType { kind: String, path: String },

    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    // ── Geometry errors ──────────────────────────────────────────────────────
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("chunk size mismatch: expected {expected} elements on the last axis, got {got}")]
    ChunkSizeMismatch { expected: usize, got: usize },

    #[error("chunk {index} reaches offset {start}, outside the extent {extent}")]
    ChunkOutOfRange { index: usize, start: usize, extent: usize },

    // ── Capability / argument errors ─────────────────────────────────────────
    #[error("{0} support is not available in this build")]
    MissingDependency(&'static str),

    #[error("file \"{}\" exists, use overwrite to replace it", .0.display())]
    FileExists(PathBuf),

    #[error("no \"{0}\" data found")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // ── Storage errors ───────────────────────────────────────────────────────
    #[error("node \"{0}\" already exists")]
    NodeExists(String),

    #[error("container is read-only")]
    ReadOnly,

    #[error("corrupt container: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Superblock(#[from] SuperblockError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn unsupported(kind: impl Into<String>, path: &str) -> Self {
        Error::UnsupportedType { kind: kind.into(), path: path.to_owned() }
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Error::Corrupt(msg.into())
    }
}
