//! Incrementally written arrays and lists.
//!
//! A [`ChunkedArray`] is one slab of a larger array: the full shape and chunk
//! geometry travel with every call so each write can be checked against what
//! is already stored.  A [`ChunkedList`] is a run of consecutive elements of a
//! list whose total length is fixed up front.

use std::ops::Range;
use tracing::debug;

use crate::codec::Compression;
use crate::error::{Error, Result};
use crate::store::{Dataset, Group, TITLE_ATTR};
use crate::tag::TypeTag;
use crate::value::{NdArray, Value};

// ── ChunkedArray ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkedArray {
    data:        NdArray,
    shape:       Vec<usize>,
    chunk_size:  Vec<usize>,
    chunk_index: usize,
}

impl ChunkedArray {
    /// `data` is the slab for chunk `chunk_index` along the last axis of an
    /// array of `shape`, stored in tiles of `chunk_size`.
    pub fn new(data: NdArray, shape: Vec<usize>, chunk_size: Vec<usize>, chunk_index: usize) -> Result<Self> {
        if shape.is_empty() {
            return Err(Error::InvalidArgument("chunked arrays need at least one axis".into()));
        }
        if chunk_size.len() != shape.len() {
            return Err(Error::InvalidArgument(format!(
                "chunk size {chunk_size:?} does not have one entry per axis of {shape:?}"
            )));
        }
        if chunk_size.contains(&0) {
            return Err(Error::InvalidArgument(format!("chunk size {chunk_size:?} has a zero entry")));
        }
        Ok(ChunkedArray { data, shape, chunk_size, chunk_index })
    }

    pub fn data(&self) -> &NdArray {
        &self.data
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn chunk_size(&self) -> &[usize] {
        &self.chunk_size
    }

    pub fn chunk_index(&self) -> usize {
        self.chunk_index
    }

    /// Last-axis range covered by this chunk, clipped to the array extent.
    pub fn chunk_range(&self) -> Result<Range<usize>> {
        let last = self.shape.len() - 1;
        let extent = self.shape[last];
        let step = self.chunk_size[last];
        let start = self.chunk_index.saturating_mul(step);
        if start >= extent {
            return Err(Error::ChunkOutOfRange { index: self.chunk_index, start, extent });
        }
        Ok(start..(start + step).min(extent))
    }

    /// Check the payload against the region it is meant to fill.
    fn check_payload(&self, range: &Range<usize>) -> Result<()> {
        let last = self.shape.len() - 1;
        let got = self.data.shape();
        if got.len() != self.shape.len() || got[..last] != self.shape[..last] {
            return Err(Error::ShapeMismatch(format!(
                "chunk payload of shape {got:?} does not span the leading axes of {:?}",
                self.shape
            )));
        }
        if got[last] != range.len() {
            return Err(Error::ChunkSizeMismatch { expected: range.len(), got: got[last] });
        }
        Ok(())
    }
}

/// Write one chunk under `parent[key]`, creating the zero-filled dataset on
/// the first call.
pub fn write_chunk(parent: &mut Group, key: &str, fragment: &ChunkedArray, compression: Compression) -> Result<()> {
    let tag = TypeTag::ChunkedArray.as_str();
    let existing = parent.get(key).and_then(|n| n.as_dataset()).filter(|d| d.title() == Some(tag));

    if let Some(stored) = existing {
        if stored.shape() != fragment.shape() {
            return Err(Error::ShapeMismatch(format!(
                "the stored shape {:?} does not match the given shape {:?}",
                stored.shape(),
                fragment.shape()
            )));
        }
        if stored.chunks() != Some(fragment.chunk_size()) {
            return Err(Error::ShapeMismatch(format!(
                "the stored chunk size {:?} does not match the given chunk size {:?}",
                stored.chunks(),
                fragment.chunk_size()
            )));
        }
    }
    let range = fragment.chunk_range()?;
    fragment.check_payload(&range)?;

    if existing.is_none() {
        if parent.remove(key).is_some() {
            debug!(key, "replacing non-chunked node");
        }
        let zeros = NdArray::zeros(fragment.data.dtype(), fragment.shape());
        let ds = parent.create_dataset(key, Dataset::chunked(zeros, fragment.chunk_size.clone(), compression))?;
        ds.set_attr(TITLE_ATTR, tag);
    }

    let ds = parent
        .dataset_mut(key)
        .ok_or_else(|| Error::corrupt(format!("chunked dataset {key} vanished")))?;
    debug!(key, chunk = fragment.chunk_index, start = range.start, end = range.end, "writing chunk");
    ds.data_mut().assign_last_axis(range, &fragment.data)
}

// ── ChunkedList ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkedList {
    items: Vec<Value>,
    size:  usize,
    start: usize,
}

impl ChunkedList {
    /// Elements `items` placed at `start..start + items.len()` of a list of
    /// total length `size`.
    pub fn new(items: Vec<Value>, size: usize, start: usize) -> Result<Self> {
        let end = start.saturating_add(items.len());
        if end > size {
            return Err(Error::ChunkOutOfRange { index: start, start: end, extent: size });
        }
        Ok(ChunkedList { items, size, start })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// `(absolute index, element)` pairs.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &Value)> {
        self.items.iter().enumerate().map(move |(i, v)| (self.start + i, v))
    }
}
