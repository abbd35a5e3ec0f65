//! Hierarchical container: groups, datasets and attributes.
//!
//! A [`Container`] owns the whole node tree in memory.  `open` materializes an
//! existing file, `close` writes the tree back through
//! [`ContainerWriter`](crate::io_stream::ContainerWriter).  Handles into the
//! tree are plain borrows; nothing outlives the call that obtained it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use crate::addressing::SEPARATOR;
use crate::codec::Compression;
use crate::error::{Error, Result};
use crate::io_stream::{ContainerReader, ContainerWriter};
use crate::superblock::Superblock;
use crate::value::NdArray;

/// Attribute holding every node's type tag.
pub const TITLE_ATTR: &str = "TITLE";
/// Attribute holding a chunked list's logical length.
pub const SIZE_ATTR: &str = "SIZE";

// ── Attributes ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Text(String),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            AttrValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            AttrValue::Text(_) => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_owned())
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Int(i)
    }
}

pub type Attributes = BTreeMap<String, AttrValue>;

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey { key: key.to_owned(), reason: "node names must not be empty" });
    }
    if key.contains(SEPARATOR) {
        return Err(Error::InvalidKey { key: key.to_owned(), reason: "node names must not contain '/'" });
    }
    Ok(())
}

// ── Dataset ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    attrs: Attributes,
    data: NdArray,
    chunks: Option<Vec<usize>>,
    compression: Compression,
}

impl Dataset {
    pub fn new(data: NdArray, compression: Compression) -> Self {
        Dataset { attrs: Attributes::new(), data, chunks: None, compression }
    }

    /// Zero-filled dataset laid out in `chunks`-sized tiles.
    pub fn chunked(data: NdArray, chunks: Vec<usize>, compression: Compression) -> Self {
        Dataset { attrs: Attributes::new(), data, chunks: Some(chunks), compression }
    }

    pub fn data(&self) -> &NdArray {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut NdArray {
        &mut self.data
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn chunks(&self) -> Option<&[usize]> {
        self.chunks.as_deref()
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<AttrValue>) {
        self.attrs.insert(name.to_owned(), value.into());
    }

    pub fn title(&self) -> Option<&str> {
        self.attrs.get(TITLE_ATTR).and_then(AttrValue::as_text)
    }

    pub(crate) fn from_parts(attrs: Attributes, data: NdArray, chunks: Option<Vec<usize>>, compression: Compression) -> Self {
        Dataset { attrs, data, chunks, compression }
    }
}

// ── Group ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    attrs: Attributes,
    children: BTreeMap<String, Node>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<AttrValue>) {
        self.attrs.insert(name.to_owned(), value.into());
    }

    pub fn title(&self) -> Option<&str> {
        self.attrs.get(TITLE_ATTR).and_then(AttrValue::as_text)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.children.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.children.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.children.get_mut(key)
    }

    pub fn group_mut(&mut self, key: &str) -> Option<&mut Group> {
        match self.children.get_mut(key) {
            Some(Node::Group(g)) => Some(g),
            _ => None,
        }
    }

    pub fn dataset_mut(&mut self, key: &str) -> Option<&mut Dataset> {
        match self.children.get_mut(key) {
            Some(Node::Dataset(d)) => Some(d),
            _ => None,
        }
    }

    /// Child names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn create_group(&mut self, key: &str) -> Result<&mut Group> {
        check_key(key)?;
        if self.children.contains_key(key) {
            return Err(Error::NodeExists(key.to_owned()));
        }
        let node = self.children.entry(key.to_owned()).or_insert_with(|| Node::Group(Group::new()));
        match node {
            Node::Group(g) => Ok(g),
            Node::Dataset(_) => Err(Error::NodeExists(key.to_owned())),
        }
    }

    pub fn create_dataset(&mut self, key: &str, dataset: Dataset) -> Result<&mut Dataset> {
        check_key(key)?;
        if self.children.contains_key(key) {
            return Err(Error::NodeExists(key.to_owned()));
        }
        let node = self.children.entry(key.to_owned()).or_insert(Node::Dataset(dataset));
        match node {
            Node::Dataset(d) => Ok(d),
            Node::Group(_) => Err(Error::NodeExists(key.to_owned())),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Node> {
        let removed = self.children.remove(key);
        if removed.is_some() {
            debug!(key, "removed node");
        }
        removed
    }

    /// Resolve a `/`-separated path relative to this group.
    pub fn walk(&self, path: &str) -> Option<&Node> {
        let mut parts = path.split(SEPARATOR).filter(|p| !p.is_empty());
        let first = parts.next()?;
        let mut node = self.children.get(first)?;
        for part in parts {
            node = node.as_group()?.children.get(part)?;
        }
        Some(node)
    }

    /// Resolve a `/`-separated group path; the empty path is this group.
    pub fn walk_group_mut(&mut self, path: &str) -> Option<&mut Group> {
        let mut group = self;
        for part in path.split(SEPARATOR).filter(|p| !p.is_empty()) {
            group = group.group_mut(part)?;
        }
        Some(group)
    }

    pub(crate) fn from_parts(attrs: Attributes, children: BTreeMap<String, Node>) -> Self {
        Group { attrs, children }
    }

    /// Insert an already built node, as done while loading a container.
    pub(crate) fn attach(&mut self, key: &str, node: Node) -> Result<()> {
        check_key(key)?;
        if self.children.contains_key(key) {
            return Err(Error::NodeExists(key.to_owned()));
        }
        self.children.insert(key.to_owned(), node);
        Ok(())
    }
}

// ── Node ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Group(Group),
    Dataset(Dataset),
}

impl Node {
    pub fn attrs(&self) -> &Attributes {
        match self {
            Node::Group(g) => g.attrs(),
            Node::Dataset(d) => d.attrs(),
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.attrs().get(TITLE_ATTR).and_then(AttrValue::as_text)
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Node::Group(g) => Some(g),
            Node::Dataset(_) => None,
        }
    }

    pub fn as_dataset(&self) -> Option<&Dataset> {
        match self {
            Node::Dataset(d) => Some(d),
            Node::Group(_) => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Node::Group(_))
    }
}

// ── Container ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    /// Start from an empty tree; the file is replaced on close.
    Write,
    /// Load the file if it exists, otherwise start empty.
    Append,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Read => "r",
            Mode::Write => "w",
            Mode::Append => "a",
        })
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "r" => Ok(Mode::Read),
            "w" => Ok(Mode::Write),
            "a" => Ok(Mode::Append),
            other => Err(Error::InvalidArgument(format!("mode must be 'r', 'w' or 'a', got {other:?}"))),
        }
    }
}

pub struct Container {
    path: PathBuf,
    mode: Mode,
    superblock: Superblock,
    root: Group,
}

impl Container {
    pub fn open<P: AsRef<Path>>(path: P, mode: Mode) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let (superblock, root) = match mode {
            Mode::Write => (Superblock::new(), Group::new()),
            Mode::Append if !path.exists() => (Superblock::new(), Group::new()),
            Mode::Read | Mode::Append => {
                let mut reader = ContainerReader::new(BufReader::new(File::open(&path)?))?;
                let root = reader.load_tree()?;
                (reader.superblock, root)
            }
        };
        info!(path = %path.display(), %mode, nodes = root.len(), "opened container");
        Ok(Container { path, mode, superblock, root })
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    pub fn root_mut(&mut self) -> Result<&mut Group> {
        match self.mode {
            Mode::Read => Err(Error::ReadOnly),
            Mode::Write | Mode::Append => Ok(&mut self.root),
        }
    }

    /// Write the tree to disk.  Read handles are a no-op.
    pub fn flush(&mut self) -> Result<()> {
        if self.mode == Mode::Read {
            return Ok(());
        }
        let file = File::create(&self.path)?;
        let mut writer = ContainerWriter::with_superblock(BufWriter::new(file), self.superblock.clone())?;
        let index = writer.write_tree(&self.root)?;
        writer.finalize(&index)?;
        self.superblock = writer.superblock.clone();
        let mut out = writer.into_inner();
        out.flush()?;
        info!(path = %self.path.display(), datasets = index.dataset_count(), "flushed container");
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.flush()
    }
}
