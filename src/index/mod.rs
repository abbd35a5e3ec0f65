//! Serialized node table.
//!
//! The INDEX block holds the hierarchy as a flat JSON array of node records,
//! parents before their children, each keyed by its `/`-separated path from
//! the root (the root itself has the empty path).  Groups carry their
//! attributes; datasets also carry element type, geometry and the location of
//! their payload block.  Nesting depth of the stored tree never shows up as
//! nesting in the JSON document.

use serde::{Deserialize, Serialize};

use crate::addressing::SEPARATOR;
use crate::store::Attributes;
use crate::value::DType;

/// Location of a DATA block inside the container.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct BlockRef {
    pub offset: u64,
    pub stored_size: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeRecord {
    Group {
        path: String,
        #[serde(default)]
        attrs: Attributes,
    },
    Dataset {
        path: String,
        #[serde(default)]
        attrs: Attributes,
        dtype: DType,
        shape: Vec<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chunks: Option<Vec<usize>>,
        block: BlockRef,
    },
}

impl NodeRecord {
    pub fn path(&self) -> &str {
        match self {
            NodeRecord::Group { path, .. } | NodeRecord::Dataset { path, .. } => path,
        }
    }

    /// `(parent path, child name)`; `None` for the root record.
    pub fn split_path(&self) -> Option<(&str, &str)> {
        let path = self.path();
        if path.is_empty() {
            return None;
        }
        Some(path.rsplit_once(SEPARATOR).unwrap_or(("", path)))
    }
}

/// Join a parent path and a child name.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_owned()
    } else {
        format!("{parent}{SEPARATOR}{name}")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ContainerIndex {
    pub nodes: Vec<NodeRecord>,
    /// Producer string, informational only.
    #[serde(default)]
    pub generator: String,
}

impl ContainerIndex {
    pub fn new(nodes: Vec<NodeRecord>) -> Self {
        ContainerIndex { nodes, generator: concat!("h5io ", env!("CARGO_PKG_VERSION")).to_owned() }
    }

    pub fn dataset_count(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, NodeRecord::Dataset { .. })).count()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
