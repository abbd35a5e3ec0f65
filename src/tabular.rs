//! Tabular frames and the bridge that stores them.
//!
//! Frames are not written inline by the dispatcher.  The bridge needs its own
//! handle on the container file, so the dispatcher queues a [`DeferredWrite`]
//! and the top-level write flushes the queue once the primary handle is
//! closed.

use ndarray::{ArrayD, IxDyn};
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::addressing::SEPARATOR;
use crate::codec::Compression;
use crate::error::{Error, Result};
use crate::store::{Container, Dataset, Mode, Node, TITLE_ATTR};
use crate::tag::TypeTag;
use crate::value::NdArray;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    DataFrame,
    Series,
}

impl FrameKind {
    pub fn tag(self) -> TypeTag {
        match self {
            FrameKind::DataFrame => TypeTag::PdDataFrame,
            FrameKind::Series => TypeTag::PdSeries,
        }
    }
}

/// Labelled numeric table: a 2-d frame or a 1-d series.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularFrame {
    kind:    FrameKind,
    columns: Vec<String>,
    values:  ArrayD<f64>,
}

impl TabularFrame {
    pub fn new(kind: FrameKind, columns: Vec<String>, values: ArrayD<f64>) -> Result<Self> {
        let ok = match kind {
            FrameKind::DataFrame => values.ndim() == 2 && values.shape()[1] == columns.len(),
            FrameKind::Series => values.ndim() == 1 && columns.len() == 1,
        };
        if !ok {
            return Err(Error::ShapeMismatch(format!(
                "{kind:?} values of shape {:?} do not fit {} column label(s)",
                values.shape(),
                columns.len()
            )));
        }
        Ok(TabularFrame { kind, columns, values })
    }

    pub fn data_frame(columns: Vec<String>, rows: usize, values: Vec<f64>) -> Result<Self> {
        let values = ArrayD::from_shape_vec(IxDyn(&[rows, columns.len()]), values)
            .map_err(|e| Error::ShapeMismatch(e.to_string()))?;
        Self::new(FrameKind::DataFrame, columns, values)
    }

    pub fn series(name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        let n = values.len();
        let values = ArrayD::from_shape_vec(IxDyn(&[n]), values).map_err(|e| Error::ShapeMismatch(e.to_string()))?;
        Self::new(FrameKind::Series, vec![name.into()], values)
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &ArrayD<f64> {
        &self.values
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }
}

/// Storage for frames, addressed by container path plus a `/`-separated node
/// path from the container root.
pub trait TabularBridge: fmt::Debug + Send + Sync {
    fn write_frame(&self, path: &Path, node_path: &str, frame: &TabularFrame) -> Result<()>;
    fn read_frame(&self, path: &Path, node_path: &str, kind: FrameKind) -> Result<TabularFrame>;
}

/// A frame queued during a write, flushed after the container is closed.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredWrite {
    pub node_path: String,
    pub frame:     TabularFrame,
}

impl DeferredWrite {
    pub fn flush(&self, bridge: &dyn TabularBridge, path: &Path) -> Result<()> {
        debug!(node = %self.node_path, kind = ?self.frame.kind(), "flushing deferred frame");
        bridge.write_frame(path, &self.node_path, &self.frame)
    }
}

// ── Default bridge ───────────────────────────────────────────────────────────

const VALUES: &str = "values";
const COLUMNS: &str = "columns";

/// Stores a frame inside the same container as a tagged group with a
/// `values` array and a JSON `columns` list.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContainerTabularBridge;

fn split_node_path(node_path: &str) -> Result<(&str, &str)> {
    match node_path.rsplit_once(SEPARATOR) {
        Some((parent, key)) if !key.is_empty() => Ok((parent, key)),
        None if !node_path.is_empty() => Ok(("", node_path)),
        _ => Err(Error::InvalidArgument(format!("bad frame location {node_path:?}"))),
    }
}

impl TabularBridge for ContainerTabularBridge {
    fn write_frame(&self, path: &Path, node_path: &str, frame: &TabularFrame) -> Result<()> {
        let (parent_path, key) = split_node_path(node_path)?;
        let mut container = Container::open(path, Mode::Append)?;
        let parent = container
            .root_mut()?
            .walk_group_mut(parent_path)
            .ok_or_else(|| Error::NotFound(parent_path.to_owned()))?;
        parent.remove(key);

        let group = parent.create_group(key)?;
        group.set_attr(TITLE_ATTR, frame.kind().tag().as_str());
        let values = NdArray::Float64(frame.values().clone());
        group
            .create_dataset(VALUES, Dataset::new(values, Compression::default()))?
            .set_attr(TITLE_ATTR, TypeTag::NdArray.as_str());
        let columns = serde_json::to_vec(frame.columns())?;
        group
            .create_dataset(COLUMNS, Dataset::new(NdArray::from_bytes(&columns), Compression::NONE))?
            .set_attr(TITLE_ATTR, TypeTag::Json.as_str());
        container.close()
    }

    fn read_frame(&self, path: &Path, node_path: &str, kind: FrameKind) -> Result<TabularFrame> {
        let container = Container::open(path, Mode::Read)?;
        let group = container
            .root()
            .walk(node_path)
            .and_then(Node::as_group)
            .ok_or_else(|| Error::NotFound(node_path.to_owned()))?;
        let values = match group.get(VALUES).and_then(Node::as_dataset).map(Dataset::data) {
            Some(NdArray::Float64(a)) => a.clone(),
            _ => return Err(Error::corrupt(format!("frame {node_path} has no float64 values"))),
        };
        let columns = group
            .get(COLUMNS)
            .and_then(Node::as_dataset)
            .and_then(|d| d.data().as_bytes())
            .ok_or_else(|| Error::corrupt(format!("frame {node_path} has no column labels")))?;
        let columns: Vec<String> = serde_json::from_slice(&columns)?;
        TabularFrame::new(kind, columns, values)
    }
}
