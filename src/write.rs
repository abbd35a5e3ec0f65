//! Recursive write dispatcher.
//!
//! Values map onto nodes by variant.  Composite values reuse an existing group
//! when its tag matches and then garbage-collect children the new value no
//! longer has; leaves are always deleted and recreated.  Chunked values merge
//! into what is already stored.

use std::collections::BTreeSet;
use tracing::debug;

use crate::addressing::{dict_key, escape_key, join_path, seq_key, validate_mapping_key, SlashPolicy};
use crate::capability::Capabilities;
use crate::chunked::{self, ChunkedList};
use crate::codec::Compression;
use crate::error::{Error, Result};
use crate::json;
use crate::multiarray;
use crate::store::{AttrValue, Dataset, Group, Node, SIZE_ATTR, TITLE_ATTR};
use crate::tabular::{DeferredWrite, TabularFrame};
use crate::tag::TypeTag;
use crate::value::{NdArray, SparseFormat, SparseMatrix, Value};

pub struct Writer<'a> {
    compression: Compression,
    slash:       SlashPolicy,
    use_json:    bool,
    caps:        &'a Capabilities,
    deferred:    Vec<DeferredWrite>,
}

impl<'a> Writer<'a> {
    pub fn new(caps: &'a Capabilities, compression: Compression, slash: SlashPolicy, use_json: bool) -> Self {
        Writer { compression, slash, use_json, caps, deferred: Vec::new() }
    }

    /// Write `value` under `root[title]`.  The title itself is never escaped.
    pub fn write_root(&mut self, root: &mut Group, title: &str, value: &Value) -> Result<()> {
        self.write(root, "", title, value, value.kind())
    }

    /// Frames queued for the tabular bridge.
    pub fn into_deferred(self) -> Vec<DeferredWrite> {
        self.deferred
    }

    fn write(&mut self, parent: &mut Group, parent_path: &str, name: &str, value: &Value, at: &str) -> Result<()> {
        let node_path = join_path(parent_path, name);

        if self.use_json && json::json_compatible(value, self.slash)? {
            let text = serde_json::to_vec(&json::to_json(value, self.slash)?)?;
            return self.replace_dataset(parent, name, TypeTag::Json, NdArray::from_bytes(&text), self.compression);
        }

        match value {
            Value::Dict(map) => {
                let group = sub_root(parent, name, TypeTag::Dict)?;
                let mut current = BTreeSet::new();
                for (k, v) in map {
                    validate_mapping_key(k)?;
                    let child = dict_key(&escape_key(k, self.slash)?);
                    self.write(group, &node_path, &child, v, &format!("{at}[\"{k}\"]"))?;
                    current.insert(child);
                }
                let stale: Vec<String> = group.keys().filter(|n| !current.contains(*n)).map(str::to_owned).collect();
                for key in &stale {
                    debug!(node = %node_path, key = %key, "removing stale dict entry");
                    group.remove(key);
                }
                Ok(())
            }
            Value::List(items) | Value::Tuple(items) => {
                let tag = if matches!(value, Value::List(_)) { TypeTag::List } else { TypeTag::Tuple };
                let group = sub_root(parent, name, tag)?;
                for (i, v) in items.iter().enumerate() {
                    self.write(group, &node_path, &seq_key(i), v, &format!("{at}[{i}]"))?;
                }
                let mut i = items.len();
                while group.remove(&seq_key(i)).is_some() {
                    i += 1;
                }
                if i > items.len() {
                    debug!(node = %node_path, from = items.len(), to = i, "shrank sequence");
                }
                Ok(())
            }
            Value::ChunkedList(list) => self.write_chunked_list(parent, &node_path, name, list, at),
            Value::Null => self.replace_dataset(parent, name, TypeTag::None, NdArray::from_vec(vec![false]), Compression::NONE),
            Value::Bool(b) => self.replace_dataset(parent, name, TypeTag::Bool, NdArray::from_vec(vec![*b]), Compression::NONE),
            Value::Int(i) => self.replace_dataset(parent, name, TypeTag::Int, NdArray::from_vec(vec![*i]), Compression::NONE),
            Value::Float(f) => self.replace_dataset(parent, name, TypeTag::Float, NdArray::from_vec(vec![*f]), Compression::NONE),
            Value::Scalar(s) => self.replace_dataset(parent, name, TypeTag::Numpy(s.dtype()), s.to_array(), Compression::NONE),
            Value::Datetime(t) => {
                let text = t.isoformat();
                self.replace_dataset(parent, name, TypeTag::Datetime, NdArray::from_bytes(text.as_bytes()), Compression::NONE)
            }
            Value::Timezone(z) => {
                let text = z.to_string();
                self.replace_dataset(parent, name, TypeTag::Timezone, NdArray::from_bytes(text.as_bytes()), Compression::NONE)
            }
            Value::Text(s) => self.replace_dataset(parent, name, TypeTag::Unicode, NdArray::from_bytes(s.as_bytes()), self.compression),
            Value::Array(a) => self.replace_dataset(parent, name, TypeTag::NdArray, a.clone(), self.compression),
            Value::MultiArray(parts) => self.write_multiarray(parent, name, parts, at),
            Value::Sparse(m) => self.write_sparse(parent, &node_path, name, m, at),
            Value::Frame(frame) => self.defer_frame(node_path, frame),
            Value::ChunkedArray(fragment) => chunked::write_chunk(parent, name, fragment, self.compression),
        }
    }

    fn replace_dataset(&self, parent: &mut Group, name: &str, tag: TypeTag, data: NdArray, compression: Compression) -> Result<()> {
        parent.remove(name);
        let ds = parent.create_dataset(name, Dataset::new(data, compression))?;
        ds.set_attr(TITLE_ATTR, tag.as_str());
        debug!(key = name, %tag, shape = ?ds.shape(), "wrote dataset");
        Ok(())
    }

    fn write_chunked_list(&mut self, parent: &mut Group, node_path: &str, name: &str, list: &ChunkedList, at: &str) -> Result<()> {
        let tag = TypeTag::ChunkedList;
        let stored_size = parent
            .get(name)
            .filter(|n| n.title() == Some(tag.as_str()))
            .and_then(|n| n.attrs().get(SIZE_ATTR))
            .and_then(AttrValue::as_int);
        if let Some(size) = stored_size {
            if size != list.size() as i64 {
                // a different total length starts a new list
                debug!(node = %node_path, old = size, new = list.size(), "restarting chunked list");
                parent.remove(name);
            }
        }
        let group = sub_root(parent, name, tag)?;
        group.set_attr(SIZE_ATTR, list.size() as i64);
        for (i, v) in list.entries() {
            self.write(group, node_path, &seq_key(i), v, &format!("{at}[{i}]"))?;
        }
        Ok(())
    }

    fn write_multiarray(&self, parent: &mut Group, name: &str, parts: &[NdArray], at: &str) -> Result<()> {
        let dtypes: BTreeSet<&str> = parts.iter().map(|p| p.dtype().name()).collect();
        if dtypes.len() != 1 {
            let kind = if parts.is_empty() { "empty multiarray".to_owned() } else { format!("multiarray of {dtypes:?}") };
            return Err(Error::unsupported(kind, at));
        }
        let (index, data) = multiarray::dump(parts)?;
        parent.remove(name);
        let group = parent.create_group(name)?;
        group.set_attr(TITLE_ATTR, TypeTag::MultiArray.as_str());
        group
            .create_dataset("index", Dataset::new(NdArray::from_vec(index), self.compression))?
            .set_attr(TITLE_ATTR, TypeTag::NdArray.as_str());
        group
            .create_dataset("data", Dataset::new(data, self.compression))?
            .set_attr(TITLE_ATTR, TypeTag::NdArray.as_str());
        debug!(key = name, parts = parts.len(), "wrote multiarray");
        Ok(())
    }

    fn write_sparse(&mut self, parent: &mut Group, node_path: &str, name: &str, m: &SparseMatrix, at: &str) -> Result<()> {
        self.caps.require_sparse()?;
        let (tag, prefix) = match m.format() {
            SparseFormat::Csc => (TypeTag::CscMatrix, "csc_matrix"),
            SparseFormat::Csr => (TypeTag::CsrMatrix, "csr_matrix"),
        };
        parent.remove(name);
        let group = parent.create_group(name)?;
        group.set_attr(TITLE_ATTR, tag.as_str());

        // CSC also records its shape so trailing empty rows survive a read.
        let (rows, cols) = m.shape();
        let children = [
            ("data", Value::Array(m.data().clone())),
            ("indices", Value::Array(NdArray::from_vec(m.indices().to_vec()))),
            ("indptr", Value::Array(NdArray::from_vec(m.indptr().to_vec()))),
            ("shape", Value::Tuple(vec![Value::Int(rows as i64), Value::Int(cols as i64)])),
        ];
        for (child, v) in &children {
            self.write(group, node_path, child, v, &format!("{at}.{prefix}_{child}"))?;
        }
        Ok(())
    }

    fn defer_frame(&mut self, node_path: String, frame: &TabularFrame) -> Result<()> {
        self.caps.require_tabular()?;
        debug!(node = %node_path, "deferring frame until the container is closed");
        self.deferred.push(DeferredWrite { node_path, frame: frame.clone() });
        Ok(())
    }
}

/// Reuse `parent[name]` if it is a group tagged `tag`, otherwise replace it
/// with an empty one.
fn sub_root<'g>(parent: &'g mut Group, name: &str, tag: TypeTag) -> Result<&'g mut Group> {
    let reusable = matches!(parent.get(name), Some(Node::Group(g)) if g.title() == Some(tag.as_str()));
    if !reusable {
        if parent.remove(name).is_some() {
            debug!(key = name, %tag, "replacing node of a different type");
        }
        parent.create_group(name)?.set_attr(TITLE_ATTR, tag.as_str());
    }
    parent
        .group_mut(name)
        .ok_or_else(|| Error::corrupt(format!("group {name} vanished")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &mut Group, value: &Value) -> Result<()> {
        let caps = Capabilities::default();
        Writer::new(&caps, Compression::NONE, SlashPolicy::Error, false).write_root(root, "h5io", value)
    }

    fn child_names(root: &Group) -> Vec<String> {
        root.walk("h5io")
            .and_then(Node::as_group)
            .map(|g| g.keys().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    #[test]
    fn stale_dict_entries_are_removed() {
        let mut root = Group::new();
        let big: Value = (0..5).map(|i| (format!("k{i}"), Value::Int(i))).collect();
        write(&mut root, &big).unwrap();
        assert_eq!(child_names(&root).len(), 5);
        let small: Value = [("k0", Value::Int(0)), ("x", Value::Int(9))].into_iter().collect();
        write(&mut root, &small).unwrap();
        assert_eq!(child_names(&root), vec!["key_k0", "key_x"]);
    }

    #[test]
    fn sequence_shrinks_from_the_tail() {
        let mut root = Group::new();
        write(&mut root, &Value::List((0..5).map(Value::Int).collect())).unwrap();
        write(&mut root, &Value::List(vec![Value::Int(7), Value::Int(8)])).unwrap();
        assert_eq!(child_names(&root), vec!["idx_0", "idx_1"]);
    }

    #[test]
    fn tag_change_replaces_the_group() {
        let mut root = Group::new();
        write(&mut root, &Value::List(vec![Value::Int(1)])).unwrap();
        write(&mut root, &Value::Tuple(vec![Value::Int(1)])).unwrap();
        assert_eq!(root.walk("h5io").and_then(Node::title), Some("tuple"));
    }

    #[test]
    fn error_path_names_the_nested_location() {
        let mut root = Group::new();
        let bad = Value::MultiArray(vec![NdArray::from_vec(vec![1i32]), NdArray::from_vec(vec![1.0f64])]);
        let value: Value = [("a", Value::List(vec![Value::Null, bad]))].into_iter().collect();
        match write(&mut root, &value) {
            Err(Error::UnsupportedType { path, .. }) => assert_eq!(path, "dict[\"a\"][1]"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn slash_in_key_needs_replace_policy() {
        let mut root = Group::new();
        let value: Value = [("a/b", Value::Int(1))].into_iter().collect();
        assert!(matches!(write(&mut root, &value), Err(Error::InvalidKey { .. })));

        let caps = Capabilities::default();
        Writer::new(&caps, Compression::NONE, SlashPolicy::Replace, false)
            .write_root(&mut root, "h5io", &value)
            .unwrap();
        assert_eq!(child_names(&root), vec!["key_a{FWDSLASH}b"]);
    }

    #[test]
    fn sparse_without_capability_fails() {
        let mut root = Group::new();
        let m = SparseMatrix::new(SparseFormat::Csr, (1, 1), NdArray::from_vec(vec![1.0f64]), vec![0], vec![0, 1]).unwrap();
        let caps = Capabilities::none();
        let err = Writer::new(&caps, Compression::NONE, SlashPolicy::Error, false)
            .write_root(&mut root, "h5io", &Value::Sparse(m));
        assert!(matches!(err, Err(Error::MissingDependency(_))));
    }

    #[test]
    fn json_fast_path_stores_one_dataset() {
        let mut root = Group::new();
        let caps = Capabilities::default();
        let value: Value = [("a", Value::List(vec![Value::Int(1), Value::Text("x".into())]))].into_iter().collect();
        Writer::new(&caps, Compression::NONE, SlashPolicy::Error, true)
            .write_root(&mut root, "h5io", &value)
            .unwrap();
        let node = root.walk("h5io").unwrap();
        assert_eq!(node.title(), Some("json"));
        assert!(!node.is_group());
    }
}
