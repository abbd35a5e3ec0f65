//! Recursive read dispatcher.
//!
//! Reconstruction is driven by the stored tag alone.  A tag that does not fit
//! the node kind (a dataset tagged `dict`, say) is reported as unknown.

use std::path::Path;
use tracing::{debug, warn};

use crate::addressing::{decode_dict_key, join_path, seq_key, unescape_key, SlashDecode};
use crate::capability::Capabilities;
use crate::error::{Error, Result};
use crate::json;
use crate::multiarray;
use crate::store::{AttrValue, Dataset, Group, Node, SIZE_ATTR};
use crate::tabular::FrameKind;
use crate::tag::TypeTag;
use crate::value::{NdArray, Scalar, SparseFormat, SparseMatrix, Timestamp, Value, ZoneOffset};

pub struct Reader<'a> {
    source: &'a Path,
    slash:  SlashDecode,
    caps:   &'a Capabilities,
}

impl<'a> Reader<'a> {
    /// `source` is the container file, handed to the tabular bridge.
    pub fn new(source: &'a Path, slash: SlashDecode, caps: &'a Capabilities) -> Self {
        Reader { source, slash, caps }
    }

    /// Reconstruct the value stored at `node`, whose path from the container
    /// root is `node_path`.
    pub fn read(&self, node: &Node, node_path: &str) -> Result<Value> {
        let title = node
            .title()
            .ok_or_else(|| Error::corrupt(format!("node {node_path} has no type tag")))?;
        let tag = TypeTag::parse(title).ok_or_else(|| Error::UnknownNodeType(title.to_owned()))?;
        match node {
            Node::Group(g) if tag.is_group() => self.read_group(g, tag, node_path),
            Node::Dataset(d) if !tag.is_group() => self.read_dataset(d, tag, node_path),
            Node::Group(_) => Err(Error::UnknownNodeType(format!("{title} (stored as a group)"))),
            Node::Dataset(_) => Err(Error::UnknownNodeType(format!("{title} (stored as a dataset)"))),
        }
    }

    fn child(&self, group: &Group, name: &str, node_path: &str) -> Result<Value> {
        let node = group
            .get(name)
            .ok_or_else(|| Error::corrupt(format!("{node_path} is missing its {name} child")))?;
        self.read(node, &join_path(node_path, name))
    }

    fn child_array(&self, group: &Group, name: &str, node_path: &str) -> Result<NdArray> {
        match self.child(group, name, node_path)? {
            Value::Array(a) => Ok(a),
            other => Err(Error::corrupt(format!("{node_path}/{name} holds {} instead of an array", other.kind()))),
        }
    }

    fn child_indices(&self, group: &Group, name: &str, node_path: &str) -> Result<Vec<i64>> {
        self.child_array(group, name, node_path)?
            .to_i64_vec()
            .ok_or_else(|| Error::corrupt(format!("{node_path}/{name} is not an integer array")))
    }

    fn read_group(&self, group: &Group, tag: TypeTag, node_path: &str) -> Result<Value> {
        debug!(node = node_path, %tag, children = group.len(), "reading group");
        match tag {
            TypeTag::Dict => {
                let mut map = std::collections::BTreeMap::new();
                for (name, child) in group.iter() {
                    let decoded = unescape_key(name, self.slash);
                    let key = decode_dict_key(&decoded)
                        .ok_or_else(|| Error::corrupt(format!("{node_path}/{name} is not a dict entry")))?;
                    map.insert(key.to_owned(), self.read(child, &join_path(node_path, name))?);
                }
                Ok(Value::Dict(map))
            }
            TypeTag::List | TypeTag::Tuple => {
                let mut items = Vec::new();
                while let Some(child) = group.get(&seq_key(items.len())) {
                    let path = join_path(node_path, &seq_key(items.len()));
                    items.push(self.read(child, &path)?);
                }
                let stored = group.keys().filter(|k| k.starts_with("idx_")).count();
                if stored != items.len() {
                    return Err(Error::corrupt(format!(
                        "{node_path} has {stored} elements but only the first {} are contiguous",
                        items.len()
                    )));
                }
                Ok(if tag == TypeTag::List { Value::List(items) } else { Value::Tuple(items) })
            }
            TypeTag::ChunkedList => {
                let size = group
                    .attr(SIZE_ATTR)
                    .and_then(AttrValue::as_int)
                    .and_then(|s| usize::try_from(s).ok())
                    .ok_or_else(|| Error::corrupt(format!("chunked list {node_path} has no valid SIZE")))?;
                let mut items = Vec::with_capacity(size);
                for i in 0..size {
                    let name = seq_key(i);
                    items.push(match group.get(&name) {
                        Some(child) => self.read(child, &join_path(node_path, &name))?,
                        None => Value::Null,
                    });
                }
                Ok(Value::List(items))
            }
            TypeTag::CscMatrix | TypeTag::CsrMatrix => {
                self.caps.require_sparse()?;
                let data = self.child_array(group, "data", node_path)?;
                let indices = self.child_indices(group, "indices", node_path)?;
                let indptr = self.child_indices(group, "indptr", node_path)?;
                let format = if tag == TypeTag::CscMatrix { SparseFormat::Csc } else { SparseFormat::Csr };
                let matrix = match (format, group.contains("shape")) {
                    (SparseFormat::Csc, false) => SparseMatrix::csc_inferred(data, indices, indptr)?,
                    (_, true) => {
                        let shape = self.read_shape(group, node_path)?;
                        SparseMatrix::new(format, shape, data, indices, indptr)?
                    }
                    (SparseFormat::Csr, false) => {
                        return Err(Error::corrupt(format!("{node_path} is missing its shape child")))
                    }
                };
                Ok(Value::Sparse(matrix))
            }
            TypeTag::PdDataFrame | TypeTag::PdSeries => {
                let bridge = self.caps.require_tabular()?;
                let kind = if tag == TypeTag::PdDataFrame { FrameKind::DataFrame } else { FrameKind::Series };
                Ok(Value::Frame(bridge.read_frame(self.source, node_path, kind)?))
            }
            TypeTag::MultiArray => {
                let index = self.child_indices(group, "index", node_path)?;
                let data = self.child_array(group, "data", node_path)?;
                Ok(Value::MultiArray(multiarray::load(&index, &data)?))
            }
            other => Err(Error::UnknownNodeType(other.as_str().to_owned())),
        }
    }

    fn read_shape(&self, group: &Group, node_path: &str) -> Result<(usize, usize)> {
        let dims = match self.child(group, "shape", node_path)? {
            Value::Tuple(items) | Value::List(items) => items,
            other => return Err(Error::corrupt(format!("{node_path}/shape holds {}", other.kind()))),
        };
        match dims.as_slice() {
            [Value::Int(r), Value::Int(c)] if *r >= 0 && *c >= 0 => Ok((*r as usize, *c as usize)),
            _ => Err(Error::corrupt(format!("{node_path}/shape is not a pair of sizes"))),
        }
    }

    fn read_dataset(&self, ds: &Dataset, tag: TypeTag, node_path: &str) -> Result<Value> {
        let data = ds.data();
        Ok(match tag {
            TypeTag::NdArray | TypeTag::ChunkedArray => Value::Array(data.clone()),
            TypeTag::Int => match data.to_i64_vec().and_then(|v| v.first().copied()) {
                Some(i) => Value::Int(i),
                None => Value::Int(first_scalar(data, node_path)?.as_f64() as i64),
            },
            TypeTag::Float => Value::Float(first_scalar(data, node_path)?.as_f64()),
            TypeTag::Bool => Value::Bool(first_scalar(data, node_path)?.as_f64() != 0.0),
            TypeTag::Numpy(dtype) => Value::Scalar(first_scalar(data, node_path)?.cast(dtype)),
            TypeTag::Datetime => Value::Datetime(Timestamp::parse_iso(&utf8(data, node_path)?)?),
            TypeTag::Timezone => Value::Timezone(utf8(data, node_path)?.parse::<ZoneOffset>()?),
            TypeTag::Unicode | TypeTag::Str => Value::Text(utf8(data, node_path)?),
            TypeTag::Ascii => {
                let text = utf8(data, node_path)?;
                if !text.is_ascii() {
                    return Err(Error::corrupt(format!("{node_path} is tagged ascii but holds non-ASCII bytes")));
                }
                Value::Text(text)
            }
            TypeTag::Json => {
                let bytes = data
                    .as_bytes()
                    .ok_or_else(|| Error::corrupt(format!("{node_path} is not a byte buffer")))?;
                json::from_json(serde_json::from_slice(&bytes)?, self.slash)
            }
            TypeTag::None => Value::Null,
            other => return Err(Error::UnknownNodeType(other.as_str().to_owned())),
        })
    }
}

fn first_scalar(data: &NdArray, node_path: &str) -> Result<Scalar> {
    if data.size() != 1 {
        warn!(node = node_path, size = data.size(), "boxed scalar holds more than one element");
    }
    data.first_scalar()
        .ok_or_else(|| Error::corrupt(format!("{node_path} is an empty scalar")))
}

fn utf8(data: &NdArray, node_path: &str) -> Result<String> {
    let bytes = data
        .as_bytes()
        .ok_or_else(|| Error::corrupt(format!("{node_path} is not a byte buffer")))?;
    String::from_utf8(bytes).map_err(|e| Error::corrupt(format!("{node_path}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Compression;
    use crate::store::TITLE_ATTR;

    fn tagged(data: NdArray, tag: &str) -> Node {
        let mut ds = Dataset::new(data, Compression::NONE);
        ds.set_attr(TITLE_ATTR, tag);
        Node::Dataset(ds)
    }

    fn read(node: &Node) -> Result<Value> {
        let caps = Capabilities::default();
        Reader::new(Path::new("unused.h5io"), SlashDecode::Ignore, &caps).read(node, "h5io")
    }

    #[test]
    fn unknown_tag_is_reported() {
        let node = tagged(NdArray::from_vec(vec![1u8]), "frozenset");
        assert!(matches!(read(&node), Err(Error::UnknownNodeType(t)) if t == "frozenset"));
    }

    #[test]
    fn group_tag_on_a_dataset_is_unknown() {
        let node = tagged(NdArray::from_vec(vec![1u8]), "dict");
        assert!(matches!(read(&node), Err(Error::UnknownNodeType(_))));
    }

    #[test]
    fn numpy_scalars_cast_to_their_tag() {
        let node = tagged(NdArray::from_vec(vec![3i64]), "np_int16");
        assert_eq!(read(&node).unwrap(), Value::Scalar(Scalar::Int16(3)));
        let node = tagged(NdArray::from_vec(vec![true]), "np_bool_");
        assert_eq!(read(&node).unwrap(), Value::Scalar(Scalar::Bool(true)));
    }

    #[test]
    fn legacy_str_tag_decodes_utf8() {
        let node = tagged(NdArray::from_bytes("héllo".as_bytes()), "str");
        assert_eq!(read(&node).unwrap(), Value::Text("héllo".into()));
    }

    #[test]
    fn list_with_a_gap_is_corrupt() {
        let mut g = Group::new();
        g.set_attr(TITLE_ATTR, "list");
        for name in ["idx_0", "idx_2"] {
            g.create_dataset(name, Dataset::new(NdArray::from_vec(vec![1i64]), Compression::NONE))
                .unwrap()
                .set_attr(TITLE_ATTR, "int");
        }
        assert!(matches!(read(&Node::Group(g)), Err(Error::Corrupt(_))));
    }

    #[test]
    fn chunked_list_fills_gaps_with_null() {
        let mut g = Group::new();
        g.set_attr(TITLE_ATTR, "chunkedlist");
        g.set_attr(SIZE_ATTR, 3i64);
        g.create_dataset("idx_1", Dataset::new(NdArray::from_vec(vec![5i64]), Compression::NONE))
            .unwrap()
            .set_attr(TITLE_ATTR, "int");
        assert_eq!(
            read(&Node::Group(g)).unwrap(),
            Value::List(vec![Value::Null, Value::Int(5), Value::Null])
        );
    }

    #[test]
    fn sparse_without_capability_fails() {
        let mut g = Group::new();
        g.set_attr(TITLE_ATTR, "csc_matrix");
        let caps = Capabilities::none();
        let err = Reader::new(Path::new("x"), SlashDecode::Ignore, &caps).read(&Node::Group(g), "h5io");
        assert!(matches!(err, Err(Error::MissingDependency(_))));
    }

    #[test]
    fn timezone_text_is_parsed_not_evaluated() {
        let text = "datetime.timezone(datetime.timedelta(seconds=3600), 'CET')";
        let node = tagged(NdArray::from_bytes(text.as_bytes()), "timezone");
        let tz = ZoneOffset::new(3_600_000_000, Some("CET".into())).unwrap();
        assert_eq!(read(&node).unwrap(), Value::Timezone(tz));
        let node = tagged(NdArray::from_bytes(b"__import__('os')"), "timezone");
        assert!(read(&node).is_err());
    }

    #[test]
    fn int_tag_unboxes_exactly() {
        let node = tagged(NdArray::from_vec(vec![i64::MAX]), "int");
        assert_eq!(read(&node).unwrap(), Value::Int(i64::MAX));
        let node = tagged(NdArray::from_vec(vec![2.0f64]), "float");
        assert_eq!(read(&node).unwrap(), Value::Float(2.0));
    }
}
