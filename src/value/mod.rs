//! In-memory value model.
//!
//! [`Value`] is a closed sum type: every shape the write dispatcher knows how
//! to store is one variant, and reading a container produces the same variants
//! back.  Chunk fragments are write-only; reading yields the assembled array or
//! list.

pub mod array;
pub mod sparse;
pub mod time;

use std::collections::BTreeMap;
use std::fmt;

pub use array::{DType, Element, NdArray};
pub use sparse::{SparseFormat, SparseMatrix};
pub use time::{Timestamp, ZoneOffset};

use crate::chunked::{ChunkedArray, ChunkedList};
use crate::tabular::TabularFrame;

// ── Scalar ───────────────────────────────────────────────────────────────────

/// A fixed-width typed scalar (stored under an `np_<dtype>` tag).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
}

impl Scalar {
    pub fn dtype(&self) -> DType {
        match self {
            Scalar::Bool(_)    => DType::Bool,
            Scalar::Int8(_)    => DType::Int8,
            Scalar::Int16(_)   => DType::Int16,
            Scalar::Int32(_)   => DType::Int32,
            Scalar::Int64(_)   => DType::Int64,
            Scalar::UInt8(_)   => DType::UInt8,
            Scalar::UInt16(_)  => DType::UInt16,
            Scalar::UInt32(_)  => DType::UInt32,
            Scalar::UInt64(_)  => DType::UInt64,
            Scalar::Float32(_) => DType::Float32,
            Scalar::Float64(_) => DType::Float64,
        }
    }

    /// Length-1 buffer holding this scalar.
    pub fn to_array(self) -> NdArray {
        match self {
            Scalar::Bool(v)    => NdArray::from_vec(vec![v]),
            Scalar::Int8(v)    => NdArray::from_vec(vec![v]),
            Scalar::Int16(v)   => NdArray::from_vec(vec![v]),
            Scalar::Int32(v)   => NdArray::from_vec(vec![v]),
            Scalar::Int64(v)   => NdArray::from_vec(vec![v]),
            Scalar::UInt8(v)   => NdArray::from_vec(vec![v]),
            Scalar::UInt16(v)  => NdArray::from_vec(vec![v]),
            Scalar::UInt32(v)  => NdArray::from_vec(vec![v]),
            Scalar::UInt64(v)  => NdArray::from_vec(vec![v]),
            Scalar::Float32(v) => NdArray::from_vec(vec![v]),
            Scalar::Float64(v) => NdArray::from_vec(vec![v]),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::Bool(v)    => v.as_f64(),
            Scalar::Int8(v)    => v.as_f64(),
            Scalar::Int16(v)   => v.as_f64(),
            Scalar::Int32(v)   => v.as_f64(),
            Scalar::Int64(v)   => v.as_f64(),
            Scalar::UInt8(v)   => v.as_f64(),
            Scalar::UInt16(v)  => v.as_f64(),
            Scalar::UInt32(v)  => v.as_f64(),
            Scalar::UInt64(v)  => v.as_f64(),
            Scalar::Float32(v) => v.as_f64(),
            Scalar::Float64(v) => v,
        }
    }

    fn as_i128(self) -> i128 {
        match self {
            Scalar::Bool(v)    => i128::from(v),
            Scalar::Int8(v)    => i128::from(v),
            Scalar::Int16(v)   => i128::from(v),
            Scalar::Int32(v)   => i128::from(v),
            Scalar::Int64(v)   => i128::from(v),
            Scalar::UInt8(v)   => i128::from(v),
            Scalar::UInt16(v)  => i128::from(v),
            Scalar::UInt32(v)  => i128::from(v),
            Scalar::UInt64(v)  => i128::from(v),
            Scalar::Float32(v) => v as i128,
            Scalar::Float64(v) => v as i128,
        }
    }

    /// Numeric cast with `as` semantics.
    pub fn cast(self, dtype: DType) -> Scalar {
        if self.dtype() == dtype {
            return self;
        }
        let i = self.as_i128();
        match dtype {
            DType::Bool    => Scalar::Bool(self.as_f64() != 0.0),
            DType::Int8    => Scalar::Int8(i as i8),
            DType::Int16   => Scalar::Int16(i as i16),
            DType::Int32   => Scalar::Int32(i as i32),
            DType::Int64   => Scalar::Int64(i as i64),
            DType::UInt8   => Scalar::UInt8(i as u8),
            DType::UInt16  => Scalar::UInt16(i as u16),
            DType::UInt32  => Scalar::UInt32(i as u32),
            DType::UInt64  => Scalar::UInt64(i as u64),
            DType::Float32 => Scalar::Float32(self.as_f64() as f32),
            DType::Float64 => Scalar::Float64(self.as_f64()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(v)    => write!(f, "{v}"),
            Scalar::Int8(v)    => write!(f, "{v}"),
            Scalar::Int16(v)   => write!(f, "{v}"),
            Scalar::Int32(v)   => write!(f, "{v}"),
            Scalar::Int64(v)   => write!(f, "{v}"),
            Scalar::UInt8(v)   => write!(f, "{v}"),
            Scalar::UInt16(v)  => write!(f, "{v}"),
            Scalar::UInt32(v)  => write!(f, "{v}"),
            Scalar::UInt64(v)  => write!(f, "{v}"),
            Scalar::Float32(v) => write!(f, "{v}"),
            Scalar::Float64(v) => write!(f, "{v}"),
        }
    }
}

// ── Value ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Scalar(Scalar),
    Datetime(Timestamp),
    Timezone(ZoneOffset),
    Text(String),
    /// Dense array with one element type.
    Array(NdArray),
    /// Ragged array-of-arrays: one dtype, differing only in leading length.
    MultiArray(Vec<NdArray>),
    Sparse(SparseMatrix),
    Dict(BTreeMap<String, Value>),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Frame(TabularFrame),
    ChunkedArray(ChunkedArray),
    ChunkedList(ChunkedList),
}

impl Value {
    /// Short shape-class name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null            => "None",
            Value::Bool(_)         => "bool",
            Value::Int(_)          => "int",
            Value::Float(_)        => "float",
            Value::Scalar(_)       => "scalar",
            Value::Datetime(_)     => "datetime",
            Value::Timezone(_)     => "timezone",
            Value::Text(_)         => "str",
            Value::Array(_)        => "ndarray",
            Value::MultiArray(_)   => "multiarray",
            Value::Sparse(_)       => "sparse",
            Value::Dict(_)         => "dict",
            Value::List(_)         => "list",
            Value::Tuple(_)        => "tuple",
            Value::Frame(_)        => "frame",
            Value::ChunkedArray(_) => "chunkedarray",
            Value::ChunkedList(_)  => "chunkedlist",
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Dict(m) => Some(m),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NdArray> for Value {
    fn from(v: NdArray) -> Self {
        Value::Array(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Dict(v)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Dict(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
