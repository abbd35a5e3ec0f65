//! Dense, dtype-tagged n-dimensional arrays.

use ndarray::{concatenate, Array1, ArrayD, ArrayViewD, Axis, IxDyn, Slice};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

use crate::error::{Error, Result};
use crate::value::Scalar;

// ── DType ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl DType {
    pub const ALL: [DType; 11] = [
        DType::Bool,
        DType::Int8,
        DType::Int16,
        DType::Int32,
        DType::Int64,
        DType::UInt8,
        DType::UInt16,
        DType::UInt32,
        DType::UInt64,
        DType::Float32,
        DType::Float64,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DType::Bool    => "bool",
            DType::Int8    => "int8",
            DType::Int16   => "int16",
            DType::Int32   => "int32",
            DType::Int64   => "int64",
            DType::UInt8   => "uint8",
            DType::UInt16  => "uint16",
            DType::UInt32  => "uint32",
            DType::UInt64  => "uint64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        DType::ALL.into_iter().find(|d| d.name() == s)
    }

    /// Bytes per element on disk.
    pub fn itemsize(self) -> usize {
        match self {
            DType::Bool | DType::Int8 | DType::UInt8 => 1,
            DType::Int16 | DType::UInt16 => 2,
            DType::Int32 | DType::UInt32 | DType::Float32 => 4,
            DType::Int64 | DType::UInt64 | DType::Float64 => 8,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Element ──────────────────────────────────────────────────────────────────

/// A primitive that can live in an [`NdArray`].
pub trait Element: Copy + Default + PartialEq + fmt::Debug + 'static {
    const DTYPE: DType;
    fn write_le(self, out: &mut Vec<u8>);
    /// `bytes.len()` is exactly `DTYPE.itemsize()`.
    fn read_le(bytes: &[u8]) -> Self;
    fn into_array(array: ArrayD<Self>) -> NdArray;
    fn into_scalar(self) -> Scalar;
    fn as_f64(self) -> f64;
}

macro_rules! impl_element {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $t {
                const DTYPE: DType = DType::$variant;
                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
                fn read_le(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    buf.copy_from_slice(bytes);
                    <$t>::from_le_bytes(buf)
                }
                fn into_array(array: ArrayD<Self>) -> NdArray {
                    NdArray::$variant(array)
                }
                fn into_scalar(self) -> Scalar {
                    Scalar::$variant(self)
                }
                fn as_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_element! {
    i8  => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8  => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
}

impl Element for bool {
    const DTYPE: DType = DType::Bool;
    fn write_le(self, out: &mut Vec<u8>) {
        out.push(self as u8);
    }
    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
    fn into_array(array: ArrayD<Self>) -> NdArray {
        NdArray::Bool(array)
    }
    fn into_scalar(self) -> Scalar {
        Scalar::Bool(self)
    }
    fn as_f64(self) -> f64 {
        if self { 1.0 } else { 0.0 }
    }
}

// ── NdArray ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum NdArray {
    Bool(ArrayD<bool>),
    Int8(ArrayD<i8>),
    Int16(ArrayD<i16>),
    Int32(ArrayD<i32>),
    Int64(ArrayD<i64>),
    UInt8(ArrayD<u8>),
    UInt16(ArrayD<u16>),
    UInt32(ArrayD<u32>),
    UInt64(ArrayD<u64>),
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
}

/// Run `$body` with `$a` bound to the inner `ArrayD<T>` of whichever variant.
macro_rules! with_array {
    ($value:expr, $a:ident => $body:expr) => {
        match $value {
            NdArray::Bool($a)    => $body,
            NdArray::Int8($a)    => $body,
            NdArray::Int16($a)   => $body,
            NdArray::Int32($a)   => $body,
            NdArray::Int64($a)   => $body,
            NdArray::UInt8($a)   => $body,
            NdArray::UInt16($a)  => $body,
            NdArray::UInt32($a)  => $body,
            NdArray::UInt64($a)  => $body,
            NdArray::Float32($a) => $body,
            NdArray::Float64($a) => $body,
        }
    };
}

/// Like `with_array!` but rewraps the resulting array in the same variant.
macro_rules! map_array {
    ($value:expr, $a:ident => $body:expr) => {
        match $value {
            NdArray::Bool($a)    => NdArray::Bool($body),
            NdArray::Int8($a)    => NdArray::Int8($body),
            NdArray::Int16($a)   => NdArray::Int16($body),
            NdArray::Int32($a)   => NdArray::Int32($body),
            NdArray::Int64($a)   => NdArray::Int64($body),
            NdArray::UInt8($a)   => NdArray::UInt8($body),
            NdArray::UInt16($a)  => NdArray::UInt16($body),
            NdArray::UInt32($a)  => NdArray::UInt32($body),
            NdArray::UInt64($a)  => NdArray::UInt64($body),
            NdArray::Float32($a) => NdArray::Float32($body),
            NdArray::Float64($a) => NdArray::Float64($body),
        }
    };
}

fn decode<T: Element>(shape: &[usize], bytes: &[u8]) -> Result<NdArray> {
    let values: Vec<T> = bytes.chunks_exact(T::DTYPE.itemsize()).map(T::read_le).collect();
    ArrayD::from_shape_vec(IxDyn(shape), values)
        .map(T::into_array)
        .map_err(|e| Error::corrupt(format!("array payload: {e}")))
}

fn zeros_of<T: Element>(shape: &[usize]) -> NdArray {
    T::into_array(ArrayD::default(IxDyn(shape)))
}

fn concat_views<T: Element>(first: &ArrayD<T>, rest: &[NdArray], pick: fn(&NdArray) -> Option<&ArrayD<T>>) -> Result<NdArray> {
    let mut views: Vec<ArrayViewD<'_, T>> = vec![first.view()];
    for part in rest {
        let arr = pick(part).ok_or_else(|| {
            Error::ShapeMismatch(format!("cannot concatenate {} with {}", T::DTYPE, part.dtype()))
        })?;
        views.push(arr.view());
    }
    concatenate(Axis(0), &views)
        .map(T::into_array)
        .map_err(|e| Error::ShapeMismatch(e.to_string()))
}

impl NdArray {
    /// One-dimensional array from a vector.
    pub fn from_vec<T: Element>(values: Vec<T>) -> Self {
        T::into_array(Array1::from(values).into_dyn())
    }

    pub fn from_shape_vec<T: Element>(shape: &[usize], values: Vec<T>) -> Result<Self> {
        ArrayD::from_shape_vec(IxDyn(shape), values)
            .map(T::into_array)
            .map_err(|e| Error::ShapeMismatch(e.to_string()))
    }

    pub fn zeros(dtype: DType, shape: &[usize]) -> Self {
        match dtype {
            DType::Bool    => zeros_of::<bool>(shape),
            DType::Int8    => zeros_of::<i8>(shape),
            DType::Int16   => zeros_of::<i16>(shape),
            DType::Int32   => zeros_of::<i32>(shape),
            DType::Int64   => zeros_of::<i64>(shape),
            DType::UInt8   => zeros_of::<u8>(shape),
            DType::UInt16  => zeros_of::<u16>(shape),
            DType::UInt32  => zeros_of::<u32>(shape),
            DType::UInt64  => zeros_of::<u64>(shape),
            DType::Float32 => zeros_of::<f32>(shape),
            DType::Float64 => zeros_of::<f64>(shape),
        }
    }

    /// UTF-8 (or ASCII) text as a flat `uint8` buffer.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        NdArray::from_vec(bytes.to_vec())
    }

    pub fn dtype(&self) -> DType {
        match self {
            NdArray::Bool(_)    => DType::Bool,
            NdArray::Int8(_)    => DType::Int8,
            NdArray::Int16(_)   => DType::Int16,
            NdArray::Int32(_)   => DType::Int32,
            NdArray::Int64(_)   => DType::Int64,
            NdArray::UInt8(_)   => DType::UInt8,
            NdArray::UInt16(_)  => DType::UInt16,
            NdArray::UInt32(_)  => DType::UInt32,
            NdArray::UInt64(_)  => DType::UInt64,
            NdArray::Float32(_) => DType::Float32,
            NdArray::Float64(_) => DType::Float64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        with_array!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        with_array!(self, a => a.len())
    }

    /// Length of the leading axis (1 for zero-dimensional arrays).
    pub fn len(&self) -> usize {
        self.shape().first().copied().unwrap_or(1)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Elements in logical (row-major) order, little-endian.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size() * self.dtype().itemsize());
        with_array!(self, a => {
            for &x in a.iter() {
                x.write_le(&mut out);
            }
        });
        out
    }

    pub fn from_le_bytes(dtype: DType, shape: &[usize], bytes: &[u8]) -> Result<Self> {
        let expected = shape.iter().product::<usize>() * dtype.itemsize();
        if bytes.len() != expected {
            return Err(Error::corrupt(format!(
                "{dtype} payload of shape {shape:?} needs {expected} bytes, found {}",
                bytes.len()
            )));
        }
        match dtype {
            DType::Bool    => decode::<bool>(shape, bytes),
            DType::Int8    => decode::<i8>(shape, bytes),
            DType::Int16   => decode::<i16>(shape, bytes),
            DType::Int32   => decode::<i32>(shape, bytes),
            DType::Int64   => decode::<i64>(shape, bytes),
            DType::UInt8   => decode::<u8>(shape, bytes),
            DType::UInt16  => decode::<u16>(shape, bytes),
            DType::UInt32  => decode::<u32>(shape, bytes),
            DType::UInt64  => decode::<u64>(shape, bytes),
            DType::Float32 => decode::<f32>(shape, bytes),
            DType::Float64 => decode::<f64>(shape, bytes),
        }
    }

    /// Raw bytes of a `uint8` buffer; `None` for any other dtype.
    pub fn as_bytes(&self) -> Option<Vec<u8>> {
        match self {
            NdArray::UInt8(a) => Some(a.iter().copied().collect()),
            _ => None,
        }
    }

    pub fn first_scalar(&self) -> Option<Scalar> {
        with_array!(self, a => a.iter().next().map(|&x| x.into_scalar()))
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        with_array!(self, a => a.iter().map(|&x| x.as_f64()).collect())
    }

    /// Integer dtypes widened to `i64`; `None` for bool and float arrays.
    pub fn to_i64_vec(&self) -> Option<Vec<i64>> {
        match self {
            NdArray::Int8(a)   => Some(a.iter().map(|&x| i64::from(x)).collect()),
            NdArray::Int16(a)  => Some(a.iter().map(|&x| i64::from(x)).collect()),
            NdArray::Int32(a)  => Some(a.iter().map(|&x| i64::from(x)).collect()),
            NdArray::Int64(a)  => Some(a.iter().copied().collect()),
            NdArray::UInt8(a)  => Some(a.iter().map(|&x| i64::from(x)).collect()),
            NdArray::UInt16(a) => Some(a.iter().map(|&x| i64::from(x)).collect()),
            NdArray::UInt32(a) => Some(a.iter().map(|&x| i64::from(x)).collect()),
            NdArray::UInt64(a) => a.iter().map(|&x| i64::try_from(x).ok()).collect(),
            NdArray::Bool(_) | NdArray::Float32(_) | NdArray::Float64(_) => None,
        }
    }

    /// Rows `range` of the leading axis.
    pub fn slice_axis0(&self, range: Range<usize>) -> NdArray {
        map_array!(self, a => a.slice_axis(Axis(0), Slice::from(range)).to_owned())
    }

    /// Concatenate along the leading axis.  All parts must share one dtype.
    pub fn concatenate(parts: &[NdArray]) -> Result<NdArray> {
        let (first, rest) = parts
            .split_first()
            .ok_or_else(|| Error::ShapeMismatch("nothing to concatenate".into()))?;
        match first {
            NdArray::Bool(a)    => concat_views(a, rest, |p| if let NdArray::Bool(x) = p { Some(x) } else { None }),
            NdArray::Int8(a)    => concat_views(a, rest, |p| if let NdArray::Int8(x) = p { Some(x) } else { None }),
            NdArray::Int16(a)   => concat_views(a, rest, |p| if let NdArray::Int16(x) = p { Some(x) } else { None }),
            NdArray::Int32(a)   => concat_views(a, rest, |p| if let NdArray::Int32(x) = p { Some(x) } else { None }),
            NdArray::Int64(a)   => concat_views(a, rest, |p| if let NdArray::Int64(x) = p { Some(x) } else { None }),
            NdArray::UInt8(a)   => concat_views(a, rest, |p| if let NdArray::UInt8(x) = p { Some(x) } else { None }),
            NdArray::UInt16(a)  => concat_views(a, rest, |p| if let NdArray::UInt16(x) = p { Some(x) } else { None }),
            NdArray::UInt32(a)  => concat_views(a, rest, |p| if let NdArray::UInt32(x) = p { Some(x) } else { None }),
            NdArray::UInt64(a)  => concat_views(a, rest, |p| if let NdArray::UInt64(x) = p { Some(x) } else { None }),
            NdArray::Float32(a) => concat_views(a, rest, |p| if let NdArray::Float32(x) = p { Some(x) } else { None }),
            NdArray::Float64(a) => concat_views(a, rest, |p| if let NdArray::Float64(x) = p { Some(x) } else { None }),
        }
    }

    /// Overwrite `range` on the last axis with `src`, spanning every other
    /// axis fully.  Caller guarantees `src` has exactly that region's shape.
    pub fn assign_last_axis(&mut self, range: Range<usize>, src: &NdArray) -> Result<()> {
        if self.ndim() == 0 {
            return Err(Error::ShapeMismatch("cannot assign a region of a 0-d array".into()));
        }
        macro_rules! assign {
            ($($v:ident),*) => {
                match (&mut *self, src) {
                    $(
                        (NdArray::$v(dst), NdArray::$v(s)) => {
                            let axis = Axis(dst.ndim() - 1);
                            dst.slice_axis_mut(axis, Slice::from(range)).assign(s);
                            Ok(())
                        }
                    )*
                    (dst, s) => Err(Error::ShapeMismatch(format!(
                        "chunk dtype {} does not match stored dtype {}",
                        s.dtype(),
                        dst.dtype()
                    ))),
                }
            };
        }
        assign!(Bool, Int8, Int16, Int32, Int64, UInt8, UInt16, UInt32, UInt64, Float32, Float64)
    }
}
