//! On-disk type tags.
//!
//! Every stored node carries one of these in its `TITLE` attribute.  The read
//! dispatcher trusts the tag alone; payload shape is never used to guess.

use std::fmt;

use crate::value::DType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    // Group tags
    Dict,
    List,
    Tuple,
    ChunkedList,
    CscMatrix,
    CsrMatrix,
    PdDataFrame,
    PdSeries,
    MultiArray,
    // Dataset tags
    NdArray,
    ChunkedArray,
    Int,
    Float,
    Bool,
    Datetime,
    Timezone,
    Numpy(DType),
    Unicode,
    Ascii,
    /// Legacy spelling of `Unicode`; read-only.
    Str,
    Json,
    None,
}

impl TypeTag {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::Dict         => "dict",
            TypeTag::List         => "list",
            TypeTag::Tuple        => "tuple",
            TypeTag::ChunkedList  => "chunkedlist",
            TypeTag::CscMatrix    => "csc_matrix",
            TypeTag::CsrMatrix    => "csr_matrix",
            TypeTag::PdDataFrame  => "pd_dataframe",
            TypeTag::PdSeries     => "pd_series",
            TypeTag::MultiArray   => "multiarray",
            TypeTag::NdArray      => "ndarray",
            TypeTag::ChunkedArray => "chunkedarray",
            TypeTag::Int          => "int",
            TypeTag::Float        => "float",
            TypeTag::Bool         => "bool",
            TypeTag::Datetime     => "datetime",
            TypeTag::Timezone     => "timezone",
            TypeTag::Numpy(dtype) => numpy_tag(dtype),
            TypeTag::Unicode      => "unicode",
            TypeTag::Ascii        => "ascii",
            TypeTag::Str          => "str",
            TypeTag::Json         => "json",
            TypeTag::None         => "None",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let tag = match s {
            "dict"         => TypeTag::Dict,
            "list"         => TypeTag::List,
            "tuple"        => TypeTag::Tuple,
            "chunkedlist"  => TypeTag::ChunkedList,
            "csc_matrix"   => TypeTag::CscMatrix,
            "csr_matrix"   => TypeTag::CsrMatrix,
            "pd_dataframe" => TypeTag::PdDataFrame,
            "pd_series"    => TypeTag::PdSeries,
            "multiarray"   => TypeTag::MultiArray,
            "ndarray"      => TypeTag::NdArray,
            "chunkedarray" => TypeTag::ChunkedArray,
            "int"          => TypeTag::Int,
            "float"        => TypeTag::Float,
            "bool"         => TypeTag::Bool,
            "datetime"     => TypeTag::Datetime,
            "timezone"     => TypeTag::Timezone,
            "unicode"      => TypeTag::Unicode,
            "ascii"        => TypeTag::Ascii,
            "str"          => TypeTag::Str,
            "json"         => TypeTag::Json,
            "None"         => TypeTag::None,
            other => {
                let name = other.strip_prefix("np_")?;
                // numpy spells its boolean scalar class `bool_`
                let name = if name == "bool_" { "bool" } else { name };
                TypeTag::Numpy(DType::from_name(name)?)
            }
        };
        Some(tag)
    }

    /// Whether nodes with this tag are stored as groups.
    pub fn is_group(self) -> bool {
        matches!(
            self,
            TypeTag::Dict
                | TypeTag::List
                | TypeTag::Tuple
                | TypeTag::ChunkedList
                | TypeTag::CscMatrix
                | TypeTag::CsrMatrix
                | TypeTag::PdDataFrame
                | TypeTag::PdSeries
                | TypeTag::MultiArray
        )
    }
}

fn numpy_tag(dtype: DType) -> &'static str {
    match dtype {
        DType::Bool    => "np_bool",
        DType::Int8    => "np_int8",
        DType::Int16   => "np_int16",
        DType::Int32   => "np_int32",
        DType::Int64   => "np_int64",
        DType::UInt8   => "np_uint8",
        DType::UInt16  => "np_uint16",
        DType::UInt32  => "np_uint32",
        DType::UInt64  => "np_uint64",
        DType::Float32 => "np_float32",
        DType::Float64 => "np_float64",
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
