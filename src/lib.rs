//! Recursive serialization of nested values into a hierarchical, typed
//! container file.
//!
//! ```no_run
//! use h5io::{read, write, ReadOptions, Value, WriteOptions};
//!
//! let value: Value = [("a", Value::Int(1)), ("b", Value::List(vec![Value::Int(1), Value::Int(2)]))]
//!     .into_iter()
//!     .collect();
//! write("data.h5io", &value, &WriteOptions::default())?;
//! assert_eq!(read("data.h5io", &ReadOptions::default())?, value);
//! # Ok::<(), h5io::Error>(())
//! ```

pub mod superblock;
pub mod codec;
pub mod block;
pub mod index;
pub mod io_stream;
pub mod store;

pub mod error;
pub mod value;
pub mod tag;
pub mod addressing;
pub mod multiarray;
pub mod chunked;
pub mod tabular;
pub mod capability;
pub mod json;
pub mod write;
pub mod read;
pub mod diff;
pub mod api;

pub use api::{
    has, list_contents, print_file_contents, read, write, Overwrite, ReadOptions, WriteOptions, DEFAULT_TITLE,
};
pub use addressing::{SlashDecode, SlashPolicy};
pub use capability::Capabilities;
pub use chunked::{ChunkedArray, ChunkedList};
pub use codec::CodecId;
pub use diff::object_diff;
pub use error::{Error, Result};
pub use store::{Container, Mode};
pub use tabular::{ContainerTabularBridge, FrameKind, TabularBridge, TabularFrame};
pub use tag::TypeTag;
pub use value::{DType, NdArray, Scalar, SparseFormat, SparseMatrix, Timestamp, Value, ZoneOffset};
