//! File-level entry points: write, read, probe and list a container.

use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::addressing::{SlashDecode, SlashPolicy, SEPARATOR};
use crate::capability::Capabilities;
use crate::codec::{CodecId, Compression, MAX_LEVEL};
use crate::error::{Error, Result};
use crate::read::Reader;
use crate::store::{Container, Mode, Node, TITLE_ATTR};
use crate::tag::TypeTag;
use crate::value::Value;
use crate::write::Writer;

pub const DEFAULT_TITLE: &str = "h5io";
pub const DEFAULT_LEVEL: u8 = 4;

const TAB: &str = "----";
const PREVIEW_CHARS: usize = 10;

/// What to do when the destination file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overwrite {
    /// Refuse with [`Error::FileExists`].
    #[default]
    Never,
    /// Replace the whole file.
    Replace,
    /// Keep the file and reconcile only the subtree under the title.
    Update,
}

impl From<bool> for Overwrite {
    fn from(b: bool) -> Self {
        if b {
            Overwrite::Replace
        } else {
            Overwrite::Never
        }
    }
}

impl FromStr for Overwrite {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "false" => Ok(Overwrite::Never),
            "true" => Ok(Overwrite::Replace),
            "update" => Ok(Overwrite::Update),
            other => Err(Error::InvalidArgument(format!("overwrite must be \"update\" or a bool, got {other:?}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub overwrite:    Overwrite,
    /// 0 stores verbatim, 1-9 trade speed for size.
    pub compression:  u8,
    pub codec:        CodecId,
    pub title:        String,
    pub slash:        SlashPolicy,
    pub use_json:     bool,
    pub capabilities: Capabilities,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            overwrite:    Overwrite::Never,
            compression:  DEFAULT_LEVEL,
            codec:        CodecId::Zstd,
            title:        DEFAULT_TITLE.to_owned(),
            slash:        SlashPolicy::Error,
            use_json:     false,
            capabilities: Capabilities::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub title:        String,
    pub slash:        SlashDecode,
    pub capabilities: Capabilities,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            title:        DEFAULT_TITLE.to_owned(),
            slash:        SlashDecode::Ignore,
            capabilities: Capabilities::default(),
        }
    }
}

fn check_title(title: &str) -> Result<()> {
    if title.is_empty() || title.contains(SEPARATOR) {
        return Err(Error::InvalidArgument(format!("title must be a non-empty name without '/', got {title:?}")));
    }
    Ok(())
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::NotFound(path.display().to_string()))
    }
}

/// Store `value` under `opts.title` in the container at `path`.
///
/// The tree is persisted when the container closes, so a write that fails
/// part way leaves the file as it was.  Frames are handed to the tabular
/// bridge after that, each with its own file handle.
pub fn write<P: AsRef<Path>>(path: P, value: &Value, opts: &WriteOptions) -> Result<()> {
    let path = path.as_ref();
    check_title(&opts.title)?;
    if opts.compression > MAX_LEVEL {
        return Err(Error::InvalidArgument(format!(
            "compression must be between 0 and {MAX_LEVEL}, got {}",
            opts.compression
        )));
    }
    let mode = match (path.is_file(), opts.overwrite) {
        (false, _) => Mode::Write,
        (true, Overwrite::Never) => return Err(Error::FileExists(path.to_owned())),
        (true, Overwrite::Replace) => Mode::Write,
        (true, Overwrite::Update) => Mode::Append,
    };

    let mut container = Container::open(path, mode)?;
    let compression = Compression::from_level(opts.codec, opts.compression);
    let mut writer = Writer::new(&opts.capabilities, compression, opts.slash, opts.use_json);
    writer.write_root(container.root_mut()?, &opts.title, value)?;
    let deferred = writer.into_deferred();
    container.close()?;

    if !deferred.is_empty() {
        let bridge = opts.capabilities.require_tabular()?;
        for d in &deferred {
            d.flush(bridge, path)?;
        }
    }
    info!(path = %path.display(), title = %opts.title, kind = value.kind(), frames = deferred.len(), "wrote value");
    Ok(())
}

/// Load the value stored under `opts.title`.
pub fn read<P: AsRef<Path>>(path: P, opts: &ReadOptions) -> Result<Value> {
    let path = path.as_ref();
    require_file(path)?;
    let container = Container::open(path, Mode::Read)?;
    let node = container
        .root()
        .get(&opts.title)
        .filter(|n| n.attrs().contains_key(TITLE_ATTR))
        .ok_or_else(|| Error::NotFound(opts.title.clone()))?;
    Reader::new(path, opts.slash, &opts.capabilities).read(node, &opts.title)
}

/// Whether the container at `path` holds anything under `title`.
pub fn has<P: AsRef<Path>>(path: P, title: &str) -> Result<bool> {
    let path = path.as_ref();
    require_file(path)?;
    let container = Container::open(path, Mode::Read)?;
    Ok(container.root().contains(title))
}

/// `(3,)` / `(3, 2)` like a tuple repr.
fn shape_text(shape: &[usize]) -> String {
    match shape {
        [n] => format!("({n},)"),
        dims => format!("({})", dims.iter().map(usize::to_string).collect::<Vec<_>>().join(", ")),
    }
}

fn describe_child(node: &Node, tag: &str) -> String {
    let parsed = TypeTag::parse(tag);
    match (parsed, node) {
        (Some(TypeTag::NdArray | TypeTag::ChunkedArray), Node::Dataset(d)) => format!("Shape: {}", shape_text(d.shape())),
        (Some(TypeTag::PdDataFrame | TypeTag::PdSeries), Node::Group(g)) => {
            let shape = g.get("values").and_then(Node::as_dataset).map(|d| shape_text(d.shape()));
            format!("Shape: {}", shape.unwrap_or_else(|| "?".into()))
        }
        (Some(TypeTag::Unicode | TypeTag::Ascii | TypeTag::Str), Node::Dataset(d)) => {
            let text = String::from_utf8_lossy(&d.data().as_bytes().unwrap_or_default()).into_owned();
            let preview = if text.chars().count() > PREVIEW_CHARS {
                format!("{}...", text.chars().take(PREVIEW_CHARS).collect::<String>())
            } else {
                text
            };
            format!("Text: {preview}")
        }
        (_, Node::Group(g)) => format!("Items: {}", g.len()),
        (_, Node::Dataset(d)) => format!("Items: {}", d.data().len()),
    }
}

/// One-level summary of the subtree under `title`.
pub fn list_contents<P: AsRef<Path>>(path: P, title: &str) -> Result<String> {
    let path = path.as_ref();
    require_file(path)?;
    let container = Container::open(path, Mode::Read)?;
    let root = container
        .root()
        .get(title)
        .ok_or_else(|| Error::NotFound(title.to_owned()))?;
    let root_tag = root.title().unwrap_or("?");

    let mut out = String::new();
    let group = match root {
        Node::Group(g) => g,
        Node::Dataset(d) => {
            let _ = writeln!(out, "Root type: {root_tag} | Items: {}", d.data().len());
            return Ok(out);
        }
    };
    let _ = writeln!(out, "Root type: {root_tag} | Items: {}", group.len());
    let width = group
        .iter()
        .map(|(k, n)| k.len().max(n.title().map_or(0, str::len)))
        .max()
        .unwrap_or(0)
        + 2;
    for (key, node) in group.iter() {
        let tag = node.title().unwrap_or("?");
        let _ = write!(out, "\n{TAB} Key: {key:<width$} | Type: {tag:<width$} | {}", describe_child(node, tag));
    }
    Ok(out)
}

pub fn print_file_contents<P: AsRef<Path>>(path: P, title: &str) -> Result<()> {
    println!("{}", list_contents(path, title)?);
    Ok(())
}
