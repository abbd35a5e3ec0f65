//! Child naming and key escaping.
//!
//! Mapping entries live under `key_<k>`, sequence entries under `idx_<i>`, so
//! user keys never collide with reserved child names such as `data` or
//! `index`.  A `/` inside a user key would split the node path; under
//! [`SlashPolicy::Replace`] it is stored as [`SLASH_ESCAPE`] instead.

use std::str::FromStr;

use crate::error::{Error, Result};

pub const SEPARATOR: char = '/';
pub const SLASH_ESCAPE: &str = "{FWDSLASH}";

const DICT_PREFIX: &str = "key_";
const SEQ_PREFIX: &str = "idx_";

/// What the writer does with a `/` in a non-root key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlashPolicy {
    #[default]
    Error,
    Replace,
}

impl FromStr for SlashPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "error" => Ok(SlashPolicy::Error),
            "replace" => Ok(SlashPolicy::Replace),
            other => Err(Error::InvalidArgument(format!("slash must be 'error' or 'replace', got {other:?}"))),
        }
    }
}

/// What the reader does with [`SLASH_ESCAPE`] in stored names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlashDecode {
    #[default]
    Ignore,
    Replace,
}

impl FromStr for SlashDecode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ignore" => Ok(SlashDecode::Ignore),
            "replace" => Ok(SlashDecode::Replace),
            other => Err(Error::InvalidArgument(format!("slash must be 'ignore' or 'replace', got {other:?}"))),
        }
    }
}

pub fn dict_key(key: &str) -> String {
    format!("{DICT_PREFIX}{key}")
}

pub fn seq_key(index: usize) -> String {
    format!("{SEQ_PREFIX}{index}")
}

/// Strip the `key_` prefix; `None` for names that are not mapping entries.
pub fn decode_dict_key(name: &str) -> Option<&str> {
    name.strip_prefix(DICT_PREFIX)
}

/// Make `key` safe as a node name under `policy`.
pub fn escape_key(key: &str, policy: SlashPolicy) -> Result<String> {
    if !key.contains(SEPARATOR) {
        return Ok(key.to_owned());
    }
    match policy {
        SlashPolicy::Error => Err(Error::InvalidKey {
            key: key.to_owned(),
            reason: "'/' is not allowed in keys unless slash policy is 'replace'",
        }),
        SlashPolicy::Replace => Ok(key.replace(SEPARATOR, SLASH_ESCAPE)),
    }
}

pub fn unescape_key(name: &str, decode: SlashDecode) -> String {
    match decode {
        SlashDecode::Ignore => name.to_owned(),
        SlashDecode::Replace => name.replace(SLASH_ESCAPE, "/"),
    }
}

pub fn validate_mapping_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey { key: String::new(), reason: "mapping keys must not be empty" });
    }
    Ok(())
}

/// Join two slash-separated node paths.
pub fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_owned()
    } else {
        format!("{parent}{SEPARATOR}{child}")
    }
}
