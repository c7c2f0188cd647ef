//! # Value Merge Layer
//!
//! Turns an ordered list of value sources (YAML files, URLs, inline `key=value` lists)
//! into one resolved mapping. Later sources win on key collisions; nested mappings are
//! merged key by key, while scalars and sequences are replaced wholesale.
//!
//! The same algorithm produces both the template values and the raw runtime-option
//! overrides of an invocation.

use crate::core::acquire;
use lazy_static::lazy_static;
use regex::Regex;
use serde_yaml::{Mapping, Number, Value};
use std::{fmt, fs, io, path::PathBuf};
use thiserror::Error;

/// Largest `key[N]` index accepted in inline values.
const MAX_INDEX: usize = 65536;

lazy_static! {
    static ref INTEGER_RE: Regex = Regex::new(r"^-?(0|[1-9][0-9]*)$").unwrap();
}

#[derive(Error, Debug)]
pub enum ValuesError {
    #[error("Failed to read values file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to fetch values from '{url}': {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to parse values from '{origin}': {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Values from '{origin}' must be a mapping at the top level.")]
    NotAMapping { origin: String },
    #[error("Failed to parse '{input}': {reason}")]
    Inline { input: String, reason: String },
}

/// One layer of values.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSource {
    /// A YAML document, given as a local path or an `http(s)://` URL.
    File(String),
    /// A `key=value[,key=value...]` list, as passed to `--set` or `--run`.
    Inline(String),
    /// An already parsed mapping.
    Mapping(Mapping),
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "file '{}'", path),
            Self::Inline(input) => write!(f, "inline '{}'", input),
            Self::Mapping(_) => write!(f, "in-memory mapping"),
        }
    }
}

impl ValueSource {
    /// Orders CLI inputs the way they are applied: every file first, then every
    /// inline list, each group in the order given.
    pub fn from_cli(files: &[String], inline: &[String]) -> Vec<Self> {
        files
            .iter()
            .cloned()
            .map(Self::File)
            .chain(inline.iter().cloned().map(Self::Inline))
            .collect()
    }

    /// Parses this source on its own.
    pub fn load(&self) -> Result<Mapping, ValuesError> {
        match self {
            Self::File(location) => load_document(location),
            Self::Inline(input) => parse_inline(input),
            Self::Mapping(mapping) => Ok(mapping.clone()),
        }
    }
}

/// Merges `sources` left to right into a single mapping.
pub fn merge_values(sources: &[ValueSource]) -> Result<Mapping, ValuesError> {
    let mut resolved = Mapping::new();
    for source in sources {
        log::debug!("Merging values from {}", source);
        let layer = source.load()?;
        merge_into(&mut resolved, layer);
    }
    Ok(resolved)
}

/// Right-biased recursive merge: `overlay` wins on every collision except when both
/// sides hold a mapping, in which case the two mappings are merged key by key.
pub fn merge_into(base: &mut Mapping, overlay: Mapping) {
    for (key, incoming) in overlay {
        match incoming {
            Value::Mapping(incoming_map) => {
                if let Some(Value::Mapping(existing)) = base.get_mut(&key) {
                    merge_into(existing, incoming_map);
                    continue;
                }
                base.insert(key, Value::Mapping(incoming_map));
            }
            other => {
                base.insert(key, other);
            }
        }
    }
}

/// Returns `defaults` with `overrides` merged on top. Neither input is modified.
pub fn coalesce(defaults: &Mapping, overrides: &Mapping) -> Mapping {
    let mut merged = defaults.clone();
    merge_into(&mut merged, overrides.clone());
    merged
}

/// Parses a YAML document into a mapping. An empty document is an empty mapping.
pub fn parse_document(content: &str, origin: &str) -> Result<Mapping, ValuesError> {
    let value: Value = serde_yaml::from_str(content).map_err(|source| ValuesError::Parse {
        origin: origin.to_string(),
        source,
    })?;
    match value {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(mapping) => Ok(mapping),
        _ => Err(ValuesError::NotAMapping {
            origin: origin.to_string(),
        }),
    }
}

fn load_document(location: &str) -> Result<Mapping, ValuesError> {
    let content = if acquire::is_remote(location) {
        log::debug!("Fetching values from {}", location);
        reqwest::blocking::get(location)
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(|source| ValuesError::Fetch {
                url: location.to_string(),
                source,
            })?
    } else {
        let path = PathBuf::from(shellexpand::tilde(location).into_owned());
        fs::read_to_string(&path).map_err(|source| ValuesError::Read { path, source })?
    };
    parse_document(&content, location)
}

// --- Inline `key=value` parsing ---

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Parses `a.b=x,list={1,2},items[0].name=y` into a mapping.
///
/// Dotted keys nest, `[N]` addresses sequence elements, `{...}` is a list value and a
/// backslash escapes the next character. Unquoted `true`, `false`, `null` and integers
/// are typed; everything else is a string.
pub fn parse_inline(input: &str) -> Result<Mapping, ValuesError> {
    let fail = |reason: String| ValuesError::Inline {
        input: input.to_string(),
        reason,
    };

    let mut root = Value::Mapping(Mapping::new());
    let chars: Vec<char> = input.chars().collect();
    let mut pos = 0;

    while pos < chars.len() {
        let (path, after_key) = parse_key(&chars, pos).map_err(fail)?;
        pos = after_key;

        let value = if chars.get(pos) == Some(&'{') {
            let (items, after_list) = parse_list(&chars, pos + 1).map_err(fail)?;
            pos = after_list;
            Value::Sequence(items.iter().map(|item| typed_scalar(item)).collect())
        } else {
            let (raw, after_value) = read_until(&chars, pos, &[',']);
            pos = after_value;
            typed_scalar(&raw)
        };

        match chars.get(pos) {
            None => {}
            Some(',') => pos += 1,
            Some(c) => return Err(fail(format!("unexpected '{}' after a list value", c))),
        }

        set_path(&mut root, &path, value).map_err(fail)?;
    }

    match root {
        Value::Mapping(mapping) => Ok(mapping),
        _ => Err(fail("top level is not a mapping".to_string())),
    }
}

/// Reads a key up to its `=`, splitting it into path segments.
fn parse_key(chars: &[char], start: usize) -> Result<(Vec<Segment>, usize), String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut pos = start;

    loop {
        match chars.get(pos) {
            None => {
                let key: String = chars.get(start..pos).unwrap_or_default().iter().collect();
                return Err(format!("key '{}' has no value", key));
            }
            Some(',') => {
                let key: String = chars.get(start..pos).unwrap_or_default().iter().collect();
                return Err(format!("key '{}' has no value", key));
            }
            Some('\\') => {
                if let Some(&escaped) = chars.get(pos + 1) {
                    current.push(escaped);
                }
                pos += 2;
            }
            Some('=') => {
                if !current.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut current)));
                }
                if segments.is_empty() {
                    return Err("empty key".to_string());
                }
                return Ok((segments, pos + 1));
            }
            Some('.') => {
                if current.is_empty() && !matches!(segments.last(), Some(Segment::Index(_))) {
                    return Err("empty key segment".to_string());
                }
                if !current.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut current)));
                }
                pos += 1;
            }
            Some('[') => {
                if !current.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut current)));
                }
                if segments.is_empty() {
                    return Err("an index needs a key before it".to_string());
                }
                let (digits, after) = read_until(chars, pos + 1, &[']']);
                if chars.get(after) != Some(&']') {
                    return Err(format!("unterminated index '[{}'", digits));
                }
                let index = digits
                    .parse::<usize>()
                    .map_err(|_| format!("invalid index '{}'", digits))?;
                if index > MAX_INDEX {
                    return Err(format!(
                        "index {} is greater than the maximum supported index {}",
                        index, MAX_INDEX
                    ));
                }
                segments.push(Segment::Index(index));
                pos = after + 1;
            }
            Some(&c) => {
                current.push(c);
                pos += 1;
            }
        }
    }
}

/// Reads the items of a `{a,b,c}` list; `start` is just past the `{`.
fn parse_list(chars: &[char], start: usize) -> Result<(Vec<String>, usize), String> {
    let mut items = Vec::new();
    let mut pos = start;
    loop {
        let (item, after) = read_until(chars, pos, &[',', '}']);
        match chars.get(after) {
            Some(',') => {
                items.push(item);
                pos = after + 1;
            }
            Some('}') => {
                if !(item.is_empty() && items.is_empty()) {
                    items.push(item);
                }
                return Ok((items, after + 1));
            }
            _ => return Err("unterminated list value".to_string()),
        }
    }
}

/// Reads until one of `stops` (unescaped) or the end of input.
fn read_until(chars: &[char], start: usize, stops: &[char]) -> (String, usize) {
    let mut out = String::new();
    let mut pos = start;
    while let Some(&c) = chars.get(pos) {
        if c == '\\' {
            if let Some(&escaped) = chars.get(pos + 1) {
                out.push(escaped);
            }
            pos += 2;
            continue;
        }
        if stops.contains(&c) {
            break;
        }
        out.push(c);
        pos += 1;
    }
    (out, pos)
}

fn typed_scalar(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    // Leading zeros stay strings so things like "007" survive.
    if INTEGER_RE.is_match(raw) {
        if let Ok(n) = raw.parse::<i64>() {
            return Value::Number(Number::from(n));
        }
    }
    Value::String(raw.to_string())
}

fn set_path(target: &mut Value, path: &[Segment], value: Value) -> Result<(), String> {
    let Some((head, rest)) = path.split_first() else {
        *target = value;
        return Ok(());
    };
    match head {
        Segment::Key(key) => {
            if !matches!(target, Value::Mapping(_)) {
                *target = Value::Mapping(Mapping::new());
            }
            let Value::Mapping(map) = target else {
                return Err(format!("'{}' is not a mapping", key));
            };
            if !map.contains_key(key.as_str()) {
                map.insert(Value::String(key.clone()), Value::Null);
            }
            match map.get_mut(key.as_str()) {
                Some(slot) => set_path(slot, rest, value),
                None => Err(format!("could not create key '{}'", key)),
            }
        }
        Segment::Index(index) => {
            if !matches!(target, Value::Sequence(_)) {
                *target = Value::Sequence(Vec::new());
            }
            let Value::Sequence(items) = target else {
                return Err(format!("index [{}] applied to a non-sequence", index));
            };
            if items.len() <= *index {
                let len = index
                    .checked_add(1)
                    .ok_or_else(|| format!("index [{}] is out of range", index))?;
                items.resize(len, Value::Null);
            }
            match items.get_mut(*index) {
                Some(slot) => set_path(slot, rest, value),
                None => Err(format!("could not create index [{}]", index)),
            }
        }
    }
}
