use serde_json::{Map, Value};
use std::borrow::Borrow;
use std::fmt;

/// A nested configuration tree: string keys, arbitrary YAML-compatible values.
pub type ConfigTree = Map<String, Value>;

/// Top-level key the merger writes its own bookkeeping under.
pub const MERGE_METADATA_KEY: &str = "_merge_metadata";

/// Location of a value in a tree, one segment per nesting level.
///
/// Identity is the segment list, so a literal `"a.b"` key and the nested
/// path `a` -> `b` are different paths. The dotted rendering escapes `.` and
/// `\` inside a segment with a backslash; [`KeyPath::parse`] reverses it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn child(&self, key: &str) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend_from_slice(&self.0);
        segments.push(key.to_string());
        Self(segments)
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `self` lies strictly below `ancestor`.
    #[must_use]
    pub fn is_below(&self, ancestor: &Self) -> bool {
        self.0.len() > ancestor.0.len() && self.0.starts_with(&ancestor.0)
    }

    /// Prefixes of this path, longest first, including the path itself.
    pub fn ancestors(&self) -> impl Iterator<Item = &[String]> {
        (1..=self.0.len()).rev().map(move |len| &self.0[..len])
    }

    /// Split a dotted rendering back into segments.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => current.push(chars.next().unwrap_or('\\')),
                '.' => segments.push(std::mem::take(&mut current)),
                _ => current.push(c),
            }
        }
        segments.push(current);
        Self(segments)
    }
}

impl Borrow<[String]> for KeyPath {
    fn borrow(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for KeyPath {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            for c in segment.chars() {
                if c == '.' || c == '\\' {
                    f.write_str("\\")?;
                }
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

pub(crate) const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
