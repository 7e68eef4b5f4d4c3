use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("env pattern is valid"))
}

/// Replace `${NAME}` references with the value of the environment variable.
///
/// References to unset variables are left as written.
#[must_use]
pub fn expand_env_vars(content: &str) -> String {
    env_pattern()
        .replace_all(content, |caps: &Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// Expand references inside every string scalar of an already parsed value.
///
/// Keys and non-string scalars are untouched, and an expanded value is
/// always a plain string, never new structure.
pub fn expand_in_value(value: &mut Value) {
    match value {
        Value::String(text) if text.contains("${") => *text = expand_env_vars(text),
        Value::Array(items) => items.iter_mut().for_each(expand_in_value),
        Value::Object(map) => map.values_mut().for_each(expand_in_value),
        _ => {}
    }
}

/// True when a YAML source holds no document content at all.
///
/// Comments, blank lines and bare `---` / `...` markers do not count.
#[must_use]
pub fn is_blank_document(content: &str) -> bool {
    content.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#') || line == "---" || line == "..."
    })
}
