use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

use crate::layer::LayerKind;

/// Failure to load a single configuration layer.
///
/// Never raised out of [`ConfigurationLayer::load`](crate::ConfigurationLayer::load);
/// its display text is recorded in the layer's `load_errors`.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("configuration file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read configuration file {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse YAML from {origin}: {source}")]
    ParseYaml {
        origin: String,
        source: serde_yaml::Error,
    },

    #[error("top-level value in {origin} must be a mapping, found {found}")]
    NotAMapping { origin: String, found: &'static str },
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(
        "conflicting values for '{key_path}': {layer_a} has {value_a}, {layer_b} has {value_b}"
    )]
    Conflict {
        key_path: String,
        layer_a: LayerKind,
        value_a: Value,
        layer_b: LayerKind,
        value_b: Value,
    },

    #[error("unknown conflict resolution strategy '{0}'")]
    UnknownStrategy(String),

    #[error("no configuration layers supplied")]
    NoLayers,

    #[error("layer {kind} declares precedence {declared}, expected {expected}")]
    PrecedenceMismatch {
        kind: LayerKind,
        declared: u8,
        expected: u8,
    },
}

impl MergeError {
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Errors caused by how the merge was requested rather than by layer content.
    #[must_use]
    pub fn is_caller_misuse(&self) -> bool {
        matches!(self, Self::UnknownStrategy(_) | Self::NoLayers)
    }

    #[must_use]
    pub fn key_path(&self) -> Option<&str> {
        match self {
            Self::Conflict { key_path, .. } => Some(key_path),
            _ => None,
        }
    }
}

pub type MergeOutcome<T> = Result<T, MergeError>;
