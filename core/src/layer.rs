//! Architectural layers and the configuration fragments they contribute.
//!
//! Each fragment is tagged with a [`LayerKind`] whose precedence is fixed:
//!
//! | Kind       | Precedence |
//! |------------|------------|
//! | Domain     | 1 (lowest) |
//! | UseCase    | 2          |
//! | Repository | 3          |
//! | Interface  | 4 (highest)|

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::LayerError;
use crate::interpolate::{expand_in_value, is_blank_document};
use crate::tree::{type_name, ConfigTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Domain,
    #[serde(alias = "use_case")]
    UseCase,
    Repository,
    Interface,
}

impl LayerKind {
    /// All kinds, lowest precedence first.
    pub const ALL: [Self; 4] = [Self::Domain, Self::UseCase, Self::Repository, Self::Interface];

    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Domain => 1,
            Self::UseCase => 2,
            Self::Repository => 3,
            Self::Interface => 4,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::UseCase => "usecase",
            Self::Repository => "repository",
            Self::Interface => "interface",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "domain" => Ok(Self::Domain),
            "usecase" | "use_case" | "use-case" => Ok(Self::UseCase),
            "repository" => Ok(Self::Repository),
            "interface" => Ok(Self::Interface),
            other => Err(format!("unknown layer kind '{other}'")),
        }
    }
}

/// Where a layer's content comes from.
#[derive(Debug, Clone)]
pub enum LayerSource {
    File(PathBuf),
    Inline { name: String, content: String },
    Tree,
}

/// One configuration fragment contributed by a single architectural layer.
///
/// Content is populated once by [`load`](Self::load). Loading never fails:
/// problems are recorded in [`load_errors`](Self::load_errors) and the layer
/// stays unloaded with an empty tree.
#[derive(Debug, Clone)]
pub struct ConfigurationLayer {
    kind: LayerKind,
    source: LayerSource,
    declared_precedence: Option<u8>,
    tree: ConfigTree,
    loaded: bool,
    load_errors: Vec<String>,
    load_timestamp: Option<DateTime<Utc>>,
}

impl ConfigurationLayer {
    fn with_source(kind: LayerKind, source: LayerSource) -> Self {
        Self {
            kind,
            source,
            declared_precedence: None,
            tree: ConfigTree::new(),
            loaded: false,
            load_errors: Vec::new(),
            load_timestamp: None,
        }
    }

    #[must_use]
    pub fn from_file(kind: LayerKind, path: impl Into<PathBuf>) -> Self {
        Self::with_source(kind, LayerSource::File(path.into()))
    }

    /// A layer backed by in-memory YAML text. `name` identifies it in messages.
    #[must_use]
    pub fn inline(kind: LayerKind, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_source(
            kind,
            LayerSource::Inline {
                name: name.into(),
                content: content.into(),
            },
        )
    }

    /// An already-parsed layer. It is considered loaded.
    #[must_use]
    pub fn from_tree(kind: LayerKind, tree: ConfigTree) -> Self {
        let mut layer = Self::with_source(kind, LayerSource::Tree);
        layer.tree = tree;
        layer.loaded = true;
        layer.load_timestamp = Some(Utc::now());
        layer
    }

    /// Record an explicitly declared precedence. A value that disagrees with
    /// the kind's own precedence is reported by the merger.
    #[must_use]
    pub fn with_declared_precedence(mut self, precedence: u8) -> Self {
        self.declared_precedence = Some(precedence);
        self
    }

    /// Read and parse the source. Only the first call has any effect.
    pub fn load(&mut self) {
        if self.load_timestamp.is_some() {
            return;
        }
        self.load_timestamp = Some(Utc::now());

        match self.read_source() {
            Ok(tree) => {
                tracing::debug!(
                    kind = %self.kind,
                    keys = tree.len(),
                    "Loaded configuration layer"
                );
                self.tree = tree;
                self.loaded = true;
            }
            Err(e) => {
                tracing::warn!(kind = %self.kind, error = %e, "Failed to load configuration layer");
                self.tree = ConfigTree::new();
                self.loaded = false;
                self.load_errors.push(e.to_string());
            }
        }
    }

    /// Consume the layer, returning it loaded.
    #[must_use]
    pub fn loaded(mut self) -> Self {
        self.load();
        self
    }

    fn read_source(&self) -> Result<ConfigTree, LayerError> {
        match &self.source {
            LayerSource::File(path) => {
                if !path.exists() {
                    return Err(LayerError::NotFound { path: path.clone() });
                }
                let content = std::fs::read_to_string(path).map_err(|e| LayerError::ReadFile {
                    path: path.clone(),
                    source: e,
                })?;
                parse_tree(&content, &path.display().to_string())
            }
            LayerSource::Inline { name, content } => parse_tree(content, name),
            LayerSource::Tree => Ok(self.tree.clone()),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> LayerKind {
        self.kind
    }

    #[must_use]
    pub const fn source(&self) -> &LayerSource {
        &self.source
    }

    /// Human-readable origin: the file path or inline name.
    #[must_use]
    pub fn origin(&self) -> Option<String> {
        match &self.source {
            LayerSource::File(path) => Some(path.display().to_string()),
            LayerSource::Inline { name, .. } => Some(name.clone()),
            LayerSource::Tree => None,
        }
    }

    #[must_use]
    pub const fn declared_precedence(&self) -> Option<u8> {
        self.declared_precedence
    }

    /// The declared precedence when it disagrees with the kind's precedence.
    #[must_use]
    pub fn precedence_mismatch(&self) -> Option<u8> {
        self.declared_precedence
            .filter(|declared| *declared != self.kind.precedence())
    }

    #[must_use]
    pub const fn tree(&self) -> &ConfigTree {
        &self.tree
    }

    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[must_use]
    pub fn load_errors(&self) -> &[String] {
        &self.load_errors
    }

    #[must_use]
    pub const fn load_timestamp(&self) -> Option<DateTime<Utc>> {
        self.load_timestamp
    }

    /// Loaded with at least one key; only such layers take part in a merge.
    #[must_use]
    pub fn is_mergeable(&self) -> bool {
        self.loaded && !self.tree.is_empty()
    }
}

fn parse_tree(content: &str, origin: &str) -> Result<ConfigTree, LayerError> {
    if is_blank_document(content) {
        return Ok(ConfigTree::new());
    }

    let mut value: Value = serde_yaml::from_str(content).map_err(|e| LayerError::ParseYaml {
        origin: origin.to_string(),
        source: e,
    })?;
    expand_in_value(&mut value);

    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(ConfigTree::new()),
        other => Err(LayerError::NotAMapping {
            origin: origin.to_string(),
            found: type_name(&other),
        }),
    }
}

/// One layer per kind from `<dir>/<kind>.yaml`, or `<kind>.yml` when only
/// that spelling exists. The layers are not loaded.
#[must_use]
pub fn discover_layers(dir: &Path) -> Vec<ConfigurationLayer> {
    LayerKind::ALL
        .iter()
        .map(|kind| {
            let yaml = dir.join(format!("{kind}.yaml"));
            let yml = dir.join(format!("{kind}.yml"));
            let path = if !yaml.exists() && yml.exists() { yml } else { yaml };
            ConfigurationLayer::from_file(*kind, path)
        })
        .collect()
}
