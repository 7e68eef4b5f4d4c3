use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::time::Duration;

use crate::layer::LayerKind;
use crate::resolver::Conflict;
use crate::tree::{ConfigTree, KeyPath, MERGE_METADATA_KEY};

/// What one layer did during a merge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerMergeMetadata {
    pub kind: LayerKind,
    pub origin: Option<String>,
    /// Key paths this layer introduced.
    pub keys_contributed: Vec<String>,
    /// Key paths where this layer's value replaced an earlier one.
    pub keys_overridden: Vec<String>,
    pub load_timestamp: Option<DateTime<Utc>>,
    pub validation_errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    #[serde(serialize_with = "serialize_secs")]
    pub execution_time: Duration,
    pub layers_processed: usize,
    /// Top-level business keys; the reserved metadata key is not counted.
    pub config_keys: usize,
    pub conflicts_resolved: usize,
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Everything a single merge produced.
///
/// Check [`validation_errors`](Self::validation_errors) and
/// [`merge_warnings`](Self::merge_warnings) before trusting `merged_tree`;
/// conflicts are informational.
#[derive(Debug, Clone, Serialize)]
pub struct HierarchicalMergeResult {
    pub merged_tree: ConfigTree,
    pub layer_metadata: Vec<LayerMergeMetadata>,
    pub conflicts: Vec<Conflict>,
    pub validation_errors: Vec<String>,
    pub merge_warnings: Vec<String>,
    pub performance_metrics: PerformanceMetrics,
}

impl HierarchicalMergeResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validation_errors.is_empty()
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.merge_warnings.is_empty()
    }

    /// The merged tree without the reserved `_merge_metadata` key.
    #[must_use]
    pub fn business_tree(&self) -> ConfigTree {
        self.merged_tree
            .iter()
            .filter(|(key, _)| key.as_str() != MERGE_METADATA_KEY)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Look up a value by its rendered key path, as it appears in
    /// [`Conflict::key_path`]. Write `\.` for a dot inside a key.
    #[must_use]
    pub fn get(&self, key_path: &str) -> Option<&Value> {
        let path = KeyPath::parse(key_path);
        let (first, rest) = path.segments().split_first()?;
        let mut current = self.merged_tree.get(first)?;
        for part in rest {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// Metadata for `kind`, if that layer took part in the merge.
    #[must_use]
    pub fn layer(&self, kind: LayerKind) -> Option<&LayerMergeMetadata> {
        self.layer_metadata.iter().find(|meta| meta.kind == kind)
    }

    /// Render the merged tree as YAML.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error if the tree cannot be represented.
    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.merged_tree)
    }
}
