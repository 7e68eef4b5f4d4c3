//! Deep merge of one layer's tree into the running merged tree.
//!
//! Rules, applied key by key at each nesting level:
//!
//! - a key only the incoming tree has is added verbatim
//! - two mappings are merged recursively
//! - an incoming `null` never replaces an existing value
//! - an existing `null` is replaced without a conflict
//! - any other pair of unequal values goes to the [`ConflictResolver`]
//! - sequences are compared and replaced as a whole, never concatenated
//!
//! Inputs are never mutated; every call returns a new tree.

use serde_json::Value;
use std::collections::HashMap;

use crate::error::MergeOutcome;
use crate::layer::LayerKind;
use crate::resolver::ConflictResolver;
use crate::tree::{type_name, ConfigTree, KeyPath};

/// Which layer last set each key path.
#[derive(Debug, Default, Clone)]
pub struct Provenance {
    owners: HashMap<KeyPath, LayerKind>,
}

impl Provenance {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key_path` and everything below it as set by `layer`.
    pub fn record(&mut self, key_path: &KeyPath, layer: LayerKind) {
        self.owners.retain(|path, _| !path.is_below(key_path));
        self.owners.insert(key_path.clone(), layer);
    }

    /// The layer that set `key_path`, or the closest ancestor it was set with.
    #[must_use]
    pub fn owner(&self, key_path: &KeyPath) -> Option<LayerKind> {
        key_path
            .ancestors()
            .find_map(|prefix| self.owners.get(prefix).copied())
    }
}

/// The merged tree after one layer, plus what that layer changed.
#[derive(Debug, Clone, Default)]
pub struct LayerContribution {
    pub tree: ConfigTree,
    pub contributed: Vec<String>,
    pub overridden: Vec<String>,
    pub warnings: Vec<String>,
}

struct DeepMerge<'a> {
    layer: LayerKind,
    resolver: &'a mut ConflictResolver,
    provenance: &'a mut Provenance,
    contributed: Vec<String>,
    overridden: Vec<String>,
    warnings: Vec<String>,
}

impl DeepMerge<'_> {
    fn contribute(&mut self, key_path: &KeyPath) {
        self.provenance.record(key_path, self.layer);
        self.contributed.push(key_path.to_string());
    }

    fn replace(&mut self, key_path: &KeyPath) {
        self.provenance.record(key_path, self.layer);
        self.overridden.push(key_path.to_string());
    }

    fn merge_level(
        &mut self,
        base: &ConfigTree,
        incoming: &ConfigTree,
        prefix: &KeyPath,
    ) -> MergeOutcome<ConfigTree> {
        let mut merged = base.clone();

        for (key, value) in incoming {
            let key_path = prefix.child(key);

            let Some(existing) = base.get(key) else {
                merged.insert(key.clone(), value.clone());
                self.contribute(&key_path);
                continue;
            };

            match (existing, value) {
                (_, Value::Null) => {}
                (Value::Null, _) => {
                    merged.insert(key.clone(), value.clone());
                    self.contribute(&key_path);
                }
                (Value::Object(existing_map), Value::Object(incoming_map)) => {
                    let nested = self.merge_level(existing_map, incoming_map, &key_path)?;
                    merged.insert(key.clone(), Value::Object(nested));
                }
                _ if existing == value => {
                    merged.insert(key.clone(), value.clone());
                    self.replace(&key_path);
                }
                _ => {
                    if existing.is_object() || value.is_object() {
                        let warning = format!(
                            "type mismatch at '{key_path}': layer {} replaces {} with {}",
                            self.layer,
                            type_name(existing),
                            type_name(value)
                        );
                        tracing::warn!(key_path = %key_path, layer = %self.layer, "Structural mismatch");
                        self.warnings.push(warning);
                    }

                    let previous = self.provenance.owner(&key_path).unwrap_or(self.layer);
                    let resolved = self.resolver.resolve(
                        &key_path,
                        previous,
                        existing.clone(),
                        self.layer,
                        value.clone(),
                    )?;
                    let incoming_won = resolved == *value;
                    merged.insert(key.clone(), resolved);
                    if incoming_won {
                        self.replace(&key_path);
                    }
                }
            }
        }

        Ok(merged)
    }
}

/// Merge `incoming` (from `layer`) over `base`.
///
/// # Errors
///
/// Propagates [`MergeError::Conflict`](crate::MergeError::Conflict) when the
/// resolver refuses to settle a collision.
pub fn deep_merge(
    base: &ConfigTree,
    incoming: &ConfigTree,
    layer: LayerKind,
    resolver: &mut ConflictResolver,
    provenance: &mut Provenance,
) -> MergeOutcome<LayerContribution> {
    let mut merge = DeepMerge {
        layer,
        resolver,
        provenance,
        contributed: Vec::new(),
        overridden: Vec::new(),
        warnings: Vec::new(),
    };
    let tree = merge.merge_level(base, incoming, &KeyPath::root())?;

    Ok(LayerContribution {
        tree,
        contributed: merge.contributed,
        overridden: merge.overridden,
        warnings: merge.warnings,
    })
}

/// Same merge rules as [`deep_merge`] with the later value always winning
/// and nothing recorded.
#[must_use]
pub fn overlay(base: &Value, incoming: &Value) -> Value {
    match (base, incoming) {
        (_, Value::Null) => base.clone(),
        (Value::Object(base_map), Value::Object(incoming_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in incoming_map {
                let next = match base_map.get(key) {
                    Some(existing) => overlay(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        _ => incoming.clone(),
    }
}
