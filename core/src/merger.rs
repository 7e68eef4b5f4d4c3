use serde_json::{json, Value};
use std::borrow::Cow;
use std::time::Instant;

use crate::error::{MergeError, MergeOutcome};
use crate::layer::ConfigurationLayer;
use crate::merge::{deep_merge, Provenance};
use crate::resolver::{ConflictResolver, ResolutionStrategy};
use crate::result::{HierarchicalMergeResult, LayerMergeMetadata, PerformanceMetrics};
use crate::tree::{ConfigTree, MERGE_METADATA_KEY};
use crate::validation::validate_mapping;

/// Merges layers lowest precedence first into a single tree.
///
/// The merger holds only settings. Conflict records, warnings and provenance
/// live for one [`merge`](Self::merge) call and come back in its result, so
/// one merger can serve concurrent callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchicalMerger {
    strategy: ResolutionStrategy,
    strict_precedence: bool,
}

impl HierarchicalMerger {
    #[must_use]
    pub const fn new(strategy: ResolutionStrategy) -> Self {
        Self {
            strategy,
            strict_precedence: false,
        }
    }

    /// # Errors
    ///
    /// Returns [`MergeError::UnknownStrategy`] for an unrecognised name.
    pub fn from_strategy_name(name: &str) -> MergeOutcome<Self> {
        Ok(Self::new(name.parse()?))
    }

    /// Reject layers whose declared precedence disagrees with their kind
    /// instead of warning about them.
    #[must_use]
    pub const fn with_strict_precedence(mut self, strict: bool) -> Self {
        self.strict_precedence = strict;
        self
    }

    #[must_use]
    pub const fn strategy(&self) -> ResolutionStrategy {
        self.strategy
    }

    /// Merge `layers` into one tree.
    ///
    /// Layers that are unloaded or empty are skipped with a warning and get
    /// no metadata entry. Validation problems are reported in the result.
    ///
    /// # Errors
    ///
    /// - [`MergeError::NoLayers`] when `layers` is empty
    /// - [`MergeError::Conflict`] under `FailOnConflict` when two layers disagree
    /// - [`MergeError::PrecedenceMismatch`] with strict precedence enabled
    pub fn merge(&self, layers: &[ConfigurationLayer]) -> MergeOutcome<HierarchicalMergeResult> {
        let started = Instant::now();
        if layers.is_empty() {
            return Err(MergeError::NoLayers);
        }

        let mut warnings = Vec::new();
        for layer in layers {
            if let Some(declared) = layer.precedence_mismatch() {
                let expected = layer.kind().precedence();
                if self.strict_precedence {
                    return Err(MergeError::PrecedenceMismatch {
                        kind: layer.kind(),
                        declared,
                        expected,
                    });
                }
                warnings.push(precedence_warning(layer, declared));
            }
        }

        let already_ordered = layers
            .windows(2)
            .all(|pair| pair[0].kind().precedence() <= pair[1].kind().precedence());
        let mut ordered: Vec<&ConfigurationLayer> = layers.iter().collect();
        ordered.sort_by_key(|layer| layer.kind().precedence());

        for pair in ordered.windows(2) {
            if pair[0].kind() == pair[1].kind() {
                warnings.push(format!(
                    "layer {} supplied more than once; later occurrences take precedence",
                    pair[1].kind()
                ));
            }
        }

        let mut resolver = ConflictResolver::new(self.strategy);
        let mut provenance = Provenance::new();
        let mut merged = ConfigTree::new();
        let mut layer_metadata = Vec::new();
        let mut processed = Vec::new();

        for layer in ordered {
            if !layer.is_mergeable() {
                let mut warning = format!("layer {} is empty or failed to load", layer.kind());
                if !layer.load_errors().is_empty() {
                    warning.push_str(": ");
                    warning.push_str(&layer.load_errors().join("; "));
                }
                tracing::warn!(kind = %layer.kind(), "Skipping configuration layer");
                warnings.push(warning);
                continue;
            }

            let incoming: Cow<'_, ConfigTree> = if layer.tree().contains_key(MERGE_METADATA_KEY) {
                warnings.push(format!(
                    "layer {} defines reserved key '{MERGE_METADATA_KEY}'; it was ignored",
                    layer.kind()
                ));
                Cow::Owned(
                    layer
                        .tree()
                        .iter()
                        .filter(|(key, _)| key.as_str() != MERGE_METADATA_KEY)
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect(),
                )
            } else {
                Cow::Borrowed(layer.tree())
            };

            let contribution = deep_merge(
                &merged,
                &incoming,
                layer.kind(),
                &mut resolver,
                &mut provenance,
            )?;

            tracing::debug!(
                kind = %layer.kind(),
                contributed = contribution.contributed.len(),
                overridden = contribution.overridden.len(),
                "Merged configuration layer"
            );

            merged = contribution.tree;
            warnings.extend(contribution.warnings);

            let mut validation_errors = layer.load_errors().to_vec();
            if let Some(declared) = layer.precedence_mismatch() {
                validation_errors.push(precedence_warning(layer, declared));
            }
            layer_metadata.push(LayerMergeMetadata {
                kind: layer.kind(),
                origin: layer.origin(),
                keys_contributed: contribution.contributed,
                keys_overridden: contribution.overridden,
                load_timestamp: layer.load_timestamp(),
                validation_errors,
            });
            processed.push(layer.kind());
        }

        let validation_errors = validate_mapping(&merged);
        let config_keys = merged.len();
        let layers_processed = processed.len();

        merged.insert(
            MERGE_METADATA_KEY.to_string(),
            json!({
                "layers_processed": processed,
                "strategy": self.strategy.as_str(),
                "optimized": already_ordered,
            }),
        );

        let conflicts = resolver.into_conflicts();
        let performance_metrics = PerformanceMetrics {
            execution_time: started.elapsed(),
            layers_processed,
            config_keys,
            conflicts_resolved: conflicts.len(),
        };

        tracing::info!(
            layers = layers_processed,
            conflicts = conflicts.len(),
            keys = config_keys,
            warnings = warnings.len(),
            invalid = validation_errors.len(),
            elapsed_ms = u64::try_from(performance_metrics.execution_time.as_millis()).unwrap_or(u64::MAX),
            strategy = %self.strategy,
            "Configuration merge complete"
        );

        Ok(HierarchicalMergeResult {
            merged_tree: merged,
            layer_metadata,
            conflicts,
            validation_errors,
            merge_warnings: warnings,
            performance_metrics,
        })
    }
}

fn precedence_warning(layer: &ConfigurationLayer, declared: u8) -> String {
    format!(
        "layer {} declares precedence {declared}, expected {}",
        layer.kind(),
        layer.kind().precedence()
    )
}

/// Load every layer, then merge with `strategy`.
///
/// # Errors
///
/// See [`HierarchicalMerger::merge`].
pub fn merge_layers(
    mut layers: Vec<ConfigurationLayer>,
    strategy: ResolutionStrategy,
) -> MergeOutcome<HierarchicalMergeResult> {
    for layer in &mut layers {
        layer.load();
    }
    HierarchicalMerger::new(strategy).merge(&layers)
}

/// The `_merge_metadata` value of a merged tree, if present.
#[must_use]
pub fn merge_metadata(tree: &ConfigTree) -> Option<&Value> {
    tree.get(MERGE_METADATA_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerKind;

    fn layer(kind: LayerKind, yaml: &str) -> ConfigurationLayer {
        ConfigurationLayer::inline(kind, format!("{kind}-test"), yaml).loaded()
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = HierarchicalMerger::default().merge(&[]).unwrap_err();
        assert!(matches!(err, MergeError::NoLayers));
    }

    #[test]
    fn unknown_strategy_name_is_rejected() {
        let err = HierarchicalMerger::from_strategy_name("newest_wins").unwrap_err();
        assert!(matches!(err, MergeError::UnknownStrategy(_)));

        let merger = HierarchicalMerger::from_strategy_name("merge_arrays").unwrap();
        assert_eq!(merger.strategy(), ResolutionStrategy::MergeArrays);
    }

    #[test]
    fn input_order_does_not_matter() {
        let domain = layer(LayerKind::Domain, "api:\n  prefix: /domain\n");
        let interface = layer(LayerKind::Interface, "api:\n  prefix: /v1\n");

        let forward = HierarchicalMerger::default()
            .merge(&[domain.clone(), interface.clone()])
            .unwrap();
        let reverse = HierarchicalMerger::default()
            .merge(&[interface, domain])
            .unwrap();

        assert_eq!(forward.get("api.prefix"), Some(&json!("/v1")));
        assert_eq!(reverse.get("api.prefix"), Some(&json!("/v1")));
        assert_eq!(forward.merged_tree[MERGE_METADATA_KEY]["optimized"], json!(true));
        assert_eq!(reverse.merged_tree[MERGE_METADATA_KEY]["optimized"], json!(false));
        assert_eq!(
            reverse.layer_metadata.iter().map(|m| m.kind).collect::<Vec<_>>(),
            vec![LayerKind::Domain, LayerKind::Interface]
        );
    }

    #[test]
    fn metadata_key_is_attached() {
        let result = HierarchicalMerger::new(ResolutionStrategy::Custom)
            .merge(&[
                layer(LayerKind::UseCase, "usecase:\n  create: true\n"),
                layer(LayerKind::Domain, "domain:\n  name: shop\n"),
            ])
            .unwrap();

        assert_eq!(
            merge_metadata(&result.merged_tree),
            Some(&json!({
                "layers_processed": ["domain", "usecase"],
                "strategy": "custom",
                "optimized": false,
            }))
        );
        assert_eq!(result.performance_metrics.config_keys, 2);
        assert_eq!(result.performance_metrics.layers_processed, 2);
        assert!(result.is_valid());
    }

    #[test]
    fn reserved_key_in_layer_is_dropped() {
        let result = HierarchicalMerger::default()
            .merge(&[layer(
                LayerKind::Domain,
                "domain:\n  name: shop\n_merge_metadata:\n  strategy: forged\n",
            )])
            .unwrap();

        assert_eq!(
            result.merged_tree[MERGE_METADATA_KEY]["strategy"],
            json!("highest_precedence")
        );
        assert!(result
            .merge_warnings
            .iter()
            .any(|w| w.contains("reserved key")));
        assert_eq!(result.layer_metadata[0].keys_contributed, vec!["domain"]);
    }

    #[test]
    fn precedence_mismatch_warns_by_default() {
        let layers = [layer(LayerKind::UseCase, "usecase:\n  create: true\n")
            .with_declared_precedence(4)];

        let result = HierarchicalMerger::default().merge(&layers).unwrap();
        assert_eq!(
            result.merge_warnings,
            vec!["layer usecase declares precedence 4, expected 2"]
        );
        assert_eq!(result.layer_metadata[0].validation_errors.len(), 1);
    }

    #[test]
    fn precedence_mismatch_is_fatal_when_strict() {
        let layers = [layer(LayerKind::UseCase, "usecase:\n  create: true\n")
            .with_declared_precedence(4)];

        let err = HierarchicalMerger::default()
            .with_strict_precedence(true)
            .merge(&layers)
            .unwrap_err();
        assert!(matches!(
            err,
            MergeError::PrecedenceMismatch {
                kind: LayerKind::UseCase,
                declared: 4,
                expected: 2
            }
        ));
    }

    #[test]
    fn duplicate_kinds_merge_in_supplied_order() {
        let result = HierarchicalMerger::default()
            .merge(&[
                layer(LayerKind::Repository, "repository:\n  driver: sqlite\n"),
                layer(LayerKind::Repository, "repository:\n  driver: postgres\n"),
            ])
            .unwrap();

        assert_eq!(result.get("repository.driver"), Some(&json!("postgres")));
        assert_eq!(result.layer_metadata.len(), 2);
        assert!(result
            .merge_warnings
            .iter()
            .any(|w| w.contains("more than once")));
    }

    #[test]
    fn failed_layer_warning_carries_load_error() {
        let result = HierarchicalMerger::default()
            .merge(&[
                layer(LayerKind::Domain, "domain:\n  name: shop\n"),
                layer(LayerKind::Interface, "api: [broken"),
            ])
            .unwrap();

        assert_eq!(result.layer_metadata.len(), 1);
        assert_eq!(result.merge_warnings.len(), 1);
        assert!(result.merge_warnings[0].starts_with("layer interface is empty or failed to load: "));
    }

    #[test]
    fn merge_layers_loads_before_merging() {
        let result = merge_layers(
            vec![
                ConfigurationLayer::inline(LayerKind::Domain, "d", "domain:\n  name: shop\n"),
                ConfigurationLayer::inline(LayerKind::Interface, "i", "api:\n  prefix: /v1\n"),
            ],
            ResolutionStrategy::HighestPrecedence,
        )
        .unwrap();
        assert_eq!(result.layer_metadata.len(), 2);
        assert_eq!(result.layer_metadata[0].origin.as_deref(), Some("d"));
    }

    #[test]
    fn merger_keeps_no_state_between_calls() {
        let merger = HierarchicalMerger::default();
        let layers = [
            layer(LayerKind::Domain, "default_settings:\n  logging: true\n"),
            layer(LayerKind::Interface, "default_settings:\n  logging: false\n"),
        ];

        let first = merger.merge(&layers).unwrap();
        let second = merger.merge(&layers).unwrap();
        assert_eq!(first.conflicts.len(), 1);
        assert_eq!(second.conflicts.len(), 1);
        assert_eq!(second.merge_warnings, first.merge_warnings);
    }
}
