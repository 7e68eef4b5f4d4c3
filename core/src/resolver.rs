use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{MergeError, MergeOutcome};
use crate::layer::LayerKind;
use crate::tree::KeyPath;

/// How a collision between two non-mapping values is settled.
///
/// `MergeArrays` and `Custom` are accepted names that currently resolve the
/// same way as `HighestPrecedence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    #[default]
    HighestPrecedence,
    FailOnConflict,
    MergeArrays,
    Custom,
}

impl ResolutionStrategy {
    pub const ALL: [Self; 4] = [
        Self::HighestPrecedence,
        Self::FailOnConflict,
        Self::MergeArrays,
        Self::Custom,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HighestPrecedence => "highest_precedence",
            Self::FailOnConflict => "fail_on_conflict",
            Self::MergeArrays => "merge_arrays",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionStrategy {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == name)
            .ok_or_else(|| MergeError::UnknownStrategy(name.to_string()))
    }
}

/// A collision between two layers at one key path, and how it was settled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conflict {
    pub key_path: String,
    pub layer_a: LayerKind,
    pub value_a: Value,
    pub layer_b: LayerKind,
    pub value_b: Value,
    pub resolved_value: Value,
    pub strategy: ResolutionStrategy,
}

impl Conflict {
    /// The layer whose value was kept.
    #[must_use]
    pub fn winner(&self) -> LayerKind {
        if self.resolved_value == self.value_b {
            self.layer_b
        } else {
            self.layer_a
        }
    }
}

/// Settles collisions under one strategy and records the decisions, one
/// record per key path.
///
/// A resolver belongs to a single merge call; its records are handed back
/// with [`into_conflicts`](Self::into_conflicts).
#[derive(Debug)]
pub struct ConflictResolver {
    strategy: ResolutionStrategy,
    conflicts: Vec<Conflict>,
    recorded: HashMap<KeyPath, usize>,
}

impl ConflictResolver {
    #[must_use]
    pub fn new(strategy: ResolutionStrategy) -> Self {
        Self {
            strategy,
            conflicts: Vec::new(),
            recorded: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn strategy(&self) -> ResolutionStrategy {
        self.strategy
    }

    /// Pick between `value_a` (from `layer_a`) and `value_b` (from the later
    /// processed `layer_b`), recording the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Conflict`] under `FailOnConflict`. Nothing is
    /// recorded in that case.
    pub fn resolve(
        &mut self,
        key_path: &KeyPath,
        layer_a: LayerKind,
        value_a: Value,
        layer_b: LayerKind,
        value_b: Value,
    ) -> MergeOutcome<Value> {
        let resolved_value = match self.strategy {
            ResolutionStrategy::HighestPrecedence
            | ResolutionStrategy::MergeArrays
            | ResolutionStrategy::Custom => {
                by_precedence(layer_a, &value_a, layer_b, &value_b).clone()
            }
            ResolutionStrategy::FailOnConflict => {
                return Err(MergeError::Conflict {
                    key_path: key_path.to_string(),
                    layer_a,
                    value_a,
                    layer_b,
                    value_b,
                });
            }
        };

        tracing::debug!(
            key_path = %key_path,
            %layer_a,
            %layer_b,
            strategy = %self.strategy,
            "Resolved configuration conflict"
        );

        let conflict = Conflict {
            key_path: key_path.to_string(),
            layer_a,
            value_a,
            layer_b,
            value_b,
            resolved_value: resolved_value.clone(),
            strategy: self.strategy,
        };
        // One record per key path; a later collision supersedes the earlier one.
        match self.recorded.get(key_path) {
            Some(&index) => self.conflicts[index] = conflict,
            None => {
                self.recorded.insert(key_path.clone(), self.conflicts.len());
                self.conflicts.push(conflict);
            }
        }
        Ok(resolved_value)
    }

    #[must_use]
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    #[must_use]
    pub fn into_conflicts(self) -> Vec<Conflict> {
        self.conflicts
    }
}

/// Ties go to `value_b`, the later-processed argument.
fn by_precedence<'a>(
    layer_a: LayerKind,
    value_a: &'a Value,
    layer_b: LayerKind,
    value_b: &'a Value,
) -> &'a Value {
    if layer_a.precedence() > layer_b.precedence() {
        value_a
    } else {
        value_b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn higher_precedence_wins_regardless_of_argument_order() {
        let mut resolver = ConflictResolver::new(ResolutionStrategy::HighestPrecedence);

        let v = resolver
            .resolve(&"a".into(), LayerKind::Domain, json!(1), LayerKind::Interface, json!(2))
            .unwrap();
        assert_eq!(v, json!(2));

        let v = resolver
            .resolve(&"b".into(), LayerKind::Interface, json!("x"), LayerKind::UseCase, json!("y"))
            .unwrap();
        assert_eq!(v, json!("x"));

        assert_eq!(resolver.conflicts().len(), 2);
        assert_eq!(resolver.conflicts()[1].winner(), LayerKind::Interface);
    }

    #[test]
    fn equal_precedence_prefers_later_value() {
        let mut resolver = ConflictResolver::new(ResolutionStrategy::HighestPrecedence);
        let v = resolver
            .resolve(&"k".into(), LayerKind::UseCase, json!(true), LayerKind::UseCase, json!(false))
            .unwrap();
        assert_eq!(v, json!(false));
    }

    #[test]
    fn conflict_record_captures_everything() {
        let mut resolver = ConflictResolver::new(ResolutionStrategy::default());
        resolver
            .resolve(
                &"default_settings.validation".into(),
                LayerKind::Domain,
                json!(true),
                LayerKind::Interface,
                json!(false),
            )
            .unwrap();

        let conflicts = resolver.into_conflicts();
        assert_eq!(
            conflicts,
            vec![Conflict {
                key_path: "default_settings.validation".into(),
                layer_a: LayerKind::Domain,
                value_a: json!(true),
                layer_b: LayerKind::Interface,
                value_b: json!(false),
                resolved_value: json!(false),
                strategy: ResolutionStrategy::HighestPrecedence,
            }]
        );
    }

    #[test]
    fn repeated_collision_keeps_latest_record() {
        let mut resolver = ConflictResolver::new(ResolutionStrategy::HighestPrecedence);
        resolver
            .resolve(&"x".into(), LayerKind::Domain, json!(1), LayerKind::UseCase, json!(2))
            .unwrap();
        resolver
            .resolve(&"y".into(), LayerKind::Domain, json!(1), LayerKind::UseCase, json!(2))
            .unwrap();
        resolver
            .resolve(&"x".into(), LayerKind::UseCase, json!(2), LayerKind::Interface, json!(3))
            .unwrap();

        let conflicts = resolver.conflicts();
        assert_eq!(conflicts.len(), 2);
        assert_eq!(conflicts[0].key_path, "x");
        assert_eq!(conflicts[0].layer_a, LayerKind::UseCase);
        assert_eq!(conflicts[0].resolved_value, json!(3));
    }

    #[test]
    fn records_are_keyed_by_segments() {
        let mut resolver = ConflictResolver::new(ResolutionStrategy::HighestPrecedence);
        let nested = KeyPath::root().child("a").child("b");
        let literal = KeyPath::root().child("a.b");
        resolver
            .resolve(&nested, LayerKind::Domain, json!(1), LayerKind::UseCase, json!(2))
            .unwrap();
        resolver
            .resolve(&literal, LayerKind::Domain, json!(1), LayerKind::UseCase, json!(2))
            .unwrap();

        let paths: Vec<&str> = resolver.conflicts().iter().map(|c| c.key_path.as_str()).collect();
        assert_eq!(paths, vec!["a.b", r"a\.b"]);
    }

    #[test]
    fn fail_on_conflict_raises_without_recording() {
        let mut resolver = ConflictResolver::new(ResolutionStrategy::FailOnConflict);
        let err = resolver
            .resolve(&"api.prefix".into(), LayerKind::UseCase, json!("/a"), LayerKind::Interface, json!("/b"))
            .unwrap_err();

        match err {
            MergeError::Conflict {
                key_path,
                value_a,
                value_b,
                ..
            } => {
                assert_eq!(key_path, "api.prefix");
                assert_eq!(value_a, json!("/a"));
                assert_eq!(value_b, json!("/b"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(resolver.conflicts().is_empty());
    }

    #[test]
    fn declared_strategies_resolve_by_precedence() {
        for strategy in [ResolutionStrategy::MergeArrays, ResolutionStrategy::Custom] {
            let mut resolver = ConflictResolver::new(strategy);
            let v = resolver
                .resolve(
                    &"entities".into(),
                    LayerKind::Repository,
                    json!(["a"]),
                    LayerKind::Domain,
                    json!(["b"]),
                )
                .unwrap();
            assert_eq!(v, json!(["a"]));
            assert_eq!(resolver.conflicts()[0].strategy, strategy);
        }
    }

    #[test]
    fn strategy_names_round_trip() {
        for strategy in ResolutionStrategy::ALL {
            assert_eq!(strategy.as_str().parse::<ResolutionStrategy>().unwrap(), strategy);
        }
        assert_eq!(
            " fail_on_conflict ".parse::<ResolutionStrategy>().unwrap(),
            ResolutionStrategy::FailOnConflict
        );
    }

    #[test]
    fn unknown_strategy_fails_fast() {
        let err = "last_writer_wins".parse::<ResolutionStrategy>().unwrap_err();
        assert!(matches!(err, MergeError::UnknownStrategy(ref name) if name == "last_writer_wins"));

        let parsed: Result<ResolutionStrategy, _> = serde_yaml::from_str("newest");
        assert!(parsed.is_err());
    }
}
