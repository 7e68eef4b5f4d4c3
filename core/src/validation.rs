//! Generic structural checks on a merged tree.
//!
//! These are shape checks only; field types and relationships inside
//! entities belong to the generators that consume the tree.

use serde_json::Value;

use crate::tree::{type_name, ConfigTree, MERGE_METADATA_KEY};

/// Top-level sections the merged tree is expected to be built from.
pub const BUSINESS_SECTIONS: &[&str] = &[
    "domain",
    "entities",
    "field_types",
    "usecase",
    "repository",
    "api",
    "default_settings",
];

const MAPPING_SECTIONS: &[&str] = &["field_types", "usecase", "repository", "api"];

/// Run every check and return one message per defect. An empty list means
/// the tree is valid. The reserved metadata key is ignored.
#[must_use]
pub fn validate_tree(tree: &Value) -> Vec<String> {
    match tree {
        Value::Object(root) => validate_mapping(root),
        other => vec![format!(
            "merged configuration must be a mapping, found {}",
            type_name(other)
        )],
    }
}

/// [`validate_tree`] for a tree already known to be a mapping.
///
/// A section whose value is `null` counts as absent.
#[must_use]
pub fn validate_mapping(root: &ConfigTree) -> Vec<String> {
    let mut errors = Vec::new();

    if let Some(domain) = present(root, "domain") {
        match domain {
            Value::Object(section) => {
                if !has_name(section.get("name")) {
                    errors.push("section 'domain' must define a non-empty 'name'".to_string());
                }
                if let Some(entities) = present(section, "entities") {
                    check_entities("domain.entities", entities, &mut errors);
                }
            }
            other => errors.push(format!(
                "section 'domain' must be a mapping, found {}",
                type_name(other)
            )),
        }
    }

    if let Some(entities) = present(root, "entities") {
        check_entities("entities", entities, &mut errors);
    }

    for name in MAPPING_SECTIONS {
        if let Some(value) = present(root, name) {
            if !value.is_object() {
                errors.push(format!(
                    "section '{name}' must be a mapping, found {}",
                    type_name(value)
                ));
            }
        }
    }

    let has_business_section = root
        .iter()
        .filter(|(key, value)| key.as_str() != MERGE_METADATA_KEY && !value.is_null())
        .any(|(key, _)| BUSINESS_SECTIONS.contains(&key.as_str()));
    if !has_business_section {
        errors.push(format!(
            "merged configuration has none of the expected sections ({})",
            BUSINESS_SECTIONS.join(", ")
        ));
    }

    errors
}

fn present<'a>(tree: &'a ConfigTree, name: &str) -> Option<&'a Value> {
    tree.get(name).filter(|value| !value.is_null())
}

fn has_name(value: Option<&Value>) -> bool {
    match value {
        Some(Value::String(name)) => !name.trim().is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}

fn check_entities(path: &str, entities: &Value, errors: &mut Vec<String>) {
    let Value::Array(items) = entities else {
        errors.push(format!(
            "section '{path}' must be a sequence, found {}",
            type_name(entities)
        ));
        return;
    };

    for (index, item) in items.iter().enumerate() {
        match item {
            Value::Object(entity) if has_name(entity.get("name")) => {}
            Value::Object(_) => {
                errors.push(format!("{path}[{index}] must define a non-empty 'name'"));
            }
            other => errors.push(format!(
                "{path}[{index}] must be a mapping, found {}",
                type_name(other)
            )),
        }
    }
}
