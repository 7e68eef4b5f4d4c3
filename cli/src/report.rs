use archgen_config::OutputFormat;
use archgen_core::HierarchicalMergeResult;
use colored::Colorize;
use serde_json::Value;

/// Serialize either the merged tree or, with `full_report`, the whole result.
pub fn render(
    result: &HierarchicalMergeResult,
    format: OutputFormat,
    full_report: bool,
    include_metadata: bool,
) -> Result<String, String> {
    let document = if full_report {
        serde_json::to_value(result).map_err(|e| format!("Failed to serialize report: {e}"))?
    } else if include_metadata {
        Value::Object(result.merged_tree.clone())
    } else {
        Value::Object(result.business_tree())
    };

    match format {
        OutputFormat::Yaml => serde_yaml::to_string(&document)
            .map_err(|e| format!("Failed to render YAML: {e}")),
        OutputFormat::Json => serde_json::to_string_pretty(&document)
            .map(|mut text| {
                text.push('\n');
                text
            })
            .map_err(|e| format!("Failed to render JSON: {e}")),
    }
}

pub fn print_summary(result: &HierarchicalMergeResult) {
    for warning in &result.merge_warnings {
        eprintln!("{} {}", "Warning:".yellow().bold(), warning);
    }
    for error in &result.validation_errors {
        eprintln!("{} {}", "Invalid:".red().bold(), error);
    }

    if !result.conflicts.is_empty() {
        eprintln!("{}", "Conflicts:".bold());
        for conflict in &result.conflicts {
            eprintln!(
                "  {} {} -> {} (kept {})",
                conflict.key_path.cyan(),
                conflict.layer_a,
                conflict.layer_b,
                conflict.resolved_value
            );
        }
    }

    let metrics = &result.performance_metrics;
    eprintln!(
        "{} Merged {} layers, {} keys, {} conflicts in {:.2?}",
        "✓".green(),
        metrics.layers_processed,
        metrics.config_keys,
        metrics.conflicts_resolved,
        metrics.execution_time
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use archgen_core::{ConfigurationLayer, HierarchicalMerger, LayerKind};

    fn sample() -> HierarchicalMergeResult {
        HierarchicalMerger::default()
            .merge(&[
                ConfigurationLayer::inline(LayerKind::Domain, "d", "domain:\n  name: shop\n").loaded(),
                ConfigurationLayer::inline(LayerKind::Interface, "i", "api:\n  prefix: /v1\n").loaded(),
            ])
            .unwrap()
    }

    #[test]
    fn yaml_tree_with_and_without_metadata() {
        let result = sample();
        let with = render(&result, OutputFormat::Yaml, false, true).unwrap();
        assert!(with.contains("_merge_metadata"));
        assert!(with.contains("prefix: /v1"));

        let without = render(&result, OutputFormat::Yaml, false, false).unwrap();
        assert!(!without.contains("_merge_metadata"));
    }

    #[test]
    fn json_report_includes_diagnostics() {
        let text = render(&sample(), OutputFormat::Json, true, true).unwrap();
        let report: Value = serde_json::from_str(&text).unwrap();
        assert!(report["layer_metadata"].is_array());
        assert!(report["performance_metrics"]["layers_processed"].is_u64());
        assert!(text.ends_with('\n'));
    }
}
