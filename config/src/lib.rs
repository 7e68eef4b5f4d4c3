//! Archgen Configuration System
//!
//! Settings for the `archgen` merge tool itself: which resolution strategy
//! to use, where the layer files live, how the result is written and how
//! much is logged.
//!
//! # Configuration Loading Priority
//!
//! 1. Compiled-in defaults
//! 2. `/etc/archgen/archgen.yaml` (system-wide)
//! 3. `~/.config/archgen/archgen.yaml` (user)
//! 4. `./archgen.yaml` (project-local)
//! 5. An explicit file, else `ARCHGEN_CONFIG=/path/to/config.yaml`
//! 6. Environment variables (highest priority)
//!
//! # Example Configuration
//!
//! ```yaml
//! merge:
//!   strategy: highest_precedence
//!   strict_precedence: false
//!
//! layers:
//!   dir: ./config/layers
//!   interface: "${API_LAYER_FILE}"
//!
//! output:
//!   format: yaml
//!   include_metadata: true
//!
//! logging:
//!   level: info
//! ```

#![allow(missing_docs)]

mod error;
mod loader;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use types::*;

/// Load configuration from default locations.
///
/// Searches for config files in order and merges them.
/// Environment variables override file values.
///
/// # Errors
///
/// See [`ConfigLoader::load`].
pub fn load() -> Result<ArchgenConfig, ConfigError> {
    ConfigLoader::new().load()
}

/// Load configuration from a specific file.
///
/// # Errors
///
/// See [`ConfigLoader::load`].
pub fn load_from_file(path: &str) -> Result<ArchgenConfig, ConfigError> {
    ConfigLoader::new().with_file(path).load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use archgen_core::ResolutionStrategy;

    #[test]
    fn default_config_is_valid() {
        let config = ArchgenConfig::default();
        assert_eq!(config.merge.strategy, ResolutionStrategy::HighestPrecedence);
        assert!(!config.merge.strict_precedence);
        assert!(config.output.include_metadata);
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = r"
merge:
  strategy: fail_on_conflict
";
        let config: ArchgenConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.merge.strategy, ResolutionStrategy::FailOnConflict);
        assert_eq!(config.output.format, OutputFormat::Yaml); // default
    }

    #[test]
    fn parse_full_config() {
        let yaml = r"
merge:
  strategy: merge_arrays
  strict_precedence: true

layers:
  dir: ./layers
  domain: shared/domain.yaml

output:
  format: json
  path: build/merged.json
  include_metadata: false

logging:
  level: debug
  format: json
";
        let config: ArchgenConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.merge.strategy, ResolutionStrategy::MergeArrays);
        assert!(config.merge.strict_precedence);
        assert_eq!(config.layers.dir.as_deref(), Some("./layers"));
        assert_eq!(config.layers.domain.as_deref(), Some("shared/domain.yaml"));
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.output.path.as_deref(), Some("build/merged.json"));
        assert!(!config.output.include_metadata);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn unknown_strategy_fails_to_parse() {
        let yaml = "merge:\n  strategy: last_one_wins\n";
        assert!(serde_yaml::from_str::<ArchgenConfig>(yaml).is_err());
    }
}
