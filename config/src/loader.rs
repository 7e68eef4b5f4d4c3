use crate::{ArchgenConfig, ConfigError, LogLevel, OutputFormat};
use archgen_core::interpolate::{expand_in_value, is_blank_document};
use archgen_core::{overlay, ResolutionStrategy};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub struct ConfigLoader {
    explicit_file: Option<PathBuf>,
    search_paths: Vec<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        if let Some(home) = dirs::home_dir() {
            search_paths.push(home.join(".config/archgen/archgen.yaml"));
        }
        search_paths.push(PathBuf::from("./archgen.yaml"));

        #[cfg(unix)]
        search_paths.insert(0, PathBuf::from("/etc/archgen/archgen.yaml"));

        Self {
            explicit_file: None,
            search_paths,
        }
    }

    #[must_use]
    pub fn with_file(mut self, path: &str) -> Self {
        self.explicit_file = Some(PathBuf::from(path));
        self
    }

    #[must_use]
    pub fn with_search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.search_paths = paths;
        self
    }

    /// Resolve the effective configuration.
    ///
    /// An explicit file replaces the search; without one, `ARCHGEN_CONFIG`
    /// does the same.
    ///
    /// # Errors
    ///
    /// Fails when an explicit file cannot be read, any found file does not
    /// parse, or an environment override holds an invalid value.
    pub fn load(&self) -> Result<ArchgenConfig, ConfigError> {
        let defaults = serde_json::to_value(ArchgenConfig::default())?;

        let explicit = self
            .explicit_file
            .clone()
            .or_else(|| std::env::var_os("ARCHGEN_CONFIG").map(PathBuf::from));

        let merged = if let Some(path) = explicit {
            let overlay_value = Self::read_file(&path)?;
            overlay(&defaults, &overlay_value)
        } else {
            let mut merged = defaults;
            for path in &self.search_paths {
                if path.exists() {
                    tracing::debug!(path = %path.display(), "Loading archgen config");
                    let overlay_value = Self::read_file(path)?;
                    merged = overlay(&merged, &overlay_value);
                }
            }
            merged
        };

        let mut config: ArchgenConfig = serde_json::from_value(merged)?;
        Self::apply_env_overrides(&mut config)?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Value, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse_yaml(&content)
    }

    fn parse_yaml(content: &str) -> Result<Value, ConfigError> {
        if is_blank_document(content) {
            return Ok(Value::Null);
        }
        let mut value: Value = serde_yaml::from_str(content)?;
        expand_in_value(&mut value);
        Ok(value)
    }

    fn apply_env_overrides(config: &mut ArchgenConfig) -> Result<(), ConfigError> {
        if let Ok(strategy) = std::env::var("ARCHGEN_STRATEGY") {
            config.merge.strategy = strategy
                .parse::<ResolutionStrategy>()
                .map_err(|e| ConfigError::InvalidValue(format!("ARCHGEN_STRATEGY: {e}")))?;
        }
        if let Ok(dir) = std::env::var("ARCHGEN_LAYER_DIR") {
            if !dir.is_empty() {
                config.layers.dir = Some(dir);
            }
        }
        if let Ok(format) = std::env::var("ARCHGEN_OUTPUT_FORMAT") {
            config.output.format = format
                .parse::<OutputFormat>()
                .map_err(|e| ConfigError::InvalidValue(format!("ARCHGEN_OUTPUT_FORMAT: {e}")))?;
        }
        if let Ok(level) = std::env::var("ARCHGEN_LOG_LEVEL") {
            config.logging.level = level
                .parse::<LogLevel>()
                .map_err(|e| ConfigError::InvalidValue(format!("ARCHGEN_LOG_LEVEL: {e}")))?;
        }
        Ok(())
    }
}
