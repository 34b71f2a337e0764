//! Session configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via ROPSTATE_CONFIG or --config)
//! 3. Environment variables
//!
//! Behavior has no default. Either a `generation` preset is named, or every
//! behavior field is given explicitly.

use crate::behavior::{
    ColumnsRequired, ExhaustedOrigin, FailedOperation, FindRowVisibility, FreeBookmarkSupport,
    Implementation, MaxRowCountSupport, ServerBehavior, ServerGeneration, StaleBookmarkPolicy,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server behavior selection.
    pub behavior: BehaviorConfig,
    /// Per-session limits.
    pub limits: LimitsConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("ROPSTATE_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Applies `ROPSTATE_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.behavior.apply_env_overrides();
        self.limits.apply_env_overrides();
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }

    /// Resolves the configured behavior and validates limits.
    pub fn resolve(&self) -> Result<ServerBehavior, ConfigError> {
        self.limits.validate()?;
        self.behavior.resolve()
    }
}

/// Behavior selection: an optional preset plus per-field overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BehaviorConfig {
    pub generation: Option<ServerGeneration>,
    pub columns_required: Option<ColumnsRequired>,
    pub failed_set_columns: Option<FailedOperation>,
    pub failed_sort_table: Option<FailedOperation>,
    pub failed_restrict: Option<FailedOperation>,
    pub backward_exhausted_origin: Option<ExhaustedOrigin>,
    pub seek_row_bookmark_stale: Option<StaleBookmarkPolicy>,
    pub find_row_stale: Option<StaleBookmarkPolicy>,
    pub free_bookmark_on_contents: Option<FreeBookmarkSupport>,
    pub expand_row_max_row_count: Option<MaxRowCountSupport>,
    pub abort: Option<Implementation>,
    pub get_status: Option<Implementation>,
    pub hierarchy_find_row_visibility: Option<FindRowVisibility>,
}

impl BehaviorConfig {
    pub fn for_generation(generation: ServerGeneration) -> Self {
        Self {
            generation: Some(generation),
            ..Self::default()
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(name) = std::env::var("ROPSTATE_GENERATION") {
            if let Ok(generation) = name.parse() {
                self.generation = Some(generation);
            }
        }
    }

    /// Builds the behavior. Overrides win over the preset; without a preset
    /// every field must be present.
    pub fn resolve(&self) -> Result<ServerBehavior, ConfigError> {
        let overrides = self;
        let base = self.generation.map(ServerGeneration::preset);
        let mut missing = Vec::new();

        macro_rules! field {
            ($name:ident) => {
                match (overrides.$name, base.map(|b| b.$name)) {
                    (Some(v), _) | (None, Some(v)) => Some(v),
                    (None, None) => {
                        missing.push(stringify!($name));
                        None
                    }
                }
            };
        }

        let columns_required = field!(columns_required);
        let failed_set_columns = field!(failed_set_columns);
        let failed_sort_table = field!(failed_sort_table);
        let failed_restrict = field!(failed_restrict);
        let backward_exhausted_origin = field!(backward_exhausted_origin);
        let seek_row_bookmark_stale = field!(seek_row_bookmark_stale);
        let find_row_stale = field!(find_row_stale);
        let free_bookmark_on_contents = field!(free_bookmark_on_contents);
        let expand_row_max_row_count = field!(expand_row_max_row_count);
        let abort = field!(abort);
        let get_status = field!(get_status);
        let hierarchy_find_row_visibility = field!(hierarchy_find_row_visibility);

        match (
            columns_required,
            failed_set_columns,
            failed_sort_table,
            failed_restrict,
            backward_exhausted_origin,
            seek_row_bookmark_stale,
            find_row_stale,
            free_bookmark_on_contents,
            expand_row_max_row_count,
            abort,
            get_status,
            hierarchy_find_row_visibility,
        ) {
            (
                Some(columns_required),
                Some(failed_set_columns),
                Some(failed_sort_table),
                Some(failed_restrict),
                Some(backward_exhausted_origin),
                Some(seek_row_bookmark_stale),
                Some(find_row_stale),
                Some(free_bookmark_on_contents),
                Some(expand_row_max_row_count),
                Some(abort),
                Some(get_status),
                Some(hierarchy_find_row_visibility),
            ) => Ok(ServerBehavior {
                columns_required,
                failed_set_columns,
                failed_sort_table,
                failed_restrict,
                backward_exhausted_origin,
                seek_row_bookmark_stale,
                find_row_stale,
                free_bookmark_on_contents,
                expand_row_max_row_count,
                abort,
                get_status,
                hierarchy_find_row_visibility,
            }),
            _ => Err(ConfigError::ValidationError(format!(
                "no server generation selected and behavior fields missing: {}",
                missing.join(", ")
            ))),
        }
    }
}

/// Per-session limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Upper bound on rows returned by one QueryRows or ExpandRow.
    pub max_rows_per_query: u16,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_rows_per_query: 1000,
        }
    }
}

impl LimitsConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(max) = std::env::var("ROPSTATE_MAX_ROWS_PER_QUERY") {
            if let Ok(n) = max.parse() {
                self.max_rows_per_query = n;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rows_per_query == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_rows_per_query must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{MissingColumns, StaleBookmark};
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.behavior.generation.is_none());
        assert_eq!(config.limits.max_rows_per_query, 1000);
    }

    #[test]
    fn test_default_config_has_no_behavior() {
        let err = Config::default().resolve().unwrap_err();
        match err {
            ConfigError::ValidationError(msg) => {
                assert!(msg.contains("columns_required"));
                assert!(msg.contains("hierarchy_find_row_visibility"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_generation_with_overrides() {
        let mut behavior = BehaviorConfig::for_generation(ServerGeneration::Exchange2010);
        behavior.failed_set_columns = Some(FailedOperation::Retain);
        let resolved = behavior.resolve().unwrap();
        assert_eq!(resolved.failed_set_columns, FailedOperation::Retain);
        assert_eq!(
            resolved.columns_required.query_rows,
            MissingColumns::NullObject
        );
    }

    #[test]
    fn test_explicit_behavior_without_generation() {
        let preset = ServerGeneration::Exchange2007.preset();
        let behavior = BehaviorConfig {
            generation: None,
            columns_required: Some(preset.columns_required),
            failed_set_columns: Some(preset.failed_set_columns),
            failed_sort_table: Some(preset.failed_sort_table),
            failed_restrict: Some(preset.failed_restrict),
            backward_exhausted_origin: Some(preset.backward_exhausted_origin),
            seek_row_bookmark_stale: Some(StaleBookmarkPolicy::uniform(
                StaleBookmark::InvalidBookmark,
            )),
            find_row_stale: Some(preset.find_row_stale),
            free_bookmark_on_contents: Some(preset.free_bookmark_on_contents),
            expand_row_max_row_count: Some(preset.expand_row_max_row_count),
            abort: Some(preset.abort),
            get_status: Some(preset.get_status),
            hierarchy_find_row_visibility: Some(preset.hierarchy_find_row_visibility),
        };
        let resolved = behavior.resolve().unwrap();
        assert_eq!(
            resolved.seek_row_bookmark_stale.after_sort,
            StaleBookmark::InvalidBookmark
        );
        assert_eq!(resolved.find_row_stale, preset.find_row_stale);
    }

    #[test]
    fn test_zero_row_limit_rejected() {
        let mut config = Config::default();
        config.behavior.generation = Some(ServerGeneration::Exchange2013);
        config.limits.max_rows_per_query = 0;
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = Config::default();
        config.behavior.generation = Some(ServerGeneration::Exchange2013);
        config.behavior.abort = Some(Implementation::NotImplemented);
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.behavior.generation, Some(ServerGeneration::Exchange2013));
        assert_eq!(parsed.behavior.abort, Some(Implementation::NotImplemented));
        assert_eq!(parsed.limits.max_rows_per_query, 1000);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "behavior:\n  generation: exchange2007\n  backward_exhausted_origin: end\nlimits:\n  max_rows_per_query: 50"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.limits.max_rows_per_query, 50);
        let behavior = config.resolve().unwrap();
        assert_eq!(behavior.backward_exhausted_origin, ExhaustedOrigin::End);
        assert_eq!(
            behavior.free_bookmark_on_contents,
            FreeBookmarkSupport::Unspecified
        );
    }

    #[test]
    fn test_from_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yaml");
        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("missing.yaml"));

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "behavior:\n  no_such_field: 1\n").unwrap();
        assert!(matches!(
            Config::from_file(&bad),
            Err(ConfigError::ParseError(_, _))
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ropstate.yaml");
        let mut config = Config::default();
        config.behavior.generation = Some(ServerGeneration::Exchange2010);
        config.save(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(
            loaded.resolve().unwrap(),
            ServerGeneration::Exchange2010.preset()
        );
    }
}
