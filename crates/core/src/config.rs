use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub engine: EngineConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Tunables for the suggestion engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Weight of the frequency component (out of 100).
    pub frequency_weight: f64,
    /// Weight of the recency component (out of 100).
    pub recency_weight: f64,
    /// Weight of the context-match component (out of 100).
    pub context_weight: f64,
    /// Days after which the recency score halves.
    pub recency_half_life_days: f64,
    /// Minimum normalized similarity for surfacing profile alternatives.
    pub similarity_threshold: f64,
    /// Alternatives attached per profile suggestion.
    pub max_alternatives: usize,
    /// Maintenance sweep: age beyond which unused patterns may be removed.
    pub retention_days: i64,
    /// Maintenance sweep: patterns at or above this frequency are kept
    /// regardless of age.
    pub frequency_floor: u32,
    /// Default result count for suggestion queries.
    pub default_limit: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://cutwise.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            engine: EngineConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frequency_weight: 40.0,
            recency_weight: 30.0,
            context_weight: 30.0,
            recency_half_life_days: 90.0,
            similarity_threshold: 0.5,
            max_alternatives: 3,
            retention_days: 180,
            frequency_floor: 5,
            default_limit: 10,
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    logging: Option<LoggingPatch>,
    engine: Option<EnginePatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct EnginePatch {
    frequency_weight: Option<f64>,
    recency_weight: Option<f64>,
    context_weight: Option<f64>,
    recency_half_life_days: Option<f64>,
    similarity_threshold: Option<f64>,
    max_alternatives: Option<usize>,
    retention_days: Option<i64>,
    frequency_floor: Option<u32>,
    default_limit: Option<usize>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("cutwise.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(engine) = patch.engine {
            if let Some(value) = engine.frequency_weight {
                self.engine.frequency_weight = value;
            }
            if let Some(value) = engine.recency_weight {
                self.engine.recency_weight = value;
            }
            if let Some(value) = engine.context_weight {
                self.engine.context_weight = value;
            }
            if let Some(value) = engine.recency_half_life_days {
                self.engine.recency_half_life_days = value;
            }
            if let Some(value) = engine.similarity_threshold {
                self.engine.similarity_threshold = value;
            }
            if let Some(value) = engine.max_alternatives {
                self.engine.max_alternatives = value;
            }
            if let Some(value) = engine.retention_days {
                self.engine.retention_days = value;
            }
            if let Some(value) = engine.frequency_floor {
                self.engine.frequency_floor = value;
            }
            if let Some(value) = engine.default_limit {
                self.engine.default_limit = value;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CUTWISE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CUTWISE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("CUTWISE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CUTWISE_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("CUTWISE_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }
        if let Some(value) = read_env("CUTWISE_RETENTION_DAYS") {
            self.engine.retention_days = parse_i64("CUTWISE_RETENTION_DAYS", &value)?;
        }
        if let Some(value) = read_env("CUTWISE_FREQUENCY_FLOOR") {
            self.engine.frequency_floor = parse_u32("CUTWISE_FREQUENCY_FLOOR", &value)?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database url must not be empty".to_string()));
        }
        self.engine.validate()
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("frequency_weight", self.frequency_weight),
            ("recency_weight", self.recency_weight),
            ("context_weight", self.context_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "engine.{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.recency_half_life_days <= 0.0 {
            return Err(ConfigError::Validation(
                "engine.recency_half_life_days must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::Validation(
                "engine.similarity_threshold must be between 0 and 1".to_string(),
            ));
        }
        if self.retention_days <= 0 {
            return Err(ConfigError::Validation(
                "engine.retention_days must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    let default = PathBuf::from("cutwise.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_engine_tunables() {
        let config = AppConfig::default();
        assert_eq!(config.engine.frequency_weight, 40.0);
        assert_eq!(config.engine.recency_weight, 30.0);
        assert_eq!(config.engine.context_weight, 30.0);
        assert_eq!(config.engine.recency_half_life_days, 90.0);
        assert_eq!(config.engine.retention_days, 180);
        assert_eq!(config.engine.frequency_floor, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn patch_overrides_engine_section() {
        let patch: ConfigPatch = toml::from_str(
            r#"
            [engine]
            retention_days = 365
            frequency_floor = 3

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        let mut config = AppConfig::default();
        config.apply_patch(patch);
        assert_eq!(config.engine.retention_days, 365);
        assert_eq!(config.engine.frequency_floor, 3);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn validation_rejects_bad_similarity_threshold() {
        let mut config = AppConfig::default();
        config.engine.similarity_threshold = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("verbose".parse::<LogFormat>().is_err());
    }
}
