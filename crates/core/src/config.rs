use std::env;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://crediflow.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

/// Raw TOML shape: every field optional so a partial file overrides only
/// what it names.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    database: FileDatabase,
    #[serde(default)]
    logging: FileLogging,
}

#[derive(Debug, Default, Deserialize)]
struct FileDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileLogging {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
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

impl AppConfig {
    /// Layered load: defaults, then the TOML file (if any), then environment
    /// variables, then explicit overrides.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let path = options
            .config_path
            .or_else(|| env::var("CREDIFLOW_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("crediflow.toml"));

        let file = match fs::read_to_string(&path) {
            Ok(raw) => toml::from_str::<FileConfig>(&raw)
                .map_err(|source| ConfigError::ParseFile { path: path.clone(), source })?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                if options.require_file {
                    return Err(ConfigError::MissingConfigFile(path));
                }
                FileConfig::default()
            }
            Err(source) => return Err(ConfigError::ReadFile { path, source }),
        };

        let mut env_overrides = env_overrides()?;
        merge_overrides(&mut env_overrides, options.overrides);

        let config = Self::default().apply_file(file).apply_overrides(env_overrides);
        config.validate()?;
        Ok(config)
    }

    fn apply_file(mut self, file: FileConfig) -> Self {
        if let Some(url) = file.database.url {
            self.database.url = url;
        }
        if let Some(max_connections) = file.database.max_connections {
            self.database.max_connections = max_connections;
        }
        if let Some(timeout_secs) = file.database.timeout_secs {
            self.database.timeout_secs = timeout_secs;
        }
        if let Some(level) = file.logging.level {
            self.logging.level = level;
        }
        if let Some(format) = file.logging.format {
            self.logging.format = format;
        }
        self
    }

    fn apply_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(format) = overrides.log_format {
            self.logging.format = format;
        }
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_overrides() -> Result<ConfigOverrides, ConfigError> {
    let log_format = match env::var("CREDIFLOW_LOG_FORMAT") {
        Ok(raw) => Some(parse_log_format(&raw).ok_or_else(|| ConfigError::InvalidEnvOverride {
            key: "CREDIFLOW_LOG_FORMAT".to_string(),
            value: raw,
        })?),
        Err(_) => None,
    };

    Ok(ConfigOverrides {
        database_url: env::var("CREDIFLOW_DATABASE_URL").ok(),
        log_level: env::var("CREDIFLOW_LOG_LEVEL").ok(),
        log_format,
    })
}

fn parse_log_format(raw: &str) -> Option<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "compact" => Some(LogFormat::Compact),
        "pretty" => Some(LogFormat::Pretty),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

/// Explicit overrides win over environment ones.
fn merge_overrides(base: &mut ConfigOverrides, explicit: ConfigOverrides) {
    if explicit.database_url.is_some() {
        base.database_url = explicit.database_url;
    }
    if explicit.log_level.is_some() {
        base.log_level = explicit.log_level;
    }
    if explicit.log_format.is_some() {
        base.log_format = explicit.log_format;
    }
}
