//! Service configuration: defaults, then an optional YAML file, then the
//! environment.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::ConnectionString;

/// Environment variables that override file and default settings.
pub mod env_vars {
    pub const HOST: &str = "NOTES_HOST";
    pub const PORT: &str = "NOTES_PORT";
    pub const TIMEOUT_SECS: &str = "NOTES_TIMEOUT_SECS";
    pub const STORE_BACKEND: &str = "NOTES_STORE_BACKEND";
    pub const CONNECTION_STRING: &str = "COSMOSDB_CONNECTION_STRING";
    pub const DATABASE: &str = "COSMOSDB_DATABASE";
    pub const CONTAINER: &str = "COSMOSDB_CONTAINER";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
    pub const STORE_LOG_LEVEL: &str = "DB_LOG_LEVEL";
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value '{value}' for {name}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub notes: NotesConfig,
    pub store: StoreConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3000,
            request_timeout_secs: 20,
            shutdown_timeout_secs: 15,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesConfig {
    /// Deadline for each note service call.
    pub timeout_secs: u64,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self { timeout_secs: 15 }
    }
}

impl NotesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    Cosmos,
}

impl FromStr for StoreBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "cosmos" | "cosmosdb" => Ok(StoreBackend::Cosmos),
            _ => Err(()),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    pub database: String,
    pub container: String,
    /// Documents requested per listing page.
    pub page_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            connection_string: None,
            database: "notes".to_string(),
            container: "notes".to_string(),
            page_size: 100,
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("backend", &self.backend)
            .field(
                "connection_string",
                &self.connection_string.as_ref().map(|_| "<redacted>"),
            )
            .field("database", &self.database)
            .field("container", &self.container)
            .field("page_size", &self.page_size)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    /// Separate level for the store client, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_level: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            store_level: None,
        }
    }
}

impl Config {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from `lookup`. Unset and empty variables are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(host) = get(env_vars::HOST) {
            self.server.host = host;
        }
        if let Some(port) = get(env_vars::PORT) {
            self.server.port = parse_env(env_vars::PORT, port)?;
        }
        if let Some(timeout) = get(env_vars::TIMEOUT_SECS) {
            self.notes.timeout_secs = parse_env(env_vars::TIMEOUT_SECS, timeout)?;
        }
        if let Some(backend) = get(env_vars::STORE_BACKEND) {
            self.store.backend = parse_env(env_vars::STORE_BACKEND, backend)?;
        }
        if let Some(connection) = get(env_vars::CONNECTION_STRING) {
            self.store.connection_string = Some(connection);
        }
        if let Some(database) = get(env_vars::DATABASE) {
            self.store.database = database;
        }
        if let Some(container) = get(env_vars::CONTAINER) {
            self.store.container = container;
        }
        if let Some(level) = get(env_vars::LOG_LEVEL) {
            self.log.level = level;
        }
        if let Some(format) = get(env_vars::LOG_FORMAT) {
            self.log.format = parse_env(env_vars::LOG_FORMAT, format)?;
        }
        if let Some(level) = get(env_vars::STORE_LOG_LEVEL) {
            self.log.store_level = Some(level);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server host is empty".to_string()));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "server request timeout must be greater than zero".to_string(),
            ));
        }
        if self.server.shutdown_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "server shutdown timeout must be greater than zero".to_string(),
            ));
        }
        if self.notes.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "note service timeout must be greater than zero".to_string(),
            ));
        }
        // The service deadline fires before the request deadline.
        if self.server.request_timeout_secs <= self.notes.timeout_secs {
            return Err(ConfigError::Invalid(format!(
                "server request timeout ({}s) must exceed the note service timeout ({}s)",
                self.server.request_timeout_secs, self.notes.timeout_secs
            )));
        }
        if self.store.page_size == 0 {
            return Err(ConfigError::Invalid("store page size must be greater than zero".to_string()));
        }

        for level in std::iter::once(&self.log.level).chain(self.log.store_level.as_ref()) {
            if level.parse::<tracing::Level>().is_err() {
                return Err(ConfigError::Invalid(format!("unknown log level '{}'", level)));
            }
        }

        if self.store.backend == StoreBackend::Cosmos {
            let connection = self.store.connection_string.as_deref().ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "cosmos backend requires a connection string ({})",
                    env_vars::CONNECTION_STRING
                ))
            })?;
            connection.parse::<ConnectionString>()?;
            if self.store.database.is_empty() {
                return Err(ConfigError::Invalid("cosmos database id is empty".to_string()));
            }
            if self.store.container.is_empty() {
                return Err(ConfigError::Invalid("cosmos container id is empty".to_string()));
            }
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CONNECTION: &str = "AccountEndpoint=https://acct.documents.azure.com:443/;AccountKey=a2V5;";

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.addr(), "localhost:3000");
        assert_eq!(config.server.request_timeout(), Duration::from_secs(20));
        assert_eq!(config.server.shutdown_timeout(), Duration::from_secs(15));
        assert_eq!(config.notes.timeout(), Duration::from_secs(15));
        assert_eq!(config.store.backend, StoreBackend::Cosmos);
        assert_eq!(config.store.database, "notes");
        assert_eq!(config.store.container, "notes");
        assert_eq!(config.store.page_size, 100);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, LogFormat::Text);
    }

    #[test]
    fn test_default_cosmos_needs_connection_string() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains(env_vars::CONNECTION_STRING));
    }

    #[test]
    fn test_from_file_partial_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server:\n  port: 8080\nstore:\n  backend: memory\nlog:\n  format: json"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.log.format, LogFormat::Json);
        config.validate().unwrap();
    }

    #[test]
    fn test_from_file_errors() {
        let err = Config::from_file(Path::new("/nonexistent/notes.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "server: [not, a, map]").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::default();
        config.server.port = 8080;

        config
            .apply_env(env(&[
                (env_vars::PORT, "9090"),
                (env_vars::HOST, "0.0.0.0"),
                (env_vars::TIMEOUT_SECS, "3"),
                (env_vars::CONNECTION_STRING, CONNECTION),
                (env_vars::DATABASE, "db1"),
                (env_vars::LOG_FORMAT, "JSON"),
                (env_vars::STORE_LOG_LEVEL, "debug"),
                (env_vars::CONTAINER, ""),
            ]))
            .unwrap();

        assert_eq!(config.server.addr(), "0.0.0.0:9090");
        assert_eq!(config.notes.timeout(), Duration::from_secs(3));
        assert_eq!(config.store.database, "db1");
        assert_eq!(config.store.container, "notes");
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.store_level.as_deref(), Some("debug"));
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = Config::default();
        let err = config
            .apply_env(env(&[(env_vars::PORT, "not-a-port")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name, .. } if name == env_vars::PORT));

        let err = config
            .apply_env(env(&[(env_vars::STORE_BACKEND, "postgres")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Memory;
        config.validate().unwrap();

        config.notes.timeout_secs = 0;
        assert!(config.validate().is_err());
        config.notes.timeout_secs = 15;

        config.log.level = "loud".to_string();
        assert!(config.validate().is_err());
        config.log.level = "INFO".to_string();
        config.validate().unwrap();

        config.store.backend = StoreBackend::Cosmos;
        config.store.connection_string = Some("AccountEndpoint=https://x/".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_request_timeout_must_exceed_note_timeout() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Memory;

        config.server.request_timeout_secs = config.notes.timeout_secs;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must exceed the note service timeout"));

        config.server.request_timeout_secs = config.notes.timeout_secs + 1;
        config.validate().unwrap();

        config
            .apply_env(env(&[(env_vars::TIMEOUT_SECS, "60")]))
            .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_connection_string() {
        let mut config = Config::default();
        config.store.connection_string = Some(CONNECTION.to_string());
        let debug = format!("{:?}", config);
        assert!(!debug.contains("a2V5"));
        assert!(debug.contains("<redacted>"));
    }
}
