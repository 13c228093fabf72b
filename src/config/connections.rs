//! Connection configuration
//!
//! Manages database connection profiles stored in ~/.dblayer/connections.toml

use crate::error::{ConfigError, ConfigResult};
use crate::sql::Collation;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// In-memory SQLite database name
pub const MEMORY_DATABASE: &str = ":memory:";

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Connection profile name
    pub name: String,

    /// Database engine
    #[serde(default)]
    pub driver: Driver,

    /// Database host (unused by embedded engines)
    #[serde(default)]
    pub host: String,

    /// Username (unused by embedded engines)
    #[serde(default)]
    pub username: String,

    /// Password
    #[serde(skip_serializing, default)]
    pub password: Option<String>,

    /// Database name; a file path or `:memory:` for SQLite
    pub database: String,

    /// Ask the engine for a persistent connection where it has one
    #[serde(default)]
    pub persistent: bool,

    /// Include the failing SQL text in query errors
    #[serde(default)]
    pub verbose_errors: bool,

    /// Collation used for lexical ordering; `None` falls back to case-folding
    #[serde(default)]
    pub collation: Option<Collation>,
}

/// Supported database engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    #[default]
    Sqlite,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConnectionsFile {
    #[serde(default)]
    connections: Vec<ConnectionConfig>,
}

impl ConnectionConfig {
    /// SQLite profile for a database file (or `:memory:`)
    pub fn sqlite(database: impl Into<String>) -> Self {
        let database = database.into();
        Self {
            name: database.clone(),
            driver: Driver::Sqlite,
            host: String::new(),
            username: String::new(),
            password: None,
            database,
            persistent: false,
            verbose_errors: false,
            collation: None,
        }
    }

    /// Private in-memory SQLite database
    pub fn memory() -> Self {
        Self::sqlite(MEMORY_DATABASE)
    }

    pub fn with_verbose_errors(mut self, verbose: bool) -> Self {
        self.verbose_errors = verbose;
        self
    }

    pub fn with_collation(mut self, collation: Option<Collation>) -> Self {
        self.collation = collation;
        self
    }

    /// Parse a `sqlite://` URL into a ConnectionConfig
    ///
    /// Accepted forms: `sqlite:///abs/path.db`, `sqlite://relative.db`,
    /// `sqlite::memory:`. The path is percent-decoded.
    pub fn from_url(url: &str) -> ConfigResult<Self> {
        let url = url.trim();
        if url == "sqlite::memory:" {
            return Ok(Self::memory());
        }

        let rest = url.strip_prefix("sqlite://").ok_or_else(|| {
            let scheme = url.split_once(':').map_or(url, |(s, _)| s);
            ConfigError::Invalid(format!("unsupported driver in URL: {}", scheme))
        })?;

        // Drop query parameters; none are understood yet
        let path = rest.split_once('?').map_or(rest, |(p, _)| p);
        if path.is_empty() {
            return Err(ConfigError::Invalid("URL must contain a database path".into()));
        }

        let database = percent_decode_str(path)
            .decode_utf8()
            .map_err(|e| ConfigError::Invalid(format!("Invalid path encoding: {}", e)))?
            .into_owned();

        Ok(Self::sqlite(database))
    }

    /// Whether this profile points at a private in-memory database
    pub fn is_memory(&self) -> bool {
        self.database == MEMORY_DATABASE
    }

    /// Get the config directory path (~/.dblayer/)
    pub fn config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".dblayer"))
    }

    /// Get the connections file path
    pub fn connections_file() -> ConfigResult<PathBuf> {
        Ok(Self::config_dir()?.join("connections.toml"))
    }
}

/// Parse the contents of a connections file
pub fn parse_connections(content: &str) -> ConfigResult<Vec<ConnectionConfig>> {
    let file: ConnectionsFile = toml::from_str(content)?;
    Ok(file.connections)
}

/// Load all connection profiles from config file
pub fn load_connections() -> ConfigResult<Vec<ConnectionConfig>> {
    let path = ConnectionConfig::connections_file()?;
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| ConfigError::NotFound(format!("Failed to read connections file: {}", e)))?;
    parse_connections(&content)
}

/// Find a connection by name
pub fn find_connection(name: &str) -> ConfigResult<ConnectionConfig> {
    let connections = load_connections()?;
    connections
        .into_iter()
        .find(|c| c.name == name)
        .ok_or_else(|| ConfigError::ProfileNotFound(name.to_string()))
}
