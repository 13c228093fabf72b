//! Error types for dblayer
//!
//! This module defines the error hierarchy used throughout the crate.
//! We use `thiserror` for library-style errors with clear error chains.

use std::io;

/// Marker embedded by the generated integrity triggers in their RAISE message.
const INTEGRITY_MARKER: &str = "violates foreign key constraint";

/// Main error type for dblayer
#[derive(Debug, thiserror::Error)]
pub enum DbLayerError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Database operation errors
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Failed to establish connection
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    /// Query execution failed
    ///
    /// `sql` is only populated when the connection runs with verbose errors.
    #[error(
        "Query execution failed: {message}{}",
        .sql.as_deref().map(|s| format!("\n{}", s)).unwrap_or_default()
    )]
    QueryFailed {
        message: String,
        sql: Option<String>,
    },

    /// The engine cannot alter this schema object in place
    #[error("Unsupported alteration: {0}")]
    UnsupportedAlteration(String),

    /// The engine cannot drop this schema object
    #[error("Unsupported drop: {0}")]
    UnsupportedDrop(String),

    /// Trigger-emulated references only cover a single column
    #[error("Multi-column references are not supported: {0}")]
    UnsupportedMultiColumnReference(String),

    /// A schema descriptor failed validation
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// Table is neither pending nor present in the catalog
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Invalid argument passed to a helper
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl DbError {
    /// Build a `QueryFailed`, attaching the statement only when asked to.
    pub fn query(message: impl Into<String>, sql: &str, verbose: bool) -> Self {
        DbError::QueryFailed {
            message: message.into(),
            sql: verbose.then(|| sql.to_string()),
        }
    }

    /// True when the failure was raised by a generated referential integrity trigger.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, DbError::QueryFailed { message, .. } if message.contains(INTEGRITY_MARKER))
    }

    /// True for the capability-gap family (`Unsupported*`).
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            DbError::UnsupportedAlteration(_)
                | DbError::UnsupportedDrop(_)
                | DbError::UnsupportedMultiColumnReference(_)
        )
    }
}

/// Configuration loading/parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Home directory not found
    #[error("Could not determine home directory")]
    NoHomeDir,

    /// Config file not found
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to read a configuration file
    #[error("Failed to read configuration: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Connection profile not found
    #[error("Connection profile '{0}' not found")]
    ProfileNotFound(String),
}

/// Specialized Result type for dblayer operations
pub type Result<T> = std::result::Result<T, DbLayerError>;

/// Specialized Result type for database operations
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Specialized Result type for config operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
