//! User settings and preferences
//!
//! Manages settings stored in ~/.dblayer/config.toml

use crate::config::ConnectionConfig;
use crate::error::ConfigResult;
use crate::export::ExportFormat;
use serde::{Deserialize, Serialize};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Include failing SQL in error messages
    #[serde(default)]
    pub verbose_errors: bool,

    /// Default output format for `query` (`table`, `csv`, `json`)
    #[serde(default)]
    pub output_format: ExportFormat,

    /// Tracing filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            verbose_errors: false,
            output_format: ExportFormat::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl Settings {
    /// Parse settings from TOML text
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Load settings from config file
pub fn load_settings() -> ConfigResult<Settings> {
    let path = ConnectionConfig::config_dir()?.join("config.toml");
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(&path)?;
    Settings::from_toml(&content)
}
