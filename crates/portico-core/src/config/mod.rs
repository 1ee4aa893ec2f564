//! Configuration types for the Portico portal services.
//!
//! A single `portico.yaml` file configures the HTTP server, the database
//! connection, the audit sink, and the account-security policy. Every
//! section is optional; omitted sections fall back to their defaults, so an
//! empty file is a valid development configuration.
//!
//! The classification vocabularies (excluded paths, sensitive field
//! fragments, always-log actions, reserved path keywords) are *not*
//! configurable here; changing them is a code change, not a data change.

pub mod audit;
pub mod auth;
pub mod database;
pub mod server;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use audit::{AuditConfig, AuditSink};
pub use auth::AuthConfig;
pub use database::DatabaseConfig;
pub use server::ServerConfig;

/// Complete Portico configuration loaded from a file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PorticoConfig {
    /// Project name, for log banners only.
    #[serde(default)]
    pub project: Option<String>,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Audit recording settings.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Account security policy.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default tracing filter directive (overridden by `RUST_LOG`).
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PorticoConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration, falling back to defaults when no path is given,
    /// and apply environment overrides.
    ///
    /// - `DATABASE_URL` overrides `database.url`
    /// - `RUST_LOG` is honored by the subscriber itself, not here
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };

        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                config.database.url = Some(url);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Basic sanity checks that are cheaper to fail at startup than at
    /// first use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audit.sink == AuditSink::File && self.audit.file_path.trim().is_empty() {
            return Err(ConfigError::Config(
                "audit.file_path must be set when audit.sink is 'file'".to_string(),
            ));
        }
        if self.audit.sink == AuditSink::Postgres && self.database.url.is_none() {
            return Err(ConfigError::Config(
                "database.url must be set when audit.sink is 'postgres'".to_string(),
            ));
        }
        if self.auth.max_failed_logins == 0 {
            return Err(ConfigError::Config(
                "auth.max_failed_logins must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
