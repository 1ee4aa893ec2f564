//! # portico-core
//!
//! Shared configuration types for the Portico services.
//!
//! Configuration is loaded from a single YAML file (`portico.yaml`) and
//! combined with environment overrides into a [`PorticoConfig`] structure
//! that the server and stores consume.

pub mod config;

pub use config::{
    AuditConfig,
    AuditSink,
    AuthConfig,
    ConfigError,
    DatabaseConfig,
    LogConfig,
    PorticoConfig,
    ServerConfig,
};
