//! HTTP server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Maximum number of request/response body bytes the audit middleware
    /// will buffer for change capture. Larger bodies are passed through
    /// untouched and recorded without a payload.
    #[serde(default = "default_body_capture_limit")]
    pub body_capture_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            body_capture_limit: default_body_capture_limit(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_body_capture_limit() -> usize {
    64 * 1024
}
