//! Account security configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the account-security policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Consecutive failed logins before the account is locked.
    #[serde(default = "default_max_failed_logins")]
    pub max_failed_logins: u32,

    /// How long a lockout lasts. The lock clears itself once the window
    /// passes; no administrative action is needed.
    #[serde(default = "default_lockout_minutes")]
    pub lockout_minutes: i64,

    /// Access token lifetime.
    #[serde(default = "default_session_ttl_minutes")]
    pub session_ttl_minutes: i64,

    /// Refresh token lifetime.
    #[serde(default = "default_refresh_ttl_minutes")]
    pub refresh_ttl_minutes: i64,

    /// Interval between best-effort sweeps of expired sessions.
    #[serde(default = "default_sweep_interval_minutes")]
    pub sweep_interval_minutes: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_failed_logins: default_max_failed_logins(),
            lockout_minutes: default_lockout_minutes(),
            session_ttl_minutes: default_session_ttl_minutes(),
            refresh_ttl_minutes: default_refresh_ttl_minutes(),
            sweep_interval_minutes: default_sweep_interval_minutes(),
        }
    }
}

fn default_max_failed_logins() -> u32 {
    5
}

fn default_lockout_minutes() -> i64 {
    15
}

fn default_session_ttl_minutes() -> i64 {
    60
}

fn default_refresh_ttl_minutes() -> i64 {
    7 * 24 * 60
}

fn default_sweep_interval_minutes() -> u64 {
    15
}
