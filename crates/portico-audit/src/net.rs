//! Network metadata extraction.
//!
//! Best-effort client identification that tolerates proxies which do not
//! set forwarding headers. Header values come in as plain strings so this
//! crate stays independent of any particular HTTP stack.

use serde::{Deserialize, Serialize};

/// Client network context attached to audit records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkContext {
    /// Best-effort client IP, `"unknown"` when nothing was derivable.
    pub ip: String,

    /// Client user-agent string.
    pub user_agent: Option<String>,
}

impl NetworkContext {
    /// A context with no derivable information.
    pub fn unknown() -> Self {
        Self {
            ip: "unknown".to_string(),
            user_agent: None,
        }
    }

    /// Build a context from raw header values and the peer socket address.
    pub fn from_parts(
        forwarded_for: Option<&str>,
        real_ip: Option<&str>,
        socket: Option<&str>,
        user_agent: Option<&str>,
    ) -> Self {
        Self {
            ip: client_ip(forwarded_for, real_ip, socket),
            user_agent: user_agent.map(|ua| ua.to_string()),
        }
    }
}

/// Derive the client IP: first comma-separated entry of the forwarded-for
/// chain, trimmed; else the real-IP header; else the socket address; else
/// the literal `"unknown"`.
pub fn client_ip(
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    socket: Option<&str>,
) -> String {
    if let Some(chain) = forwarded_for {
        if let Some(first) = chain.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }

    if let Some(ip) = real_ip {
        let trimmed = ip.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    if let Some(addr) = socket {
        let trimmed = addr.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarded_for_takes_first_entry() {
        let ip = client_ip(
            Some("203.0.113.7, 10.0.0.1, 172.16.0.9"),
            Some("10.0.0.1"),
            Some("172.16.0.9:52110"),
        );
        assert_eq!(ip, "203.0.113.7");
    }

    #[test]
    fn test_forwarded_for_entries_are_trimmed() {
        assert_eq!(client_ip(Some("  203.0.113.7 , 10.0.0.1"), None, None), "203.0.113.7");
    }

    #[test]
    fn test_empty_forwarded_for_falls_through() {
        assert_eq!(client_ip(Some(" , "), Some("198.51.100.4"), None), "198.51.100.4");
    }

    #[test]
    fn test_real_ip_used_when_no_forwarding() {
        assert_eq!(client_ip(None, Some("198.51.100.4"), Some("10.0.0.2:9000")), "198.51.100.4");
    }

    #[test]
    fn test_socket_address_is_last_resort() {
        assert_eq!(client_ip(None, None, Some("10.0.0.2:9000")), "10.0.0.2:9000");
    }

    #[test]
    fn test_unknown_when_nothing_available() {
        assert_eq!(client_ip(None, None, None), "unknown");
        assert_eq!(NetworkContext::unknown().ip, "unknown");
    }
}
