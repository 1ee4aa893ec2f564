//! Request classification.
//!
//! Derives a `(resource, action, resource_id)` triple from an HTTP method
//! and URL path. This is a best-effort heuristic over REST-ish conventions,
//! not a router-integrated mapping: unmapped shapes degrade to generic
//! categories rather than erroring.

use crate::record::AuditAction;

/// Path prefix under which API calls are classified.
pub const API_PREFIX: &str = "/api";

/// Sub-route keywords that are never treated as a resource identifier.
pub const RESERVED_KEYWORDS: &[&str] = &["list", "search", "export", "import", "bulk"];

/// Grouping prefixes that name a route namespace, not a business resource.
/// When one of these leads the path and further segments exist,
/// classification skips to the next segment, so
/// `/api/admin/registrations/xyz/approve` targets `registrations`, not a
/// literal `admin` resource.
pub const ADMIN_PREFIXES: &[&str] = &["admin"];

/// Result of classifying one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Resource name, or `"unknown"` when the path has no usable segment.
    pub resource: String,
    /// Normalized action verb.
    pub action: AuditAction,
    /// Identifier of the specific record acted upon, when present.
    pub resource_id: Option<String>,
}

/// Classify a request by method and path.
///
/// The method is matched by its uppercase HTTP name; the path may or may
/// not carry the API prefix (it is stripped when present). Never fails:
/// anything unrecognizable comes back as `unknown`.
pub fn classify(method: &str, path: &str) -> Classification {
    let trimmed = path.strip_prefix(API_PREFIX).unwrap_or(path);
    let mut segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();

    // Namespace prefixes only step aside when something follows them;
    // a bare /api/admin still classifies as the "admin" resource.
    if segments.len() > 1 && ADMIN_PREFIXES.contains(&segments[0]) {
        segments.remove(0);
    }

    let resource = segments
        .first()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let resource_id = segments
        .get(1)
        .filter(|s| !RESERVED_KEYWORDS.contains(*s))
        .map(|s| s.to_string());

    let action = match method {
        "GET" => {
            if resource_id.is_some() {
                AuditAction::Read
            } else if path.contains("/search") {
                AuditAction::Search
            } else if path.contains("/export") {
                AuditAction::Export
            } else {
                AuditAction::List
            }
        }
        "POST" => {
            if path.contains("/login") {
                AuditAction::Login
            } else if path.contains("/logout") {
                AuditAction::Logout
            } else if path.contains("/import") {
                AuditAction::Import
            } else if path.contains("/approve") {
                AuditAction::Approve
            } else if path.contains("/reject") {
                AuditAction::Reject
            } else if path.contains("/bulk") {
                AuditAction::BulkCreate
            } else {
                AuditAction::Create
            }
        }
        "PUT" | "PATCH" => AuditAction::Update,
        "DELETE" => AuditAction::Delete,
        _ => AuditAction::Unknown,
    };

    Classification {
        resource,
        action,
        resource_id,
    }
}
