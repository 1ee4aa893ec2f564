//! Error types for the auth crate.

use thiserror::Error;

/// Errors that can occur during authentication and authorization.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password. One indistinct variant so the
    /// login endpoint never reveals whether an account exists.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account is locked out after repeated failures.
    #[error("account temporarily locked")]
    AccountLocked,

    /// The account has not completed email verification.
    #[error("email not verified")]
    AccountNotVerified,

    /// The account is inactive or suspended.
    #[error("account is {0}")]
    AccountDisabled(String),

    /// No session matches the presented token.
    #[error("invalid session")]
    SessionInvalid,

    /// The session (or refresh token) has expired.
    #[error("session expired")]
    SessionExpired,

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness rule was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Password hashing or verification failed.
    #[error("credential hashing error: {0}")]
    Crypto(String),

    /// Storage backend error.
    #[error("store error: {0}")]
    Store(String),
}
