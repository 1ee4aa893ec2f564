//! # portico-auth
//!
//! Authorization and account state for the Portico investment portal.
//!
//! This crate provides:
//! - The RBAC domain model: users, roles, permissions, role assignments,
//!   role-permission links, and sessions
//! - The [`AuthStore`] trait with an in-memory backend (the Postgres
//!   backend lives in `portico-pg`)
//! - The [`PermissionResolver`]: user → role → permission chain
//!   resolution with fresh reads on every call
//! - The [`AccountService`]: login with time-bound lockout, session
//!   issuance and refresh rotation, logout, email verification
//!
//! Every authorization check is a point read against current state. There
//! is no caching layer, so a revoked permission is gone on the very next
//! check.

pub mod error;
pub mod model;
pub mod password;
pub mod resolver;
pub mod service;
pub mod store;

pub use error::AuthError;
pub use model::{
    NewPermission, NewRole, Permission, Role, RoleAssignment, RolePermission, Session,
    UpdateRole, User, UserStatus,
};
pub use password::{hash_password, verify_password};
pub use resolver::PermissionResolver;
pub use service::AccountService;
pub use store::{AuthStore, MemoryAuthStore};
