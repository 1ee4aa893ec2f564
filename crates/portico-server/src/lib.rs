//! # portico-server
//!
//! HTTP surface of the Portico investment portal:
//! - Audit middleware that classifies, times, and records every API call
//! - Bearer-token session authentication with per-route permission guards
//! - Handlers for authentication, role/permission administration, and
//!   the audit reporting endpoints
//! - A clap binary that loads `portico.yaml` and serves until interrupted
//!
//! The crate wires `portico-audit` and `portico-auth` onto axum; storage
//! backends come from those crates and `portico-pg`.

pub mod context;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ServerError;
pub use server::PorticoServer;
pub use state::AppState;
