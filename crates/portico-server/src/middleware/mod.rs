//! Request middleware: audit recording, session authentication, and
//! permission guards.

pub mod audit;
pub mod guard;
pub mod session;
