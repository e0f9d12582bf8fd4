//! Middleware modules.

pub mod auth;
pub mod authorize;
pub mod error;
pub mod rate_limit;
