//! # Fellowship Core
//!
//! The domain layer of the Fellowship community backend: entities and their
//! validation rules, the role permission matrix, pagination and the port
//! traits infrastructure must implement.
//! This crate has zero infrastructure dependencies.

pub mod domain;
pub mod error;
pub mod pagination;
pub mod permissions;
pub mod ports;

pub use error::{DomainError, RepoError};
pub use pagination::{Page, PageRequest};
pub use permissions::{Action, PermissionMatrix, Resource};
