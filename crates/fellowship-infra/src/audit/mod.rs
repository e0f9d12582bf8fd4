//! Audit log implementations.

mod memory;

pub use memory::{DEFAULT_CAPACITY, InMemoryAuditLog};
