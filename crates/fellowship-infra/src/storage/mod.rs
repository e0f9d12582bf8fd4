//! File storage for uploaded images.

mod local;

pub use local::{LocalFileStorage, PUBLIC_PREFIX, content_type_for};
