//! Observability - request IDs and alerting.

mod alert;
mod request_id;

pub use alert::{AlertLayer, AlertSink};
pub use request_id::{RequestId, RequestIdMiddleware};
