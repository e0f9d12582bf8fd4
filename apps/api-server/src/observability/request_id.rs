//! Request correlation IDs.

use std::future::{Future, Ready, ready};
use std::pin::Pin;

use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{HeaderName, HeaderValue},
};
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const MAX_INCOMING_LEN: usize = 64;

/// Correlation id of the current request, stored in request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reuse an upstream id when it is short printable ASCII, else mint one.
    fn from_incoming(header: Option<&HeaderValue>) -> Self {
        let incoming = header
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| {
                !v.is_empty()
                    && v.len() <= MAX_INCOMING_LEN
                    && v.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            });
        Self(incoming.map_or_else(|| Uuid::new_v4().to_string(), str::to_string))
    }
}

/// Attaches a [`RequestId`] to every request and echoes it in the response.
pub struct RequestIdMiddleware;

impl<S, B> Transform<S, ServiceRequest> for RequestIdMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RequestIdService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestIdService { service }))
    }
}

pub struct RequestIdService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestIdService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let request_id = RequestId::from_incoming(req.headers().get(&REQUEST_ID_HEADER));
        let span = tracing::debug_span!("request_id", id = %request_id.as_str());
        let header = HeaderValue::from_str(request_id.as_str()).ok();

        req.extensions_mut().insert(request_id);
        let fut = self.service.call(req);

        Box::pin(
            async move {
                let mut res = fut.await?;
                if let Some(header) = header {
                    res.headers_mut().insert(REQUEST_ID_HEADER, header);
                }
                Ok(res)
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incoming_id_is_reused_when_sane() {
        let value = HeaderValue::from_static("lb-1234_abc");
        assert_eq!(RequestId::from_incoming(Some(&value)).as_str(), "lb-1234_abc");
    }

    #[test]
    fn test_bad_incoming_id_is_replaced() {
        let value = HeaderValue::from_static("has spaces; and=stuff");
        let id = RequestId::from_incoming(Some(&value));
        assert_ne!(id.as_str(), "has spaces; and=stuff");
        assert!(Uuid::parse_str(id.as_str()).is_ok());

        assert!(Uuid::parse_str(RequestId::from_incoming(None).as_str()).is_ok());
    }
}
