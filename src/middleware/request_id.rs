//! Request ID propagation for both transports.
//!
//! The HTTP gateway runs [`RequestIdLayer`]; gRPC calls resolve the id in
//! the interceptor chain through [`resolve`]. Either way an inbound
//! `x-request-id` is reused verbatim and a UUID v4 is generated otherwise,
//! and the id is echoed on every response and error.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::{HeaderValue, Request, Response};
use tonic::metadata::{MetadataMap, MetadataValue};
use tonic::Status;
use tower::{Layer, Service};
use tracing::Span;
use uuid::Uuid;

use crate::context::{RequestMetadata, TransportKind};

/// Header / metadata key for request ID propagation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Metadata key the gateway sets on calls it forwards.
pub const GATEWAY_TRANSPORT_KEY: &str = "x-gateway-transport";

/// Request ID for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub Arc<str>);

impl RequestId {
    /// Generate a new random request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string().into())
    }

    /// Create from an existing string.
    pub fn from_str(s: &str) -> Self {
        Self(s.into())
    }

    /// Get as string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve request metadata from inbound gRPC metadata.
pub fn resolve(metadata: &MetadataMap) -> RequestMetadata {
    let request_id = metadata
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(RequestId::from_str)
        .unwrap_or_default();

    let transport = if metadata.contains_key(GATEWAY_TRANSPORT_KEY) {
        TransportKind::HttpGateway
    } else {
        TransportKind::Rpc
    };

    RequestMetadata::new(request_id, transport)
}

/// Attach the request id to outbound gRPC metadata.
pub fn annotate(metadata: &mut MetadataMap, request_id: &RequestId) {
    if let Ok(value) = MetadataValue::try_from(request_id.as_str()) {
        metadata.insert(REQUEST_ID_HEADER, value);
    }
}

/// Attach the request id to an error status.
#[must_use]
pub fn annotate_status(mut status: Status, request_id: &RequestId) -> Status {
    annotate(status.metadata_mut(), request_id);
    status
}

/// Tower layer for request ID propagation on the HTTP gateway.
#[derive(Clone, Default)]
pub struct RequestIdLayer;

impl RequestIdLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdMiddleware { inner }
    }
}

/// Request ID middleware service.
#[derive(Clone)]
pub struct RequestIdMiddleware<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestIdMiddleware<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let request_id = extract_or_generate(&req);
        Span::current().record("request_id", request_id.as_str());
        req.extensions_mut().insert(request_id.clone());

        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            Ok(response)
        })
    }
}

fn extract_or_generate<T>(req: &Request<T>) -> RequestId {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(RequestId::from_str)
        .unwrap_or_default()
}
