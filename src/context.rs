//! Request-scoped context handed from the interceptor chain to handlers.

use std::fmt;
use std::sync::Arc;

use blog_core::{AppError, AppResult};
use tokio_util::sync::CancellationToken;

use crate::middleware::RequestId;

/// Transport the call arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Direct gRPC call.
    Rpc,
    /// HTTP/JSON call proxied by the gateway.
    HttpGateway,
}

impl TransportKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rpc => "rpc",
            Self::HttpGateway => "http",
        }
    }
}

/// Immutable per-call metadata resolved by the request-id stage.
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    request_id: RequestId,
    transport: TransportKind,
}

impl RequestMetadata {
    #[must_use]
    pub const fn new(request_id: RequestId, transport: TransportKind) -> Self {
        Self {
            request_id,
            transport,
        }
    }

    #[inline]
    #[must_use]
    pub const fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    #[inline]
    #[must_use]
    pub const fn transport(&self) -> TransportKind {
        self.transport
    }
}

/// Authenticated caller identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal(Arc<str>);

impl Principal {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything a handler may know about the current call.
///
/// Built once per call by the interceptor chain and passed by value to the
/// handler; nothing in it is mutated afterwards.
#[derive(Debug, Clone)]
pub struct RequestContext {
    metadata: RequestMetadata,
    principal: Option<Principal>,
    cancel: CancellationToken,
}

impl RequestContext {
    #[must_use]
    pub const fn new(metadata: RequestMetadata, cancel: CancellationToken) -> Self {
        Self {
            metadata,
            principal: None,
            cancel,
        }
    }

    #[must_use]
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    #[inline]
    #[must_use]
    pub const fn metadata(&self) -> &RequestMetadata {
        &self.metadata
    }

    #[inline]
    #[must_use]
    pub const fn request_id(&self) -> &RequestId {
        self.metadata.request_id()
    }

    /// The authenticated caller; `None` on whitelisted methods.
    #[inline]
    #[must_use]
    pub const fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// The authenticated caller, or `Unauthenticated`.
    ///
    /// # Errors
    /// Returns `AppError::Unauthenticated` on calls that bypassed authentication.
    pub fn require_principal(&self) -> AppResult<&Principal> {
        self.principal
            .as_ref()
            .ok_or_else(|| AppError::Unauthenticated("no authenticated principal".to_string()))
    }

    /// Cancelled when the server shuts down.
    #[inline]
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}
