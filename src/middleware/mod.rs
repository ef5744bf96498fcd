//! Request pipeline shared by the gRPC service and the HTTP gateway.
//!
//! # Stage Order
//! Every RPC passes through [`InterceptorChain::handle`]:
//! 1. Request ID - reuse inbound `x-request-id` or generate one
//! 2. Whitelist - public methods skip the next two stages
//! 3. Authentication - bearer JWT → [`Principal`](crate::context::Principal)
//! 4. Authorization - `(principal, method, CALL)` against the policy
//! 5. Defaulting and validation
//! 6. Handler
//!
//! The gateway additionally runs [`RequestIdLayer`] so HTTP responses carry
//! the same id the RPC saw.

pub mod auth;
pub mod authz;
pub mod chain;
pub mod request_id;
pub mod whitelist;

pub use auth::{Authenticator, CredentialCarrier, AUTHORIZATION_KEY};
pub use authz::{Authorizer, ACTION_CALL};
pub use chain::InterceptorChain;
pub use request_id::{RequestId, RequestIdLayer, GATEWAY_TRANSPORT_KEY, REQUEST_ID_HEADER};
pub use whitelist::Whitelist;
