//! The ordered interceptor pipeline every RPC passes through.
//!
//! RequestID → Whitelist → Authentication → Authorization → Defaulting →
//! Validation → Handler. The first failing stage ends the call; later
//! stages and the handler never run. Responses and errors alike carry the
//! request id.

use std::future::Future;
use std::time::Instant;

use blog_core::{AppResult, Defaultable};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::field::Empty;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use super::request_id::{self, RequestId};
use super::{Authenticator, Authorizer, Whitelist};
use crate::context::{RequestContext, RequestMetadata};
use crate::validation::{ValidateRequest, Validator};

/// Shared, immutable pipeline configuration.
#[derive(Debug, Clone)]
pub struct InterceptorChain {
    whitelist: Whitelist,
    authenticator: Authenticator,
    authorizer: Authorizer,
    validator: Validator,
    shutdown: CancellationToken,
}

impl InterceptorChain {
    /// `shutdown` is the parent of every request's cancellation token.
    pub fn new(
        whitelist: Whitelist,
        authenticator: Authenticator,
        authorizer: Authorizer,
        validator: Validator,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            whitelist,
            authenticator,
            authorizer,
            validator,
            shutdown,
        }
    }

    /// Run `request` through every stage and, if all pass, `handler`.
    ///
    /// # Errors
    /// The `Status` of the first failing stage or of the handler, with the
    /// request id attached as metadata.
    pub async fn handle<Req, Resp, H, Fut>(
        &self,
        method: &'static str,
        request: Request<Req>,
        handler: H,
    ) -> Result<Response<Resp>, Status>
    where
        Req: Defaultable + ValidateRequest + Send,
        H: FnOnce(RequestContext, Req) -> Fut + Send,
        Fut: Future<Output = AppResult<Resp>> + Send,
    {
        let metadata = request_id::resolve(request.metadata());
        let request_id = metadata.request_id().clone();
        let span = info_span!(
            "rpc",
            method,
            request_id = %request_id,
            transport = metadata.transport().as_str(),
            user_id = Empty,
        );

        let started = Instant::now();
        let result = self
            .run(method, metadata, request, handler)
            .instrument(span.clone())
            .await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        span.in_scope(|| match &result {
            Ok(_) => info!(elapsed_ms, "Request completed"),
            Err(e) => warn!(elapsed_ms, code = ?e.code(), error = %e, "Request failed"),
        });

        result
            .map(|message| respond(message, &request_id))
            .map_err(|e| request_id::annotate_status(Status::from(e), &request_id))
    }

    async fn run<Req, Resp, H, Fut>(
        &self,
        method: &'static str,
        metadata: RequestMetadata,
        request: Request<Req>,
        handler: H,
    ) -> AppResult<Resp>
    where
        Req: Defaultable + ValidateRequest + Send,
        H: FnOnce(RequestContext, Req) -> Fut + Send,
        Fut: Future<Output = AppResult<Resp>> + Send,
    {
        let mut ctx = RequestContext::new(metadata, self.shutdown.child_token());

        if self.whitelist.contains(method) {
            debug!("Whitelisted method, skipping authentication");
        } else {
            let principal = self.authenticator.authenticate(request.metadata())?;
            Span::current().record("user_id", principal.as_str());
            self.authorizer.authorize(&principal, method)?;
            ctx = ctx.with_principal(principal);
        }

        let mut message = request.into_inner();
        message.apply_defaults();
        message.validate(&ctx, &self.validator)?;

        handler(ctx, message).await
    }
}

fn respond<T>(message: T, request_id: &RequestId) -> Response<T> {
    let mut response = Response::new(message);
    request_id::annotate(response.metadata_mut(), request_id);
    response
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use blog_core::{AppError, JwtValidator, DEFAULT_IDENTITY_KEY};
    use blog_proto::v1::*;
    use secrecy::SecretString;
    use tonic::metadata::MetadataValue;
    use tonic::Code;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    use super::*;
    use crate::authz::{Effect, PolicySet, StaticEngine};
    use crate::middleware::{AUTHORIZATION_KEY, REQUEST_ID_HEADER};

    fn validator() -> JwtValidator {
        JwtValidator::new(
            &SecretString::from("test_secret_key_minimum_32_chars!"),
            DEFAULT_IDENTITY_KEY,
            Duration::from_secs(600),
        )
    }

    fn chain() -> InterceptorChain {
        let policy = PolicySet::default()
            .rule("role::admin", "*", "*", Effect::Allow)
            .rule("role::user", "/blog.v1.BlogService/*", "CALL", Effect::Allow)
            .rule("role::user", methods::DELETE_USER, "CALL", Effect::Deny)
            .binding("user-000000", "role::admin")
            .binding("user-a", "role::user");
        InterceptorChain::new(
            Whitelist::default(),
            Authenticator::new(validator()),
            Authorizer::new(Arc::new(StaticEngine::new(policy).unwrap())),
            Validator::new(),
            CancellationToken::new(),
        )
    }

    fn signed<T>(message: T, user_id: &str) -> Request<T> {
        let (token, _) = validator().sign(user_id).unwrap();
        let mut request = Request::new(message);
        request.metadata_mut().insert(
            AUTHORIZATION_KEY,
            MetadataValue::try_from(format!("Bearer {token}")).unwrap(),
        );
        request
    }

    /// Records the message of every event.
    #[derive(Clone, Default)]
    struct Messages(Arc<Mutex<Vec<String>>>);

    struct MessageField<'a>(&'a mut String);

    impl Visit for MessageField<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                *self.0 = format!("{value:?}");
            }
        }
    }

    impl<S: Subscriber> Layer<S> for Messages {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut message = String::new();
            event.record(&mut MessageField(&mut message));
            self.0.lock().unwrap().push(message);
        }
    }

    impl Messages {
        fn count(&self, message: &str) -> usize {
            self.0.lock().unwrap().iter().filter(|m| *m == message).count()
        }
    }

    #[tokio::test]
    async fn whitelisted_method_needs_no_credential() {
        let chain = chain();
        let response = chain
            .handle(methods::HEALTHZ, Request::new(HealthzRequest {}), |ctx, _| async move {
                assert!(ctx.principal().is_none());
                Ok(HealthzResponse {
                    status: "Healthy".into(),
                    ..Default::default()
                })
            })
            .await
            .unwrap();
        assert_eq!(response.get_ref().status, "Healthy");
        assert!(response.metadata().get(REQUEST_ID_HEADER).is_some());
    }

    #[tokio::test]
    async fn missing_credential_stops_before_handler() {
        let chain = chain();
        let called = AtomicBool::new(false);
        let status = chain
            .handle(
                methods::GET_POST,
                Request::new(GetPostRequest {
                    post_id: "post-000001".into(),
                }),
                |_, _| async {
                    called.store(true, Ordering::SeqCst);
                    Ok(GetPostResponse::default())
                },
            )
            .await
            .unwrap_err();

        assert_eq!(status.code(), Code::Unauthenticated);
        assert!(!called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn denied_method_returns_permission_denied() {
        let chain = chain();
        let status = chain
            .handle(
                methods::DELETE_USER,
                signed(
                    DeleteUserRequest {
                        user_id: "user-a".into(),
                    },
                    "user-a",
                ),
                |_, _| async { Ok(DeleteUserResponse {}) },
            )
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::PermissionDenied);
        assert!(status.message().starts_with("access denied: subject=user-a"));
    }

    #[tokio::test]
    async fn handler_sees_principal_and_defaults() {
        let chain = chain();
        let response = chain
            .handle(
                methods::CREATE_USER,
                Request::new(CreateUserRequest {
                    username: "blogger_1".into(),
                    password: "secret123".into(),
                    nickname: None,
                    email: "blogger@example.com".into(),
                    phone: "13812345678".into(),
                }),
                |_, request| async move {
                    assert_eq!(request.nickname.as_deref(), Some(DEFAULT_NICKNAME));
                    Ok(CreateUserResponse {
                        user_id: "user-b".into(),
                    })
                },
            )
            .await
            .unwrap();
        assert_eq!(response.get_ref().user_id, "user-b");

        let response = chain
            .handle(
                methods::REFRESH_TOKEN,
                signed(RefreshTokenRequest {}, "user-000000"),
                |ctx, _| async move {
                    assert_eq!(ctx.require_principal()?.as_str(), "user-000000");
                    Ok(RefreshTokenResponse::default())
                },
            )
            .await;
        assert!(response.is_ok());
    }

    #[tokio::test]
    async fn validation_failure_is_invalid_argument() {
        let chain = chain();
        let status = chain
            .handle(
                methods::LIST_POST,
                signed(
                    ListPostRequest {
                        offset: 0,
                        limit: 0,
                        title: None,
                    },
                    "user-a",
                ),
                |_, _| async { Ok(ListPostResponse::default()) },
            )
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn request_id_is_echoed_on_errors() {
        let chain = chain();
        let mut request = Request::new(GetPostRequest::default());
        request
            .metadata_mut()
            .insert(REQUEST_ID_HEADER, MetadataValue::from_static("abc-123"));

        let status = chain
            .handle(methods::GET_POST, request, |_, _| async {
                Ok(GetPostResponse::default())
            })
            .await
            .unwrap_err();
        assert_eq!(status.metadata().get(REQUEST_ID_HEADER).unwrap(), "abc-123");
    }

    #[tokio::test]
    async fn handler_errors_are_translated() {
        let chain = chain();
        let status = chain
            .handle(
                methods::GET_POST,
                signed(
                    GetPostRequest {
                        post_id: "post-zzzzzz".into(),
                    },
                    "user-a",
                ),
                |_, request| async move {
                    Err::<GetPostResponse, _>(AppError::not_found("post", request.post_id))
                },
            )
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
        assert!(status.metadata().get(REQUEST_ID_HEADER).is_some());
    }

    #[tokio::test]
    async fn request_token_is_a_child_of_shutdown() {
        let shutdown = CancellationToken::new();
        let chain = InterceptorChain {
            shutdown: shutdown.clone(),
            ..chain()
        };
        shutdown.cancel();

        chain
            .handle(methods::HEALTHZ, Request::new(HealthzRequest {}), |ctx, _| async move {
                assert!(ctx.cancellation().is_cancelled());
                Ok(HealthzResponse::default())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn every_failing_stage_is_logged_once() {
        let messages = Messages::default();
        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(messages.clone()));
        let chain = chain();

        // Authentication.
        chain
            .handle(methods::GET_POST, Request::new(GetPostRequest::default()), |_, _| async {
                Ok(GetPostResponse::default())
            })
            .await
            .unwrap_err();
        assert_eq!(messages.count("Request failed"), 1);

        // Authorization.
        chain
            .handle(
                methods::DELETE_USER,
                signed(DeleteUserRequest { user_id: "user-a".into() }, "user-a"),
                |_, _| async { Ok(DeleteUserResponse {}) },
            )
            .await
            .unwrap_err();
        assert_eq!(messages.count("Request failed"), 2);

        // Validation.
        chain
            .handle(
                methods::LIST_POST,
                signed(ListPostRequest::default(), "user-a"),
                |_, _| async { Ok(ListPostResponse::default()) },
            )
            .await
            .unwrap_err();
        assert_eq!(messages.count("Request failed"), 3);

        chain
            .handle(methods::HEALTHZ, Request::new(HealthzRequest {}), |_, _| async {
                Ok(HealthzResponse::default())
            })
            .await
            .unwrap();
        assert_eq!(messages.count("Request completed"), 1);
        assert_eq!(messages.count("Request failed"), 3);
    }
}
