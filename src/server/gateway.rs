//! HTTP/JSON gateway in front of the gRPC listener.
//!
//! Each route decodes a JSON body (or path and query parameters), forwards
//! the call over a gRPC channel with the caller's credential and request id
//! as metadata, and renders the reply or the status as JSON.

use std::time::Duration;

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use blog_proto::v1::*;
use http::request::Parts;
use http::{Extensions, HeaderMap, Request, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tonic::metadata::MetadataValue;
use tonic::transport::Channel;
use tonic::{Code, Status};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::Level;

use crate::middleware::{
    request_id, CredentialCarrier, RequestId, RequestIdLayer, AUTHORIZATION_KEY,
    GATEWAY_TRANSPORT_KEY,
};

/// Value of the gateway marker metadata.
const GATEWAY_TRANSPORT: &str = "http";

/// gRPC client the gateway forwards through.
pub type RpcClient = BlogServiceClient<Channel>;

#[derive(Debug, Clone)]
pub struct GatewayState {
    client: RpcClient,
}

/// Build the gateway router over `client`.
pub fn router(client: RpcClient, request_timeout: Duration) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(RequestIdLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<_>| {
                    let request_id = req
                        .extensions()
                        .get::<RequestId>()
                        .map(RequestId::as_str)
                        .unwrap_or_default();
                    tracing::info_span!(
                        "request",
                        method = %req.method(),
                        uri = %req.uri(),
                        request_id,
                    )
                })
                .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/login", post(login))
        .route("/refresh-token", put(refresh_token))
        .route("/v1/users", post(create_user).get(list_user))
        .route(
            "/v1/users/:user_id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/v1/users/:user_id/change-password", put(change_password))
        .route(
            "/v1/posts",
            post(create_post).get(list_post).delete(delete_post),
        )
        .route("/v1/posts/:post_id", get(get_post).put(update_post))
        .with_state(GatewayState { client })
        .layer(middleware)
}

// ============================================================================
// Forwarding
// ============================================================================

/// Wrap `message` with the metadata the RPC pipeline expects.
fn forward<T>(headers: &HeaderMap, request_id: &RequestId, message: T) -> tonic::Request<T> {
    let mut request = tonic::Request::new(message);
    let metadata = request.metadata_mut();

    if let Some(value) = headers
        .authorization()
        .and_then(|v| MetadataValue::try_from(v).ok())
    {
        metadata.insert(AUTHORIZATION_KEY, value);
    }
    request_id::annotate(metadata, request_id);
    metadata.insert(GATEWAY_TRANSPORT_KEY, MetadataValue::from_static(GATEWAY_TRANSPORT));
    request
}

fn reply<T>(result: Result<tonic::Response<T>, Status>, request_id: &RequestId) -> GatewayResult<T> {
    result
        .map(|response| Json(response.into_inner()))
        .map_err(|status| GatewayError::new(status, request_id.clone()))
}

type GatewayResult<T> = Result<Json<T>, GatewayError>;

/// A gRPC status rendered as an HTTP error.
#[derive(Debug)]
pub struct GatewayError {
    status: Status,
    request_id: RequestId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    code: u16,
    reason: String,
    message: &'a str,
    request_id: &'a str,
}

impl GatewayError {
    #[must_use]
    pub const fn new(status: Status, request_id: RequestId) -> Self {
        Self { status, request_id }
    }

    fn invalid_input(message: String, extensions: &Extensions) -> Self {
        Self::new(Status::invalid_argument(message), stored_request_id(extensions))
    }
}

/// HTTP status for a gRPC code.
#[must_use]
pub const fn http_status(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::InvalidArgument | Code::OutOfRange | Code::FailedPrecondition => {
            StatusCode::BAD_REQUEST
        }
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists | Code::Aborted => StatusCode::CONFLICT,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Cancelled
        | Code::Unknown
        | Code::Internal
        | Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = http_status(self.status.code());
        let body = ErrorBody {
            code: status.as_u16(),
            reason: format!("{:?}", self.status.code()),
            message: self.status.message(),
            request_id: self.request_id.as_str(),
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Extractors
// ============================================================================

// axum's own rejections answer in plain text; these wrappers keep every
// gateway failure in the `GatewayError` JSON shape.

/// Id stored by `RequestIdLayer`, or a fresh one outside the layer.
fn stored_request_id(extensions: &Extensions) -> RequestId {
    extensions.get::<RequestId>().cloned().unwrap_or_default()
}

/// JSON request body.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request(req: axum::extract::Request, state: &S) -> Result<Self, Self::Rejection> {
        let request_id = stored_request_id(req.extensions());
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| Self(value))
            .map_err(|rejection| {
                GatewayError::new(Status::invalid_argument(rejection.body_text()), request_id)
            })
    }
}

/// URL query parameters.
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|rejection| GatewayError::invalid_input(rejection.body_text(), &parts.extensions))
    }
}

/// Path parameters.
pub struct PathParam<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for PathParam<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(value)| Self(value))
            .map_err(|rejection| GatewayError::invalid_input(rejection.body_text(), &parts.extensions))
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn healthz(
    State(state): State<GatewayState>,
    Extension(id): Extension<RequestId>,
    headers: HeaderMap,
) -> GatewayResult<HealthzResponse> {
    let mut client = state.client;
    reply(client.healthz(forward(&headers, &id, HealthzRequest {})).await, &id)
}

async fn login(
    State(state): State<GatewayState>,
    Extension(id): Extension<RequestId>,
    headers: HeaderMap,
    JsonBody(body): JsonBody<LoginRequest>,
) -> GatewayResult<LoginResponse> {
    let mut client = state.client;
    reply(client.login(forward(&headers, &id, body)).await, &id)
}

async fn refresh_token(
    State(state): State<GatewayState>,
    Extension(id): Extension<RequestId>,
    headers: HeaderMap,
) -> GatewayResult<RefreshTokenResponse> {
    let mut client = state.client;
    let request = forward(&headers, &id, RefreshTokenRequest {});
    reply(client.refresh_token(request).await, &id)
}

async fn change_password(
    State(state): State<GatewayState>,
    Extension(id): Extension<RequestId>,
    PathParam(user_id): PathParam<String>,
    headers: HeaderMap,
    JsonBody(mut body): JsonBody<ChangePasswordRequest>,
) -> GatewayResult<ChangePasswordResponse> {
    body.user_id = user_id;
    let mut client = state.client;
    reply(client.change_password(forward(&headers, &id, body)).await, &id)
}

async fn create_user(
    State(state): State<GatewayState>,
    Extension(id): Extension<RequestId>,
    headers: HeaderMap,
    JsonBody(body): JsonBody<CreateUserRequest>,
) -> GatewayResult<CreateUserResponse> {
    let mut client = state.client;
    reply(client.create_user(forward(&headers, &id, body)).await, &id)
}

async fn list_user(
    State(state): State<GatewayState>,
    Extension(id): Extension<RequestId>,
    headers: HeaderMap,
    QueryParams(query): QueryParams<ListUserRequest>,
) -> GatewayResult<ListUserResponse> {
    let mut client = state.client;
    reply(client.list_user(forward(&headers, &id, query)).await, &id)
}

async fn get_user(
    State(state): State<GatewayState>,
    Extension(id): Extension<RequestId>,
    PathParam(user_id): PathParam<String>,
    headers: HeaderMap,
) -> GatewayResult<GetUserResponse> {
    let mut client = state.client;
    let request = forward(&headers, &id, GetUserRequest { user_id });
    reply(client.get_user(request).await, &id)
}

async fn update_user(
    State(state): State<GatewayState>,
    Extension(id): Extension<RequestId>,
    PathParam(user_id): PathParam<String>,
    headers: HeaderMap,
    JsonBody(mut body): JsonBody<UpdateUserRequest>,
) -> GatewayResult<UpdateUserResponse> {
    body.user_id = user_id;
    let mut client = state.client;
    reply(client.update_user(forward(&headers, &id, body)).await, &id)
}

async fn delete_user(
    State(state): State<GatewayState>,
    Extension(id): Extension<RequestId>,
    PathParam(user_id): PathParam<String>,
    headers: HeaderMap,
) -> GatewayResult<DeleteUserResponse> {
    let mut client = state.client;
    let request = forward(&headers, &id, DeleteUserRequest { user_id });
    reply(client.delete_user(request).await, &id)
}

async fn create_post(
    State(state): State<GatewayState>,
    Extension(id): Extension<RequestId>,
    headers: HeaderMap,
    JsonBody(body): JsonBody<CreatePostRequest>,
) -> GatewayResult<CreatePostResponse> {
    let mut client = state.client;
    reply(client.create_post(forward(&headers, &id, body)).await, &id)
}

async fn list_post(
    State(state): State<GatewayState>,
    Extension(id): Extension<RequestId>,
    headers: HeaderMap,
    QueryParams(query): QueryParams<ListPostRequest>,
) -> GatewayResult<ListPostResponse> {
    let mut client = state.client;
    reply(client.list_post(forward(&headers, &id, query)).await, &id)
}

async fn delete_post(
    State(state): State<GatewayState>,
    Extension(id): Extension<RequestId>,
    headers: HeaderMap,
    JsonBody(body): JsonBody<DeletePostRequest>,
) -> GatewayResult<DeletePostResponse> {
    let mut client = state.client;
    reply(client.delete_post(forward(&headers, &id, body)).await, &id)
}

async fn get_post(
    State(state): State<GatewayState>,
    Extension(id): Extension<RequestId>,
    PathParam(post_id): PathParam<String>,
    headers: HeaderMap,
) -> GatewayResult<GetPostResponse> {
    let mut client = state.client;
    let request = forward(&headers, &id, GetPostRequest { post_id });
    reply(client.get_post(request).await, &id)
}

async fn update_post(
    State(state): State<GatewayState>,
    Extension(id): Extension<RequestId>,
    PathParam(post_id): PathParam<String>,
    headers: HeaderMap,
    JsonBody(mut body): JsonBody<UpdatePostRequest>,
) -> GatewayResult<UpdatePostResponse> {
    body.post_id = post_id;
    let mut client = state.client;
    reply(client.update_post(forward(&headers, &id, body)).await, &id)
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use tonic::transport::Endpoint;
    use tower::ServiceExt;

    use super::*;
    use crate::middleware::REQUEST_ID_HEADER;

    /// Router whose client never connects; only requests rejected before
    /// forwarding may be sent through it.
    fn offline_router() -> Router {
        let channel = Endpoint::from_static("http://127.0.0.1:9").connect_lazy();
        router(RpcClient::new(channel), Duration::from_secs(5))
    }

    async fn json_of(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn codes_map_to_http_statuses() {
        assert_eq!(http_status(Code::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(http_status(Code::PermissionDenied), StatusCode::FORBIDDEN);
        assert_eq!(http_status(Code::InvalidArgument), StatusCode::BAD_REQUEST);
        assert_eq!(http_status(Code::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(http_status(Code::AlreadyExists), StatusCode::CONFLICT);
        assert_eq!(http_status(Code::Unavailable), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(http_status(Code::Internal), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn error_body_names_code_reason_and_request_id() {
        let error = GatewayError::new(
            Status::permission_denied("access denied"),
            RequestId::from_str("abc-123"),
        );
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], 403);
        assert_eq!(json["reason"], "PermissionDenied");
        assert_eq!(json["message"], "access denied");
        assert_eq!(json["requestId"], "abc-123");
    }

    #[test]
    fn forwarded_request_carries_credential_id_and_marker() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::AUTHORIZATION, "Bearer t0ken".parse().unwrap());

        let request = forward(&headers, &RequestId::from_str("abc-123"), HealthzRequest {});
        let metadata = request.metadata();
        assert_eq!(metadata.get(AUTHORIZATION_KEY).unwrap(), "Bearer t0ken");
        assert_eq!(metadata.get(REQUEST_ID_HEADER).unwrap(), "abc-123");
        assert_eq!(metadata.get(GATEWAY_TRANSPORT_KEY).unwrap(), GATEWAY_TRANSPORT);
    }

    #[test]
    fn missing_credential_is_not_invented() {
        let request = forward(&HeaderMap::new(), &RequestId::new(), HealthzRequest {});
        assert!(request.metadata().get(AUTHORIZATION_KEY).is_none());
    }

    #[tokio::test]
    async fn malformed_json_body_renders_gateway_error() {
        let request = Request::builder()
            .method("POST")
            .uri("/login")
            .header(REQUEST_ID_HEADER, "req-1")
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = offline_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), "req-1");

        let json = json_of(response).await;
        assert_eq!(json["code"], 400);
        assert_eq!(json["reason"], "InvalidArgument");
        assert_eq!(json["requestId"], "req-1");
        assert!(!json["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_content_type_renders_gateway_error() {
        let request = Request::builder()
            .method("POST")
            .uri("/login")
            .header(REQUEST_ID_HEADER, "req-2")
            .body(Body::from(r#"{"username":"root","password":"x"}"#))
            .unwrap();

        let response = offline_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_of(response).await;
        assert_eq!(json["reason"], "InvalidArgument");
        assert_eq!(json["requestId"], "req-2");
    }

    #[tokio::test]
    async fn bad_query_parameter_renders_gateway_error() {
        let request = Request::builder()
            .uri("/v1/users?offset=abc")
            .body(Body::empty())
            .unwrap();

        let response = offline_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let echoed = response.headers().get(REQUEST_ID_HEADER).cloned().unwrap();

        let json = json_of(response).await;
        assert_eq!(json["reason"], "InvalidArgument");
        assert_eq!(json["requestId"], echoed.to_str().unwrap());
    }
}
