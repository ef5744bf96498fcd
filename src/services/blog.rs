//! `blog.v1.BlogService` trait implementation.
//!
//! Thin handlers: each call runs through the interceptor chain and then
//! delegates to the business layer.

use std::sync::Arc;

use blog_proto::v1::*;
use tonic::{Request, Response, Status};

use crate::biz::Biz;
use crate::middleware::InterceptorChain;

/// The RPC backend shared by the gRPC listener and the gateway.
#[derive(Debug, Clone)]
pub struct BlogServer {
    chain: Arc<InterceptorChain>,
    biz: Arc<Biz>,
}

impl BlogServer {
    #[must_use]
    pub const fn new(chain: Arc<InterceptorChain>, biz: Arc<Biz>) -> Self {
        Self { chain, biz }
    }
}

#[tonic::async_trait]
impl BlogService for BlogServer {
    // ========================================================================
    // Health and session
    // ========================================================================

    async fn healthz(&self, request: Request<HealthzRequest>) -> Result<Response<HealthzResponse>, Status> {
        let biz = &self.biz;
        self.chain
            .handle(methods::HEALTHZ, request, |_, _| async move { Ok(biz.healthz()) })
            .await
    }

    async fn login(&self, request: Request<LoginRequest>) -> Result<Response<LoginResponse>, Status> {
        let users = self.biz.users();
        self.chain
            .handle(methods::LOGIN, request, |_, req| users.login(req))
            .await
    }

    async fn refresh_token(
        &self,
        request: Request<RefreshTokenRequest>,
    ) -> Result<Response<RefreshTokenResponse>, Status> {
        let users = self.biz.users();
        self.chain
            .handle(methods::REFRESH_TOKEN, request, |ctx, _| async move {
                users.refresh_token(&ctx)
            })
            .await
    }

    async fn change_password(
        &self,
        request: Request<ChangePasswordRequest>,
    ) -> Result<Response<ChangePasswordResponse>, Status> {
        let users = self.biz.users();
        self.chain
            .handle(methods::CHANGE_PASSWORD, request, |_, req| users.change_password(req))
            .await
    }

    // ========================================================================
    // Users
    // ========================================================================

    async fn create_user(
        &self,
        request: Request<CreateUserRequest>,
    ) -> Result<Response<CreateUserResponse>, Status> {
        let users = self.biz.users();
        self.chain
            .handle(methods::CREATE_USER, request, |_, req| users.create(req))
            .await
    }

    async fn update_user(
        &self,
        request: Request<UpdateUserRequest>,
    ) -> Result<Response<UpdateUserResponse>, Status> {
        let users = self.biz.users();
        self.chain
            .handle(methods::UPDATE_USER, request, |_, req| users.update(req))
            .await
    }

    async fn delete_user(
        &self,
        request: Request<DeleteUserRequest>,
    ) -> Result<Response<DeleteUserResponse>, Status> {
        let users = self.biz.users();
        self.chain
            .handle(methods::DELETE_USER, request, |_, req| users.delete(req))
            .await
    }

    async fn get_user(&self, request: Request<GetUserRequest>) -> Result<Response<GetUserResponse>, Status> {
        let users = self.biz.users();
        self.chain
            .handle(methods::GET_USER, request, |_, req| users.get(req))
            .await
    }

    async fn list_user(&self, request: Request<ListUserRequest>) -> Result<Response<ListUserResponse>, Status> {
        let users = self.biz.users();
        self.chain
            .handle(methods::LIST_USER, request, |ctx, req| async move {
                users.list(&ctx, req).await
            })
            .await
    }

    // ========================================================================
    // Posts
    // ========================================================================

    async fn create_post(
        &self,
        request: Request<CreatePostRequest>,
    ) -> Result<Response<CreatePostResponse>, Status> {
        let posts = self.biz.posts();
        self.chain
            .handle(methods::CREATE_POST, request, |ctx, req| async move {
                posts.create(&ctx, req).await
            })
            .await
    }

    async fn update_post(
        &self,
        request: Request<UpdatePostRequest>,
    ) -> Result<Response<UpdatePostResponse>, Status> {
        let posts = self.biz.posts();
        self.chain
            .handle(methods::UPDATE_POST, request, |ctx, req| async move {
                posts.update(&ctx, req).await
            })
            .await
    }

    async fn delete_post(
        &self,
        request: Request<DeletePostRequest>,
    ) -> Result<Response<DeletePostResponse>, Status> {
        let posts = self.biz.posts();
        self.chain
            .handle(methods::DELETE_POST, request, |ctx, req| async move {
                posts.delete(&ctx, req).await
            })
            .await
    }

    async fn get_post(&self, request: Request<GetPostRequest>) -> Result<Response<GetPostResponse>, Status> {
        let posts = self.biz.posts();
        self.chain
            .handle(methods::GET_POST, request, |ctx, req| async move {
                posts.get(&ctx, req).await
            })
            .await
    }

    async fn list_post(&self, request: Request<ListPostRequest>) -> Result<Response<ListPostResponse>, Status> {
        let posts = self.biz.posts();
        self.chain
            .handle(methods::LIST_POST, request, |ctx, req| async move {
                posts.list(&ctx, req).await
            })
            .await
    }
}
