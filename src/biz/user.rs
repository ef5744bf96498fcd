//! User operations.

use std::sync::Arc;

use blog_core::{AppError, AppResult, JwtValidator};
use blog_proto::v1::{
    ChangePasswordRequest, ChangePasswordResponse, CreateUserRequest, CreateUserResponse,
    DeleteUserRequest, DeleteUserResponse, GetUserRequest, GetUserResponse, ListUserRequest,
    ListUserResponse, LoginRequest, LoginResponse, RefreshTokenResponse, UpdateUserRequest,
    UpdateUserResponse, User as UserReply, DEFAULT_NICKNAME,
};
use blog_store::{
    CreateUserParams, Page, PolicyRow, PostRepository, Store, UpdateUserParams, User,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{password, timestamp, ROLE_USER, ROOT_USERNAME};
use crate::aggregate::{Enrich, ListAggregator};
use crate::context::RequestContext;

/// Attaches each user's post count.
#[derive(Debug, Clone)]
pub struct PostCountEnricher {
    posts: PostRepository,
}

impl PostCountEnricher {
    #[must_use]
    pub const fn new(posts: PostRepository) -> Self {
        Self { posts }
    }
}

impl Enrich for PostCountEnricher {
    type Record = User;
    type Key = String;
    type Output = UserReply;

    fn key(&self, user: &User) -> String {
        user.user_id.clone()
    }

    async fn enrich(&self, user: &User, _cancel: CancellationToken) -> AppResult<UserReply> {
        let post_count = self.posts.count_user_posts(&user.user_id).await?;
        Ok(reply(user, post_count))
    }
}

fn reply(user: &User, post_count: i64) -> UserReply {
    UserReply {
        user_id: user.user_id.clone(),
        username: user.username.clone(),
        nickname: user.nickname.clone(),
        email: user.email.clone(),
        phone: user.phone.clone(),
        post_count,
        created_at: timestamp(user.created_at),
        updated_at: timestamp(user.updated_at),
    }
}

#[derive(Debug, Clone)]
pub struct UserBiz {
    store: Store,
    tokens: JwtValidator,
    aggregator: ListAggregator,
    post_counts: Arc<PostCountEnricher>,
}

impl UserBiz {
    #[must_use]
    pub fn new(store: Store, tokens: JwtValidator, aggregator: ListAggregator) -> Self {
        let post_counts = Arc::new(PostCountEnricher::new(store.posts.clone()));
        Self {
            store,
            tokens,
            aggregator,
            post_counts,
        }
    }

    /// Verify credentials and issue a token.
    ///
    /// Unknown usernames and wrong passwords are indistinguishable to the caller.
    pub async fn login(&self, req: LoginRequest) -> AppResult<LoginResponse> {
        let invalid = || AppError::Unauthenticated("invalid username or password".to_string());

        let user = match self.store.users.get_user_by_username(&req.username).await {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => return Err(invalid()),
            Err(e) => return Err(e),
        };
        if !password::verify(&req.password, &user.password) {
            return Err(invalid());
        }

        let (token, expire_at) = self.tokens.sign(&user.user_id)?;
        info!(user_id = %user.user_id, "User logged in");
        Ok(LoginResponse {
            token,
            expire_at: timestamp(expire_at),
        })
    }

    /// Issue a fresh token for the caller.
    pub fn refresh_token(&self, ctx: &RequestContext) -> AppResult<RefreshTokenResponse> {
        let principal = ctx.require_principal()?;
        let (token, expire_at) = self.tokens.sign(principal.as_str())?;
        Ok(RefreshTokenResponse {
            token,
            expire_at: timestamp(expire_at),
        })
    }

    pub async fn change_password(
        &self,
        req: ChangePasswordRequest,
    ) -> AppResult<ChangePasswordResponse> {
        let user = self.store.users.get_user(&req.user_id).await?;
        if !password::verify(&req.old_password, &user.password) {
            return Err(AppError::Unauthenticated("old password is incorrect".to_string()));
        }

        let password_hash = password::hash(&req.new_password)?;
        self.store
            .users
            .update_user(
                &user.user_id,
                UpdateUserParams {
                    password_hash: Some(&password_hash),
                    ..Default::default()
                },
            )
            .await?;

        info!(user_id = %user.user_id, "Password changed");
        Ok(ChangePasswordResponse {})
    }

    /// Register a user and bind them to the user role.
    pub async fn create(&self, req: CreateUserRequest) -> AppResult<CreateUserResponse> {
        let password_hash = password::hash(&req.password)?;
        let user = self
            .store
            .users
            .create_user(CreateUserParams {
                username: &req.username,
                password_hash: &password_hash,
                nickname: req.nickname.as_deref().unwrap_or(DEFAULT_NICKNAME),
                email: &req.email,
                phone: &req.phone,
            })
            .await?;

        self.store
            .policies
            .add_rows([PolicyRow::binding(&user.user_id, ROLE_USER)])
            .await?;

        info!(user_id = %user.user_id, username = %user.username, "User created");
        Ok(CreateUserResponse {
            user_id: user.user_id,
        })
    }

    pub async fn update(&self, req: UpdateUserRequest) -> AppResult<UpdateUserResponse> {
        self.store
            .users
            .update_user(
                &req.user_id,
                UpdateUserParams {
                    username: req.username.as_deref(),
                    nickname: req.nickname.as_deref(),
                    email: req.email.as_deref(),
                    phone: req.phone.as_deref(),
                    ..Default::default()
                },
            )
            .await?;
        Ok(UpdateUserResponse {})
    }

    /// Remove a user with their posts and policy rows.
    ///
    /// Deleting an unknown user succeeds.
    pub async fn delete(&self, req: DeleteUserRequest) -> AppResult<DeleteUserResponse> {
        let removed = self.store.users.delete_user(&req.user_id).await?;
        let posts = self.store.posts.delete_user_posts(&req.user_id).await?;
        let rows = self.store.policies.remove_subject(&req.user_id).await?;

        if removed {
            info!(user_id = %req.user_id, posts, policy_rows = rows, "User deleted");
        }
        Ok(DeleteUserResponse {})
    }

    pub async fn get(&self, req: GetUserRequest) -> AppResult<GetUserResponse> {
        let user = self.store.users.get_user(&req.user_id).await?;
        let post_count = self.store.posts.count_user_posts(&user.user_id).await?;
        Ok(GetUserResponse {
            user: Some(reply(&user, post_count)),
        })
    }

    /// List users with their post counts.
    ///
    /// The root account sees every user; anyone else sees only themselves.
    pub async fn list(&self, ctx: &RequestContext, req: ListUserRequest) -> AppResult<ListUserResponse> {
        let principal = ctx.require_principal()?;
        let caller = self.store.users.get_user(principal.as_str()).await?;
        let only = (caller.username != ROOT_USERNAME).then_some(caller.user_id.as_str());

        let (total_count, users) = self
            .store
            .users
            .list_users(Page::new(req.offset, req.limit), only)
            .await?;
        let users = self
            .aggregator
            .aggregate(users, Arc::clone(&self.post_counts), ctx.cancellation())
            .await?;

        Ok(ListUserResponse { total_count, users })
    }
}
