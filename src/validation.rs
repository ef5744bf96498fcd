//! Request validation.
//!
//! Field rules live in `blog_core::validation::domain`; this module decides
//! which rules and which mode apply to each request type, and adds the
//! checks that depend on the caller (a user may only act on their own
//! account).

use blog_core::validation::domain;
use blog_core::{AppError, AppResult, FieldValue, Rules};
use blog_proto::v1::*;

use crate::context::RequestContext;

/// Rule tables for user and post requests.
#[derive(Debug, Clone)]
pub struct Validator {
    users: Rules,
    posts: Rules,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        let paging = Rules::new()
            .with("offset", domain::offset)
            .with("limit", domain::limit);

        let users = Rules::new()
            .with("user_id", domain::user_id)
            .with("username", domain::username)
            .with("password", domain::password)
            .with("old_password", domain::old_password)
            .with("new_password", domain::new_password)
            .with("nickname", domain::nickname)
            .with("email", domain::email)
            .with("phone", domain::phone)
            .merge(&paging);

        let posts = Rules::new()
            .with("post_id", domain::post_id)
            .with("post_ids", post_ids)
            .with("title", domain::title)
            .with("content", domain::content)
            .merge(&paging);

        Self { users, posts }
    }

    #[inline]
    #[must_use]
    pub const fn users(&self) -> &Rules {
        &self.users
    }

    #[inline]
    #[must_use]
    pub const fn posts(&self) -> &Rules {
        &self.posts
    }
}

fn post_ids(value: FieldValue<'_>) -> AppResult<()> {
    let FieldValue::List(ids) = value else {
        return Err(AppError::field("post_ids", "post_ids must be a list"));
    };
    if ids.is_empty() {
        return Err(AppError::field("post_ids", "post_ids cannot be empty"));
    }
    if ids.iter().any(|id| id.trim().is_empty()) {
        return Err(AppError::field("post_ids", "post_ids cannot contain empty ids"));
    }
    Ok(())
}

/// Caller must be the owner of `user_id`.
fn require_self(ctx: &RequestContext, user_id: &str) -> AppResult<()> {
    let principal = ctx.require_principal()?;
    if principal.as_str() != user_id {
        return Err(AppError::PermissionDenied(
            "cannot act on another user's account".to_string(),
        ));
    }
    Ok(())
}

/// Per-request validation run by the interceptor chain after defaulting.
pub trait ValidateRequest {
    /// # Errors
    /// `FieldViolation` for a rule failure, `PermissionDenied` when the
    /// request targets another user.
    fn validate(&self, ctx: &RequestContext, validator: &Validator) -> AppResult<()>;
}

macro_rules! validate_all {
    ($($msg:ty => $rules:ident),* $(,)?) => {
        $(
            impl ValidateRequest for $msg {
                fn validate(&self, _ctx: &RequestContext, validator: &Validator) -> AppResult<()> {
                    validator.$rules().validate_all_fields(self)
                }
            }
        )*
    };
}

validate_all! {
    LoginRequest => users,
    CreateUserRequest => users,
    DeleteUserRequest => users,
    ListUserRequest => users,
    CreatePostRequest => posts,
    UpdatePostRequest => posts,
    DeletePostRequest => posts,
    GetPostRequest => posts,
}

impl ValidateRequest for HealthzRequest {
    fn validate(&self, _ctx: &RequestContext, _validator: &Validator) -> AppResult<()> {
        Ok(())
    }
}

impl ValidateRequest for RefreshTokenRequest {
    fn validate(&self, _ctx: &RequestContext, _validator: &Validator) -> AppResult<()> {
        Ok(())
    }
}

impl ValidateRequest for ChangePasswordRequest {
    fn validate(&self, ctx: &RequestContext, validator: &Validator) -> AppResult<()> {
        require_self(ctx, &self.user_id)?;
        validator.users().validate_all_fields(self)
    }
}

impl ValidateRequest for GetUserRequest {
    fn validate(&self, ctx: &RequestContext, validator: &Validator) -> AppResult<()> {
        require_self(ctx, &self.user_id)?;
        validator.users().validate_all_fields(self)
    }
}

impl ValidateRequest for UpdateUserRequest {
    fn validate(&self, ctx: &RequestContext, validator: &Validator) -> AppResult<()> {
        require_self(ctx, &self.user_id)?;
        validator.users().validate_selected_fields(
            self,
            &["user_id", "username", "nickname", "email", "phone"],
        )
    }
}

impl ValidateRequest for ListPostRequest {
    fn validate(&self, _ctx: &RequestContext, validator: &Validator) -> AppResult<()> {
        validator
            .posts()
            .validate_selected_fields(self, &["offset", "limit"])
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::context::{Principal, RequestMetadata, TransportKind};
    use crate::middleware::RequestId;

    fn ctx(principal: Option<&str>) -> RequestContext {
        let ctx = RequestContext::new(
            RequestMetadata::new(RequestId::new(), TransportKind::Rpc),
            CancellationToken::new(),
        );
        match principal {
            Some(p) => ctx.with_principal(Principal::new(p)),
            None => ctx,
        }
    }

    fn violation(err: AppError) -> String {
        match err {
            AppError::FieldViolation { field, .. } => field,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn create_user_checks_every_field() {
        let validator = Validator::new();
        let mut request = CreateUserRequest {
            username: "blogger_1".into(),
            password: "secret123".into(),
            nickname: None,
            email: "blogger@example.com".into(),
            phone: "13812345678".into(),
        };
        assert!(request.validate(&ctx(None), &validator).is_ok());

        request.phone = "123".into();
        assert_eq!(violation(request.validate(&ctx(None), &validator).unwrap_err()), "phone");
    }

    #[test]
    fn update_user_only_checks_populated_fields() {
        let validator = Validator::new();
        let request = UpdateUserRequest {
            user_id: "user-a".into(),
            nickname: Some("new name".into()),
            ..Default::default()
        };
        assert!(request.validate(&ctx(Some("user-a")), &validator).is_ok());

        let bad_email = UpdateUserRequest {
            email: Some("not-an-email".into()),
            ..request
        };
        assert_eq!(
            violation(bad_email.validate(&ctx(Some("user-a")), &validator).unwrap_err()),
            "email"
        );
    }

    #[test]
    fn user_requests_must_target_the_caller() {
        let validator = Validator::new();
        let request = GetUserRequest {
            user_id: "user-b".into(),
        };
        assert!(matches!(
            request.validate(&ctx(Some("user-a")), &validator),
            Err(AppError::PermissionDenied(_))
        ));

        let change = ChangePasswordRequest {
            user_id: "user-a".into(),
            old_password: "secret123".into(),
            new_password: "short".into(),
        };
        assert_eq!(
            violation(change.validate(&ctx(Some("user-a")), &validator).unwrap_err()),
            "new_password"
        );
    }

    #[test]
    fn paging_rules_apply_to_lists() {
        let validator = Validator::new();
        let request = ListPostRequest {
            offset: 0,
            limit: 0,
            title: None,
        };
        assert_eq!(violation(request.validate(&ctx(None), &validator).unwrap_err()), "limit");

        let users = ListUserRequest { offset: -1, limit: 10 };
        assert_eq!(violation(users.validate(&ctx(None), &validator).unwrap_err()), "offset");
    }

    #[test]
    fn delete_post_requires_ids() {
        let validator = Validator::new();
        let empty = DeletePostRequest { post_ids: vec![] };
        assert_eq!(violation(empty.validate(&ctx(None), &validator).unwrap_err()), "post_ids");

        let ok = DeletePostRequest {
            post_ids: vec!["post-000001".into()],
        };
        assert!(ok.validate(&ctx(None), &validator).is_ok());
    }
}
