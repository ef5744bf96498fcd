//! Field access and defaulting for request messages.

use blog_core::{Defaultable, FieldValue, Fields};

use super::*;

/// Nickname assigned when a user registers without one.
pub const DEFAULT_NICKNAME: &str = "blogger";

macro_rules! field_value {
    (str, $e:expr) => {
        Some(FieldValue::Str(&$e))
    };
    (opt, $e:expr) => {
        $e.as_deref().map(FieldValue::Str)
    };
    (int, $e:expr) => {
        Some(FieldValue::Int($e))
    };
    (list, $e:expr) => {
        Some(FieldValue::List(&$e))
    };
}

macro_rules! impl_fields {
    ($($msg:ty { $($name:literal: $kind:ident $field:ident),* $(,)? })*) => {
        $(
            impl Fields for $msg {
                fn field_names(&self) -> &'static [&'static str] {
                    &[$($name),*]
                }

                #[allow(unused_variables)]
                fn field(&self, name: &str) -> Option<FieldValue<'_>> {
                    match name {
                        $($name => field_value!($kind, self.$field),)*
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_fields! {
    HealthzRequest {}
    LoginRequest {
        "username": str username,
        "password": str password,
    }
    RefreshTokenRequest {}
    ChangePasswordRequest {
        "user_id": str user_id,
        "old_password": str old_password,
        "new_password": str new_password,
    }
    CreateUserRequest {
        "username": str username,
        "password": str password,
        "nickname": opt nickname,
        "email": str email,
        "phone": str phone,
    }
    UpdateUserRequest {
        "user_id": str user_id,
        "username": opt username,
        "nickname": opt nickname,
        "email": opt email,
        "phone": opt phone,
    }
    DeleteUserRequest {
        "user_id": str user_id,
    }
    GetUserRequest {
        "user_id": str user_id,
    }
    ListUserRequest {
        "offset": int offset,
        "limit": int limit,
    }
    CreatePostRequest {
        "title": str title,
        "content": str content,
    }
    UpdatePostRequest {
        "post_id": str post_id,
        "title": opt title,
        "content": opt content,
    }
    DeletePostRequest {
        "post_ids": list post_ids,
    }
    GetPostRequest {
        "post_id": str post_id,
    }
    ListPostRequest {
        "offset": int offset,
        "limit": int limit,
        "title": opt title,
    }
}

impl Defaultable for CreateUserRequest {
    fn apply_defaults(&mut self) {
        if self.nickname.is_none() {
            self.nickname = Some(DEFAULT_NICKNAME.to_string());
        }
    }
}

impl Defaultable for ListUserRequest {}
impl Defaultable for ListPostRequest {}
impl Defaultable for HealthzRequest {}
impl Defaultable for LoginRequest {}
impl Defaultable for RefreshTokenRequest {}
impl Defaultable for ChangePasswordRequest {}
impl Defaultable for UpdateUserRequest {}
impl Defaultable for DeleteUserRequest {}
impl Defaultable for GetUserRequest {}
impl Defaultable for CreatePostRequest {}
impl Defaultable for UpdatePostRequest {}
impl Defaultable for DeletePostRequest {}
impl Defaultable for GetPostRequest {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_nickname_defaults_when_unset() {
        let mut request = CreateUserRequest {
            username: "blogger1".into(),
            ..Default::default()
        };
        request.apply_defaults();
        assert_eq!(request.nickname.as_deref(), Some(DEFAULT_NICKNAME));

        let mut named = CreateUserRequest {
            nickname: Some("kept".into()),
            ..Default::default()
        };
        named.apply_defaults();
        assert_eq!(named.nickname.as_deref(), Some("kept"));
    }

    #[test]
    fn unset_optionals_report_no_value() {
        let request = UpdateUserRequest {
            user_id: "user-abcdef".into(),
            email: Some("a@b.io".into()),
            ..Default::default()
        };
        assert_eq!(request.field("user_id"), Some(FieldValue::Str("user-abcdef")));
        assert_eq!(request.field("email"), Some(FieldValue::Str("a@b.io")));
        assert_eq!(request.field("nickname"), None);
        assert_eq!(request.field("unknown"), None);
    }

    #[test]
    fn field_names_follow_declaration_order() {
        let request = ListPostRequest::default();
        assert_eq!(request.field_names(), &["offset", "limit", "title"]);
        assert!(HealthzRequest::default().field_names().is_empty());
    }
}
