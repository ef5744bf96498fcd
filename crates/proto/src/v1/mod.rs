//! `blog.v1` wire schema, generated from `proto/blog/v1/*.proto`.

#![allow(clippy::derive_partial_eq_without_eq)]

tonic::include_proto!("blog.v1");

mod fields;
pub mod methods;

pub use blog_service_client::BlogServiceClient;
pub use blog_service_server::{BlogService, BlogServiceServer};
pub use fields::DEFAULT_NICKNAME;
pub use methods::SERVICE_NAME;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_messages_speak_camel_case_json() {
        let response = ListUserResponse {
            total_count: 1,
            users: vec![User {
                user_id: "user-000000".into(),
                post_count: 2,
                ..Default::default()
            }],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["totalCount"], 1);
        assert_eq!(json["users"][0]["userId"], "user-000000");
        assert_eq!(json["users"][0]["postCount"], 2);

        let request: CreateUserRequest = serde_json::from_str(r#"{"username":"alice"}"#).unwrap();
        assert_eq!(request.username, "alice");
        assert!(request.nickname.is_none());
    }
}
