//! Full method names, as seen by interceptors and the authorization engine.

/// Fully-qualified service name.
pub const SERVICE_NAME: &str = "blog.v1.BlogService";

pub const HEALTHZ: &str = "/blog.v1.BlogService/Healthz";
pub const LOGIN: &str = "/blog.v1.BlogService/Login";
pub const REFRESH_TOKEN: &str = "/blog.v1.BlogService/RefreshToken";
pub const CHANGE_PASSWORD: &str = "/blog.v1.BlogService/ChangePassword";
pub const CREATE_USER: &str = "/blog.v1.BlogService/CreateUser";
pub const UPDATE_USER: &str = "/blog.v1.BlogService/UpdateUser";
pub const DELETE_USER: &str = "/blog.v1.BlogService/DeleteUser";
pub const GET_USER: &str = "/blog.v1.BlogService/GetUser";
pub const LIST_USER: &str = "/blog.v1.BlogService/ListUser";
pub const CREATE_POST: &str = "/blog.v1.BlogService/CreatePost";
pub const UPDATE_POST: &str = "/blog.v1.BlogService/UpdatePost";
pub const DELETE_POST: &str = "/blog.v1.BlogService/DeletePost";
pub const GET_POST: &str = "/blog.v1.BlogService/GetPost";
pub const LIST_POST: &str = "/blog.v1.BlogService/ListPost";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_are_fully_qualified() {
        for method in [HEALTHZ, LOGIN, DELETE_USER, LIST_POST] {
            assert!(method.starts_with(&format!("/{SERVICE_NAME}/")));
        }
    }
}
