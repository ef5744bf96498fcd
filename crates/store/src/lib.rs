//! Storage layer for the blog service.
//!
//! Provides:
//! - Repository pattern for data access via [`Store`]
//! - Record and parameter types
//! - Resource id generation (`user-xxxxxx`, `post-xxxxxx`)
//!
//! # Example
//!
//! ```ignore
//! use blog_store::{CreateUserParams, Store};
//!
//! let store = Store::new();
//! let user = store.users.create_user(params).await?;
//! let count = store.posts.count_user_posts(&user.user_id).await?;
//! ```

mod models;
mod repository;
pub mod rid;

pub use models::{
    CreateUserParams, Page, PolicyRow, Post, UpdatePostParams, UpdateUserParams, User,
};
pub use repository::{PolicyRepository, PostFilter, PostRepository, Store, UserRepository};
