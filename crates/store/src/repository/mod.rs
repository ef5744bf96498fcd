//! In-memory repositories.
//!
//! # Error Handling
//!
//! All repository methods return `Result<T, AppError>` where errors are:
//! - `AppError::NotFound` - Requested entity does not exist
//! - `AppError::AlreadyExists` - Unique column collision on create/update

#![allow(clippy::missing_errors_doc)]

mod policy;
mod post;
mod user;

pub use policy::PolicyRepository;
pub use post::{PostFilter, PostRepository};
pub use user::UserRepository;

/// Combined store context.
#[derive(Debug, Clone, Default)]
pub struct Store {
    pub users: UserRepository,
    pub posts: PostRepository,
    pub policies: PolicyRepository,
}

impl Store {
    /// Creates an empty store with all repositories.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
