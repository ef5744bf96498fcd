//! Core library with shared types and traits for the blog services.
//!
//! - Error type with automatic Status conversion
//! - JWT signing and validation
//! - Field-rule validation and request defaulting

pub mod defaults;
pub mod error;
pub mod jwt;
pub mod validation;

pub use defaults::Defaultable;
pub use error::{AppError, AppResult, ResultExt};
pub use jwt::{JwtError, JwtValidator, DEFAULT_IDENTITY_KEY};
pub use validation::{FieldValue, Fields, Rule, Rules};
