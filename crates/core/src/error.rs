//! Structured error handling for the blog gRPC service.
//!
//! Every stage of the request pipeline and every business handler reports
//! failures as [`AppError`]; the conversion to `tonic::Status` is the single
//! place where error classes become wire codes. Internal details are logged
//! but never exposed to clients.

use std::fmt::Display;

use thiserror::Error;
use tonic::Status;
use tonic_types::{ErrorDetails, StatusExt as _};
use tracing::error;

/// Application error type with automatic Status conversion.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A single field failed validation; carried as a `BadRequest` detail.
    #[error("Invalid argument: {field}: {description}")]
    FieldViolation { field: String, description: String },

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Internal: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a not found error for an entity.
    pub fn not_found(entity: &str, id: impl Display) -> Self {
        Self::NotFound(format!("{entity} not found: {id}"))
    }

    /// Create an already-exists error for duplicate data.
    #[must_use]
    pub fn already_exists(entity: &str, field: &str) -> Self {
        Self::AlreadyExists(format!("{entity} with this {field} already exists"))
    }

    /// Create a field violation error.
    pub fn field(field: impl Into<String>, description: impl Into<String>) -> Self {
        Self::FieldViolation {
            field: field.into(),
            description: description.into(),
        }
    }

    /// Authorization failure for a `(subject, object, action)` request.
    ///
    /// The matched rule is intentionally absent from the message.
    pub fn access_denied(subject: &str, object: &str, action: &str) -> Self {
        Self::PermissionDenied(format!(
            "access denied: subject={subject}, object={object}, action={action}"
        ))
    }

    /// gRPC code this error maps to.
    #[must_use]
    pub const fn code(&self) -> tonic::Code {
        match self {
            Self::NotFound(_) => tonic::Code::NotFound,
            Self::Unauthenticated(_) => tonic::Code::Unauthenticated,
            Self::PermissionDenied(_) => tonic::Code::PermissionDenied,
            Self::InvalidArgument(_) | Self::FieldViolation { .. } => tonic::Code::InvalidArgument,
            Self::AlreadyExists(_) => tonic::Code::AlreadyExists,
            Self::Unavailable(_) => tonic::Code::Unavailable,
            Self::Internal(_) => tonic::Code::Internal,
        }
    }
}

impl From<AppError> for Status {
    fn from(error: AppError) -> Self {
        match error {
            AppError::NotFound(msg) => Status::not_found(msg),
            AppError::Unauthenticated(msg) => Status::unauthenticated(msg),
            AppError::PermissionDenied(msg) => Status::permission_denied(msg),
            AppError::InvalidArgument(msg) => Status::invalid_argument(msg),
            AppError::FieldViolation { field, description } => {
                let details = ErrorDetails::with_bad_request_violation(&field, &description);
                Status::with_error_details(tonic::Code::InvalidArgument, description, details)
            }
            AppError::AlreadyExists(msg) => Status::already_exists(msg),
            AppError::Unavailable(msg) => Status::unavailable(msg),
            AppError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                Status::internal("Internal server error")
            }
        }
    }
}

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

/// Extension trait for converting foreign errors into internal errors with logging.
pub trait ResultExt<T> {
    /// Convert the error into `AppError::Internal`, logging the original cause.
    ///
    /// # Errors
    /// Returns `AppError::Internal` carrying `msg`.
    fn internal(self, msg: &'static str) -> AppResult<T>;
}

impl<T, E: Display> ResultExt<T> for Result<T, E> {
    fn internal(self, msg: &'static str) -> AppResult<T> {
        self.map_err(|e| {
            error!(error = %e, "{msg}");
            AppError::Internal(msg.to_string())
        })
    }
}
