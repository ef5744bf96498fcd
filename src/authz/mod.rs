//! Policy-based authorization.
//!
//! Answers "may `subject` perform `action` on `object`?" from a compiled
//! [`PolicySnapshot`]. Two engines share the [`AuthorizationEngine`] seam:
//! [`StaticEngine`] holds one snapshot for the process lifetime and
//! [`ReloadingEngine`] swaps in a fresh one on a fixed period.
//!
//! Evaluation is deny-overrides with default deny.

mod engine;
mod policy;
mod source;

use thiserror::Error;

pub use engine::{ReloadingEngine, StaticEngine};
pub use policy::{parse_csv, Effect, PolicyRule, PolicySet, PolicySnapshot, RoleBinding};
pub use source::{load_policy_file, PolicySource, StaticPolicySource, StorePolicySource};

/// Outcome of an authorization query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// The rule that decided the outcome; `None` on default deny.
    pub rule: Option<PolicyRule>,
}

impl Decision {
    #[must_use]
    pub const fn allow(rule: PolicyRule) -> Self {
        Self {
            allowed: true,
            rule: Some(rule),
        }
    }

    #[must_use]
    pub const fn deny(rule: Option<PolicyRule>) -> Self {
        Self {
            allowed: false,
            rule,
        }
    }
}

/// Errors from loading or compiling policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid policy row {index}: {reason}")]
    InvalidRow { index: usize, reason: String },

    #[error("invalid policy effect {0:?}")]
    InvalidEffect(String),

    #[error("invalid object pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),

    #[error("policy source failed: {0}")]
    Source(String),
}

/// Errors from an authorization query.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthzError {
    #[error("empty subject")]
    EmptySubject,

    #[error("empty object")]
    EmptyObject,
}

/// Authorization decision point.
pub trait AuthorizationEngine: Send + Sync {
    /// Evaluate `(subject, object, action)` against the current policy.
    ///
    /// # Errors
    /// Returns [`AuthzError`] if the query itself is malformed.
    fn authorize(&self, subject: &str, object: &str, action: &str) -> Result<Decision, AuthzError>;
}

fn check_query(subject: &str, object: &str) -> Result<(), AuthzError> {
    if subject.is_empty() {
        return Err(AuthzError::EmptySubject);
    }
    if object.is_empty() {
        return Err(AuthzError::EmptyObject);
    }
    Ok(())
}
