//! Authorization stage.

use std::sync::Arc;

use blog_core::{AppError, AppResult};
use tracing::{debug, warn};

use crate::authz::AuthorizationEngine;
use crate::context::Principal;

/// Action every RPC is checked under.
pub const ACTION_CALL: &str = "CALL";

/// Asks the engine whether a principal may call a method.
///
/// Fails closed: an engine error is treated as a deny.
#[derive(Clone)]
pub struct Authorizer {
    engine: Arc<dyn AuthorizationEngine>,
}

impl Authorizer {
    pub fn new(engine: Arc<dyn AuthorizationEngine>) -> Self {
        Self { engine }
    }

    /// # Errors
    /// Returns `AppError::PermissionDenied` unless the policy allows
    /// `(principal, method, CALL)`.
    pub fn authorize(&self, principal: &Principal, method: &str) -> AppResult<()> {
        let subject = principal.as_str();
        match self.engine.authorize(subject, method, ACTION_CALL) {
            Ok(decision) if decision.allowed => {
                debug!(user_id = %subject, method, "Authorized");
                Ok(())
            }
            Ok(_) => {
                warn!(user_id = %subject, method, "Access denied");
                Err(AppError::access_denied(subject, method, ACTION_CALL))
            }
            Err(e) => {
                warn!(user_id = %subject, method, error = %e, "Authorization failed");
                Err(AppError::access_denied(subject, method, ACTION_CALL))
            }
        }
    }
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer").finish_non_exhaustive()
    }
}
