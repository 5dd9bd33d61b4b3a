//! Error types for the grant engine.

use fhe_acl_core::{HandleId, Principal};
use fhe_acl_store::StoreError;
use thiserror::Error;

use crate::call::CallId;
use crate::policy::Requirement;

/// Errors that can occur during grant and check operations.
///
/// `Denied` and `StaleTransientGrant` are expected outcomes of policy, not
/// faults; callers abort the enclosing call on them.
#[derive(Debug, Error)]
pub enum PermsError {
    /// The grantor holds no capability over the handle.
    #[error("{grantor} holds no capability over {handle} and cannot grant one")]
    Unauthorized { handle: HandleId, grantor: Principal },

    /// Grant targeted the null principal.
    #[error("invalid principal: {0}")]
    InvalidPrincipal(Principal),

    /// A use was attempted without the required capability.
    #[error("{principal} is denied use of {handle}: requires {required}")]
    Denied {
        handle: HandleId,
        principal: Principal,
        required: Requirement,
    },

    /// A use relied on a transient grant from an earlier call.
    #[error("transient grant on {handle} for {principal} expired with call {granted_in} (now in call {current})")]
    StaleTransientGrant {
        handle: HandleId,
        principal: Principal,
        granted_in: CallId,
        current: CallId,
    },

    /// The call context is no longer the engine's active call.
    #[error("call {0} is no longer active")]
    CallClosed(CallId),

    /// Registry backend failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl PermsError {
    /// Whether this is a policy denial rather than a fault.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            PermsError::Denied { .. } | PermsError::StaleTransientGrant { .. }
        )
    }
}

/// Result type for grant engine operations.
pub type Result<T> = std::result::Result<T, PermsError>;
