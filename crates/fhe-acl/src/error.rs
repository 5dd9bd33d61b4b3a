//! Error types for the operation gate and host contract.

use fhe_acl_core::{HandleId, ProofError};
use fhe_acl_perms::PermsError;
use fhe_acl_store::StoreError;
use thiserror::Error;

use crate::coprocessor::CoprocessorError;

/// Errors that can occur during a call.
///
/// Every error aborts the enclosing call; none are retried.
#[derive(Debug, Error)]
pub enum AclError {
    /// Grant or check failure from the grant engine.
    #[error("permission error: {0}")]
    Permission(#[from] PermsError),

    /// External input rejected.
    #[error("input rejected: {0}")]
    Proof(#[from] ProofError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The coprocessor refused the operation.
    #[error("coprocessor error: {0}")]
    Coprocessor(#[from] CoprocessorError),

    /// An operand is not registered with this contract.
    #[error("unknown handle: {0}")]
    UnknownHandle(HandleId),

    /// The call was already committed or aborted.
    #[error("call already finished")]
    CallFinished,

    /// Invalid operation.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl AclError {
    /// Whether the call was declined by capability policy.
    ///
    /// Denials are the expected outcome of a missing grant, not a fault.
    pub fn is_denial(&self) -> bool {
        matches!(self, AclError::Permission(e) if e.is_denial())
    }
}

/// Result type for gate and host operations.
pub type Result<T> = std::result::Result<T, AclError>;
