//! Error types for the fhe-acl core.

use thiserror::Error;

use crate::types::Address;

/// Core errors that can occur while handling primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("unknown fhe type tag: {0}")]
    UnknownFheType(u8),

    #[error("unsupported proof version: {0}")]
    UnsupportedVersion(u64),

    #[error("malformed proof: {0}")]
    MalformedProof(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Rejection of an external input at import time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    /// The proof is malformed, forged, from an untrusted verifier, does not
    /// cover the submitted ciphertext, or was already consumed.
    #[error("invalid input proof: {0}")]
    InvalidProof(String),

    /// The proof is genuine but bound to a different (contract, account) pair.
    #[error(
        "input proof bound to contract {bound_contract} / account {bound_account}, \
         expected contract {expected_contract} / account {expected_account}"
    )]
    InvalidSigner {
        expected_contract: Address,
        expected_account: Address,
        bound_contract: Address,
        bound_account: Address,
    },
}

impl From<CoreError> for ProofError {
    fn from(e: CoreError) -> Self {
        ProofError::InvalidProof(e.to_string())
    }
}
