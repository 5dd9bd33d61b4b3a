//! Host contract configuration.

use fhe_acl_core::Ed25519PublicKey;
use serde::{Deserialize, Serialize};

/// Configuration for a [`HostContract`](crate::HostContract).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclConfig {
    /// Input verifiers whose proof signatures are accepted.
    ///
    /// Empty means no external input can be imported.
    pub trusted_verifiers: Vec<Ed25519PublicKey>,
    /// Reject a proof that was already consumed by this contract.
    pub single_use_inputs: bool,
    /// Upper bound on operands per homomorphic operation.
    pub max_operands: usize,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            trusted_verifiers: Vec::new(),
            single_use_inputs: true,
            max_operands: 3,
        }
    }
}

impl AclConfig {
    /// Trust an additional input verifier.
    pub fn with_verifier(mut self, verifier: Ed25519PublicKey) -> Self {
        if !self.trusted_verifiers.contains(&verifier) {
            self.trusted_verifiers.push(verifier);
        }
        self
    }

    /// Accept the same input proof more than once.
    pub fn allow_input_reuse(mut self) -> Self {
        self.single_use_inputs = false;
        self
    }
}
