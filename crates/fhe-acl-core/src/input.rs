//! External inputs: ciphertexts submitted by callers with a binding proof.
//!
//! An input verifier (an off-chain coprocessor, out of scope here) checks the
//! ciphertext and signs a [`ProofClaims`] binding it to exactly one
//! (target contract, submitting account) pair. The proof travels as opaque
//! bytes next to the ciphertext.

use bytes::Bytes;

use crate::canonical::{encode_proof, proof_claims_bytes};
use crate::crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
use crate::types::{Address, FheType};

/// The current proof schema version.
pub const PROOF_VERSION: u8 = 0;

/// Domain tag prepended to the claims before signing.
pub const PROOF_SIGN_DOMAIN: &[u8] = b"fhe-acl-input-proof-v0:";

/// What an input verifier attests to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofClaims {
    /// Schema version (currently 0).
    pub version: u8,

    /// The contract the input may be imported into.
    pub contract: Address,

    /// The account allowed to submit the input.
    pub account: Address,

    /// Declared type of the encrypted value.
    pub fhe_type: FheType,

    /// Blake3 of the ciphertext bytes.
    pub ciphertext_digest: Blake3Hash,

    /// Verifier-chosen nonce; distinguishes otherwise identical inputs.
    pub nonce: u64,

    /// Public key of the verifier that signed these claims.
    pub verifier: Ed25519PublicKey,
}

impl ProofClaims {
    /// The message an input verifier signs.
    pub fn signed_message(&self) -> Vec<u8> {
        let mut msg = PROOF_SIGN_DOMAIN.to_vec();
        msg.extend_from_slice(&proof_claims_bytes(self));
        msg
    }
}

/// Signed claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputProof {
    pub claims: ProofClaims,
    pub signature: Ed25519Signature,
}

impl InputProof {
    /// Issue a proof as an input verifier.
    pub fn issue(
        verifier: &Keypair,
        contract: Address,
        account: Address,
        ciphertext: &[u8],
        fhe_type: FheType,
        nonce: u64,
    ) -> Self {
        let claims = ProofClaims {
            version: PROOF_VERSION,
            contract,
            account,
            fhe_type,
            ciphertext_digest: Blake3Hash::hash(ciphertext),
            nonce,
            verifier: verifier.public_key(),
        };
        let signature = verifier.sign(&claims.signed_message());
        Self { claims, signature }
    }

    /// Encode to the opaque proof bytes carried in an [`ExternalInput`].
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_proof(self)
    }

    /// Identity of this proof; consumed at most once.
    pub fn digest(&self) -> Blake3Hash {
        Blake3Hash::hash_with_domain(b"fhe-acl-proof-digest-v0:", &self.to_bytes())
    }
}

/// A (ciphertext, proof) pair as submitted in a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalInput {
    pub ciphertext: Bytes,
    pub proof: Bytes,
}

impl ExternalInput {
    pub fn new(ciphertext: impl Into<Bytes>, proof: impl Into<Bytes>) -> Self {
        Self {
            ciphertext: ciphertext.into(),
            proof: proof.into(),
        }
    }

    /// Client-side helper: have `verifier` attest `ciphertext` for
    /// (contract, account) and package the result.
    pub fn seal(
        verifier: &Keypair,
        contract: Address,
        account: Address,
        ciphertext: impl Into<Bytes>,
        fhe_type: FheType,
        nonce: u64,
    ) -> Self {
        let ciphertext = ciphertext.into();
        let proof = InputProof::issue(verifier, contract, account, &ciphertext, fhe_type, nonce);
        Self {
            ciphertext,
            proof: Bytes::from(proof.to_bytes()),
        }
    }
}
