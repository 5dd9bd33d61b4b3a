//! # fhe-acl core
//!
//! Pure primitives for the encrypted-handle capability model: handles,
//! principals, capability sets, external inputs and their proofs.
//!
//! This crate contains no I/O, no storage, no async. It is pure computation
//! over identifiers and signed proof data.
//!
//! ## Key Types
//!
//! - [`HandleId`] - Content-derived identifier of one ciphertext (Blake3)
//! - [`Handle`] - A handle id plus its declared [`FheType`]
//! - [`Principal`] - The hosting contract or an external account
//! - [`CapabilitySet`] - Every capability held over one handle
//! - [`ExternalInput`] - A ciphertext with a proof bound to (contract, account)
//!
//! ## Canonicalization
//!
//! Input proofs are encoded using deterministic CBOR. See [`canonical`] module.

pub mod canonical;
pub mod capability;
pub mod crypto;
pub mod error;
pub mod input;
pub mod types;
pub mod validation;

pub use canonical::{decode_proof, encode_proof, proof_claims_bytes};
pub use capability::{Capability, CapabilityKind, CapabilitySet};
pub use crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
pub use error::{CoreError, ProofError};
pub use input::{ExternalInput, InputProof, ProofClaims, PROOF_VERSION};
pub use types::{Address, FheType, Handle, HandleId, Principal};
pub use validation::{verify_external_input, VerifiedInput};
