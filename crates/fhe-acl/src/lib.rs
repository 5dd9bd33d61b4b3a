//! # fhe-acl
//!
//! Capability model for encrypted value handles on an FHE-enabled contract
//! platform: who may compute on, decrypt, or transiently use a ciphertext
//! handle, and how those rights flow (or don't) to derived values.
//!
//! ## Overview
//!
//! Three layers, in dependency order:
//!
//! - **Handle Registry** ([`store`]): capability sets per handle, scoped per
//!   contract instance
//! - **Grant Engine** ([`perms`]): permanent and transient grants, call
//!   boundaries, explicit-only propagation
//! - **Operation Gate** ([`gate`]): the single choke point for compute,
//!   decrypt, transfer and import
//!
//! [`HostContract`] ties them together for one deployed contract, and
//! [`Call`] is one top-level transaction against it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fhe_acl::{AclConfig, FheOp, HostContract, SymbolicCoprocessor};
//! use fhe_acl::core::{Address, ExternalInput, FheType, Keypair};
//! use fhe_acl::store::SqliteStore;
//!
//! async fn example() {
//!     let verifier = Keypair::generate();
//!     let contract = Address::from_bytes([1; 20]);
//!     let alice = Address::from_bytes([2; 20]);
//!
//!     let host = HostContract::new(
//!         contract,
//!         Arc::new(SqliteStore::open("registry.db").unwrap()),
//!         SymbolicCoprocessor,
//!         AclConfig::default().with_verifier(verifier.public_key()),
//!     );
//!
//!     // Client side: encrypt and obtain a proof bound to (contract, alice)
//!     let input = ExternalInput::seal(&verifier, contract, alice, vec![0u8; 32], FheType::Uint64, 1);
//!
//!     let mut call = host.begin_call(alice).await;
//!     let amount = call.import(&input).await.unwrap();
//!     call.allow_this(&amount.id).await.unwrap();
//!     call.allow(&amount.id, alice).await.unwrap();
//!
//!     let doubled = call.compute(FheOp::Add, &[amount.id, amount.id]).await.unwrap();
//!     call.allow_this(&doubled.id).await.unwrap();
//!     call.commit().await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `fhe_acl::core` - Handles, principals, capabilities, input proofs
//! - `fhe_acl::store` - Registry storage abstraction and SQLite
//! - `fhe_acl::perms` - Grant engine and call scopes

pub mod config;
pub mod coprocessor;
pub mod error;
pub mod gate;
pub mod host;

// Re-export component crates
pub use fhe_acl_core as core;
pub use fhe_acl_perms as perms;
pub use fhe_acl_store as store;

// Re-export main types for convenience
pub use config::AclConfig;
pub use coprocessor::{Coprocessor, CoprocessorError, FheOp, SymbolicCoprocessor};
pub use error::{AclError, Result};
pub use gate::{DecryptionTicket, GateState, OperationGate, TransferOutcome, UseAttempt, UseKind};
pub use host::{Call, HostContract};

// Re-export commonly used core types
pub use fhe_acl_core::{
    Address, Capability, CapabilityKind, CapabilitySet, ExternalInput, FheType, Handle, HandleId,
    Principal,
};
pub use fhe_acl_perms::{CallId, PermsError, Requirement};
