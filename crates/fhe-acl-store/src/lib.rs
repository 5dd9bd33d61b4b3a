//! # fhe-acl store
//!
//! The Handle Registry: durable storage of capability sets keyed by handle,
//! scoped per contract instance.
//!
//! ## Overview
//!
//! Registry storage sits behind the [`Store`] trait so the grant engine is
//! storage-agnostic. The primary implementation is [`SqliteStore`], with
//! [`MemoryStore`] for testing.
//!
//! Only committed state lives here: handles, permanent grants, public
//! decryption flags and consumed input proofs. Transient grants never reach
//! the store; they live and die with a call.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all registry operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`CommitBatch`] - Everything one call wants to make durable
//! - [`RecordResult`] - Result of recording a handle
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fhe_acl_store::{CommitBatch, SqliteStore, Store};
//! use fhe_acl_core::{Address, FheType, Handle, HandleId};
//!
//! async fn example() {
//!     let store = SqliteStore::open_memory().unwrap();
//!     let contract = Address::from_bytes([1; 20]);
//!     let handle = Handle::new(HandleId::from_bytes([2; 32]), FheType::Uint64);
//!
//!     let batch = CommitBatch { handles: vec![handle], ..Default::default() };
//!     store.commit(&contract, &batch).await.unwrap();
//!     let caps = store.capabilities_of(&contract, &handle.id).await.unwrap();
//!     assert!(caps.is_empty());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent records**: committing a known handle again leaves its
//!   capability set untouched
//! - **Unknown handles**: `capabilities_of` returns an empty set, never an error
//! - **Atomic commits**: a [`CommitBatch`] is applied all-or-nothing

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CommitBatch, RecordResult, Store};
