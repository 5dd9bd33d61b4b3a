//! # fhe-acl perms
//!
//! The Capability Grant Engine: who may be granted what, for how long, and
//! what a derived handle inherits (nothing).
//!
//! ## Overview
//!
//! Capabilities come in two kinds. Permanent grants are monotonic: once
//! issued they are reported for every later call, and there is no revoke.
//! Transient grants are leases on the current top-level call. They live
//! inside the call's [`CallContext`] and expire with it.
//!
//! Granting is delegation, not administration. The grantor must already
//! hold a capability over the handle. The one bootstrap exception is the
//! hosting contract acting on a handle it materialized in the same call.
//!
//! ## Key Types
//!
//! - [`GrantEngine`] - Grants, checks and call boundaries for one contract
//! - [`CallContext`] - Scope token for one top-level call
//! - [`Requirement`] - Which capability kind a use needs
//! - [`authorize_operands`] - The single authorization predicate
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fhe_acl_core::{Address, FheType, Handle, HandleId};
//! use fhe_acl_perms::{GrantEngine, Requirement};
//! use fhe_acl_store::MemoryStore;
//!
//! async fn example() {
//!     let contract = Address::from_bytes([1; 20]);
//!     let mut engine = GrantEngine::new(Arc::new(MemoryStore::new()), contract);
//!
//!     let mut ctx = engine.begin_call(Address::from_bytes([2; 20]));
//!     let handle = Handle::new(HandleId::from_bytes([3; 32]), FheType::Uint64);
//!     engine.record_handle(&mut ctx, handle).await.unwrap();
//!
//!     let this = ctx.this();
//!     engine.grant_permanent(&mut ctx, &this, &handle.id, this).await.unwrap();
//!     engine.check(&ctx, &handle.id, &this, Requirement::Any).await.unwrap();
//!     engine.commit(ctx).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Explicit propagation**: [`GrantEngine::derive_from`] records the
//!   result with an empty capability set
//! - **Journaled effects**: grants are buffered in the call and committed
//!   atomically; an aborted call leaves no trace
//! - **Stale leases**: a denial explained by a transient grant from an
//!   earlier call is reported as `StaleTransientGrant`

pub mod call;
pub mod engine;
pub mod error;
pub mod policy;

pub use call::{CallContext, CallId};
pub use engine::{GrantEngine, STALE_GRANT_WINDOW};
pub use error::{PermsError, Result};
pub use policy::{authorize, authorize_operands, Requirement};
