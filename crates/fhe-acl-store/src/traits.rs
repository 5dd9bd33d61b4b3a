//! Store trait: the abstract interface for the handle registry.
//!
//! This trait allows the grant engine to be storage-agnostic.
//! Implementations include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use fhe_acl_core::{Address, Blake3Hash, CapabilitySet, Handle, HandleId, Principal};

use crate::error::Result;

/// Result of recording a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordResult {
    /// The handle was new; it now has an empty capability set.
    Recorded,
    /// The handle was already known (idempotent - not an error).
    AlreadyKnown,
}

/// The durable effects of one successful call.
///
/// Applied atomically by [`Store::commit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitBatch {
    /// Handles produced during the call.
    pub handles: Vec<Handle>,
    /// Permanent grants issued during the call.
    pub grants: Vec<(HandleId, Principal)>,
    /// Handles flagged for public decryption.
    pub public: Vec<HandleId>,
    /// Input proofs consumed by imports.
    pub consumed_inputs: Vec<Blake3Hash>,
}

impl CommitBatch {
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
            && self.grants.is_empty()
            && self.public.is_empty()
            && self.consumed_inputs.is_empty()
    }
}

/// The Store trait: async interface for the handle registry.
///
/// Every method is scoped by `contract`: capabilities are never shared
/// across contract instances.
///
/// # Design Notes
///
/// - **Idempotent records**: committing a handle that is already registered
///   never resets its capability set.
/// - **Read-only lookups**: unknown handles have an empty capability set.
/// - **Monotonic**: there is no way to remove a permanent grant.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Handle Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a handle by id.
    async fn get_handle(&self, contract: &Address, id: &HandleId) -> Result<Option<Handle>>;

    /// Check if a handle is registered.
    async fn has_handle(&self, contract: &Address, id: &HandleId) -> Result<bool>;

    /// List every handle registered for a contract.
    async fn list_handles(&self, contract: &Address) -> Result<Vec<Handle>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Capability Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Committed capabilities of a handle. Empty for unknown handles.
    async fn capabilities_of(&self, contract: &Address, id: &HandleId) -> Result<CapabilitySet>;

    /// Check a single permanent grant.
    async fn has_permanent(
        &self,
        contract: &Address,
        id: &HandleId,
        principal: &Principal,
    ) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Input Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether an input proof was already consumed by this contract.
    async fn is_input_consumed(&self, contract: &Address, proof_digest: &Blake3Hash)
        -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Commit
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply a call's effects all-or-nothing.
    async fn commit(&self, contract: &Address, batch: &CommitBatch) -> Result<()>;
}
