//! The capability grant engine.
//!
//! The engine is the only writer of the handle registry. It combines three
//! layers into one view of a handle's capabilities:
//!
//! 1. committed state from the [`Store`]
//! 2. the current call's journal (grants and flags not yet committed)
//! 3. the current call's live transient grants
//!
//! Layer 3 is never written anywhere durable. When a call ends, its
//! transient grants are moved into an expiry ledger that exists only to
//! explain later denials.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use fhe_acl_core::{
    Address, Blake3Hash, Capability, CapabilityKind, CapabilitySet, Handle, HandleId, Principal,
};
use fhe_acl_store::{RecordResult, Store};
use tracing::{debug, info, warn};

use crate::call::{CallContext, CallId, FinishedCall};
use crate::error::{PermsError, Result};
use crate::policy::{self, Requirement};

/// How many finished calls' transient grants are remembered for stale-use
/// reporting. Older ones fall back to a plain denial.
pub const STALE_GRANT_WINDOW: u64 = 64;

/// Grant engine for one contract instance.
pub struct GrantEngine<S: Store> {
    store: Arc<S>,
    contract: Address,
    next_call: u64,
    current: Option<CallId>,
    /// Transient grants from the last [`STALE_GRANT_WINDOW`] finished
    /// calls, by the call that issued them.
    expired: HashMap<(HandleId, Principal), CallId>,
}

impl<S: Store> GrantEngine<S> {
    pub fn new(store: Arc<S>, contract: Address) -> Self {
        Self {
            store,
            contract,
            next_call: 1,
            current: None,
            expired: HashMap::new(),
        }
    }

    pub fn contract(&self) -> &Address {
        &self.contract
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The active call, if any.
    pub fn current_call(&self) -> Option<CallId> {
        self.current
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Call Boundaries
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a new top-level call.
    ///
    /// Any context from an earlier call that is still alive stops being
    /// accepted: its transient grants read as absent from here on.
    pub fn begin_call(&mut self, caller: Address) -> CallContext {
        let id = CallId(self.next_call);
        self.next_call += 1;
        if let Some(previous) = self.current.replace(id) {
            warn!(previous = %previous, call = %id, "call started before previous one ended");
        }
        debug!(contract = %self.contract, call = %id, caller = %caller, "call started");
        CallContext::new(id, self.contract, caller)
    }

    /// Commit the call's journal atomically and expire its transient grants.
    ///
    /// Transient grants expire whether or not the commit succeeds.
    pub async fn commit(&mut self, ctx: CallContext) -> Result<CallId> {
        self.ensure_live(&ctx)?;
        let FinishedCall {
            id,
            transient,
            batch,
        } = ctx.finish();

        let result = self.store.commit(&self.contract, &batch).await;
        self.end_call(id, transient);

        match result {
            Ok(()) => {
                // A pair that is now held permanently can no longer go stale.
                for pair in &batch.grants {
                    self.expired.remove(pair);
                }
                info!(
                    contract = %self.contract,
                    call = %id,
                    handles = batch.handles.len(),
                    grants = batch.grants.len(),
                    "call committed"
                );
                Ok(id)
            }
            Err(e) => {
                warn!(contract = %self.contract, call = %id, error = %e, "commit failed");
                Err(e.into())
            }
        }
    }

    /// Discard the call's journal and expire its transient grants.
    pub fn abort(&mut self, ctx: CallContext) -> CallId {
        let live = self.current == Some(ctx.id());
        let FinishedCall { id, transient, batch } = ctx.finish();
        if live {
            self.end_call(id, transient);
        }
        info!(
            contract = %self.contract,
            call = %id,
            discarded = batch.handles.len() + batch.grants.len(),
            "call aborted"
        );
        id
    }

    fn end_call(&mut self, id: CallId, transient: HashMap<HandleId, BTreeSet<Principal>>) {
        for (handle, principals) in transient {
            for principal in principals {
                self.expired.insert((handle, principal), id);
            }
        }
        self.expired
            .retain(|_, granted_in| id.0.saturating_sub(granted_in.0) < STALE_GRANT_WINDOW);
        if self.current == Some(id) {
            self.current = None;
        }
    }

    fn is_live(&self, ctx: &CallContext) -> bool {
        self.current == Some(ctx.id()) && *ctx.contract() == self.contract
    }

    fn ensure_live(&self, ctx: &CallContext) -> Result<()> {
        if self.is_live(ctx) {
            Ok(())
        } else {
            Err(PermsError::CallClosed(ctx.id()))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registry Access
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a handle produced in this call with an empty capability set.
    ///
    /// Idempotent. Only a first registration makes the call the handle's
    /// producer, which lets the hosting contract issue the first grants on
    /// it. A handle that is already known keeps its capability set and
    /// confers nothing.
    pub async fn record_handle(
        &self,
        ctx: &mut CallContext,
        handle: Handle,
    ) -> Result<RecordResult> {
        self.ensure_live(ctx)?;

        if ctx.journal.has_handle(&handle.id)
            || self.store.has_handle(&self.contract, &handle.id).await?
        {
            return Ok(RecordResult::AlreadyKnown);
        }

        ctx.journal.record_handle(handle);
        debug!(call = %ctx.id(), handle = %handle.id, fhe_type = %handle.fhe_type, "handle recorded");
        Ok(RecordResult::Recorded)
    }

    /// Record the result of a homomorphic operation.
    ///
    /// The result receives no capabilities from its operands. Whoever needs
    /// it must be granted explicitly.
    pub async fn derive_from(
        &self,
        ctx: &mut CallContext,
        operands: &[HandleId],
        result: Handle,
    ) -> Result<RecordResult> {
        let recorded = self.record_handle(ctx, result).await?;
        debug!(
            call = %ctx.id(),
            result = %result.id,
            operands = operands.len(),
            "derived handle starts without capabilities"
        );
        Ok(recorded)
    }

    /// Look a handle up, including ones recorded earlier in this call.
    pub async fn get_handle(&self, ctx: &CallContext, id: &HandleId) -> Result<Option<Handle>> {
        if let Some(handle) = ctx.journal.get_handle(id) {
            return Ok(Some(handle));
        }
        Ok(self.store.get_handle(&self.contract, id).await?)
    }

    /// Mark an input proof as consumed. Returns `false` if it already was.
    pub async fn consume_input(&self, ctx: &mut CallContext, digest: Blake3Hash) -> Result<bool> {
        self.ensure_live(ctx)?;
        if ctx.journal.is_consumed(&digest)
            || self.store.is_input_consumed(&self.contract, &digest).await?
        {
            return Ok(false);
        }
        Ok(ctx.journal.consume_input(digest))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Capabilities of a handle as seen from inside `ctx`.
    ///
    /// Transient grants are only reported while `ctx` is the active call.
    pub async fn capabilities_of(&self, ctx: &CallContext, id: &HandleId) -> Result<CapabilitySet> {
        let mut set = self.store.capabilities_of(&self.contract, id).await?;

        for principal in ctx.journal.grants_for(id) {
            set.insert(Capability::permanent(*id, principal));
        }
        if ctx.journal.is_public(id) {
            set.mark_publicly_decryptable();
        }
        if self.is_live(ctx) {
            for principal in ctx.transient_holders(id) {
                set.insert(Capability::transient(*id, *principal));
            }
        }

        Ok(set)
    }

    /// Committed capabilities, outside any call.
    pub async fn committed_capabilities(&self, id: &HandleId) -> Result<CapabilitySet> {
        Ok(self.store.capabilities_of(&self.contract, id).await?)
    }

    /// Whether `principal` currently holds any capability over `id`.
    pub async fn is_allowed(
        &self,
        ctx: &CallContext,
        id: &HandleId,
        principal: &Principal,
    ) -> Result<bool> {
        Ok(self.capabilities_of(ctx, id).await?.allows(principal))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Checks
    // ─────────────────────────────────────────────────────────────────────────

    /// Check one handle use.
    pub async fn check(
        &self,
        ctx: &CallContext,
        id: &HandleId,
        principal: &Principal,
        required: Requirement,
    ) -> Result<CapabilityKind> {
        self.ensure_live(ctx)?;
        let set = self.capabilities_of(ctx, id).await?;
        policy::authorize(&set, principal, required)
            .ok_or_else(|| self.denial(ctx, id, principal, required))
    }

    /// Check a use over every operand at once.
    pub async fn check_operands(
        &self,
        ctx: &CallContext,
        operands: &[HandleId],
        principal: &Principal,
        required: Requirement,
    ) -> Result<()> {
        self.ensure_live(ctx)?;
        let mut sets = Vec::with_capacity(operands.len());
        for id in operands {
            sets.push(self.capabilities_of(ctx, id).await?);
        }
        policy::authorize_operands(&sets, principal, required)
            .map_err(|index| self.denial(ctx, &operands[index], principal, required))
    }

    fn denial(
        &self,
        ctx: &CallContext,
        id: &HandleId,
        principal: &Principal,
        required: Requirement,
    ) -> PermsError {
        if required == Requirement::Any {
            if let Some(&granted_in) = self.expired.get(&(*id, *principal)) {
                debug!(
                    call = %ctx.id(),
                    handle = %id,
                    principal = %principal,
                    granted_in = %granted_in,
                    "use relied on an expired transient grant"
                );
                return PermsError::StaleTransientGrant {
                    handle: *id,
                    principal: *principal,
                    granted_in,
                    current: ctx.id(),
                };
            }
        }

        debug!(
            call = %ctx.id(),
            handle = %id,
            principal = %principal,
            required = %required,
            "use denied"
        );
        PermsError::Denied {
            handle: *id,
            principal: *principal,
            required,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Grants
    // ─────────────────────────────────────────────────────────────────────────

    /// Grant `grantee` a permanent capability over `id`.
    ///
    /// Returns `false` when the grantee already held one.
    pub async fn grant_permanent(
        &self,
        ctx: &mut CallContext,
        grantor: &Principal,
        id: &HandleId,
        grantee: Principal,
    ) -> Result<bool> {
        let set = self.prepare_grant(ctx, grantor, id, &grantee).await?;
        if set.has_permanent(&grantee) {
            return Ok(false);
        }

        ctx.journal.grant(*id, grantee);
        debug!(
            call = %ctx.id(),
            handle = %id,
            grantor = %grantor,
            grantee = %grantee,
            "permanent grant"
        );
        Ok(true)
    }

    /// Grant `grantee` a capability over `id` for the rest of this call.
    ///
    /// Returns `false` when the grantee already held any capability.
    pub async fn grant_transient(
        &self,
        ctx: &mut CallContext,
        grantor: &Principal,
        id: &HandleId,
        grantee: Principal,
    ) -> Result<bool> {
        let set = self.prepare_grant(ctx, grantor, id, &grantee).await?;
        if set.allows(&grantee) {
            return Ok(false);
        }

        ctx.grant_transient(*id, grantee);
        debug!(
            call = %ctx.id(),
            handle = %id,
            grantor = %grantor,
            grantee = %grantee,
            "transient grant"
        );
        Ok(true)
    }

    /// Validate a grant and return the handle's current capabilities.
    async fn prepare_grant(
        &self,
        ctx: &CallContext,
        grantor: &Principal,
        id: &HandleId,
        grantee: &Principal,
    ) -> Result<CapabilitySet> {
        self.ensure_live(ctx)?;
        if grantee.is_null() {
            return Err(PermsError::InvalidPrincipal(*grantee));
        }

        let set = self.capabilities_of(ctx, id).await?;
        let producer = *grantor == ctx.this() && ctx.produced(id);
        if !producer && !set.allows(grantor) {
            warn!(call = %ctx.id(), handle = %id, grantor = %grantor, "grant without capability");
            return Err(PermsError::Unauthorized {
                handle: *id,
                grantor: *grantor,
            });
        }

        Ok(set)
    }

    /// Flag a handle as decryptable by anyone. Monotonic.
    ///
    /// The hosting contract must hold a capability over the handle.
    pub async fn mark_public(&self, ctx: &mut CallContext, id: &HandleId) -> Result<bool> {
        let this = ctx.this();
        self.check(ctx, id, &this, Requirement::Any).await?;

        let set = self.capabilities_of(ctx, id).await?;
        if set.is_publicly_decryptable() {
            return Ok(false);
        }
        ctx.journal.mark_public(*id);
        debug!(call = %ctx.id(), handle = %id, "handle made publicly decryptable");
        Ok(true)
    }
}
