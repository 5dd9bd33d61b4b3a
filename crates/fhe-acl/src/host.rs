//! The host contract: one deployed contract instance and its calls.
//!
//! A [`HostContract`] owns the grant engine of one contract address behind
//! an async mutex, so calls against it are serialized. A [`Call`] holds the
//! lock for its whole lifetime and is the only way to reach the gate.
//!
//! Calls are all-or-nothing. The first error reverts the call: its journal
//! is discarded, its transient grants expire, and every later operation on
//! it fails with [`AclError::CallFinished`]. Dropping a call without
//! committing it reverts it the same way.

use std::sync::Arc;

use bytes::Bytes;
use fhe_acl_core::{
    Address, CapabilityKind, CapabilitySet, ExternalInput, FheType, Handle, HandleId, Principal,
};
use fhe_acl_perms::{CallContext, CallId, GrantEngine};
use fhe_acl_store::Store;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::config::AclConfig;
use crate::coprocessor::{Coprocessor, FheOp, SymbolicCoprocessor};
use crate::error::{AclError, Result};
use crate::gate::{DecryptionTicket, OperationGate, TransferOutcome};

/// A deployed contract instance.
pub struct HostContract<S: Store, C: Coprocessor = SymbolicCoprocessor> {
    address: Address,
    config: AclConfig,
    store: Arc<S>,
    coprocessor: C,
    engine: Mutex<GrantEngine<S>>,
}

impl<S: Store, C: Coprocessor> HostContract<S, C> {
    pub fn new(address: Address, store: Arc<S>, coprocessor: C, config: AclConfig) -> Self {
        let engine = GrantEngine::new(Arc::clone(&store), address);
        Self {
            address,
            config,
            store,
            coprocessor,
            engine: Mutex::new(engine),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn config(&self) -> &AclConfig {
        &self.config
    }

    /// The contract as a principal.
    pub fn principal(&self) -> Principal {
        Principal::Contract(self.address)
    }

    /// Enter the contract from `caller`. Waits for any running call.
    pub async fn begin_call(&self, caller: Address) -> Call<'_, S, C> {
        let mut engine = self.engine.lock().await;
        let ctx = engine.begin_call(caller);
        Call {
            host: self,
            id: ctx.id(),
            caller,
            engine,
            ctx: Some(ctx),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshot Queries
    //
    // These read committed state only. Transient grants never exist outside
    // a call, so they are never reported here.
    // ─────────────────────────────────────────────────────────────────────────

    /// Committed capabilities of a handle.
    pub async fn capabilities_of(&self, id: &HandleId) -> Result<CapabilitySet> {
        Ok(self.store.capabilities_of(&self.address, id).await?)
    }

    /// Whether `principal` holds a committed capability over `id`.
    pub async fn is_allowed(&self, id: &HandleId, principal: &Principal) -> Result<bool> {
        Ok(self
            .store
            .has_permanent(&self.address, id, principal)
            .await?)
    }

    /// Every handle registered with this contract.
    pub async fn handles(&self) -> Result<Vec<Handle>> {
        Ok(self.store.list_handles(&self.address).await?)
    }
}

/// One top-level call into a [`HostContract`].
pub struct Call<'h, S: Store, C: Coprocessor> {
    host: &'h HostContract<S, C>,
    id: CallId,
    caller: Address,
    engine: MutexGuard<'h, GrantEngine<S>>,
    ctx: Option<CallContext>,
}

impl<'h, S: Store, C: Coprocessor> Call<'h, S, C> {
    pub fn id(&self) -> CallId {
        self.id
    }

    /// The account that submitted the call.
    pub fn caller(&self) -> &Address {
        &self.caller
    }

    /// Whether the call can still be used.
    pub fn is_active(&self) -> bool {
        self.ctx.is_some()
    }

    fn gate(&mut self) -> Result<(OperationGate<'_, S>, &mut CallContext)> {
        let host = self.host;
        let ctx = self.ctx.as_mut().ok_or(AclError::CallFinished)?;
        Ok((OperationGate::new(&self.engine, &host.config), ctx))
    }

    /// Revert the call if `result` is an error.
    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if let Some(ctx) = self.ctx.take() {
                warn!(call = %self.id, error = %e, "call reverted");
                self.engine.abort(ctx);
            }
        }
        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Handles
    // ─────────────────────────────────────────────────────────────────────────

    /// Import an external (ciphertext, proof) pair submitted by the caller.
    pub async fn import(&mut self, input: &ExternalInput) -> Result<Handle> {
        let result = async {
            let (gate, ctx) = self.gate()?;
            gate.import(ctx, input).await
        }
        .await;
        self.settle(result)
    }

    /// Import from raw call arguments.
    pub async fn import_bytes(
        &mut self,
        ciphertext: impl Into<Bytes>,
        proof: impl Into<Bytes>,
    ) -> Result<Handle> {
        let input = ExternalInput::new(ciphertext, proof);
        self.import(&input).await
    }

    /// Evaluate a homomorphic operation as the contract.
    pub async fn compute(&mut self, op: FheOp, operands: &[HandleId]) -> Result<Handle> {
        let host = self.host;
        let result = async {
            let (gate, ctx) = self.gate()?;
            gate.compute(ctx, &host.coprocessor, &op, operands).await
        }
        .await;
        self.settle(result)
    }

    /// Encrypt a public constant (big-endian bytes).
    pub async fn trivial_encrypt(&mut self, value: &[u8], fhe_type: FheType) -> Result<Handle> {
        let op = FheOp::TrivialEncrypt {
            value: value.to_vec(),
            fhe_type,
        };
        self.compute(op, &[]).await
    }

    /// Move `amount` between two encrypted balances.
    pub async fn transfer(
        &mut self,
        amount: &HandleId,
        from: &HandleId,
        to: &HandleId,
    ) -> Result<TransferOutcome> {
        let host = self.host;
        let result = async {
            let (gate, ctx) = self.gate()?;
            gate.transfer(ctx, &host.coprocessor, amount, from, to).await
        }
        .await;
        self.settle(result)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Grants
    // ─────────────────────────────────────────────────────────────────────────

    /// Grant an account a permanent capability, as the contract.
    pub async fn allow(&mut self, id: &HandleId, account: Address) -> Result<bool> {
        let this = self.host.principal();
        self.grant(this, id, Principal::Account(account), CapabilityKind::Permanent)
            .await
    }

    /// Grant the contract itself a permanent capability.
    pub async fn allow_this(&mut self, id: &HandleId) -> Result<bool> {
        let this = self.host.principal();
        self.grant(this, id, this, CapabilityKind::Permanent).await
    }

    /// Grant a capability for the rest of this call, as the contract.
    pub async fn allow_transient(&mut self, id: &HandleId, principal: Principal) -> Result<bool> {
        let this = self.host.principal();
        self.grant(this, id, principal, CapabilityKind::Transient)
            .await
    }

    /// Grant a permanent capability as the calling account.
    ///
    /// The caller must hold a capability over the handle themselves.
    pub async fn delegate(&mut self, id: &HandleId, to: Principal) -> Result<bool> {
        let sender = Principal::Account(self.caller);
        self.grant(sender, id, to, CapabilityKind::Permanent).await
    }

    async fn grant(
        &mut self,
        grantor: Principal,
        id: &HandleId,
        grantee: Principal,
        kind: CapabilityKind,
    ) -> Result<bool> {
        let result = async {
            let engine = &*self.engine;
            let ctx = self.ctx.as_mut().ok_or(AclError::CallFinished)?;
            let granted = match kind {
                CapabilityKind::Permanent => {
                    engine.grant_permanent(ctx, &grantor, id, grantee).await?
                }
                CapabilityKind::Transient => {
                    engine.grant_transient(ctx, &grantor, id, grantee).await?
                }
            };
            Ok(granted)
        }
        .await;
        self.settle(result)
    }

    /// Flag a handle as decryptable by anyone. Requires the contract to
    /// hold a capability over it.
    pub async fn make_publicly_decryptable(&mut self, id: &HandleId) -> Result<bool> {
        let result = async {
            let engine = &*self.engine;
            let ctx = self.ctx.as_mut().ok_or(AclError::CallFinished)?;
            Ok(engine.mark_public(ctx, id).await?)
        }
        .await;
        self.settle(result)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Capabilities of a handle as seen from inside this call.
    pub async fn capabilities_of(&self, id: &HandleId) -> Result<CapabilitySet> {
        let ctx = self.ctx.as_ref().ok_or(AclError::CallFinished)?;
        Ok(self.engine.capabilities_of(ctx, id).await?)
    }

    /// Whether `principal` holds any live capability over `id`.
    pub async fn is_allowed(&self, id: &HandleId, principal: &Principal) -> Result<bool> {
        let ctx = self.ctx.as_ref().ok_or(AclError::CallFinished)?;
        Ok(self.engine.is_allowed(ctx, id, principal).await?)
    }

    /// Whether the calling account holds any live capability over `id`.
    pub async fn is_sender_allowed(&self, id: &HandleId) -> Result<bool> {
        let ctx = self.ctx.as_ref().ok_or(AclError::CallFinished)?;
        Ok(self.engine.is_allowed(ctx, id, &ctx.sender()).await?)
    }

    /// Authorize the calling account to decrypt a handle off-chain.
    pub async fn request_decryption(&mut self, id: &HandleId) -> Result<DecryptionTicket> {
        let result = async {
            let (gate, ctx) = self.gate()?;
            gate.decrypt(ctx, id).await
        }
        .await;
        self.settle(result)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Boundaries
    // ─────────────────────────────────────────────────────────────────────────

    /// Make the call's effects durable.
    pub async fn commit(mut self) -> Result<CallId> {
        let ctx = self.ctx.take().ok_or(AclError::CallFinished)?;
        Ok(self.engine.commit(ctx).await?)
    }

    /// Discard the call's effects.
    pub fn abort(mut self) -> CallId {
        if let Some(ctx) = self.ctx.take() {
            self.engine.abort(ctx);
        }
        self.id
    }
}

impl<S: Store, C: Coprocessor> Drop for Call<'_, S, C> {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            info!(call = %self.id, "call dropped without commit");
            self.engine.abort(ctx);
        }
    }
}
