//! The Operation Gate.
//!
//! Every homomorphic operation, decryption request, transfer and import
//! passes through here. Each attempt walks a small state machine:
//!
//! ```text
//! Requested ──authorize──▶ Authorized ──execute──▶ Executed
//!     │
//!     └──────────────────▶ Denied
//! ```
//!
//! Authorization is read-only. Only execution touches the registry, and
//! only by recording the handles it produced.

use fhe_acl_core::{
    verify_external_input, ExternalInput, Handle, HandleId, Principal, ProofError,
};
use fhe_acl_perms::{CallContext, GrantEngine, Requirement};
use fhe_acl_store::Store;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::AclConfig;
use crate::coprocessor::{Coprocessor, FheOp};
use crate::error::{AclError, Result};

/// What a handle is being used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseKind {
    /// Homomorphic computation by the hosting contract.
    Compute,
    /// Confidential value transfer by the hosting contract.
    Transfer,
    /// Off-chain decryption by the calling account.
    Decrypt,
}

impl UseKind {
    fn requirement(self) -> Requirement {
        match self {
            UseKind::Compute | UseKind::Transfer => Requirement::Any,
            UseKind::Decrypt => Requirement::Permanent,
        }
    }
}

/// Position of a use attempt in the gate's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateState {
    Requested,
    Authorized,
    Executed,
    Denied,
}

impl GateState {
    /// Whether `next` is a legal successor.
    pub fn can_advance_to(self, next: GateState) -> bool {
        matches!(
            (self, next),
            (GateState::Requested, GateState::Authorized)
                | (GateState::Requested, GateState::Denied)
                | (GateState::Authorized, GateState::Executed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, GateState::Executed | GateState::Denied)
    }
}

/// One attempted use of one or more handles.
#[derive(Debug, Clone)]
pub struct UseAttempt {
    kind: UseKind,
    principal: Principal,
    operands: Vec<HandleId>,
    state: GateState,
}

impl UseAttempt {
    pub fn kind(&self) -> UseKind {
        self.kind
    }

    /// Who must hold the capabilities.
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn operands(&self) -> &[HandleId] {
        &self.operands
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    fn advance(&mut self, next: GateState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(AclError::InvalidOperation(format!(
                "{:?} use cannot move from {:?} to {:?}",
                self.kind, self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }
}

/// Proof of an authorized decryption, handed to the off-chain decryption
/// service together with the requester's own key material.
///
/// Never contains plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionTicket {
    pub handle: Handle,
    pub requester: Principal,
    /// Authorized through the public decryption flag rather than a grant.
    pub public: bool,
}

/// Result handles of a confidential transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    /// `amount <= from`, as an encrypted boolean.
    pub success: Handle,
    /// New sender balance. Unchanged if the transfer could not be covered.
    pub from: Handle,
    /// New recipient balance.
    pub to: Handle,
}

/// The gate for one contract's grant engine.
pub struct OperationGate<'a, S: Store> {
    engine: &'a GrantEngine<S>,
    config: &'a AclConfig,
}

impl<'a, S: Store> OperationGate<'a, S> {
    pub fn new(engine: &'a GrantEngine<S>, config: &'a AclConfig) -> Self {
        Self { engine, config }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // State Machine
    // ─────────────────────────────────────────────────────────────────────────

    /// Open an attempt. The requesting context is the hosting contract for
    /// computation and transfers, the calling account for decryption.
    pub fn request(&self, ctx: &CallContext, kind: UseKind, operands: &[HandleId]) -> UseAttempt {
        let principal = match kind {
            UseKind::Compute | UseKind::Transfer => ctx.this(),
            UseKind::Decrypt => ctx.sender(),
        };
        UseAttempt {
            kind,
            principal,
            operands: operands.to_vec(),
            state: GateState::Requested,
        }
    }

    /// `Requested → Authorized`, or `Requested → Denied`.
    pub async fn authorize(&self, ctx: &CallContext, attempt: &mut UseAttempt) -> Result<()> {
        let decision = self.decide(ctx, attempt).await;
        match decision {
            Ok(()) => {
                attempt.advance(GateState::Authorized)?;
                debug!(
                    call = %ctx.id(),
                    kind = ?attempt.kind,
                    principal = %attempt.principal,
                    operands = attempt.operands.len(),
                    "use authorized"
                );
                Ok(())
            }
            Err(e) => {
                attempt.advance(GateState::Denied)?;
                warn!(
                    call = %ctx.id(),
                    kind = ?attempt.kind,
                    principal = %attempt.principal,
                    error = %e,
                    "use denied"
                );
                Err(e)
            }
        }
    }

    async fn decide(&self, ctx: &CallContext, attempt: &UseAttempt) -> Result<()> {
        match attempt.kind {
            UseKind::Compute if attempt.operands.len() > self.config.max_operands => {
                Err(AclError::InvalidOperation(format!(
                    "{} operands exceed the limit of {}",
                    attempt.operands.len(),
                    self.config.max_operands
                )))
            }
            UseKind::Compute | UseKind::Transfer => Ok(self
                .engine
                .check_operands(
                    ctx,
                    &attempt.operands,
                    &attempt.principal,
                    attempt.kind.requirement(),
                )
                .await?),
            UseKind::Decrypt => {
                for id in &attempt.operands {
                    let set = self.engine.capabilities_of(ctx, id).await?;
                    if !set.is_publicly_decryptable() {
                        self.engine
                            .check(ctx, id, &attempt.principal, attempt.kind.requirement())
                            .await?;
                    }
                }
                Ok(())
            }
        }
    }

    /// `Authorized → Executed`: evaluate `op` and record its result.
    pub async fn execute<C: Coprocessor + ?Sized>(
        &self,
        ctx: &mut CallContext,
        attempt: &mut UseAttempt,
        coprocessor: &C,
        op: &FheOp,
    ) -> Result<Handle> {
        if attempt.state != GateState::Authorized {
            return Err(AclError::InvalidOperation(format!(
                "cannot execute a {:?} use",
                attempt.state
            )));
        }

        let operands = self.resolve(ctx, &attempt.operands).await?;
        let result = self.evaluate(ctx, coprocessor, op, &operands).await?;
        attempt.advance(GateState::Executed)?;
        Ok(result)
    }

    /// Request, authorize and execute in one step.
    pub async fn compute<C: Coprocessor + ?Sized>(
        &self,
        ctx: &mut CallContext,
        coprocessor: &C,
        op: &FheOp,
        operands: &[HandleId],
    ) -> Result<Handle> {
        let mut attempt = self.request(ctx, UseKind::Compute, operands);
        self.authorize(ctx, &mut attempt).await?;
        self.execute(ctx, &mut attempt, coprocessor, op).await
    }

    async fn resolve(&self, ctx: &CallContext, ids: &[HandleId]) -> Result<Vec<Handle>> {
        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            let handle = self
                .engine
                .get_handle(ctx, id)
                .await?
                .ok_or(AclError::UnknownHandle(*id))?;
            handles.push(handle);
        }
        Ok(handles)
    }

    async fn evaluate<C: Coprocessor + ?Sized>(
        &self,
        ctx: &mut CallContext,
        coprocessor: &C,
        op: &FheOp,
        operands: &[Handle],
    ) -> Result<Handle> {
        let result = coprocessor.evaluate(op, operands).await?;
        let ids: Vec<HandleId> = operands.iter().map(|h| h.id).collect();
        self.engine.derive_from(ctx, &ids, result).await?;
        debug!(call = %ctx.id(), op = %op, result = %result, "operation executed");
        Ok(result)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Special Paths
    // ─────────────────────────────────────────────────────────────────────────

    /// Materialize an external input as a handle.
    ///
    /// The proof must be signed by a trusted verifier and bound to exactly
    /// (this contract, calling account). The resulting handle carries no
    /// capabilities.
    pub async fn import(&self, ctx: &mut CallContext, input: &ExternalInput) -> Result<Handle> {
        let verified = verify_external_input(
            input,
            ctx.contract(),
            ctx.caller(),
            &self.config.trusted_verifiers,
        )
        .map_err(|e| {
            warn!(call = %ctx.id(), caller = %ctx.caller(), error = %e, "input rejected");
            e
        })?;

        let fresh = self.engine.consume_input(ctx, verified.proof_digest).await?;
        if !fresh && self.config.single_use_inputs {
            warn!(call = %ctx.id(), proof = %verified.proof_digest, "input proof replayed");
            return Err(ProofError::InvalidProof("input proof already consumed".into()).into());
        }

        self.engine.record_handle(ctx, verified.handle).await?;
        debug!(call = %ctx.id(), handle = %verified.handle, "input imported");
        Ok(verified.handle)
    }

    /// Authorize the calling account to decrypt a handle.
    pub async fn decrypt(&self, ctx: &CallContext, id: &HandleId) -> Result<DecryptionTicket> {
        let mut attempt = self.request(ctx, UseKind::Decrypt, &[*id]);
        self.authorize(ctx, &mut attempt).await?;

        let handle = self
            .engine
            .get_handle(ctx, id)
            .await?
            .ok_or(AclError::UnknownHandle(*id))?;
        let set = self.engine.capabilities_of(ctx, id).await?;
        attempt.advance(GateState::Executed)?;

        Ok(DecryptionTicket {
            handle,
            requester: attempt.principal,
            public: !set.has_permanent(&attempt.principal) && set.is_publicly_decryptable(),
        })
    }

    /// Move `amount` from one encrypted balance to another.
    ///
    /// The contract must hold a capability over all three handles. If the
    /// sender cannot cover the amount both balances come back unchanged in
    /// value. Every produced handle starts without capabilities.
    pub async fn transfer<C: Coprocessor + ?Sized>(
        &self,
        ctx: &mut CallContext,
        coprocessor: &C,
        amount: &HandleId,
        from: &HandleId,
        to: &HandleId,
    ) -> Result<TransferOutcome> {
        let mut attempt = self.request(ctx, UseKind::Transfer, &[*amount, *from, *to]);
        self.authorize(ctx, &mut attempt).await?;

        let resolved = self.resolve(ctx, &attempt.operands).await?;
        let (amount, from, to) = (resolved[0], resolved[1], resolved[2]);

        let success = self.evaluate(ctx, coprocessor, &FheOp::Le, &[amount, from]).await?;
        let debited = self.evaluate(ctx, coprocessor, &FheOp::Sub, &[from, amount]).await?;
        let credited = self.evaluate(ctx, coprocessor, &FheOp::Add, &[to, amount]).await?;
        let new_from = self
            .evaluate(ctx, coprocessor, &FheOp::Select, &[success, debited, from])
            .await?;
        let new_to = self
            .evaluate(ctx, coprocessor, &FheOp::Select, &[success, credited, to])
            .await?;
        attempt.advance(GateState::Executed)?;

        Ok(TransferOutcome {
            success,
            from: new_from,
            to: new_to,
        })
    }
}
