//! Call scopes.
//!
//! A [`CallContext`] is the token for one top-level external call. It owns
//! everything that must not outlive the call:
//!
//! - transient grants, which are keyed by the context and vanish with it
//! - the producer rights over handles first registered during the call
//! - the journal of durable effects, committed all-or-nothing at the end
//!
//! Contexts are only minted by [`GrantEngine::begin_call`](crate::GrantEngine::begin_call).

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use fhe_acl_core::{Address, Blake3Hash, Handle, HandleId, Principal};
use fhe_acl_store::CommitBatch;

/// Sequence number of a top-level call against one contract instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallId(pub u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Durable effects pending commit.
#[derive(Debug, Default)]
pub(crate) struct Journal {
    handles: Vec<Handle>,
    known: HashSet<HandleId>,
    grants: Vec<(HandleId, Principal)>,
    granted: HashSet<(HandleId, Principal)>,
    public: Vec<HandleId>,
    consumed_inputs: Vec<Blake3Hash>,
}

impl Journal {
    pub(crate) fn record_handle(&mut self, handle: Handle) -> bool {
        if !self.known.insert(handle.id) {
            return false;
        }
        self.handles.push(handle);
        true
    }

    pub(crate) fn get_handle(&self, id: &HandleId) -> Option<Handle> {
        self.handles.iter().find(|h| h.id == *id).copied()
    }

    pub(crate) fn has_handle(&self, id: &HandleId) -> bool {
        self.known.contains(id)
    }

    pub(crate) fn grant(&mut self, id: HandleId, principal: Principal) -> bool {
        if !self.granted.insert((id, principal)) {
            return false;
        }
        self.grants.push((id, principal));
        true
    }

    pub(crate) fn grants_for<'a>(&'a self, id: &'a HandleId) -> impl Iterator<Item = Principal> + 'a {
        self.grants
            .iter()
            .filter(move |(h, _)| h == id)
            .map(|(_, p)| *p)
    }

    pub(crate) fn mark_public(&mut self, id: HandleId) -> bool {
        if self.public.contains(&id) {
            return false;
        }
        self.public.push(id);
        true
    }

    pub(crate) fn is_public(&self, id: &HandleId) -> bool {
        self.public.contains(id)
    }

    pub(crate) fn consume_input(&mut self, digest: Blake3Hash) -> bool {
        if self.consumed_inputs.contains(&digest) {
            return false;
        }
        self.consumed_inputs.push(digest);
        true
    }

    pub(crate) fn is_consumed(&self, digest: &Blake3Hash) -> bool {
        self.consumed_inputs.contains(digest)
    }

    pub(crate) fn into_batch(self) -> CommitBatch {
        CommitBatch {
            handles: self.handles,
            grants: self.grants,
            public: self.public,
            consumed_inputs: self.consumed_inputs,
        }
    }
}

/// Scope token for one top-level call.
#[derive(Debug)]
pub struct CallContext {
    id: CallId,
    contract: Address,
    caller: Address,
    transient: HashMap<HandleId, BTreeSet<Principal>>,
    pub(crate) journal: Journal,
}

/// What is left of a context once its call ends.
pub(crate) struct FinishedCall {
    pub(crate) id: CallId,
    pub(crate) transient: HashMap<HandleId, BTreeSet<Principal>>,
    pub(crate) batch: CommitBatch,
}

impl CallContext {
    pub(crate) fn new(id: CallId, contract: Address, caller: Address) -> Self {
        Self {
            id,
            contract,
            caller,
            transient: HashMap::new(),
            journal: Journal::default(),
        }
    }

    pub fn id(&self) -> CallId {
        self.id
    }

    /// The contract instance this call executes in.
    pub fn contract(&self) -> &Address {
        &self.contract
    }

    /// The account that submitted the call.
    pub fn caller(&self) -> &Address {
        &self.caller
    }

    /// The hosting contract as a principal.
    pub fn this(&self) -> Principal {
        Principal::Contract(self.contract)
    }

    /// The submitting account as a principal.
    pub fn sender(&self) -> Principal {
        Principal::Account(self.caller)
    }

    /// Whether `id` was first registered by this call.
    ///
    /// Re-deriving or re-importing a handle the registry already knows does
    /// not count.
    pub fn produced(&self, id: &HandleId) -> bool {
        self.journal.has_handle(id)
    }

    /// Principals holding a live transient grant over `id`.
    pub fn transient_holders<'a>(&'a self, id: &HandleId) -> impl Iterator<Item = &'a Principal> {
        self.transient.get(id).into_iter().flatten()
    }

    /// Number of durable effects waiting for commit.
    pub fn pending_effects(&self) -> usize {
        let j = &self.journal;
        j.handles.len() + j.grants.len() + j.public.len() + j.consumed_inputs.len()
    }

    pub(crate) fn grant_transient(&mut self, id: HandleId, principal: Principal) -> bool {
        self.transient.entry(id).or_default().insert(principal)
    }

    pub(crate) fn finish(self) -> FinishedCall {
        FinishedCall {
            id: self.id,
            transient: self.transient,
            batch: self.journal.into_batch(),
        }
    }
}
