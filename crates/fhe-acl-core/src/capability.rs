//! Capabilities and capability sets.
//!
//! A capability is a (handle, principal, kind) triple. Permanent capabilities
//! are monotonic; transient ones only live for the call that granted them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{HandleId, Principal};

/// Lifetime of a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CapabilityKind {
    /// Survives indefinitely once issued. Never implicitly revoked.
    Permanent,
    /// Valid only for the remainder of the call in which it was granted.
    Transient,
}

/// One capability record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
    pub handle: HandleId,
    pub principal: Principal,
    pub kind: CapabilityKind,
}

impl Capability {
    pub fn permanent(handle: HandleId, principal: Principal) -> Self {
        Self {
            handle,
            principal,
            kind: CapabilityKind::Permanent,
        }
    }

    pub fn transient(handle: HandleId, principal: Principal) -> Self {
        Self {
            handle,
            principal,
            kind: CapabilityKind::Transient,
        }
    }
}

/// All capabilities held over one handle.
///
/// A view, not an authority: the set itself never decides who may grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    handle: HandleId,
    permanent: BTreeSet<Principal>,
    transient: BTreeSet<Principal>,
    publicly_decryptable: bool,
}

impl CapabilitySet {
    /// An empty set for `handle`.
    pub fn empty(handle: HandleId) -> Self {
        Self {
            handle,
            permanent: BTreeSet::new(),
            transient: BTreeSet::new(),
            publicly_decryptable: false,
        }
    }

    /// The handle this set describes.
    pub fn handle(&self) -> HandleId {
        self.handle
    }

    /// Add a capability. Returns `false` if it was already held.
    ///
    /// Capabilities for other handles are ignored.
    pub fn insert(&mut self, capability: Capability) -> bool {
        if capability.handle != self.handle {
            return false;
        }
        match capability.kind {
            CapabilityKind::Permanent => self.permanent.insert(capability.principal),
            CapabilityKind::Transient => self.transient.insert(capability.principal),
        }
    }

    /// Flag the handle as decryptable by anyone.
    pub fn mark_publicly_decryptable(&mut self) -> bool {
        !std::mem::replace(&mut self.publicly_decryptable, true)
    }

    pub fn is_publicly_decryptable(&self) -> bool {
        self.publicly_decryptable
    }

    /// Strongest capability `principal` holds, if any.
    pub fn kind_for(&self, principal: &Principal) -> Option<CapabilityKind> {
        if self.permanent.contains(principal) {
            Some(CapabilityKind::Permanent)
        } else if self.transient.contains(principal) {
            Some(CapabilityKind::Transient)
        } else {
            None
        }
    }

    /// Whether `principal` holds any capability.
    pub fn allows(&self, principal: &Principal) -> bool {
        self.kind_for(principal).is_some()
    }

    /// Whether `principal` holds a permanent capability.
    pub fn has_permanent(&self, principal: &Principal) -> bool {
        self.permanent.contains(principal)
    }

    /// Whether `principal` holds a transient capability.
    pub fn has_transient(&self, principal: &Principal) -> bool {
        self.transient.contains(principal)
    }

    /// Iterate over all capability records, permanent first.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        let handle = self.handle;
        self.permanent
            .iter()
            .map(move |p| Capability::permanent(handle, *p))
            .chain(
                self.transient
                    .iter()
                    .map(move |p| Capability::transient(handle, *p)),
            )
    }

    pub fn len(&self) -> usize {
        self.permanent.len() + self.transient.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permanent.is_empty() && self.transient.is_empty() && !self.publicly_decryptable
    }
}
