//! Authorization predicates.
//!
//! Every use decision in the crate funnels through [`authorize`] or
//! [`authorize_operands`]. They are pure functions over capability sets, so
//! the whole policy can be audited (and property-tested) here without a
//! store or a call in sight.

use std::fmt;

use fhe_acl_core::{CapabilityKind, CapabilitySet, Principal};

/// The capability kind a use requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requirement {
    /// Permanent or live transient. Homomorphic computation and transfers.
    Any,
    /// Permanent only. Decryption happens outside the call window, so a
    /// transient lease never suffices.
    Permanent,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Any => write!(f, "any capability"),
            Requirement::Permanent => write!(f, "a permanent capability"),
        }
    }
}

/// Decide a single handle use.
///
/// Returns the kind of capability that satisfied the requirement.
pub fn authorize(
    set: &CapabilitySet,
    principal: &Principal,
    required: Requirement,
) -> Option<CapabilityKind> {
    match required {
        Requirement::Any => set.kind_for(principal),
        Requirement::Permanent => set
            .has_permanent(principal)
            .then_some(CapabilityKind::Permanent),
    }
}

/// Decide a use over a full operand list.
///
/// A derived value is only usable because the principal holds a capability
/// on *every* operand; nothing is inherited from the others. On failure the
/// index of the first unauthorized operand is returned.
pub fn authorize_operands(
    sets: &[CapabilitySet],
    principal: &Principal,
    required: Requirement,
) -> Result<(), usize> {
    match sets
        .iter()
        .position(|set| authorize(set, principal, required).is_none())
    {
        Some(index) => Err(index),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhe_acl_core::{Address, Capability, HandleId};
    use proptest::prelude::*;

    fn contract() -> Principal {
        Principal::Contract(Address::from_bytes([0xc0; 20]))
    }

    fn set_with(byte: u8, caps: &[(Principal, CapabilityKind)]) -> CapabilitySet {
        let id = HandleId::from_bytes([byte; 32]);
        let mut set = CapabilitySet::empty(id);
        for (principal, kind) in caps {
            set.insert(Capability {
                handle: id,
                principal: *principal,
                kind: *kind,
            });
        }
        set
    }

    #[test]
    fn test_transient_satisfies_any_but_not_permanent() {
        let set = set_with(1, &[(contract(), CapabilityKind::Transient)]);

        assert_eq!(
            authorize(&set, &contract(), Requirement::Any),
            Some(CapabilityKind::Transient)
        );
        assert_eq!(authorize(&set, &contract(), Requirement::Permanent), None);
    }

    #[test]
    fn test_permanent_satisfies_both() {
        let set = set_with(1, &[(contract(), CapabilityKind::Permanent)]);

        assert_eq!(
            authorize(&set, &contract(), Requirement::Any),
            Some(CapabilityKind::Permanent)
        );
        assert_eq!(
            authorize(&set, &contract(), Requirement::Permanent),
            Some(CapabilityKind::Permanent)
        );
    }

    #[test]
    fn test_first_unauthorized_operand_is_reported() {
        let sets = vec![
            set_with(1, &[(contract(), CapabilityKind::Permanent)]),
            set_with(2, &[]),
            set_with(3, &[]),
        ];

        assert_eq!(
            authorize_operands(&sets, &contract(), Requirement::Any),
            Err(1)
        );
    }

    #[test]
    fn test_no_operands_is_vacuously_authorized() {
        assert_eq!(authorize_operands(&[], &contract(), Requirement::Any), Ok(()));
    }

    proptest! {
        #[test]
        fn prop_operands_authorized_iff_every_set_allows(
            held in proptest::collection::vec(proptest::option::of(any::<bool>()), 0..6)
        ) {
            let sets: Vec<CapabilitySet> = held
                .iter()
                .enumerate()
                .map(|(i, cap)| match cap {
                    Some(true) => set_with(i as u8, &[(contract(), CapabilityKind::Permanent)]),
                    Some(false) => set_with(i as u8, &[(contract(), CapabilityKind::Transient)]),
                    None => set_with(i as u8, &[]),
                })
                .collect();

            let any_ok = held.iter().all(|c| c.is_some());
            let permanent_ok = held.iter().all(|c| *c == Some(true));

            prop_assert_eq!(
                authorize_operands(&sets, &contract(), Requirement::Any).is_ok(),
                any_ok
            );
            prop_assert_eq!(
                authorize_operands(&sets, &contract(), Requirement::Permanent).is_ok(),
                permanent_ok
            );
        }
    }
}
