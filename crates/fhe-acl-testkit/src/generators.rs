//! Proptest generators for property-based testing.

use proptest::prelude::*;

use fhe_acl_core::{Address, Blake3Hash, FheType, Handle, HandleId, Keypair, Principal};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a non-null address.
pub fn address() -> impl Strategy<Value = Address> {
    any::<[u8; 20]>()
        .prop_filter("null address", |bytes| bytes.iter().any(|b| *b != 0))
        .prop_map(Address::from_bytes)
}

/// Generate a non-null principal of either kind.
pub fn principal() -> impl Strategy<Value = Principal> {
    prop_oneof![
        address().prop_map(Principal::Contract),
        address().prop_map(Principal::Account),
    ]
}

/// Generate a random HandleId.
pub fn handle_id() -> impl Strategy<Value = HandleId> {
    any::<[u8; 32]>().prop_map(HandleId::from_bytes)
}

/// Generate a random Blake3Hash.
pub fn blake3_hash() -> impl Strategy<Value = Blake3Hash> {
    any::<[u8; 32]>().prop_map(Blake3Hash)
}

/// Generate an FheType.
pub fn fhe_type() -> impl Strategy<Value = FheType> {
    prop_oneof![
        Just(FheType::Bool),
        Just(FheType::Uint8),
        Just(FheType::Uint16),
        Just(FheType::Uint32),
        Just(FheType::Uint64),
        Just(FheType::Uint128),
        Just(FheType::Address),
        Just(FheType::Uint256),
    ]
}

/// Generate a handle.
pub fn handle() -> impl Strategy<Value = Handle> {
    (handle_id(), fhe_type()).prop_map(|(id, t)| Handle::new(id, t))
}

/// Generate ciphertext bytes of specified max length.
pub fn ciphertext(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..=max_len)
}

/// One grant made by the contract inside a scripted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantStep {
    /// Permanently grant account `account` on handle `handle`.
    Permanent { handle: usize, account: usize },
    /// Transiently grant account `account` on handle `handle`.
    Transient { handle: usize, account: usize },
}

/// A sequence of calls, each a list of grants over a fixed pool of
/// handles and accounts.
///
/// Indices are into pools of [`CallScript::HANDLES`] handles and
/// [`CallScript::ACCOUNTS`] accounts that the test sets up itself.
#[derive(Debug, Clone)]
pub struct CallScript {
    pub calls: Vec<Vec<GrantStep>>,
}

impl CallScript {
    pub const HANDLES: usize = 4;
    pub const ACCOUNTS: usize = 3;
}

/// Generate one grant step.
pub fn grant_step() -> impl Strategy<Value = GrantStep> {
    (any::<bool>(), 0..CallScript::HANDLES, 0..CallScript::ACCOUNTS).prop_map(
        |(permanent, handle, account)| {
            if permanent {
                GrantStep::Permanent { handle, account }
            } else {
                GrantStep::Transient { handle, account }
            }
        },
    )
}

impl Arbitrary for CallScript {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop::collection::vec(prop::collection::vec(grant_step(), 0..6), 1..6)
            .prop_map(|calls| CallScript { calls })
            .boxed()
    }
}
