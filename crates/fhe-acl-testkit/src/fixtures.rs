//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a trusted input verifier, a
//! deployed contract over a memory store, and a few named accounts.

use std::sync::Arc;

use fhe_acl::{AclConfig, HostContract, SymbolicCoprocessor};
use fhe_acl_core::{Address, ExternalInput, FheType, Keypair};
use fhe_acl_store::MemoryStore;

/// A deployed contract with a trusted verifier and three accounts.
pub struct TestFixture {
    /// The input verifier trusted by `host`.
    pub verifier: Keypair,
    /// Address of the deployed contract.
    pub contract: Address,
    pub alice: Keypair,
    pub bob: Keypair,
    pub carol: Keypair,
    pub store: Arc<MemoryStore>,
    pub host: HostContract<MemoryStore>,
}

impl TestFixture {
    /// Create a new fixture with a random verifier and contract address.
    pub fn new() -> Self {
        Self::build(Keypair::generate(), rand::random())
    }

    /// Create a deterministic fixture from a seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self::build(Keypair::from_seed(&seed), u64::from(seed[0]))
    }

    fn build(verifier: Keypair, nonce: u64) -> Self {
        let deployer = verifier.address();
        let contract = Address::for_contract(&deployer, nonce);
        let store = Arc::new(MemoryStore::new());
        let config = AclConfig::default().with_verifier(verifier.public_key());
        let host = HostContract::new(contract, Arc::clone(&store), SymbolicCoprocessor, config);

        Self {
            verifier,
            contract,
            alice: Keypair::from_seed(&[0xa1; 32]),
            bob: Keypair::from_seed(&[0xb0; 32]),
            carol: Keypair::from_seed(&[0xca; 32]),
            store,
            host,
        }
    }

    pub fn alice(&self) -> Address {
        self.alice.address()
    }

    pub fn bob(&self) -> Address {
        self.bob.address()
    }

    pub fn carol(&self) -> Address {
        self.carol.address()
    }

    /// A verifier-attested input for this contract, submitted by `account`.
    pub fn seal(&self, account: Address, ciphertext: &[u8], fhe_type: FheType, nonce: u64) -> ExternalInput {
        self.seal_for(self.contract, account, ciphertext, fhe_type, nonce)
    }

    /// A verifier-attested input bound to an arbitrary contract.
    pub fn seal_for(
        &self,
        contract: Address,
        account: Address,
        ciphertext: &[u8],
        fhe_type: FheType,
        nonce: u64,
    ) -> ExternalInput {
        ExternalInput::seal(
            &self.verifier,
            contract,
            account,
            ciphertext.to_vec(),
            fhe_type,
            nonce,
        )
    }

    /// Another contract sharing this fixture's store and verifier.
    pub fn sibling_contract(&self, nonce: u64) -> HostContract<MemoryStore> {
        let address = Address::for_contract(&self.verifier.address(), nonce);
        HostContract::new(
            address,
            Arc::clone(&self.store),
            SymbolicCoprocessor,
            self.host.config().clone(),
        )
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create multiple fixtures with distinct verifiers and contracts.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            seed[1] = 0x5e;
            TestFixture::with_seed(seed)
        })
        .collect()
}
