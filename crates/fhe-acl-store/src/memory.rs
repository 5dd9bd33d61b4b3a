//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use fhe_acl_core::{Address, Blake3Hash, Capability, CapabilitySet, Handle, HandleId, Principal};

use crate::error::{Result, StoreError};
use crate::traits::{CommitBatch, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<Address, ContractRegistry>>,
}

/// Registry of a single contract instance.
#[derive(Default)]
struct ContractRegistry {
    /// Handles in insertion order.
    handles: BTreeMap<u64, HandleId>,

    /// Handle entries indexed by id.
    entries: HashMap<HandleId, Entry>,

    /// Consumed input proofs.
    consumed: HashSet<Blake3Hash>,
}

struct Entry {
    handle: Handle,
    capabilities: CapabilitySet,
}

impl ContractRegistry {
    fn record(&mut self, handle: &Handle) {
        if self.entries.contains_key(&handle.id) {
            return;
        }
        let position = self.handles.len() as u64;
        self.handles.insert(position, handle.id);
        self.entries.insert(
            handle.id,
            Entry {
                handle: *handle,
                capabilities: CapabilitySet::empty(handle.id),
            },
        );
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<Address, ContractRegistry>>> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<Address, ContractRegistry>>> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_handle(&self, contract: &Address, id: &HandleId) -> Result<Option<Handle>> {
        let inner = self.read()?;
        Ok(inner
            .get(contract)
            .and_then(|r| r.entries.get(id))
            .map(|e| e.handle))
    }

    async fn has_handle(&self, contract: &Address, id: &HandleId) -> Result<bool> {
        let inner = self.read()?;
        Ok(inner
            .get(contract)
            .map(|r| r.entries.contains_key(id))
            .unwrap_or(false))
    }

    async fn list_handles(&self, contract: &Address) -> Result<Vec<Handle>> {
        let inner = self.read()?;
        Ok(inner
            .get(contract)
            .map(|r| {
                r.handles
                    .values()
                    .filter_map(|id| r.entries.get(id))
                    .map(|e| e.handle)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn capabilities_of(&self, contract: &Address, id: &HandleId) -> Result<CapabilitySet> {
        let inner = self.read()?;
        Ok(inner
            .get(contract)
            .and_then(|r| r.entries.get(id))
            .map(|e| e.capabilities.clone())
            .unwrap_or_else(|| CapabilitySet::empty(*id)))
    }

    async fn has_permanent(
        &self,
        contract: &Address,
        id: &HandleId,
        principal: &Principal,
    ) -> Result<bool> {
        let inner = self.read()?;
        Ok(inner
            .get(contract)
            .and_then(|r| r.entries.get(id))
            .map(|e| e.capabilities.has_permanent(principal))
            .unwrap_or(false))
    }

    async fn is_input_consumed(
        &self,
        contract: &Address,
        proof_digest: &Blake3Hash,
    ) -> Result<bool> {
        let inner = self.read()?;
        Ok(inner
            .get(contract)
            .map(|r| r.consumed.contains(proof_digest))
            .unwrap_or(false))
    }

    async fn commit(&self, contract: &Address, batch: &CommitBatch) -> Result<()> {
        let mut inner = self.write()?;
        let registry = inner.entry(*contract).or_default();

        // Validate before touching anything so a bad batch leaves no trace.
        let known = |id: &HandleId| {
            registry.entries.contains_key(id) || batch.handles.iter().any(|h| h.id == *id)
        };
        if let Some((id, _)) = batch.grants.iter().find(|(id, _)| !known(id)) {
            return Err(StoreError::InvalidData(format!(
                "grant for unknown handle {}",
                id
            )));
        }
        if let Some(id) = batch.public.iter().find(|id| !known(*id)) {
            return Err(StoreError::InvalidData(format!(
                "public flag for unknown handle {}",
                id
            )));
        }

        for handle in &batch.handles {
            registry.record(handle);
        }
        for (id, principal) in &batch.grants {
            if let Some(entry) = registry.entries.get_mut(id) {
                entry
                    .capabilities
                    .insert(Capability::permanent(*id, *principal));
            }
        }
        for id in &batch.public {
            if let Some(entry) = registry.entries.get_mut(id) {
                entry.capabilities.mark_publicly_decryptable();
            }
        }
        registry
            .consumed
            .extend(batch.consumed_inputs.iter().copied());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhe_acl_core::{CapabilityKind, FheType};

    fn contract() -> Address {
        Address::from_bytes([0xc0; 20])
    }

    fn alice() -> Principal {
        Principal::Account(Address::from_bytes([0xa1; 20]))
    }

    fn handle(byte: u8) -> Handle {
        Handle::new(HandleId::from_bytes([byte; 32]), FheType::Uint64)
    }

    #[tokio::test]
    async fn test_record_is_idempotent() {
        let store = MemoryStore::new();
        let h = handle(1);

        store
            .commit(
                &contract(),
                &CommitBatch {
                    handles: vec![h],
                    grants: vec![(h.id, alice())],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // Recording again neither duplicates nor resets
        store
            .commit(
                &contract(),
                &CommitBatch {
                    handles: vec![h],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let caps = store.capabilities_of(&contract(), &h.id).await.unwrap();
        assert_eq!(caps.kind_for(&alice()), Some(CapabilityKind::Permanent));
        assert_eq!(store.list_handles(&contract()).await.unwrap(), vec![h]);
    }

    #[tokio::test]
    async fn test_unknown_handle_has_empty_set() {
        let store = MemoryStore::new();
        let caps = store.capabilities_of(&contract(), &handle(9).id).await.unwrap();
        assert!(caps.is_empty());
        assert!(!store.has_handle(&contract(), &handle(9).id).await.unwrap());
    }

    #[tokio::test]
    async fn test_registries_are_scoped_per_contract() {
        let store = MemoryStore::new();
        let other = Address::from_bytes([0xc1; 20]);
        let h = handle(1);

        store
            .commit(
                &contract(),
                &CommitBatch {
                    handles: vec![h],
                    grants: vec![(h.id, alice())],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(store.has_permanent(&contract(), &h.id, &alice()).await.unwrap());
        assert!(!store.has_permanent(&other, &h.id, &alice()).await.unwrap());
        assert!(!store.has_handle(&other, &h.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_bad_batch_is_not_applied() {
        let store = MemoryStore::new();
        let h = handle(1);
        let digest = Blake3Hash::hash(b"proof");

        let result = store
            .commit(
                &contract(),
                &CommitBatch {
                    handles: vec![h],
                    grants: vec![(handle(2).id, alice())],
                    consumed_inputs: vec![digest],
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(StoreError::InvalidData(_))));
        assert!(!store.has_handle(&contract(), &h.id).await.unwrap());
        assert!(!store.is_input_consumed(&contract(), &digest).await.unwrap());
    }

    proptest::proptest! {
        #[test]
        fn test_committed_grants_are_all_visible(
            grants in proptest::collection::vec((0u8..4, 1u8..6), 0..16)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = MemoryStore::new();
                let handles: Vec<Handle> = (0..4).map(handle).collect();
                let grants: Vec<(HandleId, Principal)> = grants
                    .iter()
                    .map(|(h, a)| {
                        (handles[*h as usize].id, Principal::Account(Address::from_bytes([*a; 20])))
                    })
                    .collect();

                store
                    .commit(
                        &contract(),
                        &CommitBatch {
                            handles: handles.clone(),
                            grants: grants.clone(),
                            ..Default::default()
                        },
                    )
                    .await
                    .unwrap();

                for (id, principal) in &grants {
                    proptest::prop_assert!(store.has_permanent(&contract(), id, principal).await.unwrap());
                }
                let total: usize = {
                    let mut sum = 0;
                    for h in &handles {
                        sum += store.capabilities_of(&contract(), &h.id).await.unwrap().len();
                    }
                    sum
                };
                let distinct: std::collections::BTreeSet<_> = grants.iter().collect();
                proptest::prop_assert_eq!(total, distinct.len());
                Ok(())
            })?;
        }
    }
}
