//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use fhe_acl_core::{
    Address, Blake3Hash, Capability, CapabilitySet, FheType, Handle, HandleId, Principal,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{CommitBatch, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn handle_from_parts(id: Vec<u8>, tag: u8) -> Result<Handle> {
    let id = HandleId::try_from(id.as_slice())
        .map_err(|_| StoreError::InvalidData("handle_id is not 32 bytes".into()))?;
    let fhe_type =
        FheType::from_u8(tag).map_err(|e| StoreError::InvalidData(e.to_string()))?;
    Ok(Handle::new(id, fhe_type))
}

fn principal_from_parts(tag: u8, address: Vec<u8>) -> Result<Principal> {
    let address: [u8; 20] = address
        .try_into()
        .map_err(|_| StoreError::InvalidData("principal is not 20 bytes".into()))?;
    Principal::from_tag(tag, Address(address))
        .ok_or_else(|| StoreError::InvalidData(format!("unknown principal kind {}", tag)))
}

fn handle_exists(conn: &Connection, contract: &Address, id: &HandleId) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM handles WHERE contract = ?1 AND handle_id = ?2)",
        params![contract.0.as_slice(), id.0.as_slice()],
        |row| row.get(0),
    )?)
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_handle(&self, contract: &Address, id: &HandleId) -> Result<Option<Handle>> {
        let contract = *contract;
        let id = *id;

        self.blocking(move |conn| {
            let row: Option<(Vec<u8>, u8)> = conn
                .query_row(
                    "SELECT handle_id, fhe_type FROM handles
                     WHERE contract = ?1 AND handle_id = ?2",
                    params![contract.0.as_slice(), id.0.as_slice()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            row.map(|(id, tag)| handle_from_parts(id, tag)).transpose()
        })
        .await
    }

    async fn has_handle(&self, contract: &Address, id: &HandleId) -> Result<bool> {
        let contract = *contract;
        let id = *id;

        self.blocking(move |conn| handle_exists(conn, &contract, &id))
            .await
    }

    async fn list_handles(&self, contract: &Address) -> Result<Vec<Handle>> {
        let contract = *contract;

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT handle_id, fhe_type FROM handles
                 WHERE contract = ?1 ORDER BY recorded_at, rowid",
            )?;

            let rows = stmt
                .query_map(params![contract.0.as_slice()], |row| {
                    Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, u8>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(id, tag)| handle_from_parts(id, tag))
                .collect()
        })
        .await
    }

    async fn capabilities_of(&self, contract: &Address, id: &HandleId) -> Result<CapabilitySet> {
        let contract = *contract;
        let id = *id;

        self.blocking(move |conn| {
            let mut set = CapabilitySet::empty(id);

            let public: Option<bool> = conn
                .query_row(
                    "SELECT public_decrypt FROM handles WHERE contract = ?1 AND handle_id = ?2",
                    params![contract.0.as_slice(), id.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            if public.unwrap_or(false) {
                set.mark_publicly_decryptable();
            }

            let mut stmt = conn.prepare(
                "SELECT principal_kind, principal FROM grants
                 WHERE contract = ?1 AND handle_id = ?2",
            )?;
            let rows = stmt
                .query_map(params![contract.0.as_slice(), id.0.as_slice()], |row| {
                    Ok((row.get::<_, u8>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            for (tag, address) in rows {
                set.insert(Capability::permanent(id, principal_from_parts(tag, address)?));
            }

            Ok(set)
        })
        .await
    }

    async fn has_permanent(
        &self,
        contract: &Address,
        id: &HandleId,
        principal: &Principal,
    ) -> Result<bool> {
        let contract = *contract;
        let id = *id;
        let principal = *principal;

        self.blocking(move |conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM grants
                 WHERE contract = ?1 AND handle_id = ?2
                   AND principal_kind = ?3 AND principal = ?4)",
                params![
                    contract.0.as_slice(),
                    id.0.as_slice(),
                    principal.kind_tag(),
                    principal.address().0.as_slice(),
                ],
                |row| row.get(0),
            )?)
        })
        .await
    }

    async fn is_input_consumed(
        &self,
        contract: &Address,
        proof_digest: &Blake3Hash,
    ) -> Result<bool> {
        let contract = *contract;
        let digest = *proof_digest;

        self.blocking(move |conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM consumed_inputs
                 WHERE contract = ?1 AND proof_digest = ?2)",
                params![contract.0.as_slice(), digest.0.as_slice()],
                |row| row.get(0),
            )?)
        })
        .await
    }

    async fn commit(&self, contract: &Address, batch: &CommitBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let contract = *contract;
        let batch = batch.clone();

        self.blocking(move |conn| {
            let now = now_millis();
            // Dropping the transaction on any early return rolls it back.
            let tx = conn.transaction()?;

            for handle in &batch.handles {
                tx.execute(
                    "INSERT OR IGNORE INTO handles (contract, handle_id, fhe_type, recorded_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        contract.0.as_slice(),
                        handle.id.0.as_slice(),
                        handle.fhe_type.to_u8(),
                        now,
                    ],
                )?;
            }

            for (id, principal) in &batch.grants {
                if !handle_exists(&tx, &contract, id)? {
                    return Err(StoreError::InvalidData(format!(
                        "grant for unknown handle {}",
                        id
                    )));
                }
                tx.execute(
                    "INSERT OR IGNORE INTO grants
                        (contract, handle_id, principal_kind, principal, granted_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        contract.0.as_slice(),
                        id.0.as_slice(),
                        principal.kind_tag(),
                        principal.address().0.as_slice(),
                        now,
                    ],
                )?;
            }

            for id in &batch.public {
                let updated = tx.execute(
                    "UPDATE handles SET public_decrypt = 1
                     WHERE contract = ?1 AND handle_id = ?2",
                    params![contract.0.as_slice(), id.0.as_slice()],
                )?;
                if updated == 0 {
                    return Err(StoreError::InvalidData(format!(
                        "public flag for unknown handle {}",
                        id
                    )));
                }
            }

            for digest in &batch.consumed_inputs {
                tx.execute(
                    "INSERT OR IGNORE INTO consumed_inputs (contract, proof_digest, consumed_at)
                     VALUES (?1, ?2, ?3)",
                    params![contract.0.as_slice(), digest.0.as_slice(), now],
                )?;
            }

            tx.commit()?;
            tracing::debug!(
                contract = %contract,
                handles = batch.handles.len(),
                grants = batch.grants.len(),
                "registry batch committed"
            );
            Ok(())
        })
        .await
    }
}

/// Get current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
