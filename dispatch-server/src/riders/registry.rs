//! redb-backed rider registry (`riders.redb`)

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use shared::order::RiderProfile;
use std::path::Path;
use std::sync::Arc;

use super::{DirectoryError, RiderDirectory};
use crate::orders::storage::{StorageError, StorageResult};

/// Rider records: key = rider_id, value = JSON-serialized RiderProfile
const RIDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("riders");

#[derive(Clone)]
pub struct RiderRegistry {
    db: Arc<Database>,
}

impl std::fmt::Debug for RiderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiderRegistry").finish_non_exhaustive()
    }
}

impl RiderRegistry {
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::init(Database::create(path)?)
    }

    /// In-memory registry (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::init(
            Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?,
        )
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(RIDERS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Insert or replace a rider record
    pub fn upsert(&self, mut profile: RiderProfile) -> StorageResult<RiderProfile> {
        profile.updated_at = shared::now_millis();
        let bytes = serde_json::to_vec(&profile)?;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(RIDERS_TABLE)?;
            table.insert(profile.rider_id.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;

        tracing::info!(rider_id = %profile.rider_id, active = profile.active, "Rider record saved");
        Ok(profile)
    }

    /// Any rider record, active or not
    pub fn get(&self, rider_id: &str) -> StorageResult<Option<RiderProfile>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RIDERS_TABLE)?;
        match table.get(rider_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All riders, ordered by id
    pub fn list(&self) -> StorageResult<Vec<RiderProfile>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RIDERS_TABLE)?;

        let mut riders = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            riders.push(serde_json::from_slice(value.value())?);
        }
        Ok(riders)
    }
}

impl From<StorageError> for DirectoryError {
    fn from(err: StorageError) -> Self {
        DirectoryError(err.to_string())
    }
}

#[async_trait]
impl RiderDirectory for RiderRegistry {
    async fn lookup_rider(&self, rider_id: &str) -> Result<Option<RiderProfile>, DirectoryError> {
        Ok(self.get(rider_id)?.filter(|r| r.active))
    }
}
