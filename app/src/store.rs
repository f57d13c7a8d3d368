//! Durable cell holding the last emitted proposal height.
//!
//! The entire persisted state of the ordering service is a single `u64`.
//! Keeping the write path this small keeps the latency of the emission
//! critical section low and makes the crash-recovery argument trivial: a redb
//! commit either lands or it doesn't, so `load` returns either the old or the
//! new value, never a torn one.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::ReadableTable;
use thiserror::Error;

use citrine_types::Height;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Failed to join on task: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Persistent height cell consulted on every emission.
///
/// `load` fails only catastrophically (storage unreachable), and such a
/// failure aborts node initialization: proceeding without the recorded height
/// would risk regressing it.
#[async_trait]
pub trait HeightStore: Send + Sync {
    async fn load(&self) -> Result<Height, StoreError>;
    async fn save(&self, height: Height) -> Result<(), StoreError>;
}

const ORDERING_STATE_TABLE: redb::TableDefinition<'_, &str, u64> =
    redb::TableDefinition::new("ordering_state");

const LAST_PROPOSAL_HEIGHT: &str = "last_proposal_height";

struct Db {
    db: redb::Database,
}

impl Db {
    fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self {
            db: redb::Database::create(path).map_err(StoreError::Database)?,
        })
    }

    fn create_tables(&self) -> Result<(), StoreError> {
        let tx = self.db.begin_write()?;

        // Implicitly creates the table if it does not exist yet
        let _ = tx.open_table(ORDERING_STATE_TABLE)?;

        tx.commit()?;

        Ok(())
    }

    fn load_height(&self) -> Result<Height, StoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(ORDERING_STATE_TABLE)?;

        let height = table
            .get(LAST_PROPOSAL_HEIGHT)?
            .map(|value| value.value())
            .unwrap_or(0);

        Ok(Height::new(height))
    }

    fn save_height(&self, height: Height) -> Result<(), StoreError> {
        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(ORDERING_STATE_TABLE)?;
            table.insert(LAST_PROPOSAL_HEIGHT, height.as_u64())?;
        }
        tx.commit()?;

        Ok(())
    }
}

/// redb-backed implementation of [`HeightStore`].
#[derive(Clone)]
pub struct RedbHeightStore {
    db: Arc<Db>,
}

impl RedbHeightStore {
    /// Opens (or creates) the store at the given path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_owned();

        tokio::task::spawn_blocking(move || {
            let db = Db::new(path)?;
            db.create_tables()?;
            Ok(Self { db: Arc::new(db) })
        })
        .await?
    }
}

#[async_trait]
impl HeightStore for RedbHeightStore {
    async fn load(&self) -> Result<Height, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.load_height()).await?
    }

    async fn save(&self, height: Height) -> Result<(), StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.save_height(height)).await?
    }
}
