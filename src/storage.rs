// Durable "last observed value" for delta sampling.
// Persister = raw key/value backend; Storage = typed u64 view over one key.
// Single writer: one poller per Storage instance.

use crate::error::StorageError;
use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::instrument;

/// Key the last observed counter is stored under unless configured otherwise.
pub const LAST_COUNT_KEY: &str = "last_count";

/// Key/value backend shared with the surrounding pipeline (checkpoint store).
#[async_trait]
pub trait Persister: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
}

#[async_trait]
impl<P: Persister + ?Sized> Persister for Arc<P> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        (**self).set(key, value).await
    }
}

/// Last observed sample value.
#[async_trait]
pub trait Storage: Send {
    /// Stored value, `None` on the first-ever run.
    async fn load_stored(&mut self) -> Result<Option<u64>, StorageError>;

    async fn save(&mut self, value: u64) -> Result<(), StorageError>;

    /// Stored value, 0 when nothing has been stored yet.
    async fn load(&mut self) -> Result<u64, StorageError> {
        Ok(self.load_stored().await?.unwrap_or(0))
    }
}

/// [`Storage`] over a [`Persister`]: the value is kept as base-10 ASCII under a fixed key.
pub struct PersisterStorage<P> {
    persister: P,
    key: String,
}

impl<P: Persister> PersisterStorage<P> {
    pub fn new(persister: P) -> Self {
        Self::with_key(persister, LAST_COUNT_KEY)
    }

    pub fn with_key(persister: P, key: impl Into<String>) -> Self {
        Self {
            persister,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

fn decode(key: &str, bytes: &[u8]) -> Result<u64, StorageError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .ok_or_else(|| StorageError::Decode {
            key: key.to_string(),
            value: String::from_utf8_lossy(bytes).into_owned(),
        })
}

#[async_trait]
impl<P: Persister> Storage for PersisterStorage<P> {
    #[instrument(skip(self), fields(storage = "persister", operation = "load", key = %self.key))]
    async fn load_stored(&mut self) -> Result<Option<u64>, StorageError> {
        match self.persister.get(&self.key).await? {
            Some(bytes) => decode(&self.key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(storage = "persister", operation = "save", key = %self.key))]
    async fn save(&mut self, value: u64) -> Result<(), StorageError> {
        self.persister
            .set(&self.key, value.to_string().as_bytes())
            .await
    }
}

/// In-process persister. State is lost on restart; cloning shares the map.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersister {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryPersister {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Persister for MemoryPersister {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// SQLite-backed persister. Each `set` is a single upsert.
pub struct SqlitePersister {
    pool: SqlitePool,
}

impl SqlitePersister {
    pub async fn connect(path: &str) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sampler_state (key TEXT PRIMARY KEY, value BLOB NOT NULL)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Persister for SqlitePersister {
    #[instrument(skip(self), fields(repo = "sqlite", operation = "get"))]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let row = sqlx::query("SELECT value FROM sampler_state WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let value: Vec<u8> = row.try_get("value")?;
        Ok(Some(value))
    }

    #[instrument(skip(self, value), fields(repo = "sqlite", operation = "set"))]
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO sampler_state (key, value) VALUES ($1, $2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
