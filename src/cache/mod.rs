//! Memoization of remote and fingerprint results.
//!
//! Remote calls are slow (the metadata service allows one request per
//! second) and the same queries repeat constantly while a release is being
//! resolved, so every result is cached under a [`CallSignature`].
//!
//! Results live in an in-memory map backed by a SQLite table. If the
//! database cannot be opened or written, the cache logs a warning and keeps
//! working from memory only.
//!
//! # Example
//!
//! ```ignore
//! let cache = ResultCache::open(&path).await;
//! let sig = CallSignature::new("search", &(kind, &params))?;
//! if let Some(hit) = cache.get::<SearchResults>(&sig).await { ... }
//! cache.put(&sig, &results).await;
//! ```

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Default cache database filename.
pub const DEFAULT_CACHE_NAME: &str = "results.db";

/// Default location of the cache database (user cache directory).
pub fn default_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("tag-sleuth")
        .join(DEFAULT_CACHE_NAME)
}

/// Deterministic identity of a call: what was called and with which
/// argument content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSignature(String);

impl CallSignature {
    /// Hash `namespace` together with the JSON form of `args`.
    ///
    /// JSON objects serialize with sorted keys, so equal argument content
    /// always yields the same signature. Callers reduce non-comparable
    /// arguments (such as whole tracks) to plain values first.
    ///
    /// Arguments that cannot be represented as JSON have no signature;
    /// such calls are simply not cached.
    pub fn new<A: Serialize + ?Sized>(namespace: &str, args: &A) -> Option<Self> {
        let json = match serde_json::to_value(args) {
            Ok(value) => value.to_string(),
            Err(e) => {
                tracing::warn!("Not caching {} call: {}", namespace, e);
                return None;
            }
        };

        let mut hasher = Sha256::new();
        hasher.update(namespace.as_bytes());
        hasher.update([0u8]);
        hasher.update(json.as_bytes());
        Some(Self(format!("{:x}", hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Hit/call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub calls: u64,
}

/// Cache errors (maintenance operations only; lookups never fail).
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to create cache directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),
}

/// Two-level result cache.
pub struct ResultCache {
    memory: Mutex<HashMap<String, String>>,
    store: Mutex<Option<SqlitePool>>,
    hits: AtomicU64,
    calls: AtomicU64,
}

impl ResultCache {
    /// A cache that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            store: Mutex::new(None),
            hits: AtomicU64::new(0),
            calls: AtomicU64::new(0),
        }
    }

    /// Open (or create) the durable store at `path`.
    ///
    /// Never fails: if the database is unusable the cache runs in memory.
    pub async fn open(path: &Path) -> Self {
        let cache = Self::in_memory();
        match open_store(path).await {
            Ok(pool) => {
                tracing::info!("Opened result cache at {:?}", path);
                *cache.store.lock() = Some(pool);
            }
            Err(e) => {
                tracing::warn!("Result cache unavailable ({}), caching in memory only", e);
            }
        }
        cache
    }

    /// Whether results are persisted between runs.
    pub fn is_durable(&self) -> bool {
        self.store.lock().is_some()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            calls: self.calls.load(Ordering::Relaxed),
        }
    }

    /// Look up a cached result.
    pub async fn get<T: DeserializeOwned>(&self, signature: &CallSignature) -> Option<T> {
        let calls = self.calls.fetch_add(1, Ordering::Relaxed) + 1;

        let cached = self.memory.lock().get(signature.as_str()).cloned();
        let payload = match cached {
            Some(payload) => Some(payload),
            None => self.load_durable(signature).await,
        };

        let value = payload.and_then(|p| serde_json::from_str::<T>(&p).ok());
        if value.is_some() {
            let hits = self.hits.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!("Hit result cache ({} hits of {} tries)", hits, calls);
        } else {
            tracing::debug!(
                "Missed result cache ({} hits of {} tries)",
                self.hits.load(Ordering::Relaxed),
                calls
            );
        }
        value
    }

    /// Store a result.
    pub async fn put<T: Serialize + ?Sized>(&self, signature: &CallSignature, value: &T) {
        let payload = match serde_json::to_string(value) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Result not cacheable: {}", e);
                return;
            }
        };

        self.memory
            .lock()
            .insert(signature.as_str().to_string(), payload.clone());

        let Some(pool) = self.pool() else {
            return;
        };
        let result = sqlx::query(
            "INSERT OR REPLACE INTO results (signature, payload, created_at) VALUES (?, ?, ?)",
        )
        .bind(signature.as_str())
        .bind(&payload)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&pool)
        .await;

        if let Err(e) = result {
            self.degrade(&e);
        }
    }

    /// Number of persisted entries (or in-memory entries without a store).
    pub async fn len(&self) -> Result<u64, CacheError> {
        match self.pool() {
            Some(pool) => {
                let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM results")
                    .fetch_one(&pool)
                    .await?;
                Ok(count.max(0) as u64)
            }
            None => Ok(self.memory.lock().len() as u64),
        }
    }

    pub async fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len().await? == 0)
    }

    /// Drop every entry, in memory and on disk.
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.memory.lock().clear();
        if let Some(pool) = self.pool() {
            sqlx::query("DELETE FROM results").execute(&pool).await?;
        }
        Ok(())
    }

    fn pool(&self) -> Option<SqlitePool> {
        self.store.lock().clone()
    }

    async fn load_durable(&self, signature: &CallSignature) -> Option<String> {
        let pool = self.pool()?;
        let row: Result<Option<(String,)>, sqlx::Error> =
            sqlx::query_as("SELECT payload FROM results WHERE signature = ?")
                .bind(signature.as_str())
                .fetch_optional(&pool)
                .await;

        match row {
            Ok(Some((payload,))) => {
                self.memory
                    .lock()
                    .insert(signature.as_str().to_string(), payload.clone());
                Some(payload)
            }
            Ok(None) => None,
            Err(e) => {
                self.degrade(&e);
                None
            }
        }
    }

    fn degrade(&self, error: &sqlx::Error) {
        if self.store.lock().take().is_some() {
            tracing::warn!(
                "Result cache store failed ({}), continuing in memory only",
                error
            );
        }
    }
}

async fn open_store(path: &Path) -> Result<SqlitePool, CacheError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| CacheError::CreateDir(dir.to_path_buf(), e))?;
    }

    let db_url = format!("sqlite:{}", path.display());
    if !sqlx::Sqlite::database_exists(&db_url).await.unwrap_or(false) {
        sqlx::Sqlite::create_database(&db_url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&db_url)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS results (
            signature TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}
