//! Key-value store client
//!
//! The ingestion path needs a durable `put` keyed by order id. `get` exists
//! for read-back by operators and tests; no HTTP route exposes it.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use thiserror::Error;
use tracing::{debug, info};

/// Failures reported by a store backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unavailable(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("store rejected the write: {0}")]
    Rejected(String),
}

/// Durable put/get of an encoded record by unique key.
///
/// Implementations own one long-lived connection and must be safe to call
/// from many in-flight requests at once.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Store `value` under `key`, overwriting any prior value. No expiry.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
}

/// Redis-backed store.
///
/// `ConnectionManager` multiplexes one connection and reconnects on its own,
/// so clones are cheap and concurrent callers never contend on a lock.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;
        info!(url = %redact_url(url), "Connected to Redis");
        Ok(Self { conn })
    }
}

#[async_trait]
impl OrderStore for RedisStore {
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value)
            .await
            .map_err(map_redis_error)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(map_redis_error)
    }
}

/// Transport-level failures (including client-side timeouts) mean the store
/// could not be reached; anything the server answered with is a rejection.
/// The bounded wait in the ingestion path is what produces `StoreError::Timeout`.
fn map_redis_error(err: redis::RedisError) -> StoreError {
    if err.is_io_error()
        || err.is_timeout()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
    {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Rejected(err.to_string())
    }
}

/// Strip credentials from a connection URL before logging it.
pub(crate) fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}

/// In-process store for local runs and tests.
///
/// Counts calls and can be told to fail or stall, which lets callers observe
/// how the ingestion path reacts to a misbehaving backend.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Vec<u8>>,
    put_calls: AtomicUsize,
    failure: Mutex<Option<StoreError>>,
    latency_ms: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `err` (or succeed again with `None`).
    pub fn fail_with(&self, err: Option<StoreError>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = err;
        }
    }

    /// Delay every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn simulate(&self) -> Result<(), StoreError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        match self.failure.lock() {
            Ok(failure) => failure.clone().map_or(Ok(()), Err),
            Err(_) => Err(StoreError::Unavailable("store state poisoned".to_string())),
        }
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        self.entries.insert(key.to_string(), value.to_vec());
        debug!(key, bytes = value.len(), "Stored entry in memory");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.simulate().await?;
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }
}
