//! Key-value client capability required by the remote lock engine
//!
//! The remote engine only needs four primitives from a shared store:
//! a conditional set-with-expiry, an unconditional multi-set, an expiry update,
//! and a (bulk) delete. `MemoryKvStore` implements them in-process and is used
//! by tests and single-node deployments.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Canonical success reply of a conditional set
pub const SET_OK: &str = "OK";

/// Errors raised by a key-value client
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum KvError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

#[async_trait]
pub trait KvClient: Send + Sync {
    /// Round-trip check used when the locker is initialized
    async fn ping(&self) -> Result<(), KvError>;

    /// Sets `key` to `value` with expiry `ttl` only if the key is absent.
    ///
    /// Returns `Some(SET_OK)` when the key was set and `None` when it already existed.
    async fn set_nx_px(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<Option<String>, KvError>;

    /// Unconditionally sets every pair. Existing expiries are cleared.
    async fn mset(&self, entries: &[(String, String)]) -> Result<(), KvError>;

    /// Sets an expiry on an existing key. Returns `false` when the key is absent.
    async fn pexpire(&self, key: &str, ttl: Duration) -> Result<bool, KvError>;

    /// Deletes the keys and returns how many existed
    async fn del(&self, keys: &[String]) -> Result<u64, KvError>;
}

#[derive(Debug, Clone)]
struct KvEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl KvEntry {
    fn new(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }
}

/// In-process store. Expired entries read as absent and are swept on every write.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: DashMap<String, KvEntry>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a live key
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }

    /// Remaining time to live of a live key; `None` for absent or non-expiring keys
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .and_then(|entry| entry.expires_at)
            .map(|expires_at| expires_at.saturating_duration_since(Instant::now()))
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every expired entry and returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.entries.len())
    }
}

#[async_trait]
impl KvClient for MemoryKvStore {
    async fn ping(&self) -> Result<(), KvError> {
        Ok(())
    }

    async fn set_nx_px(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<Option<String>, KvError> {
        self.purge_expired();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(KvEntry::new(value, Some(ttl)));
                    Ok(Some(SET_OK.to_string()))
                } else {
                    Ok(None)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(KvEntry::new(value, Some(ttl)));
                Ok(Some(SET_OK.to_string()))
            }
        }
    }

    async fn mset(&self, entries: &[(String, String)]) -> Result<(), KvError> {
        self.purge_expired();
        for (key, value) in entries {
            self.entries.insert(key.clone(), KvEntry::new(value, None));
        }
        Ok(())
    }

    async fn pexpire(&self, key: &str, ttl: Duration) -> Result<bool, KvError> {
        match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired() => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn del(&self, keys: &[String]) -> Result<u64, KvError> {
        let mut removed = 0;
        for key in keys {
            if let Some((_, entry)) = self.entries.remove(key)
                && !entry.is_expired()
            {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
