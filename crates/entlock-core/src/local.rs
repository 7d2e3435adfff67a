//! In-process lock engine
//!
//! All lock records live in one table behind a single mutex, so the
//! check-then-insert of one key and the check/insert/rollback sequence of a
//! multi-key request are never interleaved with other callers. The guard is
//! never held across an await point.
//!
//! Auto-expiring records own a spawned timer task. Each record carries a
//! generation number; a timer only removes the record it was started for, so a
//! timer racing a manual release (or a later re-acquisition) is a no-op.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use entlock_common::{Engine, LockError, ResolvedOptions, Result};

use crate::backend::LockBackend;
use crate::stats::LockStatsCollector;

struct LockRecord {
    owner: String,
    generation: u64,
    acquired_at: Instant,
    ttl: Option<Duration>,
    expiry: Option<JoinHandle<()>>,
}

impl LockRecord {
    fn cancel_expiry(&mut self) {
        if let Some(handle) = self.expiry.take() {
            handle.abort();
        }
    }
}

struct RegistryInner {
    records: Mutex<HashMap<String, LockRecord>>,
    next_generation: AtomicU64,
    stats: Arc<LockStatsCollector>,
}

impl RegistryInner {
    /// Called by a timer task once its TTL elapsed
    fn expire(&self, key: &str, generation: u64) {
        let mut records = self.records.lock();
        let current = records.get(key).map(|record| record.generation);
        if current == Some(generation) {
            if let Some(record) = records.remove(key) {
                debug!(
                    key = %key,
                    owner = %record.owner,
                    held_ms = record.acquired_at.elapsed().as_millis() as u64,
                    "Lock expired"
                );
            }
            self.stats.record_expired();
        }
    }
}

/// Information about a held lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    pub key: String,
    pub owner: String,
    pub ttl: Option<Duration>,
    pub held_for: Duration,
}

/// In-process lock registry
pub struct LocalRegistry {
    inner: Arc<RegistryInner>,
}

impl LocalRegistry {
    pub fn new(stats: Arc<LockStatsCollector>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                records: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                stats,
            }),
        }
    }

    pub fn try_acquire(&self, key: &str, options: &ResolvedOptions) -> Result<String> {
        let runtime = Self::timer_runtime(options)?;
        let mut records = self.inner.records.lock();

        if let Some(existing) = records.get(key) {
            debug!(key = %key, owner = %existing.owner, "Lock already held");
            return Err(LockError::conflict(key));
        }

        let record = self.new_record(key, options, runtime.as_ref());
        records.insert(key.to_string(), record);
        debug!(key = %key, owner = %options.owner, auto = options.auto, "Lock acquired");
        Ok(key.to_string())
    }

    /// Releasing a key that is not held still succeeds and removes nothing
    pub fn release(&self, key: &str) -> Result<u64> {
        let removed = self.inner.records.lock().remove(key);
        match removed {
            Some(mut record) => {
                record.cancel_expiry();
                debug!(key = %key, owner = %record.owner, "Lock released");
                Ok(1)
            }
            None => {
                debug!(key = %key, "Release of a lock that is not held");
                Ok(0)
            }
        }
    }

    /// All-or-nothing: keys provisioned before the first conflict are rolled back.
    ///
    /// A key repeated within `keys` conflicts with its own earlier claim.
    pub fn bulk_try_acquire(
        &self,
        keys: &[String],
        options: &ResolvedOptions,
    ) -> Result<Vec<String>> {
        let runtime = Self::timer_runtime(options)?;
        let mut records = self.inner.records.lock();
        let mut provisioned: Vec<String> = Vec::with_capacity(keys.len());

        for key in keys {
            if records.contains_key(key) {
                for done in &provisioned {
                    if let Some(mut record) = records.remove(done) {
                        record.cancel_expiry();
                    }
                }
                self.inner
                    .stats
                    .record_rolled_back(provisioned.len() as u64);
                warn!(
                    key = %key,
                    rolled_back = provisioned.len(),
                    "Bulk lock conflict, rolled back keys acquired by this request"
                );
                return Err(LockError::conflict(key.as_str()));
            }

            let record = self.new_record(key, options, runtime.as_ref());
            records.insert(key.clone(), record);
            provisioned.push(key.clone());
        }

        debug!(count = provisioned.len(), owner = %options.owner, "Bulk lock acquired");
        Ok(provisioned)
    }

    pub fn bulk_release(&self, keys: &[String]) -> Result<u64> {
        let mut records = self.inner.records.lock();
        let mut released = 0u64;
        for key in keys {
            if let Some(mut record) = records.remove(key) {
                record.cancel_expiry();
                released += 1;
            }
        }
        debug!(requested = keys.len(), released, "Bulk lock released");
        Ok(released)
    }

    pub fn list_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.records.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn get(&self, key: &str) -> Option<LockInfo> {
        self.inner.records.lock().get(key).map(|record| LockInfo {
            key: key.to_string(),
            owner: record.owner.clone(),
            ttl: record.ttl,
            held_for: record.acquired_at.elapsed(),
        })
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.inner.records.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases every record and cancels every pending timer
    pub fn drain(&self) -> usize {
        let drained: Vec<(String, LockRecord)> = self.inner.records.lock().drain().collect();
        let count = drained.len();
        for (_, mut record) in drained {
            record.cancel_expiry();
        }
        count
    }

    /// Timers need a tokio runtime; resolve it before touching the table
    fn timer_runtime(options: &ResolvedOptions) -> Result<Option<Handle>> {
        if !options.auto {
            return Ok(None);
        }
        Handle::try_current().map(Some).map_err(|_| {
            LockError::Unsupported("auto-expiring locks require a tokio runtime".to_string())
        })
    }

    fn new_record(
        &self,
        key: &str,
        options: &ResolvedOptions,
        runtime: Option<&Handle>,
    ) -> LockRecord {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let expiry = runtime.map(|runtime| {
            Self::spawn_expiry(
                runtime,
                Arc::downgrade(&self.inner),
                key.to_string(),
                generation,
                options.ttl,
            )
        });

        LockRecord {
            owner: options.owner.clone(),
            generation,
            acquired_at: Instant::now(),
            ttl: expiry.as_ref().map(|_| options.ttl),
            expiry,
        }
    }

    fn spawn_expiry(
        runtime: &Handle,
        inner: Weak<RegistryInner>,
        key: String,
        generation: u64,
        ttl: Duration,
    ) -> JoinHandle<()> {
        runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(inner) = inner.upgrade() {
                inner.expire(&key, generation);
            }
        })
    }
}

impl Drop for LocalRegistry {
    fn drop(&mut self) {
        for record in self.inner.records.lock().values_mut() {
            record.cancel_expiry();
        }
    }
}

#[async_trait]
impl LockBackend for LocalRegistry {
    fn engine(&self) -> Engine {
        Engine::Local
    }

    async fn try_acquire(&self, key: &str, options: &ResolvedOptions) -> Result<String> {
        LocalRegistry::try_acquire(self, key, options)
    }

    async fn release(&self, key: &str) -> Result<u64> {
        LocalRegistry::release(self, key)
    }

    async fn bulk_try_acquire(
        &self,
        keys: &[String],
        options: &ResolvedOptions,
    ) -> Result<Vec<String>> {
        LocalRegistry::bulk_try_acquire(self, keys, options)
    }

    async fn bulk_release(&self, keys: &[String]) -> Result<u64> {
        LocalRegistry::bulk_release(self, keys)
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(LocalRegistry::list_keys(self))
    }

    async fn drain(&self) -> Result<usize> {
        Ok(LocalRegistry::drain(self))
    }
}
