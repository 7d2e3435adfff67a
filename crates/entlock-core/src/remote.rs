//! Remote lock engine over a shared key-value store
//!
//! Lock ownership lives entirely in the store: a held lock is a key whose value
//! is the owner label, with a store-managed expiry. Nothing is cached locally,
//! so every check is a live round-trip.
//!
//! Multi-key acquisition depends on [`RemoteBulkMode`]:
//! - `Conditional` claims keys one by one with set-if-absent and deletes the keys
//!   it already claimed when a later key conflicts. Each key is absence-checked,
//!   but the request as a whole is not atomic: another process can observe the
//!   partially claimed set before the rollback runs.
//! - `Unconditional` issues one multi-set. It never reports a conflict and
//!   overwrites keys held by other owners.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use entlock_common::{Engine, LockError, RemoteBulkMode, ResolvedOptions, Result};

use crate::backend::LockBackend;
use crate::kv::{KvClient, KvError, SET_OK};
use crate::stats::LockStatsCollector;

fn backend_error(err: KvError) -> LockError {
    LockError::Backend(err.to_string())
}

pub struct RemoteStoreAdapter {
    client: Arc<dyn KvClient>,
    bulk_mode: RemoteBulkMode,
    stats: Arc<LockStatsCollector>,
}

impl RemoteStoreAdapter {
    pub fn new(
        client: Arc<dyn KvClient>,
        bulk_mode: RemoteBulkMode,
        stats: Arc<LockStatsCollector>,
    ) -> Self {
        if bulk_mode == RemoteBulkMode::Unconditional {
            warn!(
                "Remote bulk lock mode is 'unconditional': multi-key requests overwrite keys held by other owners"
            );
        }
        Self {
            client,
            bulk_mode,
            stats,
        }
    }

    pub fn bulk_mode(&self) -> RemoteBulkMode {
        self.bulk_mode
    }

    async fn set_if_absent(&self, key: &str, options: &ResolvedOptions) -> Result<bool> {
        let reply = self
            .client
            .set_nx_px(key, &options.owner, options.ttl)
            .await
            .map_err(backend_error)?;

        match reply.as_deref() {
            Some(SET_OK) => Ok(true),
            other => {
                debug!(key = %key, reply = ?other, "Conditional set refused");
                Ok(false)
            }
        }
    }

    async fn bulk_acquire_conditional(
        &self,
        keys: &[String],
        options: &ResolvedOptions,
    ) -> Result<Vec<String>> {
        let mut provisioned: Vec<String> = Vec::with_capacity(keys.len());

        for key in keys {
            let outcome = self.set_if_absent(key, options).await;
            let err = match outcome {
                Ok(true) => {
                    provisioned.push(key.clone());
                    continue;
                }
                Ok(false) => LockError::conflict(key.as_str()),
                Err(err) => err,
            };

            self.rollback(&provisioned).await;
            return Err(err);
        }

        debug!(count = provisioned.len(), owner = %options.owner, "Remote bulk lock acquired");
        Ok(provisioned)
    }

    async fn bulk_acquire_unconditional(
        &self,
        keys: &[String],
        options: &ResolvedOptions,
    ) -> Result<Vec<String>> {
        warn!(
            count = keys.len(),
            "Unconditional remote bulk lock, existing holders are not checked"
        );

        let entries: Vec<(String, String)> = keys
            .iter()
            .map(|key| (key.clone(), options.owner.clone()))
            .collect();
        self.client.mset(&entries).await.map_err(backend_error)?;

        // mset leaves the keys without expiry until every pexpire lands
        for key in keys {
            if let Err(e) = self.client.pexpire(key, options.ttl).await {
                self.rollback(keys).await;
                return Err(backend_error(e));
            }
        }

        Ok(keys.to_vec())
    }

    /// Best-effort: failures are logged and never replace the original error
    async fn rollback(&self, provisioned: &[String]) {
        if provisioned.is_empty() {
            return;
        }

        match self.client.del(provisioned).await {
            Ok(removed) => {
                self.stats.record_rolled_back(provisioned.len() as u64);
                warn!(
                    requested = provisioned.len(),
                    removed, "Rolled back remote bulk lock after failure"
                );
            }
            Err(e) => {
                warn!(
                    keys = ?provisioned,
                    error = %e,
                    "Failed to roll back remote bulk lock; keys expire with their TTL"
                );
            }
        }
    }
}

#[async_trait]
impl LockBackend for RemoteStoreAdapter {
    fn engine(&self) -> Engine {
        Engine::Remote
    }

    async fn try_acquire(&self, key: &str, options: &ResolvedOptions) -> Result<String> {
        if self.set_if_absent(key, options).await? {
            debug!(key = %key, owner = %options.owner, "Remote lock acquired");
            Ok(key.to_string())
        } else {
            Err(LockError::conflict(key))
        }
    }

    async fn release(&self, key: &str) -> Result<u64> {
        let removed = self
            .client
            .del(&[key.to_string()])
            .await
            .map_err(backend_error)?;
        debug!(key = %key, removed, "Remote lock released");
        Ok(removed)
    }

    async fn bulk_try_acquire(
        &self,
        keys: &[String],
        options: &ResolvedOptions,
    ) -> Result<Vec<String>> {
        match self.bulk_mode {
            RemoteBulkMode::Conditional => self.bulk_acquire_conditional(keys, options).await,
            RemoteBulkMode::Unconditional => self.bulk_acquire_unconditional(keys, options).await,
        }
    }

    async fn bulk_release(&self, keys: &[String]) -> Result<u64> {
        let removed = self.client.del(keys).await.map_err(backend_error)?;
        debug!(requested = keys.len(), removed, "Remote bulk lock released");
        Ok(removed)
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Err(LockError::Unsupported(
            "listing is not supported by the remote engine".to_string(),
        ))
    }

    /// Remote entries are shared with other processes and are left to expire
    async fn drain(&self) -> Result<usize> {
        Ok(0)
    }
}
