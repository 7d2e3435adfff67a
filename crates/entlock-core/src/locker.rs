//! Entity locker facade
//!
//! Selects a lock engine once at initialization, derives lock keys from entity
//! references and reports every outcome as a `Result` value. Operations are
//! only served while the locker is `Active`.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use entlock_common::{
    Engine, EntityRef, LastError, LockError, LockOptions, LockTarget, LockerConfig, PageParam,
    Result,
};

use crate::backend::LockBackend;
use crate::kv::KvClient;
use crate::local::LocalRegistry;
use crate::remote::RemoteStoreAdapter;
use crate::stats::{LockStats, LockStatsCollector};

/// Lifecycle of the locker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockerState {
    /// Constructed, not yet initialized
    Init,
    /// Serving lock operations
    Active,
    /// Shutting down, releasing local lock state
    Draining,
    /// Shut down; never serves again
    Closed,
}

impl LockerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockerState::Init => "INIT",
            LockerState::Active => "ACTIVE",
            LockerState::Draining => "DRAINING",
            LockerState::Closed => "CLOSED",
        }
    }
}

impl std::fmt::Display for LockerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub struct EntityLocker {
    state: RwLock<LockerState>,
    config: RwLock<LockerConfig>,
    backend: RwLock<Option<Arc<dyn LockBackend>>>,
    kv_client: Option<Arc<dyn KvClient>>,
    last_error: Mutex<Option<LastError>>,
    stats: Arc<LockStatsCollector>,
    /// Serializes init and shutdown, which await the backend
    lifecycle: tokio::sync::Mutex<()>,
}

impl Default for EntityLocker {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityLocker {
    /// Locker that can only run the local engine
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Locker that can run either engine; the client is used when `engine` is remote
    pub fn with_kv_client(client: Arc<dyn KvClient>) -> Self {
        Self::build(Some(client))
    }

    fn build(kv_client: Option<Arc<dyn KvClient>>) -> Self {
        Self {
            state: RwLock::new(LockerState::Init),
            config: RwLock::new(LockerConfig::default()),
            backend: RwLock::new(None),
            kv_client,
            last_error: Mutex::new(None),
            stats: Arc::new(LockStatsCollector::new()),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Activates the locker. Calling it again once active is a no-op.
    pub async fn init(&self, config: LockerConfig) -> Result<()> {
        let _guard = self.lifecycle.lock().await;

        match self.state() {
            LockerState::Active => {
                warn!(engine = %self.config.read().engine, "Entity locker already initialized");
                return Ok(());
            }
            LockerState::Draining | LockerState::Closed => {
                return self.record(Err(LockError::ServiceUnavailable(
                    "entity locker has been shut down".to_string(),
                )));
            }
            LockerState::Init => {}
        }

        let backend = self.record(self.create_backend(&config).await)?;

        *self.backend.write() = Some(backend);
        *self.config.write() = config.clone();
        *self.state.write() = LockerState::Active;

        info!(
            engine = %config.engine,
            default_ttl_ms = config.default_ttl_ms,
            persistent = config.persistent,
            "Entity locker initialized"
        );
        Ok(())
    }

    async fn create_backend(&self, config: &LockerConfig) -> Result<Arc<dyn LockBackend>> {
        match config.engine {
            Engine::Local => Ok(Arc::new(LocalRegistry::new(self.stats.clone()))),
            Engine::Remote => {
                let client = self.kv_client.clone().ok_or_else(|| {
                    LockError::IllegalArgument(
                        "remote engine requires a key-value client".to_string(),
                    )
                })?;

                client
                    .ping()
                    .await
                    .map_err(|e| LockError::Backend(format!("remote store unreachable: {}", e)))?;

                Ok(Arc::new(RemoteStoreAdapter::new(
                    client,
                    config.remote_bulk_mode,
                    self.stats.clone(),
                )))
            }
        }
    }

    /// Locks a single entity and returns its key
    pub async fn lock_one(
        &self,
        entity: &EntityRef,
        options: Option<LockOptions>,
    ) -> Result<String> {
        let result = async {
            let backend = self.active_backend()?;
            entity.validate()?;

            let key = entity.key();
            let options = options.unwrap_or_default().resolve(&self.config());
            backend.try_acquire(&key, &options).await
        }
        .await;

        match &result {
            Ok(_) => self.stats.record_acquired(1),
            Err(e) if e.is_conflict() => self.stats.record_conflict(),
            Err(_) => {}
        }
        self.record(result)
    }

    /// Unlocks a key. Succeeds whether or not the key was held.
    pub async fn unlock_one(&self, key: &str) -> Result<String> {
        let result = async {
            let backend = self.active_backend()?;
            backend.release(key).await
        }
        .await;

        let result = result.map(|removed| {
            self.stats.record_released(removed);
            key.to_string()
        });
        self.record(result)
    }

    /// Locks every entity of the target or none of them
    pub async fn lock_many(
        &self,
        target: impl Into<LockTarget>,
        options: Option<LockOptions>,
    ) -> Result<Vec<String>> {
        let target = target.into();
        let result = async {
            let backend = self.active_backend()?;

            let entities = target.into_entities();
            for entity in &entities {
                entity.validate()?;
            }
            let keys: Vec<String> = entities.iter().map(EntityRef::key).collect();
            if keys.is_empty() {
                return Ok(keys);
            }

            let options = options.unwrap_or_default().resolve(&self.config());
            backend.bulk_try_acquire(&keys, &options).await
        }
        .await;

        match &result {
            Ok(keys) => self.stats.record_acquired(keys.len() as u64),
            Err(e) if e.is_conflict() => self.stats.record_conflict(),
            Err(_) => {}
        }
        self.record(result)
    }

    pub async fn unlock_many(&self, keys: &[String]) -> Result<Vec<String>> {
        let result = async {
            let backend = self.active_backend()?;
            if keys.is_empty() {
                return Ok(0);
            }
            backend.bulk_release(keys).await
        }
        .await;

        let result = result.map(|removed| {
            self.stats.record_released(removed);
            keys.to_vec()
        });
        self.record(result)
    }

    /// Held keys in sorted order, optionally one page of them
    pub async fn list(&self, page: Option<PageParam>) -> Result<Vec<String>> {
        let result = async {
            let backend = self.active_backend()?;
            let keys = backend.list_keys().await?;
            Ok::<_, LockError>(match page {
                Some(page) => page.apply(keys),
                None => keys,
            })
        }
        .await;

        self.record(result)
    }

    /// Stops serving and releases local lock state. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<()> {
        let _guard = self.lifecycle.lock().await;

        match self.state() {
            LockerState::Draining | LockerState::Closed => return Ok(()),
            LockerState::Init => {
                *self.state.write() = LockerState::Closed;
                info!("Entity locker closed before initialization");
                return Ok(());
            }
            LockerState::Active => {}
        }

        *self.state.write() = LockerState::Draining;
        let backend = self.backend.write().take();

        if let Some(backend) = backend {
            match backend.drain().await {
                Ok(released) => info!(
                    engine = %backend.engine(),
                    released,
                    "Entity locker drained"
                ),
                Err(e) => {
                    warn!(error = %e, "Failed to drain entity locker");
                    *self.last_error.lock() = Some(LastError::from(&e));
                }
            }
        }

        *self.state.write() = LockerState::Closed;
        info!("Entity locker closed");
        Ok(())
    }

    pub fn state(&self) -> LockerState {
        *self.state.read()
    }

    pub fn is_active(&self) -> bool {
        self.state() == LockerState::Active
    }

    pub fn config(&self) -> LockerConfig {
        self.config.read().clone()
    }

    /// Most recent failure, kept for health checks
    pub fn last_error(&self) -> Option<LastError> {
        self.last_error.lock().clone()
    }

    pub async fn stats(&self) -> LockStats {
        let active = match self.current_backend() {
            Some(backend) if backend.engine() == Engine::Local => backend
                .list_keys()
                .await
                .ok()
                .map(|keys| keys.len() as u64),
            _ => None,
        };
        self.stats.snapshot(active)
    }

    fn active_backend(&self) -> Result<Arc<dyn LockBackend>> {
        let state = self.state();
        if state != LockerState::Active {
            return Err(LockError::ServiceUnavailable(format!(
                "entity locker is {}",
                state
            )));
        }

        self.current_backend()
            .ok_or_else(|| LockError::ServiceUnavailable("no lock engine selected".to_string()))
    }

    fn current_backend(&self) -> Option<Arc<dyn LockBackend>> {
        self.backend.read().clone()
    }

    fn record<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            debug!(code = e.name(), error = %e, "Entity locker operation failed");
            *self.last_error.lock() = Some(LastError::from(e));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn order(id: &str) -> EntityRef {
        EntityRef::new("default", "Order", id)
    }

    async fn active_locker() -> EntityLocker {
        let locker = EntityLocker::new();
        locker
            .init(LockerConfig::local().with_default_ttl(Duration::from_millis(5000)))
            .await
            .unwrap();
        locker
    }

    #[tokio::test]
    async fn test_operations_before_init_are_unavailable() {
        let locker = EntityLocker::new();
        assert_eq!(locker.state(), LockerState::Init);

        let err = locker.lock_one(&order("1"), None).await.unwrap_err();
        assert_eq!(err.name(), "SERVICE_UNAVAILABLE");
        assert!(locker.unlock_one("default:Order:1").await.is_err());
        assert!(locker.list(None).await.is_err());

        let last = locker.last_error().unwrap();
        assert_eq!(last.name, "SERVICE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_double_init_is_noop() {
        let locker = active_locker().await;
        locker.lock_one(&order("1"), None).await.unwrap();

        locker.init(LockerConfig::local()).await.unwrap();

        assert!(locker.is_active());
        // the second config is ignored and existing locks survive
        assert_eq!(locker.config().default_ttl_ms, 5000);
        assert_eq!(locker.list(None).await.unwrap(), vec!["default:Order:1"]);
    }

    #[tokio::test]
    async fn test_remote_without_client_stays_init() {
        let locker = EntityLocker::new();

        let err = locker.init(LockerConfig::remote()).await.unwrap_err();

        assert_eq!(err.name(), "PARAMETER_VALIDATE_ERROR");
        assert_eq!(locker.state(), LockerState::Init);
        assert!(locker.last_error().is_some());
    }

    #[tokio::test]
    async fn test_conflict_records_last_error() {
        let locker = active_locker().await;
        locker.lock_one(&order("42"), None).await.unwrap();

        let err = locker.lock_one(&order("42"), None).await.unwrap_err();

        assert_eq!(err.conflict_key(), Some("default:Order:42"));
        let last = locker.last_error().unwrap();
        assert_eq!(last.name, "CONFLICT");
        assert_eq!(last.code, 20005);
    }

    #[tokio::test]
    async fn test_invalid_entity_rejected() {
        let locker = active_locker().await;

        let err = locker
            .lock_one(&EntityRef::new("default", "", "1"), None)
            .await
            .unwrap_err();
        assert_eq!(err.name(), "PARAMETER_VALIDATE_ERROR");
        assert!(locker.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_requests() {
        let locker = active_locker().await;

        let keys = locker
            .lock_many(Vec::<EntityRef>::new(), None)
            .await
            .unwrap();
        assert!(keys.is_empty());
        assert!(locker.unlock_many(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_paging() {
        let locker = active_locker().await;
        let batch = entlock_common::BatchRef::new("default", "Order", ["1", "2", "3", "4", "5"]);
        locker.lock_many(batch, None).await.unwrap();

        let page = locker.list(Some(PageParam::new(2, 2))).await.unwrap();
        assert_eq!(page, vec!["default:Order:3", "default:Order:4"]);
        assert_eq!(locker.list(None).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_shutdown_drains_and_closes() {
        let locker = active_locker().await;
        locker
            .lock_many(vec![order("1"), order("2")], None)
            .await
            .unwrap();

        locker.shutdown().await.unwrap();
        assert_eq!(locker.state(), LockerState::Closed);

        let err = locker.lock_one(&order("1"), None).await.unwrap_err();
        assert_eq!(err.name(), "SERVICE_UNAVAILABLE");
        assert!(locker.init(LockerConfig::local()).await.is_err());
        // a second shutdown is a no-op
        assert!(locker.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_stats() {
        let locker = active_locker().await;
        locker.lock_one(&order("1"), None).await.unwrap();
        let _ = locker.lock_one(&order("1"), None).await;
        locker
            .lock_many(vec![order("2"), order("3")], None)
            .await
            .unwrap();
        locker.unlock_one("default:Order:2").await.unwrap();
        locker.unlock_one("default:Order:2").await.unwrap();
        locker
            .unlock_many(&["default:Order:never".to_string()])
            .await
            .unwrap();

        let stats = locker.stats().await;
        assert_eq!(stats.total_acquisitions, 3);
        assert_eq!(stats.failed_acquisitions, 1);
        assert_eq!(stats.total_releases, 1);
        assert_eq!(stats.active_locks, Some(2));
    }
}
