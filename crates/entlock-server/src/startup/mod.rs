//! Process startup: logging, locker wiring and the serve loop

pub mod logging;
pub mod shutdown;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use entlock_common::{Engine, LockerConfig};
use entlock_core::{EntityLocker, MemoryKvStore};

pub use logging::{LoggingConfig, LoggingGuard, init_logging};
pub use shutdown::{ShutdownSignal, listen_for_shutdown_signal};

/// Builds and initializes the locker for the configured engine.
///
/// No network key-value client ships with this process, so the remote engine
/// runs against an in-process store. Embedders pass their own client through
/// `EntityLocker::with_kv_client`.
pub async fn start_locker(config: LockerConfig) -> anyhow::Result<Arc<EntityLocker>> {
    let locker = match config.engine {
        Engine::Local => EntityLocker::new(),
        Engine::Remote => {
            warn!("Remote engine is backed by an in-process store in this process");
            EntityLocker::with_kv_client(Arc::new(MemoryKvStore::new()))
        }
    };

    locker.init(config).await?;
    Ok(Arc::new(locker))
}

/// Serves until the shutdown signal fires, then drains the locker
pub async fn serve(
    locker: Arc<EntityLocker>,
    mut receiver: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    info!(state = %locker.state(), "Entity locker serving, press Ctrl+C to stop");

    let _ = receiver.recv().await;

    locker.shutdown().await?;
    let stats = locker.stats().await;
    info!(
        acquisitions = stats.total_acquisitions,
        conflicts = stats.failed_acquisitions,
        releases = stats.total_releases,
        expired = stats.expired_locks,
        "Shutdown complete"
    );
    Ok(())
}
