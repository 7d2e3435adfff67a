//! Storage engine abstraction behind the entity locker

use async_trait::async_trait;

use entlock_common::{Engine, ResolvedOptions, Result};

/// Lock state storage. One implementation is selected when the locker is initialized.
///
/// Every method completes with either a value or a structured `LockError`.
/// Release operations are idempotent.
#[async_trait]
pub trait LockBackend: Send + Sync {
    fn engine(&self) -> Engine;

    /// Claims `key`, failing with `Conflict` if it is already held
    async fn try_acquire(&self, key: &str, options: &ResolvedOptions) -> Result<String>;

    /// Returns how many locks were actually removed
    async fn release(&self, key: &str) -> Result<u64>;

    /// Claims every key in order. On conflict the error names the offending key.
    async fn bulk_try_acquire(
        &self,
        keys: &[String],
        options: &ResolvedOptions,
    ) -> Result<Vec<String>>;

    async fn bulk_release(&self, keys: &[String]) -> Result<u64>;

    /// Currently held keys, sorted
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Drops all lock state owned by this process. Returns how many locks were released.
    async fn drain(&self) -> Result<usize>;
}
