//! Entlock Core - entity locker and its storage engines
//!
//! - `locker`: the `EntityLocker` facade callers use
//! - `local`: in-process registry with cancellable expiry timers
//! - `remote`: adapter over a shared key-value store
//! - `kv`: the key-value client capability and an in-memory store

pub mod backend;
pub mod kv;
pub mod local;
pub mod locker;
pub mod remote;
pub mod stats;

pub use backend::LockBackend;
pub use kv::{KvClient, KvError, MemoryKvStore, SET_OK};
pub use local::{LocalRegistry, LockInfo};
pub use locker::{EntityLocker, LockerState};
pub use remote::RemoteStoreAdapter;
pub use stats::{LockStats, LockStatsCollector};

pub use entlock_common::{
    BatchRef, Engine, EntityRef, LastError, LockError, LockOptions, LockTarget, LockerConfig,
    PageParam, RemoteBulkMode,
};
