//! Locker configuration and per-call lock options

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_OWNER, DEFAULT_TTL_MS};

/// Storage strategy for lock state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// In-process registry
    #[default]
    Local,
    /// External shared key-value store
    Remote,
}

impl Engine {
    pub fn as_str(self) -> &'static str {
        match self {
            Engine::Local => "local",
            Engine::Remote => "remote",
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Engine::Local),
            "remote" => Ok(Engine::Remote),
            _ => Err(format!("Invalid engine: {}", s)),
        }
    }
}

/// How the remote engine claims several keys in one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteBulkMode {
    /// Claim each key only if absent and roll back on the first conflict.
    /// Absence-checked but not atomic across keys.
    #[default]
    Conditional,
    /// One unconditional multi-set. Overwrites keys held by other owners.
    Unconditional,
}

impl RemoteBulkMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RemoteBulkMode::Conditional => "conditional",
            RemoteBulkMode::Unconditional => "unconditional",
        }
    }
}

impl std::fmt::Display for RemoteBulkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RemoteBulkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "conditional" => Ok(RemoteBulkMode::Conditional),
            "unconditional" => Ok(RemoteBulkMode::Unconditional),
            _ => Err(format!("Invalid remote bulk mode: {}", s)),
        }
    }
}

/// Configuration consumed by `EntityLocker::init`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockerConfig {
    #[serde(default)]
    pub engine: Engine,
    #[serde(default = "default_ttl_ms")]
    pub default_ttl_ms: u64,
    /// Carried through for callers and logs. Lock expiry is decided per call by `auto`.
    #[serde(default)]
    pub persistent: bool,
    #[serde(default)]
    pub remote_bulk_mode: RemoteBulkMode,
}

fn default_ttl_ms() -> u64 {
    DEFAULT_TTL_MS
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self {
            engine: Engine::Local,
            default_ttl_ms: DEFAULT_TTL_MS,
            persistent: false,
            remote_bulk_mode: RemoteBulkMode::Conditional,
        }
    }
}

impl LockerConfig {
    pub fn local() -> Self {
        Self::default()
    }

    pub fn remote() -> Self {
        Self {
            engine: Engine::Remote,
            ..Default::default()
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn with_remote_bulk_mode(mut self, mode: RemoteBulkMode) -> Self {
        self.remote_bulk_mode = mode;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }
}

/// Per-call options for lock operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockOptions {
    /// Start an expiry timer. Unset means no timer.
    pub auto: Option<bool>,
    pub ttl: Option<Duration>,
    pub owner: Option<String>,
}

impl LockOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Auto-expiring lock with the given TTL
    pub fn expiring(ttl: Duration) -> Self {
        Self {
            auto: Some(true),
            ttl: Some(ttl),
            owner: None,
        }
    }

    pub fn with_auto(mut self, auto: bool) -> Self {
        self.auto = Some(auto);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Fills unset fields from the locker configuration
    pub fn resolve(&self, config: &LockerConfig) -> ResolvedOptions {
        ResolvedOptions {
            auto: self.auto.unwrap_or(false),
            ttl: self.ttl.unwrap_or_else(|| config.default_ttl()),
            owner: self
                .owner
                .as_deref()
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_OWNER)
                .to_string(),
        }
    }
}

/// Lock options with every default applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub auto: bool,
    pub ttl: Duration,
    pub owner: String,
}
