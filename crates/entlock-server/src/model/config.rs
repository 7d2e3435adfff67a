//! Configuration management for the entlock process
//!
//! Values are read from `conf/application.yml` (optional) and from
//! `ENTLOCK_*` environment variables, e.g. `ENTLOCK_LOCK__ENGINE=remote`.
//! Command line flags override both.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use config::{Config, Environment};

use entlock_common::{DEFAULT_TTL_MS, Engine, LockerConfig, RemoteBulkMode};

use crate::startup::logging::LoggingConfig;

pub const LOCK_ENGINE: &str = "lock.engine";
pub const LOCK_DEFAULT_TTL_MS: &str = "lock.default_ttl_ms";
pub const LOCK_PERSISTENT: &str = "lock.persistent";
pub const LOCK_REMOTE_BULK_MODE: &str = "lock.remote_bulk_mode";
pub const LOGS_PATH: &str = "logs.path";
pub const LOGS_LEVEL: &str = "logs.level";
pub const LOGS_CONSOLE: &str = "logs.console";
pub const LOGS_FILE: &str = "logs.file";

pub const DEFAULT_CONFIG_FILE: &str = "conf/application.yml";

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "entlock", version, about = "Entity lock service")]
pub struct Cli {
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: String,
    #[arg(short = 'e', long = "engine", env = "ENTLOCK_ENGINE")]
    pub engine: Option<String>,
    #[arg(long = "default-ttl-ms")]
    pub default_ttl_ms: Option<u64>,
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Initialize the locker and run until Ctrl-C
    Serve,
    /// Run a short lock/unlock scenario and print each outcome
    Demo,
}

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let mut builder = Config::builder()
            .add_source(config::File::with_name(&cli.config_file).required(false))
            .add_source(
                Environment::with_prefix("ENTLOCK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Some(v) = &cli.engine {
            builder = builder.set_override(LOCK_ENGINE, v.as_str())?;
        }
        if let Some(v) = cli.default_ttl_ms {
            builder = builder.set_override(LOCK_DEFAULT_TTL_MS, v)?;
        }
        if let Some(v) = &cli.log_level {
            builder = builder.set_override(LOGS_LEVEL, v.as_str())?;
        }

        Ok(Self::from_config(builder.build()?))
    }

    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    // ========================================================================
    // Lock Configuration
    // ========================================================================

    pub fn lock_engine(&self) -> anyhow::Result<Engine> {
        match self.config.get_string(LOCK_ENGINE) {
            Ok(v) => v.parse().map_err(anyhow::Error::msg),
            Err(_) => Ok(Engine::Local),
        }
    }

    pub fn lock_default_ttl_ms(&self) -> u64 {
        self.config
            .get_int(LOCK_DEFAULT_TTL_MS)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(DEFAULT_TTL_MS)
    }

    pub fn lock_persistent(&self) -> bool {
        self.config.get_bool(LOCK_PERSISTENT).unwrap_or(false)
    }

    pub fn lock_remote_bulk_mode(&self) -> anyhow::Result<RemoteBulkMode> {
        match self.config.get_string(LOCK_REMOTE_BULK_MODE) {
            Ok(v) => v.parse().map_err(anyhow::Error::msg),
            Err(_) => Ok(RemoteBulkMode::default()),
        }
    }

    pub fn locker_config(&self) -> anyhow::Result<LockerConfig> {
        Ok(LockerConfig {
            engine: self.lock_engine()?,
            default_ttl_ms: self.lock_default_ttl_ms(),
            persistent: self.lock_persistent(),
            remote_bulk_mode: self.lock_remote_bulk_mode()?,
        })
    }

    // ========================================================================
    // Logging Configuration
    // ========================================================================

    pub fn log_dir(&self) -> Option<String> {
        self.config.get_string(LOGS_PATH).ok()
    }

    pub fn log_level(&self) -> String {
        self.config
            .get_string(LOGS_LEVEL)
            .unwrap_or_else(|_| "info".to_string())
    }

    pub fn log_console(&self) -> bool {
        self.config.get_bool(LOGS_CONSOLE).unwrap_or(true)
    }

    pub fn log_file(&self) -> bool {
        self.config.get_bool(LOGS_FILE).unwrap_or(false)
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::from_config(
            self.log_dir().map(PathBuf::from),
            self.log_console(),
            self.log_file(),
            &self.log_level(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn cli(config_file: &str) -> Cli {
        Cli {
            config_file: config_file.to_string(),
            engine: None,
            default_ttl_ms: None,
            log_level: None,
            command: None,
        }
    }

    #[test]
    fn test_defaults_without_config_file() {
        let configuration = Configuration::from_cli(&cli("does/not/exist.yml")).unwrap();
        let locker = configuration.locker_config().unwrap();

        assert_eq!(locker, LockerConfig::default());
        assert_eq!(configuration.log_level(), "info");
        assert!(!configuration.log_file());
    }

    #[test]
    fn test_values_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(
            file,
            "lock:\n  engine: remote\n  default_ttl_ms: 5000\n  persistent: true\n  remote_bulk_mode: unconditional\nlogs:\n  level: debug"
        )
        .unwrap();

        let path = file.path().to_string_lossy().to_string();
        let configuration = Configuration::from_cli(&cli(&path)).unwrap();
        let locker = configuration.locker_config().unwrap();

        assert_eq!(locker.engine, Engine::Remote);
        assert_eq!(locker.default_ttl_ms, 5000);
        assert!(locker.persistent);
        assert_eq!(locker.remote_bulk_mode, RemoteBulkMode::Unconditional);
        assert_eq!(configuration.log_level(), "debug");
    }

    #[test]
    fn test_cli_overrides() {
        let mut args = cli("does/not/exist.yml");
        args.engine = Some("remote".to_string());
        args.default_ttl_ms = Some(250);

        let locker = Configuration::from_cli(&args)
            .unwrap()
            .locker_config()
            .unwrap();

        assert_eq!(locker.engine, Engine::Remote);
        assert_eq!(locker.default_ttl_ms, 250);
    }

    #[test]
    fn test_invalid_engine_is_an_error() {
        let config = Config::builder()
            .set_default(LOCK_ENGINE, "zookeeper")
            .unwrap()
            .build()
            .unwrap();

        assert!(Configuration::from_config(config).locker_config().is_err());
    }
}
