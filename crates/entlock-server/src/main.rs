//! Main entry point for the entlock process.
//!
//! Loads configuration, sets up logging, initializes the entity locker and
//! either serves until a shutdown signal or runs the demo scenario.

use clap::Parser;
use tracing::info;

use entlock_server::demo::run_demo;
use entlock_server::model::{Cli, Command, Configuration};
use entlock_server::startup;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let configuration = Configuration::from_cli(&cli)?;

    let _logging_guard = startup::init_logging(&configuration.logging_config())?;

    let locker_config = configuration.locker_config()?;
    info!(
        engine = %locker_config.engine,
        default_ttl_ms = locker_config.default_ttl_ms,
        remote_bulk_mode = %locker_config.remote_bulk_mode,
        "Starting entlock"
    );
    let locker = startup::start_locker(locker_config).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let signal = startup::listen_for_shutdown_signal();
            startup::serve(locker, signal.subscribe()).await?;
        }
        Command::Demo => {
            let steps = run_demo(&locker).await;
            println!("{}", serde_json::to_string_pretty(&steps)?);
            locker.shutdown().await?;
        }
    }

    Ok(())
}
