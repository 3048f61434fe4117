//! # caisse-cli
//!
//! Command-line front end for the cash-session ledger.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        caisse Startup                                   │
//! │                                                                         │
//! │  1. Parse arguments (clap)                                             │
//! │  2. Initialize tracing (stderr, RUST_LOG)                              │
//! │  3. Load caisse.toml + CAISSE_* overrides                              │
//! │  4. Open database, run migrations                                      │
//! │  5. Dispatch command ──► caisse-db repositories                        │
//! │  6. Print JSON to stdout (errors to stderr, non-zero exit)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

use serde_json::Value;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

use caisse_db::Database;

use crate::cli::Cli;
use crate::commands::Context;
use crate::config::AppConfig;
use crate::error::CliError;

/// Loads configuration, opens the database and runs one command.
pub async fn run(cli: Cli) -> Result<Value, CliError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(path) = cli.db {
        config.database.path = Some(path);
    }

    let db_config = config.db_config()?;
    debug!(path = %db_config.database_path.display(), "Opening ledger database");
    let db = Database::new(db_config).await?;

    let ctx = Context::new(db, config);
    let result = commands::dispatch(&ctx, cli.command).await;
    ctx.db.close().await;
    result
}

/// Initializes the tracing subscriber.
///
/// Logs go to stderr so stdout carries only JSON.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=caisse_db=trace` - Trace the storage layer only
/// - Default: `info,caisse=debug,sqlx=warn`
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,caisse=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[tokio::test]
    async fn test_run_against_a_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("caisse.db");
        let config_path = dir.path().join("caisse.toml");
        std::fs::write(&config_path, "[currencies]\nallowed = [\"USD\"]\n").unwrap();

        let args = |rest: &[&str]| {
            let mut argv = vec![
                "caisse".to_string(),
                "--config".to_string(),
                config_path.display().to_string(),
                "--db".to_string(),
                db_path.display().to_string(),
            ];
            argv.extend(rest.iter().map(|s| s.to_string()));
            Cli::try_parse_from(argv).unwrap()
        };

        run(args(&["register", "add", "till-1", "--shop", "shop-1"]))
            .await
            .unwrap();
        let opened = run(args(&["session", "open", "till-1", "--operator", "c-1", "--amount", "USD=10"]))
            .await
            .unwrap();
        assert_eq!(opened["status"], "open");

        // State survives between invocations
        let shown = run(args(&["register", "show", "till-1"])).await.unwrap();
        assert_eq!(shown["open_session"]["id"], opened["id"]);

        // The allow-list from the file is in force
        let err = run(args(&["session", "open", "till-1", "--operator", "c-1", "--amount", "CDF=1"]))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
