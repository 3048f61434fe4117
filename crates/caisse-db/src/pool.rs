//! # Ledger Database Handle
//!
//! Connection pool, lock registry and currency catalog, bundled into the
//! `Database` handle every repository is built from.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Handle                                    │
//! │                                                                         │
//! │  DbConfig::new(path).lock_timeout(..).catalog(..)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← pool, schema, lock registry             │
//! │       │                                                                 │
//! │       ├── SqlitePool        (WAL, FKs on, busy_timeout = lock_timeout)  │
//! │       ├── Arc<LockRegistry> (session:<id>, register:<id>)               │
//! │       └── Arc<CurrencyCatalog>                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  db.sessions() / db.movements() / db.reports() / db.registers()        │
//! │  (cheap clones sharing the same pool, locks and catalog)                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! Readers never wait for writers, so balance queries and reports stay
//! responsive while a cashier is recording movements.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use caisse_core::CurrencyCatalog;

use crate::error::{DbError, DbResult};
use crate::locks::LockRegistry;
use crate::migrations;
use crate::repository::movement::MovementRepository;
use crate::repository::register::RegisterRepository;
use crate::repository::report::ReportRepository;
use crate::repository::session::SessionRepository;

/// Default bound on any lock wait.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Configuration
// =============================================================================

/// Where the ledger lives and how long a write may wait.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/caisse/caisse.db")
///     .max_connections(5)
///     .lock_timeout(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file; `:memory:` for a throwaway ledger.
    pub database_path: PathBuf,

    /// Pool ceiling. Writers are serialized by locks, so this mostly
    /// bounds concurrent readers.
    /// Default: 5
    pub max_connections: u32,

    /// Connections kept warm.
    /// Default: 1
    pub min_connections: u32,

    /// Pool acquire timeout.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// How long an unused connection lingers.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Bound on session/register lock waits and on SQLite's busy wait.
    /// Default: 5 seconds
    pub lock_timeout: Duration,

    /// Recognized currencies and their exponents.
    pub catalog: CurrencyCatalog,

    /// Apply the embedded schema on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a configuration for the given database file (created if missing).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            catalog: CurrencyCatalog::default(),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn catalog(mut self, catalog: CurrencyCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// A private in-memory ledger, used by tests.
    ///
    /// One connection only: every connection to `:memory:` is a different
    /// database.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            catalog: CurrencyCatalog::default(),
            run_migrations: true,
        }
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == ":memory:"
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared handle: every repository borrows its pool, locks and catalog.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    locks: Arc<LockRegistry>,
    catalog: Arc<CurrencyCatalog>,
}

impl Database {
    /// Creates the pool and, if enabled, applies migrations.
    ///
    /// ## SQLite Settings
    /// - WAL journal, NORMAL synchronous
    /// - foreign keys on
    /// - busy_timeout = lock_timeout, so cross-process contention is bounded
    ///   like in-process contention
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening ledger database"
        );

        let connect_url = if config.is_in_memory() {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}?mode=rwc", config.database_path.display())
        };

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(config.lock_timeout)
            .create_if_missing(true);

        debug!(busy_timeout_ms = config.lock_timeout.as_millis() as u64, "SQLite options set");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            lock_timeout_ms = config.lock_timeout.as_millis() as u64,
            currencies = config.catalog.len(),
            "Database pool created"
        );

        let db = Database {
            pool,
            locks: Arc::new(LockRegistry::new(config.lock_timeout)),
            catalog: Arc::new(config.catalog),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies all pending migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await?;
        debug!("Ledger schema up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn catalog(&self) -> &CurrencyCatalog {
        &self.catalog
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    /// Register administration (outside the ledger proper).
    pub fn registers(&self) -> RegisterRepository {
        RegisterRepository::new(self.pool.clone())
    }

    /// Session lifecycle: open, close, reopen and session reads.
    pub fn sessions(&self) -> SessionRepository {
        SessionRepository::new(self.pool.clone(), self.locks.clone(), self.catalog.clone())
    }

    /// Movement ledger and balance projector.
    pub fn movements(&self) -> MovementRepository {
        MovementRepository::new(self.pool.clone(), self.locks.clone(), self.catalog.clone())
    }

    /// Read-only reconciliation reports.
    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.pool.clone(), self.catalog.clone())
    }

    /// Closes the pool; every later repository call fails.
    pub async fn close(&self) {
        info!("Closing ledger database");
        self.pool.close().await;
    }

    /// True if a trivial query round-trips.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use caisse_core::Currency;

    #[tokio::test]
    async fn test_schema_applied_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        // Re-running is a no-op
        db.run_migrations().await.unwrap();
        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
        assert!(total >= 1);
    }

    #[tokio::test]
    async fn test_file_database_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        db.registers()
            .create("till-1", "shop-1", None, None)
            .await
            .unwrap();
        db.close().await;
        assert!(!db.health_check().await);

        let reopened = Database::new(DbConfig::new(&path)).await.unwrap();
        assert!(reopened.registers().get("till-1").await.unwrap().is_some());
    }

    #[test]
    fn test_config_builder() {
        let catalog = CurrencyCatalog::default().restrict_to(&[Currency::parse("USD").unwrap()]);
        let config = DbConfig::new("/tmp/caisse.db")
            .max_connections(10)
            .min_connections(2)
            .lock_timeout(Duration::from_millis(250))
            .catalog(catalog);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
        assert_eq!(config.catalog.len(), 1);
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }
}
