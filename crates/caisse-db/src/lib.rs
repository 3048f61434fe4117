//! # caisse-db: Storage Layer for the Cash-Session Ledger
//!
//! Persists sessions, movements, balances and closings in SQLite and runs
//! every ledger write as one locked transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caisse Data Flow                                 │
//! │                                                                         │
//! │  caisse-cli (movement record ...)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     caisse-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │ SqlitePool    │◄───│ SessionRepo    │    │ 001_initial  │  │   │
//! │  │   │ LockRegistry  │    │ MovementRepo   │    │   _schema    │  │   │
//! │  │   │ Catalog       │    │ ReportRepo     │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  caisse-core (projection, reconciliation, validation)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caisse_db::{Database, DbConfig};
//! use caisse_core::{Currency, Money, MovementKind, NewMovement, OpenSession};
//!
//! let db = Database::new(DbConfig::new("caisse.db")).await?;
//! let usd = Currency::parse("USD")?;
//!
//! let session = db
//!     .sessions()
//!     .open(&OpenSession::new("till-1", "cashier-7").with_opening(usd, Money::from_minor(10_000)))
//!     .await?;
//!
//! let deposit = NewMovement::new(MovementKind::Deposit, Money::from_minor(5_000), usd, "cashier-7");
//! db.movements().record(&session.id, &deposit).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod locks;
pub mod migrations;
pub mod pool;
mod records;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use locks::LockRegistry;
pub use pool::{Database, DbConfig, DEFAULT_LOCK_TIMEOUT};

pub use repository::movement::MovementRepository;
pub use repository::register::RegisterRepository;
pub use repository::report::ReportRepository;
pub use repository::session::{ClosedSession, SessionRepository};
