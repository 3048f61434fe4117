//! # CLI Error Type
//!
//! The one error shape the operator sees.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Error Flow in caisse                               │
//! │                                                                         │
//! │  caisse movement record S-1 deposit USD=12.50 --actor c-1               │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Command Function                                                │  │
//! │  │  Result<Value, CliError>                                         │  │
//! │  │         │                                                        │  │
//! │  │  Ledger rule? ──── LedgerError::SessionClosed ──┐               │  │
//! │  │         │                                       │               │  │
//! │  │  Storage?  ─────── DbError::QueryFailed ────────┼─► CliError    │  │
//! │  │         │                                       │   {code,      │  │
//! │  │  Config?   ─────── ConfigError::Parse ──────────┘    message}   │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  stderr: { "code": "SESSION_CLOSED", "message": "..." }   exit 3       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Exit Codes
//! | code | meaning                                   |
//! |------|-------------------------------------------|
//! | 2    | bad input (validation, amount, currency)  |
//! | 3    | ledger state refused the operation        |
//! | 4    | not found                                 |
//! | 5    | busy, try again                           |
//! | 6    | configuration                             |
//! | 10   | storage or internal failure               |

use caisse_core::{ErrorKind, LedgerError, ValidationError};
use caisse_db::DbError;
use serde::Serialize;

use crate::config::ConfigError;

/// Error printed by the CLI on failure.
///
/// ## Serialization
/// ```json
/// {
///   "code": "REGISTER_BUSY",
///   "message": "Register till-1 already has an open session"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct CliError {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

/// Error codes for CLI output.
///
/// Ledger rejections keep their own kind so scripts can branch on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Ledger(ErrorKind),
    Cli(CliCode),
}

/// Codes for failures that are not ledger rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CliCode {
    NotFound,
    Duplicate,
    InvalidArgument,
    ConfigError,
    DatabaseError,
    Internal,
}

impl CliError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        CliError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        CliError::new(
            ErrorCode::Cli(CliCode::NotFound),
            format!("{} not found: {}", resource, id),
        )
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        CliError::new(ErrorCode::Cli(CliCode::InvalidArgument), message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CliError::new(ErrorCode::Cli(CliCode::Internal), message)
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self.code {
            ErrorCode::Ledger(kind) => match kind {
                ErrorKind::InvalidAmount
                | ErrorKind::UnknownCurrency
                | ErrorKind::CurrencyMismatch
                | ErrorKind::Validation => 2,
                ErrorKind::RegisterBusy
                | ErrorKind::SessionClosed
                | ErrorKind::AlreadyClosed
                | ErrorKind::NotClosed => 3,
                ErrorKind::SessionNotFound | ErrorKind::RegisterNotFound => 4,
                ErrorKind::Busy => 5,
            },
            ErrorCode::Cli(CliCode::InvalidArgument) | ErrorCode::Cli(CliCode::Duplicate) => 2,
            ErrorCode::Cli(CliCode::NotFound) => 4,
            ErrorCode::Cli(CliCode::ConfigError) => 6,
            ErrorCode::Cli(CliCode::DatabaseError) | ErrorCode::Cli(CliCode::Internal) => 10,
        }
    }

    /// Pretty JSON for stderr.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.to_string())
    }
}

impl From<LedgerError> for CliError {
    fn from(err: LedgerError) -> Self {
        CliError::new(ErrorCode::Ledger(err.kind()), err.to_string())
    }
}

impl From<ValidationError> for CliError {
    fn from(err: ValidationError) -> Self {
        LedgerError::from(err).into()
    }
}

/// Converts storage errors, hiding driver detail behind a log line.
impl From<DbError> for CliError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Ledger(e) => e.into(),
            DbError::NotFound { entity, id } => CliError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => CliError::new(
                ErrorCode::Cli(CliCode::Duplicate),
                format!("{} '{}' already exists", field, value),
            ),
            DbError::PoolExhausted => CliError::new(
                ErrorCode::Cli(CliCode::DatabaseError),
                "Database pool exhausted",
            ),
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                CliError::new(
                    ErrorCode::Cli(CliCode::DatabaseError),
                    "Database connection failed",
                )
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Migration failed: {}", e);
                CliError::new(
                    ErrorCode::Cli(CliCode::DatabaseError),
                    "Database migration failed",
                )
            }
            other => {
                tracing::error!("Database operation failed: {}", other);
                CliError::new(
                    ErrorCode::Cli(CliCode::DatabaseError),
                    "Database operation failed",
                )
            }
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::new(ErrorCode::Cli(CliCode::ConfigError), err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::internal(format!("Could not serialize output: {}", err))
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for CliError {}
