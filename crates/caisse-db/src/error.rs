//! # Database Error Types
//!
//! Error types for storage operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          LedgerError (caisse-core)          │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  DbError (this module) ◄──────── DbError::Ledger                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CliError (caisse-cli) ← { code, message } for the operator             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! "database is locked" from SQLite becomes `LedgerError::Busy`: to the
//! caller it is the same bounded-wait failure as an in-process lock timeout.

use caisse_core::{LedgerError, ValidationError};
use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// A ledger rule rejected the operation.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Registering a register id twice
    /// - Second open session on a register (mapped to `RegisterBusy` by the
    ///   session repository before it reaches callers)
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A trigger or CHECK refused the write (append-only tables, sign rule).
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Stored data could not be turned back into a domain value.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether resubmitting the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            DbError::Ledger(err) => err.is_retryable(),
            DbError::PoolExhausted => true,
            _ => false,
        }
    }

    /// The ledger rejection inside, if this is one.
    pub fn as_ledger(&self) -> Option<&LedgerError> {
        match self {
            DbError::Ledger(err) => Some(err),
            _ => None,
        }
    }

    /// True for a UNIQUE violation on `table.column`.
    pub(crate) fn is_unique_on(&self, target: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field.contains(target))
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Ledger(LedgerError::Validation(err))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → analyze message for constraint type / lock
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("database is locked") || msg.contains("database is busy") {
                    DbError::Ledger(LedgerError::busy(msg.to_string()))
                } else if msg.contains("CHECK constraint failed") || msg.contains("append-only")
                    || msg.contains("immutable")
                {
                    DbError::ConstraintViolation(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::ColumnDecode { index, source } => {
                DbError::CorruptRow(format!("column {}: {}", index, source))
            }

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(DbError::PoolExhausted.is_retryable());
        assert!(DbError::Ledger(LedgerError::busy("lock wait")).is_retryable());
        assert!(!DbError::Ledger(LedgerError::AlreadyClosed {
            session_id: "s".to_string()
        })
        .is_retryable());
        assert!(!DbError::not_found("Session", "s").is_retryable());
    }

    #[test]
    fn test_ledger_error_is_transparent() {
        let err: DbError = LedgerError::SessionNotFound("s-9".to_string()).into();
        assert_eq!(err.to_string(), "Session not found: s-9");
        assert!(err.as_ledger().is_some());
    }

    #[test]
    fn test_unique_target_match() {
        let err = DbError::duplicate("cash_sessions.register_id", "unknown");
        assert!(err.is_unique_on("cash_sessions.register_id"));
        assert!(!err.is_unique_on("cash_registers.id"));
    }
}
