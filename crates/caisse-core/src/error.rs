//! # Error Types
//!
//! Domain error taxonomy for the cash-session ledger.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  caisse-core errors (this file)                                        │
//! │  ├── LedgerError      - Rejected ledger operations                     │
//! │  └── ValidationError  - Malformed text input                           │
//! │                                                                         │
//! │  caisse-db errors (separate crate)                                     │
//! │  └── DbError          - Storage failures, wraps LedgerError            │
//! │                                                                         │
//! │  caisse-cli errors                                                     │
//! │  └── CliError         - What the operator sees (code + message)        │
//! │                                                                         │
//! │  Flow: ValidationError → LedgerError → DbError → CliError              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant is a synchronous, caller-visible rejection. Nothing here is
//! retried inside the ledger; `Busy` is the only kind a caller may resubmit.

use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

use crate::currency::Currency;

// =============================================================================
// Ledger Error
// =============================================================================

/// A rejected ledger operation.
///
/// The operation that returned it left no trace: no movement without its
/// balance update, no half-closed session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The register already has an open session.
    ///
    /// ## When This Occurs
    /// - Opening a session on a register whose current shift is still open
    /// - Reopening an old session after a newer one was opened on its register
    /// - Two concurrent opens on the same register (the loser gets this)
    #[error("Register {register_id} already has an open session")]
    RegisterBusy { register_id: String },

    /// A movement was attempted on a session that is not open.
    #[error("Session {session_id} is closed; no movements may be recorded")]
    SessionClosed { session_id: String },

    /// Close was requested on a session that is already closed.
    #[error("Session {session_id} is already closed")]
    AlreadyClosed { session_id: String },

    /// Reopen was requested on a session that is not closed.
    #[error("Session {session_id} is not closed")]
    NotClosed { session_id: String },

    /// Negative, zero (when not allowed), overflowing or malformed amount.
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Currency code outside the recognized catalog.
    #[error("Unknown currency: '{code}'")]
    UnknownCurrency { code: String },

    /// Arithmetic attempted across two different currencies.
    #[error("Currency mismatch: cannot combine {left} with {right}")]
    CurrencyMismatch { left: Currency, right: Currency },

    /// Lock contention exceeded the configured bound.
    ///
    /// ## User Workflow
    /// ```text
    /// Cashier A: record deposit ──► holds session lock
    /// Cashier B: record deposit ──► waits ... lock_timeout elapsed
    ///      │
    ///      ▼
    /// Busy { reason } ──► B resubmits (retry belongs to the caller)
    /// ```
    #[error("Ledger busy: {reason}")]
    Busy { reason: String },

    /// No session with this id.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// No register with this id.
    #[error("Register not found: {0}")]
    RegisterNotFound(String),

    /// Input validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl LedgerError {
    /// Shorthand for an `InvalidAmount` with a reason.
    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        LedgerError::InvalidAmount {
            reason: reason.into(),
        }
    }

    /// Shorthand for a `Busy` with a reason.
    pub fn busy(reason: impl Into<String>) -> Self {
        LedgerError::Busy {
            reason: reason.into(),
        }
    }

    /// Returns the stable machine-readable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::RegisterBusy { .. } => ErrorKind::RegisterBusy,
            LedgerError::SessionClosed { .. } => ErrorKind::SessionClosed,
            LedgerError::AlreadyClosed { .. } => ErrorKind::AlreadyClosed,
            LedgerError::NotClosed { .. } => ErrorKind::NotClosed,
            LedgerError::InvalidAmount { .. } => ErrorKind::InvalidAmount,
            LedgerError::UnknownCurrency { .. } => ErrorKind::UnknownCurrency,
            LedgerError::CurrencyMismatch { .. } => ErrorKind::CurrencyMismatch,
            LedgerError::Busy { .. } => ErrorKind::Busy,
            LedgerError::SessionNotFound(_) => ErrorKind::SessionNotFound,
            LedgerError::RegisterNotFound(_) => ErrorKind::RegisterNotFound,
            LedgerError::Validation(_) => ErrorKind::Validation,
        }
    }

    /// Whether resubmitting the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Busy { .. })
    }
}

/// Machine-readable error kinds, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    RegisterBusy,
    SessionClosed,
    AlreadyClosed,
    NotClosed,
    InvalidAmount,
    UnknownCurrency,
    CurrencyMismatch,
    Busy,
    SessionNotFound,
    RegisterNotFound,
    Validation,
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when text supplied by a collaborator doesn't meet
/// requirements. Used for early validation before any lock is taken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g., currency code with digits).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// The same key was supplied twice.
    #[error("{field} '{value}' given more than once")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with LedgerError.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Unit Tests
// =============================================================================
