//! # caisse-core: Pure Ledger Logic for Cash Sessions
//!
//! This crate is the arithmetic and rule-keeping heart of the cash-session
//! ledger. Everything here is a pure function or a value type; storage,
//! locking and transactions live in `caisse-db`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caisse Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    caisse-cli / calling workflow                │   │
//! │  │    open session ──► record movements ──► close & reconcile      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    caisse-db (Session Manager, Ledger)          │   │
//! │  │              transactions, per-session locks, SQLite            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ caisse-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌────────────┐ ┌────────────────┐  │   │
//! │  │   │  money   │ │ currency │ │ projection │ │ reconciliation │  │   │
//! │  │   │  Money   │ │ Catalog  │ │  Balance   │ │ summary, gaps  │  │   │
//! │  │   └──────────┘ └──────────┘ └────────────┘ └────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO LOCKS • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Minor-unit `Money` with exact decimal parsing
//! - [`currency`] - `Currency` codes, the `CurrencyCatalog`, `CurrencyAmount`
//! - [`types`] - Registers, sessions, movements, balances, closings
//! - [`projection`] - Balance projection (opening + Σ movements)
//! - [`reconciliation`] - Summaries, discrepancies, institution breakdowns
//! - [`validation`] - Input rules
//! - [`error`] - Ledger error taxonomy
//!
//! ## Example Usage
//!
//! ```rust
//! use caisse_core::{BalanceProjection, Currency, Money, MovementKind};
//!
//! let usd = Currency::parse("USD").unwrap();
//! let mut projection = BalanceProjection::new();
//! projection.seed(usd, Money::from_minor(10_000)).unwrap();
//!
//! // The ledger owns the sign: withdrawals always subtract
//! let signed = MovementKind::Withdrawal.apply_sign(Money::from_minor(2_000)).unwrap();
//! projection.apply(usd, signed).unwrap();
//!
//! assert_eq!(projection.balance(usd).minor(), 8_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod currency;
pub mod error;
pub mod money;
pub mod projection;
pub mod reconciliation;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use currency::{Currency, CurrencyAmount, CurrencyCatalog};
pub use error::{ErrorKind, LedgerError, LedgerResult, ValidationError};
pub use money::Money;
pub use projection::{BalanceProjection, ProjectedBalance};
pub use reconciliation::{
    InstitutionResolver, InstitutionTotal, KindSummary, PrefixResolver, RollupLine,
    ShopDayRollup,
};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of opening/closing notes.
pub const MAX_NOTES_LEN: usize = 1000;

/// Maximum length of a movement description.
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Maximum length of opaque identifiers supplied by collaborators
/// (register ids, operator ids, actor ids, shop ids).
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Maximum length of an external business-transaction reference.
pub const MAX_EXTERNAL_REF_LEN: usize = 128;
