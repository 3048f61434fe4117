//! # Domain Types
//!
//! Core domain types of the cash-session ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  CashRegister   │   │   CashSession   │   │  CashMovement   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │◄──│  register_id    │◄──│  session_id     │       │
//! │  │  shop_id        │   │  operator_id    │   │  kind           │       │
//! │  │  counter_id?    │   │  status         │   │  amount_minor ± │       │
//! │  │  operator?      │   │  opened/closed  │   │  currency       │       │
//! │  └─────────────────┘   └────────┬────────┘   └─────────────────┘       │
//! │                                 │                                       │
//! │                 ┌───────────────┴──────────────┐                        │
//! │                 ▼                              ▼                        │
//! │  ┌─────────────────────┐          ┌──────────────────────────┐         │
//! │  │  CurrencyBalance    │          │  SessionClosing          │         │
//! │  │  opening + Σ moves  │          │  sequence, discrepancies │         │
//! │  └─────────────────────┘          └──────────────────────────┘         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Movements and closings are append-only. Sessions only ever change through
//! the open → closed → open transitions owned by the session manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::currency::Currency;
use crate::error::{LedgerError, LedgerResult, ValidationError};
use crate::money::Money;

// =============================================================================
// Cash Register
// =============================================================================

/// A physical till. Administered outside the ledger; read at open time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashRegister {
    pub id: String,
    pub shop_id: String,
    pub counter_id: Option<String>,
    /// Operator pre-assigned to this till, if any.
    pub assigned_operator_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CashRegister {
    /// Who owns a shift opened on this register.
    ///
    /// The assigned operator wins; otherwise the person asking to open it.
    pub fn operator_for<'a>(&'a self, requester_id: &'a str) -> &'a str {
        self.assigned_operator_id.as_deref().unwrap_or(requester_id)
    }
}

// =============================================================================
// Session Status
// =============================================================================

/// Status of a cash session. There is no cancelled/void state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Shift in progress; movements accepted.
    Open,
    /// Shift sealed; movements rejected.
    Closed,
}

impl SessionStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Cash Session
// =============================================================================

/// One working shift of one register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashSession {
    pub id: String,
    pub register_id: String,
    /// Owner of the shift.
    pub operator_id: String,
    pub status: SessionStatus,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    /// Null while open; cleared again by a reopen.
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    pub opening_notes: Option<String>,
    pub closing_notes: Option<String>,
    /// Who asked for the open (may differ from the operator).
    pub opened_by: String,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl CashSession {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }
}

// =============================================================================
// Movement Kind
// =============================================================================

/// What caused a movement. The kind alone decides the sign.
///
/// ## Sign Table
/// ```text
/// ┌────────────────┬──────┐
/// │ kind           │ sign │
/// ├────────────────┼──────┤
/// │ deposit        │  +   │
/// │ withdrawal     │  −   │
/// │ exchange_in    │  +   │
/// │ exchange_out   │  −   │
/// │ adjustment_in  │  +   │
/// │ adjustment_out │  −   │
/// └────────────────┴──────┘
/// ```
///
/// Callers pass a non-negative magnitude; they never negate anything
/// themselves.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Client cash handed in.
    Deposit,
    /// Client cash paid out.
    Withdrawal,
    /// Currency received in an exchange.
    ExchangeIn,
    /// Currency handed out in an exchange.
    ExchangeOut,
    /// Manual correction upwards.
    AdjustmentIn,
    /// Manual correction downwards.
    AdjustmentOut,
}

impl MovementKind {
    /// Every kind, in table order.
    pub const ALL: [MovementKind; 6] = [
        MovementKind::Deposit,
        MovementKind::Withdrawal,
        MovementKind::ExchangeIn,
        MovementKind::ExchangeOut,
        MovementKind::AdjustmentIn,
        MovementKind::AdjustmentOut,
    ];

    /// +1 for money entering the till, -1 for money leaving it.
    pub const fn sign(&self) -> i64 {
        match self {
            MovementKind::Deposit | MovementKind::ExchangeIn | MovementKind::AdjustmentIn => 1,
            MovementKind::Withdrawal | MovementKind::ExchangeOut | MovementKind::AdjustmentOut => {
                -1
            }
        }
    }

    #[inline]
    pub const fn is_inflow(&self) -> bool {
        self.sign() > 0
    }

    /// Turns a magnitude into the signed amount that gets stored.
    ///
    /// ```rust
    /// use caisse_core::{Money, MovementKind};
    ///
    /// let out = MovementKind::AdjustmentOut.apply_sign(Money::from_minor(50)).unwrap();
    /// assert_eq!(out.minor(), -50);
    ///
    /// // A negative magnitude is a caller bug, not a double negative
    /// assert!(MovementKind::Withdrawal.apply_sign(Money::from_minor(-50)).is_err());
    /// ```
    pub fn apply_sign(&self, magnitude: Money) -> LedgerResult<Money> {
        if magnitude.is_negative() {
            return Err(LedgerError::invalid_amount(format!(
                "magnitude must not be negative (got {})",
                magnitude.minor()
            )));
        }
        if self.is_inflow() {
            Ok(magnitude)
        } else {
            magnitude.checked_neg()
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Deposit => "deposit",
            MovementKind::Withdrawal => "withdrawal",
            MovementKind::ExchangeIn => "exchange_in",
            MovementKind::ExchangeOut => "exchange_out",
            MovementKind::AdjustmentIn => "adjustment_in",
            MovementKind::AdjustmentOut => "adjustment_out",
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        MovementKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "kind".to_string(),
                reason: format!(
                    "'{}' is not one of deposit, withdrawal, exchange_in, exchange_out, adjustment_in, adjustment_out",
                    s.trim()
                ),
            })
    }
}

// =============================================================================
// Cash Movement
// =============================================================================

/// An immutable ledger entry. Corrections are new, offsetting entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashMovement {
    pub id: String,
    pub session_id: String,
    pub kind: MovementKind,
    /// Signed amount in minor units, as stored.
    pub amount_minor: i64,
    #[ts(as = "String")]
    pub currency: Currency,
    pub description: String,
    /// Client operation (or other business transaction) that caused it.
    pub external_ref: Option<String>,
    pub actor_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CashMovement {
    /// Returns the signed amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_minor(self.amount_minor)
    }
}

/// A request to append a movement.
///
/// ## Example
/// ```rust
/// use caisse_core::{Currency, Money, MovementKind, NewMovement};
///
/// let usd = Currency::parse("USD").unwrap();
/// let request = NewMovement::new(MovementKind::Deposit, Money::from_minor(5_000), usd, "cashier-7")
///     .with_description("client deposit")
///     .with_external_ref("op-991");
/// assert_eq!(request.signed_amount().unwrap().minor(), 5_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub kind: MovementKind,
    /// Non-negative magnitude; the kind supplies the sign.
    pub magnitude: Money,
    pub currency: Currency,
    pub description: String,
    pub external_ref: Option<String>,
    pub actor_id: String,
    /// Accept a zero magnitude (documentation-only entries).
    #[serde(default)]
    pub allow_zero: bool,
}

impl NewMovement {
    pub fn new(
        kind: MovementKind,
        magnitude: Money,
        currency: Currency,
        actor_id: impl Into<String>,
    ) -> Self {
        NewMovement {
            kind,
            magnitude,
            currency,
            description: String::new(),
            external_ref: None,
            actor_id: actor_id.into(),
            allow_zero: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_external_ref(mut self, external_ref: impl Into<String>) -> Self {
        self.external_ref = Some(external_ref.into());
        self
    }

    pub fn allowing_zero(mut self) -> Self {
        self.allow_zero = true;
        self
    }

    /// Checks the magnitude rules and applies the sign table.
    ///
    /// ## Rules
    /// - magnitude < 0 → `InvalidAmount`
    /// - magnitude = 0 → `InvalidAmount` unless `allow_zero`
    pub fn signed_amount(&self) -> LedgerResult<Money> {
        if self.magnitude.is_zero() && !self.allow_zero {
            return Err(LedgerError::invalid_amount(
                "movement amount must be greater than zero",
            ));
        }
        self.kind.apply_sign(self.magnitude)
    }
}

// =============================================================================
// Session Requests
// =============================================================================

/// A request to open a register for a shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSession {
    pub register_id: String,
    /// Whoever asks; becomes the operator unless the register has one assigned.
    pub requester_id: String,
    /// Counted float per currency. Unlisted currencies start at zero.
    pub opening_amounts: BTreeMap<Currency, Money>,
    pub notes: Option<String>,
}

impl OpenSession {
    pub fn new(register_id: impl Into<String>, requester_id: impl Into<String>) -> Self {
        OpenSession {
            register_id: register_id.into(),
            requester_id: requester_id.into(),
            opening_amounts: BTreeMap::new(),
            notes: None,
        }
    }

    pub fn with_opening(mut self, currency: Currency, amount: Money) -> Self {
        self.opening_amounts.insert(currency, amount);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// A request to close a shift with the manager's physical count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseSession {
    pub session_id: String,
    pub actor_id: String,
    /// Counted cash per currency. A projected currency left out counts as zero.
    pub counted_amounts: BTreeMap<Currency, Money>,
    pub notes: Option<String>,
}

impl CloseSession {
    pub fn new(session_id: impl Into<String>, actor_id: impl Into<String>) -> Self {
        CloseSession {
            session_id: session_id.into(),
            actor_id: actor_id.into(),
            counted_amounts: BTreeMap::new(),
            notes: None,
        }
    }

    pub fn with_count(mut self, currency: Currency, amount: Money) -> Self {
        self.counted_amounts.insert(currency, amount);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

// =============================================================================
// Currency Balance
// =============================================================================

/// Projected balance of one currency within one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CurrencyBalance {
    pub session_id: String,
    #[ts(as = "String")]
    pub currency: Currency,
    pub opening_minor: i64,
    /// opening + Σ signed movements.
    pub current_minor: i64,
}

impl CurrencyBalance {
    #[inline]
    pub fn opening(&self) -> Money {
        Money::from_minor(self.opening_minor)
    }

    #[inline]
    pub fn current(&self) -> Money {
        Money::from_minor(self.current_minor)
    }

    /// Net effect of the movements alone.
    pub fn movement_total(&self) -> Money {
        self.current() - self.opening()
    }
}

/// A cached balance that disagrees with its recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BalanceDrift {
    #[ts(as = "String")]
    pub currency: Currency,
    pub cached_minor: i64,
    pub recomputed_minor: i64,
}

// =============================================================================
// Closing Records
// =============================================================================

/// Counted versus projected for one currency at one close.
///
/// `discrepancy = counted − projected`: positive is a surplus, negative a
/// shortfall. Never clamped, never rounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CurrencyDiscrepancy {
    #[ts(as = "String")]
    pub currency: Currency,
    pub counted_minor: i64,
    pub projected_minor: i64,
    pub discrepancy_minor: i64,
}

impl CurrencyDiscrepancy {
    #[inline]
    pub fn discrepancy(&self) -> Money {
        Money::from_minor(self.discrepancy_minor)
    }

    #[inline]
    pub fn is_balanced(&self) -> bool {
        self.discrepancy_minor == 0
    }

    #[inline]
    pub fn is_surplus(&self) -> bool {
        self.discrepancy_minor > 0
    }

    #[inline]
    pub fn is_shortfall(&self) -> bool {
        self.discrepancy_minor < 0
    }
}

/// One close of a session. A session closed, reopened and closed again has
/// two of these; neither is ever rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionClosing {
    pub id: String,
    pub session_id: String,
    /// 1 for the first close, 2 after one reopen, ...
    pub sequence: i64,
    #[ts(as = "String")]
    pub closed_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub actor_id: String,
    pub discrepancies: Vec<CurrencyDiscrepancy>,
}

impl SessionClosing {
    /// True when every currency reconciled exactly.
    pub fn is_balanced(&self) -> bool {
        self.discrepancies.iter().all(|d| d.is_balanced())
    }

    /// Discrepancy for one currency (zero if the currency was not involved).
    pub fn discrepancy_for(&self, currency: Currency) -> Money {
        self.discrepancies
            .iter()
            .find(|d| d.currency == currency)
            .map(|d| d.discrepancy())
            .unwrap_or_default()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
