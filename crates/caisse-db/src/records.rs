//! Row shapes as SQLite returns them, and their conversion to domain types.
//!
//! Currency codes come back as text and are re-parsed; a malformed code in
//! storage is a `CorruptRow`, never silently dropped.

use chrono::{DateTime, Utc};

use caisse_core::{
    CashMovement, CashRegister, CashSession, Currency, CurrencyBalance, CurrencyDiscrepancy,
    MovementKind, SessionStatus,
};

use crate::error::{DbError, DbResult};

pub(crate) fn parse_currency(code: &str) -> DbResult<Currency> {
    Currency::parse(code).map_err(|e| DbError::CorruptRow(format!("currency '{}': {}", code, e)))
}

// =============================================================================
// Registers & Sessions
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct RegisterRecord {
    pub id: String,
    pub shop_id: String,
    pub counter_id: Option<String>,
    pub assigned_operator_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<RegisterRecord> for CashRegister {
    fn from(r: RegisterRecord) -> Self {
        CashRegister {
            id: r.id,
            shop_id: r.shop_id,
            counter_id: r.counter_id,
            assigned_operator_id: r.assigned_operator_id,
            created_at: r.created_at,
        }
    }
}

pub(crate) const SESSION_COLUMNS: &str = "id, register_id, operator_id, status, opened_at, \
     closed_at, opening_notes, closing_notes, opened_by, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct SessionRecord {
    pub id: String,
    pub register_id: String,
    pub operator_id: String,
    pub status: SessionStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub opening_notes: Option<String>,
    pub closing_notes: Option<String>,
    pub opened_by: String,
    pub updated_at: DateTime<Utc>,
}

impl From<SessionRecord> for CashSession {
    fn from(r: SessionRecord) -> Self {
        CashSession {
            id: r.id,
            register_id: r.register_id,
            operator_id: r.operator_id,
            status: r.status,
            opened_at: r.opened_at,
            closed_at: r.closed_at,
            opening_notes: r.opening_notes,
            closing_notes: r.closing_notes,
            opened_by: r.opened_by,
            updated_at: r.updated_at,
        }
    }
}

// =============================================================================
// Movements & Balances
// =============================================================================

pub(crate) const MOVEMENT_COLUMNS: &str = "id, session_id, kind, amount_minor, currency, \
     description, external_ref, actor_id, created_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct MovementRecord {
    pub id: String,
    pub session_id: String,
    pub kind: MovementKind,
    pub amount_minor: i64,
    pub currency: String,
    pub description: String,
    pub external_ref: Option<String>,
    pub actor_id: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MovementRecord> for CashMovement {
    type Error = DbError;

    fn try_from(r: MovementRecord) -> DbResult<Self> {
        Ok(CashMovement {
            currency: parse_currency(&r.currency)?,
            id: r.id,
            session_id: r.session_id,
            kind: r.kind,
            amount_minor: r.amount_minor,
            description: r.description,
            external_ref: r.external_ref,
            actor_id: r.actor_id,
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct BalanceRecord {
    pub session_id: String,
    pub currency: String,
    pub opening_minor: i64,
    pub current_minor: i64,
}

impl TryFrom<BalanceRecord> for CurrencyBalance {
    type Error = DbError;

    fn try_from(r: BalanceRecord) -> DbResult<Self> {
        Ok(CurrencyBalance {
            currency: parse_currency(&r.currency)?,
            session_id: r.session_id,
            opening_minor: r.opening_minor,
            current_minor: r.current_minor,
        })
    }
}

/// Opening and movement sum of one currency, computed from the ledger.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct RecomputedRecord {
    pub currency: String,
    pub opening_minor: i64,
    pub movement_minor: i64,
    pub movement_count: i64,
}

// =============================================================================
// Closings
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ClosingRecord {
    pub id: String,
    pub session_id: String,
    pub sequence: i64,
    pub closed_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub actor_id: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct DiscrepancyRecord {
    pub closing_id: String,
    pub currency: String,
    pub counted_minor: i64,
    pub projected_minor: i64,
    pub discrepancy_minor: i64,
}

impl TryFrom<DiscrepancyRecord> for CurrencyDiscrepancy {
    type Error = DbError;

    fn try_from(r: DiscrepancyRecord) -> DbResult<Self> {
        Ok(CurrencyDiscrepancy {
            currency: parse_currency(&r.currency)?,
            counted_minor: r.counted_minor,
            projected_minor: r.projected_minor,
            discrepancy_minor: r.discrepancy_minor,
        })
    }
}

/// Converts a list of records, failing on the first bad row.
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> DbResult<Vec<T>>
where
    T: TryFrom<R, Error = DbError>,
{
    rows.into_iter().map(T::try_from).collect()
}
