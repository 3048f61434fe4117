//! # Repository Module
//!
//! Ledger operations over SQLite.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Every Ledger Write                                   │
//! │                                                                         │
//! │  validate input            (no lock, no connection)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  LockRegistry::acquire     (session:<id> or register:<id>, bounded)    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  pool.begin()                                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  guarded write first       UPDATE ... WHERE status = 'open'            │
//! │       │                    or INSERT ... SELECT                        │
//! │       │  0 rows? ──► look up why ──► NotFound / Closed / ...           │
//! │       ▼                                                                 │
//! │  dependent reads & writes                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  commit                    (any error before this rolls back on drop)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`RegisterRepository`](register::RegisterRepository) - Register administration
//! - [`SessionRepository`](session::SessionRepository) - Open, close, reopen
//! - [`MovementRepository`](movement::MovementRepository) - Movement ledger and balances
//! - [`ReportRepository`](report::ReportRepository) - Reconciliation reports

pub mod movement;
pub mod register;
pub mod report;
pub mod session;

use sqlx::SqliteConnection;
use std::collections::BTreeMap;

use caisse_core::{BalanceProjection, LedgerError, Money, SessionStatus};

use crate::error::DbResult;
use crate::records::{parse_currency, RecomputedRecord};

/// Status of a session, or `None` if it does not exist.
pub(crate) async fn session_status(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> DbResult<Option<SessionStatus>> {
    let status = sqlx::query_scalar::<_, SessionStatus>(
        "SELECT status FROM cash_sessions WHERE id = ?1",
    )
    .bind(session_id)
    .fetch_optional(conn)
    .await?;

    Ok(status)
}

/// Fails with `SessionNotFound` unless the session exists.
pub(crate) async fn ensure_session_exists(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> DbResult<SessionStatus> {
    session_status(conn, session_id)
        .await?
        .ok_or_else(|| LedgerError::SessionNotFound(session_id.to_string()).into())
}

/// Recomputes a session's projection from openings and the movement log.
///
/// Never reads the cached `current_minor`: this is the authoritative value
/// closes and audits are based on.
pub(crate) async fn load_projection(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> DbResult<BalanceProjection> {
    let rows = sqlx::query_as::<_, RecomputedRecord>(
        r#"
        SELECT
            c.currency AS currency,
            COALESCE((SELECT b.opening_minor FROM currency_balances b
                      WHERE b.session_id = ?1 AND b.currency = c.currency), 0) AS opening_minor,
            COALESCE((SELECT SUM(m.amount_minor) FROM cash_movements m
                      WHERE m.session_id = ?1 AND m.currency = c.currency), 0) AS movement_minor,
            (SELECT COUNT(*) FROM cash_movements m
                      WHERE m.session_id = ?1 AND m.currency = c.currency) AS movement_count
        FROM (
            SELECT currency FROM currency_balances WHERE session_id = ?1
            UNION
            SELECT currency FROM cash_movements WHERE session_id = ?1
        ) AS c
        ORDER BY c.currency
        "#,
    )
    .bind(session_id)
    .fetch_all(conn)
    .await?;

    let mut openings = BTreeMap::new();
    let mut nets = Vec::with_capacity(rows.len());
    for row in rows {
        let currency = parse_currency(&row.currency)?;
        openings.insert(currency, Money::from_minor(row.opening_minor));
        nets.push((
            currency,
            Money::from_minor(row.movement_minor),
            row.movement_count.max(0) as u64,
        ));
    }

    let mut projection = BalanceProjection::with_openings(&openings)?;
    for (currency, net, count) in nets {
        projection.apply_aggregate(currency, net, count)?;
    }
    Ok(projection)
}
