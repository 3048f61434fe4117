//! # Session Repository
//!
//! The cash session manager: opening, closing and reopening shifts.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Session Lifecycle                                 │
//! │                                                                         │
//! │   open(register, float) ──► OPEN ──── close(count) ────► CLOSED         │
//! │          │                   ▲                              │           │
//! │          │                   └──── reopen (privileged) ─────┘           │
//! │          │                                                              │
//! │          └── RegisterBusy if the till already has an OPEN session       │
//! │                                                                         │
//! │   Every close appends a SessionClosing (sequence 1, 2, ...).           │
//! │   Reopen never removes one.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Authorization of the privileged reopen belongs to the caller; this layer
//! only records who asked.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use caisse_core::reconciliation::discrepancies;
use caisse_core::validation::{validate_amounts, validate_identifier, validate_notes};
use caisse_core::{
    CashSession, CloseSession, CurrencyCatalog, LedgerError, OpenSession, SessionClosing,
    SessionStatus,
};

use crate::error::{DbError, DbResult};
use crate::locks::{register_key, session_key, LockRegistry};
use crate::records::{
    convert_all, ClosingRecord, DiscrepancyRecord, SessionRecord, SESSION_COLUMNS,
};
use crate::repository::{ensure_session_exists, load_projection, session_status};

/// Result of a close: the sealed session and what the count showed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedSession {
    pub session: CashSession,
    pub closing: SessionClosing,
}

/// Repository for session lifecycle operations.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
    locks: Arc<LockRegistry>,
    catalog: Arc<CurrencyCatalog>,
}

/// A second open session on a register trips the partial unique index.
fn register_conflict(err: sqlx::Error, register_id: &str) -> DbError {
    let err = DbError::from(err);
    if err.is_unique_on("cash_sessions.register_id") {
        LedgerError::RegisterBusy {
            register_id: register_id.to_string(),
        }
        .into()
    } else {
        err
    }
}

async fn fetch_session(conn: &mut SqliteConnection, session_id: &str) -> DbResult<CashSession> {
    let sql = format!("SELECT {} FROM cash_sessions WHERE id = ?1", SESSION_COLUMNS);
    let record = sqlx::query_as::<_, SessionRecord>(&sql)
        .bind(session_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| LedgerError::SessionNotFound(session_id.to_string()))?;

    Ok(record.into())
}

impl SessionRepository {
    pub fn new(pool: SqlitePool, locks: Arc<LockRegistry>, catalog: Arc<CurrencyCatalog>) -> Self {
        SessionRepository {
            pool,
            locks,
            catalog,
        }
    }

    // =========================================================================
    // Open
    // =========================================================================

    /// Opens a session on a register.
    ///
    /// The operator is the register's assigned operator if it has one,
    /// otherwise the requester. One balance row is seeded per listed
    /// currency; any other currency starts at zero when first touched.
    ///
    /// ## Errors
    /// * `RegisterBusy` - the register already has an open session
    /// * `RegisterNotFound` - no such register
    /// * `InvalidAmount` - a negative opening amount
    /// * `UnknownCurrency` - a currency outside the catalog
    /// * `Busy` - the register lock could not be taken in time
    pub async fn open(&self, request: &OpenSession) -> DbResult<CashSession> {
        validate_identifier("register_id", &request.register_id)?;
        validate_identifier("requester_id", &request.requester_id)?;
        validate_notes(request.notes.as_deref())?;
        validate_amounts("opening", &request.opening_amounts, &self.catalog)?;

        let _guard = self.locks.acquire(register_key(&request.register_id)).await?;

        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Write first: the insert takes SQLite's write lock before any read
        let inserted = sqlx::query(
            r#"
            INSERT INTO cash_sessions (
                id, register_id, operator_id, status, opened_at,
                closed_at, opening_notes, closing_notes, opened_by, updated_at
            )
            SELECT ?1, r.id, COALESCE(r.assigned_operator_id, ?2), 'open', ?3,
                   NULL, ?4, NULL, ?2, ?3
            FROM cash_registers r
            WHERE r.id = ?5
            "#,
        )
        .bind(&session_id)
        .bind(&request.requester_id)
        .bind(now)
        .bind(&request.notes)
        .bind(&request.register_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| register_conflict(e, &request.register_id))?;

        if inserted.rows_affected() == 0 {
            return Err(LedgerError::RegisterNotFound(request.register_id.clone()).into());
        }

        for (currency, amount) in &request.opening_amounts {
            sqlx::query(
                r#"
                INSERT INTO currency_balances (session_id, currency, opening_minor, current_minor)
                VALUES (?1, ?2, ?3, ?3)
                "#,
            )
            .bind(&session_id)
            .bind(currency.code())
            .bind(amount.minor())
            .execute(&mut *tx)
            .await?;
        }

        let session = fetch_session(&mut tx, &session_id).await?;
        tx.commit().await?;

        info!(
            session_id = %session.id,
            register_id = %session.register_id,
            operator_id = %session.operator_id,
            opened_by = %session.opened_by,
            currencies = request.opening_amounts.len(),
            "Session opened"
        );
        Ok(session)
    }

    // =========================================================================
    // Close
    // =========================================================================

    /// Closes a session against the manager's physical count.
    ///
    /// ## What This Does
    /// 1. Flips the session to closed (no movement can commit after this)
    /// 2. Recomputes the projection from the movement log
    /// 3. Records counted − projected for every currency in either set
    ///
    /// Discrepancies never block the close.
    ///
    /// ## Errors
    /// * `AlreadyClosed` - the session is not open
    /// * `SessionNotFound` - no such session
    /// * `InvalidAmount` / `UnknownCurrency` - bad counted amounts
    pub async fn close(&self, request: &CloseSession) -> DbResult<ClosedSession> {
        validate_identifier("session_id", &request.session_id)?;
        validate_identifier("actor_id", &request.actor_id)?;
        validate_notes(request.notes.as_deref())?;
        validate_amounts("counted", &request.counted_amounts, &self.catalog)?;

        let session_id = request.session_id.as_str();
        let _guard = self.locks.acquire(session_key(session_id)).await?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE cash_sessions
            SET status = 'closed', closed_at = ?2, closing_notes = ?3, updated_at = ?2
            WHERE id = ?1 AND status = 'open'
            "#,
        )
        .bind(session_id)
        .bind(now)
        .bind(&request.notes)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(match session_status(&mut tx, session_id).await? {
                None => LedgerError::SessionNotFound(session_id.to_string()),
                Some(_) => LedgerError::AlreadyClosed {
                    session_id: session_id.to_string(),
                },
            }
            .into());
        }

        let projection = load_projection(&mut tx, session_id).await?;
        let rows = discrepancies(&projection, &request.counted_amounts)?;

        let sequence: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM session_closings WHERE session_id = ?1",
        )
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await?;

        let closing_id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO session_closings (id, session_id, sequence, closed_at, notes, actor_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&closing_id)
        .bind(session_id)
        .bind(sequence)
        .bind(now)
        .bind(&request.notes)
        .bind(&request.actor_id)
        .execute(&mut *tx)
        .await?;

        for row in &rows {
            sqlx::query(
                r#"
                INSERT INTO closing_discrepancies (
                    closing_id, currency, counted_minor, projected_minor, discrepancy_minor
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&closing_id)
            .bind(row.currency.code())
            .bind(row.counted_minor)
            .bind(row.projected_minor)
            .bind(row.discrepancy_minor)
            .execute(&mut *tx)
            .await?;
        }

        let session = fetch_session(&mut tx, session_id).await?;
        tx.commit().await?;

        let closing = SessionClosing {
            id: closing_id,
            session_id: session_id.to_string(),
            sequence,
            closed_at: now,
            notes: request.notes.clone(),
            actor_id: request.actor_id.clone(),
            discrepancies: rows,
        };

        info!(
            session_id = %session_id,
            actor_id = %request.actor_id,
            sequence,
            balanced = closing.is_balanced(),
            "Session closed"
        );
        for row in closing.discrepancies.iter().filter(|d| !d.is_balanced()) {
            warn!(
                session_id = %session_id,
                currency = %row.currency,
                counted = row.counted_minor,
                projected = row.projected_minor,
                discrepancy = row.discrepancy_minor,
                "Cash count does not match projection"
            );
        }

        Ok(ClosedSession { session, closing })
    }

    // =========================================================================
    // Reopen
    // =========================================================================

    /// Reopens a closed session. Prior closings stay on record.
    ///
    /// ## Errors
    /// * `NotClosed` - the session is open
    /// * `RegisterBusy` - another session was opened on the register since
    /// * `SessionNotFound` - no such session
    pub async fn reopen(&self, session_id: &str, actor_id: &str) -> DbResult<CashSession> {
        validate_identifier("session_id", session_id)?;
        validate_identifier("actor_id", actor_id)?;

        let register_id: String =
            sqlx::query_scalar("SELECT register_id FROM cash_sessions WHERE id = ?1")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| LedgerError::SessionNotFound(session_id.to_string()))?;

        let _guard = self.locks.acquire(register_key(&register_id)).await?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE cash_sessions
            SET status = 'open', closed_at = NULL, closing_notes = NULL, updated_at = ?2
            WHERE id = ?1 AND status = 'closed'
            "#,
        )
        .bind(session_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| register_conflict(e, &register_id))?;

        if updated.rows_affected() == 0 {
            return Err(match session_status(&mut tx, session_id).await? {
                None => LedgerError::SessionNotFound(session_id.to_string()),
                Some(_) => LedgerError::NotClosed {
                    session_id: session_id.to_string(),
                },
            }
            .into());
        }

        let session = fetch_session(&mut tx, session_id).await?;
        tx.commit().await?;

        info!(
            session_id = %session_id,
            register_id = %register_id,
            actor_id = %actor_id,
            "Session reopened"
        );
        Ok(session)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get(&self, session_id: &str) -> DbResult<Option<CashSession>> {
        let sql = format!("SELECT {} FROM cash_sessions WHERE id = ?1", SESSION_COLUMNS);
        let record = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(CashSession::from))
    }

    /// Like [`get`](Self::get), but an unknown id is `SessionNotFound`.
    pub async fn require(&self, session_id: &str) -> DbResult<CashSession> {
        self.get(session_id)
            .await?
            .ok_or_else(|| LedgerError::SessionNotFound(session_id.to_string()).into())
    }

    /// The register's open session, if any.
    pub async fn open_for_register(&self, register_id: &str) -> DbResult<Option<CashSession>> {
        let sql = format!(
            "SELECT {} FROM cash_sessions WHERE register_id = ?1 AND status = ?2",
            SESSION_COLUMNS
        );
        let record = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(register_id)
            .bind(SessionStatus::Open)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(CashSession::from))
    }

    /// Every session of a register, oldest first.
    pub async fn list_for_register(&self, register_id: &str) -> DbResult<Vec<CashSession>> {
        let sql = format!(
            "SELECT {} FROM cash_sessions WHERE register_id = ?1 ORDER BY opened_at, id",
            SESSION_COLUMNS
        );
        let records = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(register_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(records.into_iter().map(CashSession::from).collect())
    }

    /// Closing history of a session with its discrepancies, oldest first.
    pub async fn closings(&self, session_id: &str) -> DbResult<Vec<SessionClosing>> {
        let mut conn = self.pool.acquire().await?;
        ensure_session_exists(&mut conn, session_id).await?;

        let closings = sqlx::query_as::<_, ClosingRecord>(
            r#"
            SELECT id, session_id, sequence, closed_at, notes, actor_id
            FROM session_closings
            WHERE session_id = ?1
            ORDER BY sequence
            "#,
        )
        .bind(session_id)
        .fetch_all(&mut *conn)
        .await?;

        let discrepancy_rows = sqlx::query_as::<_, DiscrepancyRecord>(
            r#"
            SELECT d.closing_id, d.currency, d.counted_minor, d.projected_minor, d.discrepancy_minor
            FROM closing_discrepancies d
            JOIN session_closings c ON c.id = d.closing_id
            WHERE c.session_id = ?1
            ORDER BY c.sequence, d.currency
            "#,
        )
        .bind(session_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut by_closing: BTreeMap<String, Vec<DiscrepancyRecord>> = BTreeMap::new();
        for row in discrepancy_rows {
            by_closing.entry(row.closing_id.clone()).or_default().push(row);
        }

        debug!(session_id = %session_id, count = closings.len(), "Loaded closing history");

        closings
            .into_iter()
            .map(|c| {
                let rows = by_closing.remove(&c.id).unwrap_or_default();
                Ok(SessionClosing {
                    discrepancies: convert_all(rows)?,
                    id: c.id,
                    session_id: c.session_id,
                    sequence: c.sequence,
                    closed_at: c.closed_at,
                    notes: c.notes,
                    actor_id: c.actor_id,
                })
            })
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
