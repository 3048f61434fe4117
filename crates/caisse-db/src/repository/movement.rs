//! # Movement Repository
//!
//! The movement ledger and its balance projector.
//!
//! ## Recording a Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  NewMovement { kind: withdrawal, magnitude: 20.00, USD }               │
//! │       │                                                                 │
//! │       ▼  sign table                                                     │
//! │  signed amount −20.00                                                  │
//! │       │                                                                 │
//! │       ▼  one transaction, session lock held                            │
//! │  ┌───────────────────────────────────────────────────────────────┐     │
//! │  │ UPDATE cash_sessions ... WHERE status = 'open'  (0 rows → ✗)  │     │
//! │  │ INSERT cash_movements (−2000, USD, seq n+1)                   │     │
//! │  │ UPSERT currency_balances.current_minor = old − 2000           │     │
//! │  └───────────────────────────────────────────────────────────────┘     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  both rows or neither                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`current_balance`](MovementRepository::current_balance) and
//! [`balances`](MovementRepository::balances) compute `opening + SUM(amount)`
//! from the log. The cached rows serve the shop rollup;
//! [`verify`](MovementRepository::verify) reports any row that has drifted.

use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use caisse_core::validation::{validate_description, validate_external_ref, validate_identifier};
use caisse_core::{
    BalanceDrift, CashMovement, Currency, CurrencyBalance, CurrencyCatalog, LedgerError, Money,
    NewMovement,
};

use crate::error::DbResult;
use crate::locks::{session_key, LockRegistry};
use crate::records::{convert_all, BalanceRecord, MovementRecord, MOVEMENT_COLUMNS};
use crate::repository::{ensure_session_exists, load_projection, session_status};

/// Repository for the movement ledger.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
    locks: Arc<LockRegistry>,
    catalog: Arc<CurrencyCatalog>,
}

impl MovementRepository {
    pub fn new(pool: SqlitePool, locks: Arc<LockRegistry>, catalog: Arc<CurrencyCatalog>) -> Self {
        MovementRepository {
            pool,
            locks,
            catalog,
        }
    }

    // =========================================================================
    // Write
    // =========================================================================

    /// Appends a movement and updates the cached balance atomically.
    ///
    /// ## Errors
    /// * `SessionClosed` - the session is not open
    /// * `SessionNotFound` - no such session
    /// * `InvalidAmount` - negative magnitude, zero without `allow_zero`,
    ///   or a balance outside the `i64` range
    /// * `UnknownCurrency` - a currency outside the catalog
    /// * `Busy` - the session lock could not be taken in time
    pub async fn record(&self, session_id: &str, request: &NewMovement) -> DbResult<CashMovement> {
        validate_identifier("session_id", session_id)?;
        validate_identifier("actor_id", &request.actor_id)?;
        validate_description(&request.description)?;
        validate_external_ref(request.external_ref.as_deref())?;
        self.catalog.ensure_known(request.currency)?;
        let signed = request.signed_amount()?;

        let _guard = self.locks.acquire(session_key(session_id)).await?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // The status guard doubles as the write that takes SQLite's lock
        let touched = sqlx::query(
            "UPDATE cash_sessions SET updated_at = ?2 WHERE id = ?1 AND status = 'open'",
        )
        .bind(session_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if touched.rows_affected() == 0 {
            return Err(match session_status(&mut tx, session_id).await? {
                None => LedgerError::SessionNotFound(session_id.to_string()),
                Some(_) => LedgerError::SessionClosed {
                    session_id: session_id.to_string(),
                },
            }
            .into());
        }

        let cached: Option<i64> = sqlx::query_scalar(
            "SELECT current_minor FROM currency_balances WHERE session_id = ?1 AND currency = ?2",
        )
        .bind(session_id)
        .bind(request.currency.code())
        .fetch_optional(&mut *tx)
        .await?;
        let balance = Money::from_minor(cached.unwrap_or(0)).checked_add(signed)?;

        let seq: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM cash_movements WHERE session_id = ?1",
        )
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await?;

        let movement = CashMovement {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            kind: request.kind,
            amount_minor: signed.minor(),
            currency: request.currency,
            description: request.description.clone(),
            external_ref: request.external_ref.clone(),
            actor_id: request.actor_id.clone(),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO cash_movements (
                id, session_id, kind, amount_minor, currency,
                description, external_ref, actor_id, created_at, seq
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.session_id)
        .bind(movement.kind)
        .bind(movement.amount_minor)
        .bind(movement.currency.code())
        .bind(&movement.description)
        .bind(&movement.external_ref)
        .bind(&movement.actor_id)
        .bind(movement.created_at)
        .bind(seq)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO currency_balances (session_id, currency, opening_minor, current_minor)
            VALUES (?1, ?2, 0, ?3)
            ON CONFLICT (session_id, currency) DO UPDATE SET current_minor = excluded.current_minor
            "#,
        )
        .bind(session_id)
        .bind(movement.currency.code())
        .bind(balance.minor())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            session_id = %session_id,
            movement_id = %movement.id,
            kind = %movement.kind,
            amount = movement.amount_minor,
            currency = %movement.currency,
            balance = balance.minor(),
            "Movement recorded"
        );
        Ok(movement)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Opening + Σ signed amounts for one currency.
    ///
    /// A currency never touched in the session reads as zero.
    pub async fn current_balance(&self, session_id: &str, currency: Currency) -> DbResult<Money> {
        self.catalog.ensure_known(currency)?;

        let mut conn = self.pool.acquire().await?;
        ensure_session_exists(&mut conn, session_id).await?;

        let minor: i64 = sqlx::query_scalar(
            r#"
            SELECT
                COALESCE((SELECT opening_minor FROM currency_balances
                          WHERE session_id = ?1 AND currency = ?2), 0)
              + COALESCE((SELECT SUM(amount_minor) FROM cash_movements
                          WHERE session_id = ?1 AND currency = ?2), 0)
            "#,
        )
        .bind(session_id)
        .bind(currency.code())
        .fetch_one(&mut *conn)
        .await?;

        Ok(Money::from_minor(minor))
    }

    /// All balance lines of a session, by currency code, recomputed from the
    /// log.
    pub async fn balances(&self, session_id: &str) -> DbResult<Vec<CurrencyBalance>> {
        let mut conn = self.pool.acquire().await?;
        ensure_session_exists(&mut conn, session_id).await?;

        let projection = load_projection(&mut conn, session_id).await?;
        Ok(projection.snapshot(session_id)?)
    }

    /// Movements of a session, oldest first.
    pub async fn list(&self, session_id: &str) -> DbResult<Vec<CashMovement>> {
        let mut conn = self.pool.acquire().await?;
        ensure_session_exists(&mut conn, session_id).await?;

        let sql = format!(
            "SELECT {} FROM cash_movements WHERE session_id = ?1 ORDER BY seq",
            MOVEMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, MovementRecord>(&sql)
            .bind(session_id)
            .fetch_all(&mut *conn)
            .await?;

        convert_all(rows)
    }

    /// Recomputes every balance from the log and reports cached rows that
    /// disagree. An empty result means the cache is sound.
    pub async fn verify(&self, session_id: &str) -> DbResult<Vec<BalanceDrift>> {
        let mut conn = self.pool.acquire().await?;
        ensure_session_exists(&mut conn, session_id).await?;

        let projection = load_projection(&mut conn, session_id).await?;
        let cached = sqlx::query_as::<_, BalanceRecord>(
            r#"
            SELECT session_id, currency, opening_minor, current_minor
            FROM currency_balances
            WHERE session_id = ?1
            "#,
        )
        .bind(session_id)
        .fetch_all(&mut *conn)
        .await?;
        let cached: Vec<CurrencyBalance> = convert_all(cached)?;

        let drifts: Vec<BalanceDrift> = projection
            .currencies()
            .filter_map(|currency| {
                let cached_minor = cached
                    .iter()
                    .find(|row| row.currency == currency)
                    .map(|row| row.current_minor)
                    .unwrap_or(0);
                let recomputed_minor = projection.balance(currency).minor();
                (cached_minor != recomputed_minor).then_some(BalanceDrift {
                    currency,
                    cached_minor,
                    recomputed_minor,
                })
            })
            .collect();

        if drifts.is_empty() {
            debug!(session_id = %session_id, "Balances verified");
        } else {
            warn!(session_id = %session_id, drifted = drifts.len(), "Cached balances drifted");
        }
        Ok(drifts)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
