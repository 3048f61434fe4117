//! # Report Repository
//!
//! Read-only reconciliation views. Nothing here takes a lock or writes.
//!
//! ## Reports
//! ```text
//! summarize(session)              (kind, currency) → count, signed sum
//! discrepancy(session, counted)   currency → counted − projected (preview)
//! institution_breakdown(session)  (institution, currency) → withdrawals paid
//! shop_day_rollup(shop, day)      currency → opening, movements, current
//! ```

use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use caisse_core::reconciliation::{discrepancies, institution_breakdown, summarize};
use caisse_core::validation::{validate_amounts, validate_identifier};
use caisse_core::{
    CashMovement, CashSession, Currency, CurrencyBalance, CurrencyCatalog, CurrencyDiscrepancy,
    InstitutionResolver, InstitutionTotal, KindSummary, Money, ShopDayRollup,
};

use crate::error::DbResult;
use crate::records::{
    convert_all, BalanceRecord, MovementRecord, SessionRecord, MOVEMENT_COLUMNS, SESSION_COLUMNS,
};
use crate::repository::{ensure_session_exists, load_projection};

/// Repository for reconciliation reports.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
    catalog: Arc<CurrencyCatalog>,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool, catalog: Arc<CurrencyCatalog>) -> Self {
        ReportRepository { pool, catalog }
    }

    async fn movements(&self, session_id: &str) -> DbResult<Vec<CashMovement>> {
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

    /// Count and signed sum per (kind, currency).
    pub async fn summarize(&self, session_id: &str) -> DbResult<Vec<KindSummary>> {
        let movements = self.movements(session_id).await?;
        Ok(summarize(&movements)?)
    }

    /// Counted − projected per currency, without closing anything.
    ///
    /// Works on open and closed sessions alike; on a closed session it shows
    /// what a count would show against the final projection.
    pub async fn discrepancy(
        &self,
        session_id: &str,
        counted: &BTreeMap<Currency, Money>,
    ) -> DbResult<Vec<CurrencyDiscrepancy>> {
        validate_amounts("counted", counted, &self.catalog)?;

        let mut conn = self.pool.acquire().await?;
        ensure_session_exists(&mut conn, session_id).await?;
        let projection = load_projection(&mut conn, session_id).await?;

        Ok(discrepancies(&projection, counted)?)
    }

    /// Withdrawals paid out per counterpart institution.
    pub async fn institution_breakdown<R>(
        &self,
        session_id: &str,
        resolver: &R,
    ) -> DbResult<Vec<InstitutionTotal>>
    where
        R: InstitutionResolver + ?Sized,
    {
        let movements = self.movements(session_id).await?;
        Ok(institution_breakdown(&movements, resolver)?)
    }

    /// Totals across every session of a shop opened on `day` (UTC).
    ///
    /// Reads the cached balance rows.
    pub async fn shop_day_rollup(&self, shop_id: &str, day: NaiveDate) -> DbResult<ShopDayRollup> {
        validate_identifier("shop_id", shop_id)?;

        let start = Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN));
        let end = start + Duration::days(1);

        let mut conn = self.pool.acquire().await?;

        let sql = format!(
            r#"
            SELECT {} FROM cash_sessions
            WHERE register_id IN (SELECT id FROM cash_registers WHERE shop_id = ?1)
              AND opened_at >= ?2 AND opened_at < ?3
            ORDER BY opened_at, id
            "#,
            SESSION_COLUMNS
        );
        let sessions: Vec<CashSession> = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(shop_id)
            .bind(start)
            .bind(end)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .map(CashSession::from)
            .collect();

        let balance_rows = sqlx::query_as::<_, BalanceRecord>(
            r#"
            SELECT session_id, currency, opening_minor, current_minor
            FROM currency_balances
            WHERE session_id IN (
                SELECT id FROM cash_sessions
                WHERE register_id IN (SELECT id FROM cash_registers WHERE shop_id = ?1)
                  AND opened_at >= ?2 AND opened_at < ?3
            )
            "#,
        )
        .bind(shop_id)
        .bind(start)
        .bind(end)
        .fetch_all(&mut *conn)
        .await?;
        let balances: Vec<CurrencyBalance> = convert_all(balance_rows)?;

        debug!(
            shop_id = %shop_id,
            day = %day,
            sessions = sessions.len(),
            "Building shop-day rollup"
        );
        Ok(ShopDayRollup::build(shop_id, day, &sessions, &balances)?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
