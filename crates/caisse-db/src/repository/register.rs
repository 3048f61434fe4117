//! # Register Repository
//!
//! Registers are administered outside the ledger. This repository only
//! exists so an installation (and the tests) can put tills in the table and
//! read them back; the session manager reads `cash_registers` directly.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use caisse_core::validation::validate_identifier;
use caisse_core::CashRegister;

use crate::error::{DbError, DbResult};
use crate::records::RegisterRecord;

/// Repository for cash register rows.
#[derive(Debug, Clone)]
pub struct RegisterRepository {
    pool: SqlitePool,
}

impl RegisterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RegisterRepository { pool }
    }

    /// Adds a register.
    ///
    /// ## Errors
    /// * `UniqueViolation` - a register with this id exists
    /// * `Validation` - malformed identifiers
    pub async fn create(
        &self,
        id: &str,
        shop_id: &str,
        counter_id: Option<&str>,
        assigned_operator_id: Option<&str>,
    ) -> DbResult<CashRegister> {
        validate_identifier("register_id", id)?;
        validate_identifier("shop_id", shop_id)?;
        if let Some(counter) = counter_id {
            validate_identifier("counter_id", counter)?;
        }
        if let Some(operator) = assigned_operator_id {
            validate_identifier("assigned_operator_id", operator)?;
        }

        let register = CashRegister {
            id: id.trim().to_string(),
            shop_id: shop_id.trim().to_string(),
            counter_id: counter_id.map(|c| c.trim().to_string()),
            assigned_operator_id: assigned_operator_id.map(|o| o.trim().to_string()),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO cash_registers (id, shop_id, counter_id, assigned_operator_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&register.id)
        .bind(&register.shop_id)
        .bind(&register.counter_id)
        .bind(&register.assigned_operator_id)
        .bind(register.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: register.id.clone(),
            },
            other => other,
        })?;

        info!(register_id = %register.id, shop_id = %register.shop_id, "Register created");
        Ok(register)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<CashRegister>> {
        let record = sqlx::query_as::<_, RegisterRecord>(
            r#"
            SELECT id, shop_id, counter_id, assigned_operator_id, created_at
            FROM cash_registers
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(CashRegister::from))
    }

    /// Registers of a shop, by id.
    pub async fn list_for_shop(&self, shop_id: &str) -> DbResult<Vec<CashRegister>> {
        let records = sqlx::query_as::<_, RegisterRecord>(
            r#"
            SELECT id, shop_id, counter_id, assigned_operator_id, created_at
            FROM cash_registers
            WHERE shop_id = ?1
            ORDER BY id
            "#,
        )
        .bind(shop_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(CashRegister::from).collect())
    }
}
