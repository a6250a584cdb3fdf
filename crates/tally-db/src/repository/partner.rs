//! # Partner Repository
//!
//! Customers and suppliers, and the one column every mutation converges on:
//! `debt_balance_cents`.
//!
//! The balance is never written from a request. It moves through
//! [`adjust_balance`] (incremental mutators) or [`set_balance`] (auditor);
//! an opening balance is recorded as a synthetic Debt order.

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use tally_core::validation::validate_partner_name;
use tally_core::{new_id, LedgerConfig, Money, NewPartner, Partner, ValidationError};
use tracing::{debug, info};

use super::Tx;
use crate::error::{DbError, DbResult};
use crate::pool::WriteGate;
use crate::service::orders::insert_opening_balance;

const PARTNER_SELECT: &str = r#"
    SELECT id, name, is_customer, is_supplier, phone, address, debt_balance_cents,
           created_at, updated_at
    FROM partners
"#;

// =============================================================================
// Query Helpers
// =============================================================================

pub(crate) async fn fetch_partner<'e, E>(executor: E, id: &str) -> DbResult<Option<Partner>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{PARTNER_SELECT} WHERE id = ?1");
    let partner = sqlx::query_as::<_, Partner>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(partner)
}

/// Like [`fetch_partner`] but a missing row is a reference error.
pub(crate) async fn require_partner(tx: &mut Tx<'_>, id: &str) -> DbResult<Partner> {
    fetch_partner(&mut **tx, id)
        .await?
        .ok_or_else(|| DbError::not_found("Partner", id))
}

/// Adds `delta` to a partner's balance and returns the new balance.
pub(crate) async fn adjust_balance(tx: &mut Tx<'_>, partner_id: &str, delta: Money) -> DbResult<Money> {
    let balance: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE partners
        SET debt_balance_cents = debt_balance_cents + ?1, updated_at = ?2
        WHERE id = ?3
        RETURNING debt_balance_cents
        "#,
    )
    .bind(delta.cents())
    .bind(Utc::now())
    .bind(partner_id)
    .fetch_optional(&mut **tx)
    .await?;

    let balance = balance.ok_or_else(|| {
        DbError::consistency(format!("partner {} vanished while adjusting balance", partner_id))
    })?;

    debug!(partner_id = %partner_id, delta = delta.cents(), balance, "Partner balance adjusted");
    Ok(Money::from_cents(balance))
}

/// Overwrites a partner's balance. Auditor only.
pub(crate) async fn set_balance(tx: &mut Tx<'_>, partner_id: &str, balance: Money) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE partners SET debt_balance_cents = ?1, updated_at = ?2 WHERE id = ?3",
    )
    .bind(balance.cents())
    .bind(Utc::now())
    .bind(partner_id)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Partner", partner_id));
    }
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for partner database operations.
#[derive(Debug, Clone)]
pub struct PartnerRepository {
    pool: SqlitePool,
    gate: WriteGate,
    ledger: LedgerConfig,
}

impl PartnerRepository {
    pub fn new(pool: SqlitePool, gate: WriteGate, ledger: LedgerConfig) -> Self {
        PartnerRepository { pool, gate, ledger }
    }

    /// Inserts a partner.
    ///
    /// A non-zero `opening_balance_cents` becomes an opening-balance order
    /// in the same transaction, so the ledger and the auditor both see it.
    pub async fn insert(&self, new: NewPartner) -> DbResult<Partner> {
        validate_partner_name(&new.name)?;

        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let now = Utc::now();
        let id = new_id();
        sqlx::query(
            r#"
            INSERT INTO partners (
                id, name, is_customer, is_supplier, phone, address,
                debt_balance_cents, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8)
            "#,
        )
        .bind(&id)
        .bind(new.name.trim())
        .bind(new.is_customer)
        .bind(new.is_supplier)
        .bind(&new.phone)
        .bind(&new.address)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let opening = Money::from_cents(new.opening_balance_cents);
        if !opening.is_zero() {
            insert_opening_balance(&mut tx, &self.ledger, &id, opening, now).await?;
        }

        let partner = require_partner(&mut tx, &id).await?;
        tx.commit().await?;

        info!(id = %partner.id, name = %partner.name, opening = %opening, "Partner created");
        Ok(partner)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Partner>> {
        fetch_partner(&self.pool, id).await
    }

    /// All partners, ordered by name.
    pub async fn list(&self) -> DbResult<Vec<Partner>> {
        let sql = format!("{PARTNER_SELECT} ORDER BY name");
        let partners = sqlx::query_as::<_, Partner>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(partners)
    }

    /// Deletes a partner with no orders, vouchers or bank transactions.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let (references,): (i64,) = sqlx::query_as(
            r#"
            SELECT (SELECT COUNT(*) FROM orders WHERE partner_id = ?1)
                 + (SELECT COUNT(*) FROM cash_vouchers WHERE partner_id = ?1)
                 + (SELECT COUNT(*) FROM bank_transactions WHERE partner_id = ?1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if references > 0 {
            return Err(ValidationError::NotAllowed {
                field: "partner".to_string(),
                reason: "partner has orders, vouchers or bank transactions".to_string(),
            }
            .into());
        }

        let result = sqlx::query("DELETE FROM partners WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Partner", id));
        }

        tx.commit().await?;
        info!(id = %id, "Partner deleted");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tally_core::{OrderType, PaymentMethod};

    fn customer(name: &str, opening: i64) -> NewPartner {
        NewPartner {
            name: name.to_string(),
            is_customer: true,
            is_supplier: false,
            phone: None,
            address: None,
            opening_balance_cents: opening,
        }
    }

    #[tokio::test]
    async fn test_insert_without_opening_balance() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let partner = db.partners().insert(customer("Acme", 0)).await.unwrap();

        assert_eq!(partner.debt_balance_cents, 0);
        assert!(partner.is_customer);
        assert!(db.order_records().list_for_partner(&partner.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_opening_balance_goes_through_an_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let partner = db.partners().insert(customer("Acme", -25_000)).await.unwrap();

        assert_eq!(partner.debt_balance_cents, -25_000);

        let orders = db.order_records().list_for_partner(&partner.id).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_type, OrderType::Purchase);
        assert_eq!(orders[0].payment_method, PaymentMethod::Debt);
        assert_eq!(orders[0].total_cents, 25_000);
        assert_eq!(orders[0].display_id, "#OPENING");
        assert_eq!(orders[0].day_seq, None);
    }

    #[tokio::test]
    async fn test_delete_guarded_by_history() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let with_history = db.partners().insert(customer("Old", 100)).await.unwrap();
        let fresh = db.partners().insert(customer("New", 0)).await.unwrap();

        assert!(db.partners().delete(&with_history.id).await.is_err());
        db.partners().delete(&fresh.id).await.unwrap();
        assert!(db.partners().get_by_id(&fresh.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db.partners().insert(customer("  ", 0)).await.unwrap_err();
        assert_eq!(err.kind(), tally_core::ErrorKind::Validation);
    }
}
