//! # Voucher Repository
//!
//! Row access for cash vouchers.

use sqlx::{Executor, Sqlite, SqlitePool};
use tally_core::{CashVoucher, Money};
use tracing::debug;

use super::Tx;
use crate::error::{DbError, DbResult};

const VOUCHER_SELECT: &str = r#"
    SELECT id, partner_id, order_id, amount_cents, voucher_type, origin, note,
           occurred_at, created_at
    FROM cash_vouchers
"#;

// =============================================================================
// Query Helpers
// =============================================================================

pub(crate) async fn fetch_voucher<'e, E>(executor: E, id: &str) -> DbResult<Option<CashVoucher>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{VOUCHER_SELECT} WHERE id = ?1");
    let voucher = sqlx::query_as::<_, CashVoucher>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(voucher)
}

pub(crate) async fn vouchers_for_order<'e, E>(executor: E, order_id: &str) -> DbResult<Vec<CashVoucher>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{VOUCHER_SELECT} WHERE order_id = ?1 ORDER BY created_at, id");
    let vouchers = sqlx::query_as::<_, CashVoucher>(&sql)
        .bind(order_id)
        .fetch_all(executor)
        .await?;
    Ok(vouchers)
}

pub(crate) async fn vouchers_for_partner<'e, E>(executor: E, partner_id: &str) -> DbResult<Vec<CashVoucher>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{VOUCHER_SELECT} WHERE partner_id = ?1 ORDER BY occurred_at, created_at");
    let vouchers = sqlx::query_as::<_, CashVoucher>(&sql)
        .bind(partner_id)
        .fetch_all(executor)
        .await?;
    Ok(vouchers)
}

/// `(Σ receipts, Σ payments)` over a partner's vouchers.
pub(crate) async fn voucher_totals<'e, E>(executor: E, partner_id: &str) -> DbResult<(Money, Money)>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (receipts, payments): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN voucher_type = 'receipt' THEN amount_cents ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN voucher_type = 'payment' THEN amount_cents ELSE 0 END), 0)
        FROM cash_vouchers
        WHERE partner_id = ?1
        "#,
    )
    .bind(partner_id)
    .fetch_one(executor)
    .await?;
    Ok((Money::from_cents(receipts), Money::from_cents(payments)))
}

pub(crate) async fn insert_voucher(tx: &mut Tx<'_>, voucher: &CashVoucher) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO cash_vouchers (
            id, partner_id, order_id, amount_cents, voucher_type, origin, note,
            occurred_at, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&voucher.id)
    .bind(&voucher.partner_id)
    .bind(&voucher.order_id)
    .bind(voucher.amount_cents)
    .bind(voucher.voucher_type)
    .bind(voucher.origin)
    .bind(&voucher.note)
    .bind(voucher.occurred_at)
    .bind(voucher.created_at)
    .execute(&mut **tx)
    .await?;

    debug!(
        id = %voucher.id,
        voucher_type = ?voucher.voucher_type,
        origin = ?voucher.origin,
        amount = voucher.amount_cents,
        "Voucher inserted"
    );
    Ok(())
}

pub(crate) async fn delete_voucher_row(tx: &mut Tx<'_>, id: &str) -> DbResult<()> {
    let result = sqlx::query("DELETE FROM cash_vouchers WHERE id = ?1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::consistency(format!("voucher {} vanished while deleting", id)));
    }
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Read access to vouchers.
///
/// Mutations go through [`VoucherService`](crate::service::settlement::VoucherService).
#[derive(Debug, Clone)]
pub struct VoucherRepository {
    pool: SqlitePool,
}

impl VoucherRepository {
    pub fn new(pool: SqlitePool) -> Self {
        VoucherRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CashVoucher>> {
        fetch_voucher(&self.pool, id).await
    }

    pub async fn list_for_order(&self, order_id: &str) -> DbResult<Vec<CashVoucher>> {
        vouchers_for_order(&self.pool, order_id).await
    }

    pub async fn list_for_partner(&self, partner_id: &str) -> DbResult<Vec<CashVoucher>> {
        vouchers_for_partner(&self.pool, partner_id).await
    }
}
