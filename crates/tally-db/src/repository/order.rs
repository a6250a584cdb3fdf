//! # Order Repository
//!
//! Row access for orders, their lines, the stock moves they applied and the
//! per-day display id counter.
//!
//! ## Display Id Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    INSERT INTO daily_sequences (day, last_seq)                          │
//! │    VALUES (day, <orders already dated that day> + 1)                    │
//! │    ON CONFLICT(day) DO UPDATE SET last_seq = last_seq + 1               │
//! │    RETURNING last_seq                     ← first statement: takes the  │
//! │                                             write lock                  │
//! │    INSERT INTO orders (..., day_seq)      ← UNIQUE(order_day, day_seq)  │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The counter never goes backwards, so a deleted order's number is not
//! handed out again.

use chrono::{NaiveDate, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};
use tally_core::inventory::StockDelta;
use tally_core::{Money, Order, OrderLine, OrderWithLines, PaymentMethod};
use tracing::debug;

use super::Tx;
use crate::error::{DbError, DbResult};

const ORDER_SELECT: &str = r#"
    SELECT id, display_id, order_day, day_seq, occurred_at, partner_id, order_type,
           payment_method, total_cents, amount_paid_cents, previous_balance_cents,
           note, created_at, updated_at
    FROM orders
"#;

const LINE_SELECT: &str = r#"
    SELECT id, order_id, product_id, name_override, quantity, unit_price_cents,
           line_total_cents, position
    FROM order_lines
"#;

// =============================================================================
// Query Helpers
// =============================================================================

pub(crate) async fn fetch_order<'e, E>(executor: E, id: &str) -> DbResult<Option<Order>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{ORDER_SELECT} WHERE id = ?1");
    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(order)
}

pub(crate) async fn require_order(tx: &mut Tx<'_>, id: &str) -> DbResult<Order> {
    fetch_order(&mut **tx, id)
        .await?
        .ok_or_else(|| DbError::not_found("Order", id))
}

pub(crate) async fn fetch_lines<'e, E>(executor: E, order_id: &str) -> DbResult<Vec<OrderLine>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{LINE_SELECT} WHERE order_id = ?1 ORDER BY position");
    let lines = sqlx::query_as::<_, OrderLine>(&sql)
        .bind(order_id)
        .fetch_all(executor)
        .await?;
    Ok(lines)
}

/// Debt-bearing orders of a partner (Debt and Pending).
pub(crate) async fn debt_orders_for_partner<'e, E>(executor: E, partner_id: &str) -> DbResult<Vec<Order>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "{ORDER_SELECT} WHERE partner_id = ?1 AND payment_method IN ('debt', 'pending') ORDER BY occurred_at"
    );
    let orders = sqlx::query_as::<_, Order>(&sql)
        .bind(partner_id)
        .fetch_all(executor)
        .await?;
    Ok(orders)
}

/// `(Σ sale totals, Σ purchase totals)` over a partner's debt-bearing orders.
pub(crate) async fn debt_order_totals<'e, E>(executor: E, partner_id: &str) -> DbResult<(Money, Money)>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (sales, purchases): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN order_type = 'sale' THEN total_cents ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN order_type = 'purchase' THEN total_cents ELSE 0 END), 0)
        FROM orders
        WHERE partner_id = ?1 AND payment_method IN ('debt', 'pending')
        "#,
    )
    .bind(partner_id)
    .fetch_one(executor)
    .await?;
    Ok((Money::from_cents(sales), Money::from_cents(purchases)))
}

/// Claims the next display number for `day`.
pub(crate) async fn allocate_day_seq(tx: &mut Tx<'_>, day: NaiveDate) -> DbResult<i64> {
    let seq: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO daily_sequences (day, last_seq)
        VALUES (?1, (SELECT COUNT(*) FROM orders WHERE order_day = ?1 AND day_seq IS NOT NULL) + 1)
        ON CONFLICT(day) DO UPDATE SET last_seq = last_seq + 1
        RETURNING last_seq
        "#,
    )
    .bind(day)
    .fetch_one(&mut **tx)
    .await?;

    debug!(day = %day, seq, "Display number allocated");
    Ok(seq)
}

pub(crate) async fn insert_order(tx: &mut Tx<'_>, order: &Order) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            id, display_id, order_day, day_seq, occurred_at, partner_id, order_type,
            payment_method, total_cents, amount_paid_cents, previous_balance_cents,
            note, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(&order.id)
    .bind(&order.display_id)
    .bind(order.order_day)
    .bind(order.day_seq)
    .bind(order.occurred_at)
    .bind(&order.partner_id)
    .bind(order.order_type)
    .bind(order.payment_method)
    .bind(order.total_cents)
    .bind(order.amount_paid_cents)
    .bind(order.previous_balance_cents)
    .bind(&order.note)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Rewrites the mutable part of an order. Identity and display id stay.
pub(crate) async fn update_order_row(tx: &mut Tx<'_>, order: &Order) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET
            occurred_at = ?1,
            partner_id = ?2,
            order_type = ?3,
            payment_method = ?4,
            total_cents = ?5,
            amount_paid_cents = ?6,
            previous_balance_cents = ?7,
            note = ?8,
            updated_at = ?9
        WHERE id = ?10
        "#,
    )
    .bind(order.occurred_at)
    .bind(&order.partner_id)
    .bind(order.order_type)
    .bind(order.payment_method)
    .bind(order.total_cents)
    .bind(order.amount_paid_cents)
    .bind(order.previous_balance_cents)
    .bind(&order.note)
    .bind(order.updated_at)
    .bind(&order.id)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::consistency(format!("order {} vanished while updating", order.id)));
    }
    Ok(())
}

/// Sets payment method and settled amount together.
pub(crate) async fn set_payment_state(
    tx: &mut Tx<'_>,
    order_id: &str,
    method: PaymentMethod,
    amount_paid: Money,
) -> DbResult<()> {
    sqlx::query(
        "UPDATE orders SET payment_method = ?1, amount_paid_cents = ?2, updated_at = ?3 WHERE id = ?4",
    )
    .bind(method)
    .bind(amount_paid.cents())
    .bind(Utc::now())
    .bind(order_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub(crate) async fn set_amount_paid(tx: &mut Tx<'_>, order_id: &str, amount_paid: Money) -> DbResult<()> {
    sqlx::query("UPDATE orders SET amount_paid_cents = ?1 WHERE id = ?2")
        .bind(amount_paid.cents())
        .bind(order_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub(crate) async fn insert_line(tx: &mut Tx<'_>, line: &OrderLine) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_lines (
            id, order_id, product_id, name_override, quantity, unit_price_cents,
            line_total_cents, position
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&line.id)
    .bind(&line.order_id)
    .bind(&line.product_id)
    .bind(&line.name_override)
    .bind(line.quantity)
    .bind(line.unit_price_cents)
    .bind(line.line_total_cents)
    .bind(line.position)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub(crate) async fn delete_lines(tx: &mut Tx<'_>, order_id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM order_lines WHERE order_id = ?1")
        .bind(order_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Records the raw stock deltas an order applied.
pub(crate) async fn insert_stock_moves(
    tx: &mut Tx<'_>,
    order_id: &str,
    moves: &[StockDelta],
) -> DbResult<()> {
    for m in moves {
        sqlx::query("INSERT INTO order_stock_moves (order_id, product_id, delta) VALUES (?1, ?2, ?3)")
            .bind(order_id)
            .bind(&m.product_id)
            .bind(m.delta)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

pub(crate) async fn fetch_stock_moves<'e, E>(executor: E, order_id: &str) -> DbResult<Vec<StockDelta>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT product_id, delta FROM order_stock_moves WHERE order_id = ?1 ORDER BY rowid",
    )
    .bind(order_id)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(product_id, delta)| StockDelta { product_id, delta })
        .collect())
}

pub(crate) async fn delete_stock_moves(tx: &mut Tx<'_>, order_id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM order_stock_moves WHERE order_id = ?1")
        .bind(order_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub(crate) async fn delete_order_row(tx: &mut Tx<'_>, order_id: &str) -> DbResult<()> {
    let result = sqlx::query("DELETE FROM orders WHERE id = ?1")
        .bind(order_id)
        .execute(&mut **tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::consistency(format!("order {} vanished while deleting", order_id)));
    }
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Read access to orders.
///
/// Mutations go through [`OrderService`](crate::service::orders::OrderService).
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order with its lines.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<OrderWithLines>> {
        let mut conn = self.pool.acquire().await?;
        let Some(order) = fetch_order(&mut *conn, id).await? else {
            return Ok(None);
        };
        let lines = fetch_lines(&mut *conn, id).await?;
        Ok(Some(OrderWithLines { order, lines }))
    }

    /// All orders of a partner, oldest first.
    pub async fn list_for_partner(&self, partner_id: &str) -> DbResult<Vec<Order>> {
        let sql = format!("{ORDER_SELECT} WHERE partner_id = ?1 ORDER BY occurred_at, created_at");
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(partner_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    /// Orders of one business day, in display-number order.
    pub async fn list_for_day(&self, day: NaiveDate) -> DbResult<Vec<Order>> {
        let sql = format!("{ORDER_SELECT} WHERE order_day = ?1 ORDER BY day_seq, created_at");
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(day)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    /// Raw stock deltas the order applied.
    pub async fn stock_moves(&self, order_id: &str) -> DbResult<Vec<StockDelta>> {
        fetch_stock_moves(&self.pool, order_id).await
    }
}
