//! # Order Service
//!
//! Creates, edits and deletes orders as single atomic units.
//!
//! ## Effects of One Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  OrderRequest                                                           │
//! │    │                                                                    │
//! │    ├── lines ──► inventory::expand ──► consolidate ──► products.stock   │
//! │    │                                        └───────► order_stock_moves │
//! │    ├── Purchase lines ──► products.cost_cents (last purchase cost)      │
//! │    ├── Debt/Pending + partner ──► debt_delta ──► partners.balance       │
//! │    ├── Debt + upfront ──► upfront_settlement ──► cash_vouchers          │
//! │    │                                         └─► partners.balance       │
//! │    ├── Transfer + account ──► bank_movement ──► bank_transactions       │
//! │    │                                        └─► bank_accounts.balance   │
//! │    └── settlement resync ──► orders.amount_paid_cents                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Deleting an order replays its recorded stock moves negated and reverses
//! every debt, voucher and bank effect it owns. Updating is a reversal
//! followed by a fresh application that keeps the order's identity and its
//! display id.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tally_core::config::format_display_id;
use tally_core::inventory::{consolidate, expand, StockDelta, StockDirection};
use tally_core::mutators::{bank_balance_delta, bank_movement, debt_delta, upfront_settlement, voucher_debt_delta};
use tally_core::validation::validate_order_request;
use tally_core::{
    new_id, BankTransaction, CashVoucher, LedgerConfig, Money, Order, OrderLine, OrderRequest,
    OrderType, OrderWithLines, Partner, PaymentMethod, ValidationError, VoucherOrigin,
};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::pool::WriteGate;
use crate::repository::bank::{
    adjust_account_balance, delete_transaction_row, fetch_account, insert_transaction,
    transactions_for_order,
};
use crate::repository::order::{
    allocate_day_seq, delete_lines, delete_order_row, delete_stock_moves, fetch_lines,
    fetch_order, fetch_stock_moves, insert_line, insert_order, insert_stock_moves, require_order,
    update_order_row,
};
use crate::repository::partner::{adjust_balance, require_partner};
use crate::repository::product::{adjust_stock, fetch_components, fetch_product, set_cost};
use crate::repository::voucher::{delete_voucher_row, insert_voucher, vouchers_for_order};
use crate::repository::Tx;
use crate::service::settlement::resync_in_tx;

// =============================================================================
// Service
// =============================================================================

/// Transaction processor for orders.
#[derive(Debug, Clone)]
pub struct OrderService {
    pool: SqlitePool,
    gate: WriteGate,
    ledger: LedgerConfig,
}

impl OrderService {
    pub fn new(pool: SqlitePool, gate: WriteGate, ledger: LedgerConfig) -> Self {
        OrderService { pool, gate, ledger }
    }

    /// Creates an order with all of its effects.
    ///
    /// The display number is claimed by the first statement of the
    /// transaction, so two concurrent creates on the same day cannot end up
    /// with the same display id.
    pub async fn create(&self, req: OrderRequest) -> DbResult<OrderWithLines> {
        validate_order_request(&req)?;

        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let now = Utc::now();
        let occurred_at = req.occurred_at.unwrap_or(now);
        let day = self.ledger.business_day(occurred_at);
        let seq = allocate_day_seq(&mut tx, day).await?;

        let partner = resolve_partner(&mut tx, &req).await?;

        let order = Order {
            id: new_id(),
            display_id: format_display_id(seq, day),
            order_day: day,
            day_seq: Some(seq),
            occurred_at,
            partner_id: req.partner_id.clone(),
            order_type: req.order_type,
            payment_method: req.payment_method,
            total_cents: req.total()?.cents(),
            amount_paid_cents: 0,
            previous_balance_cents: partner.as_ref().map_or(0, |p| p.debt_balance_cents),
            note: clean_note(req.note.as_deref()),
            created_at: now,
            updated_at: now,
        };
        insert_order(&mut tx, &order).await?;

        apply_effects(&mut tx, &order, &req, true).await?;
        let paid = resync_in_tx(&mut tx, &order.id).await?;

        tx.commit().await?;

        info!(
            id = %order.id,
            display_id = %order.display_id,
            order_type = ?order.order_type,
            payment_method = ?order.payment_method,
            total = %order.total(),
            paid = %paid,
            "Order created"
        );

        self.reload(&order.id).await
    }

    /// Replaces an order's content, keeping its identity and display id.
    ///
    /// ## Vouchers
    /// Linked vouchers survive only while the order stays `Debt` with the
    /// same partner. Otherwise they are deleted and their debt effect is
    /// reversed. A new upfront settlement is created only when no settlement
    /// voucher survived.
    ///
    /// ## Bank Transactions
    /// Always reversed; a new one is created from the request if it asks for
    /// a transfer.
    pub async fn update(&self, id: &str, req: OrderRequest) -> DbResult<OrderWithLines> {
        validate_order_request(&req)?;

        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let old = require_order(&mut tx, id).await?;
        if old.day_seq.is_none() {
            return Err(ValidationError::NotAllowed {
                field: "order".to_string(),
                reason: "opening-balance orders cannot be edited; delete and record again".to_string(),
            }
            .into());
        }

        let keep_vouchers =
            req.payment_method == PaymentMethod::Debt && req.partner_id == old.partner_id;
        reverse_effects(&mut tx, &old, keep_vouchers).await?;

        let partner = resolve_partner(&mut tx, &req).await?;
        let previous_balance_cents = if req.partner_id == old.partner_id {
            old.previous_balance_cents
        } else {
            partner.as_ref().map_or(0, |p| p.debt_balance_cents)
        };

        let order = Order {
            occurred_at: req.occurred_at.unwrap_or(old.occurred_at),
            partner_id: req.partner_id.clone(),
            order_type: req.order_type,
            payment_method: req.payment_method,
            total_cents: req.total()?.cents(),
            previous_balance_cents,
            note: clean_note(req.note.as_deref()),
            updated_at: Utc::now(),
            ..old
        };
        update_order_row(&mut tx, &order).await?;

        let settled_already = vouchers_for_order(&mut *tx, &order.id)
            .await?
            .iter()
            .any(|v| v.origin == VoucherOrigin::Settlement);
        apply_effects(&mut tx, &order, &req, !settled_already).await?;
        let paid = resync_in_tx(&mut tx, &order.id).await?;

        tx.commit().await?;

        info!(
            id = %order.id,
            display_id = %order.display_id,
            payment_method = ?order.payment_method,
            total = %order.total(),
            paid = %paid,
            kept_vouchers = keep_vouchers,
            "Order updated"
        );

        self.reload(&order.id).await
    }

    /// Deletes an order and reverses everything it did.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let order = require_order(&mut tx, id).await?;
        reverse_effects(&mut tx, &order, false).await?;
        delete_order_row(&mut tx, id).await?;

        tx.commit().await?;

        info!(id = %id, display_id = %order.display_id, "Order deleted");
        Ok(())
    }

    /// Records a correction of a partner's balance as an opening-balance
    /// order.
    ///
    /// Positive amounts mean the partner owes us (a `Sale`), negative
    /// amounts mean we owe the partner (a `Purchase`).
    pub async fn record_opening_balance(&self, partner_id: &str, amount: Money) -> DbResult<Order> {
        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let order = insert_opening_balance(&mut tx, &self.ledger, partner_id, amount, Utc::now()).await?;

        tx.commit().await?;

        info!(id = %order.id, partner_id = %partner_id, amount = %amount, "Opening balance recorded");
        Ok(order)
    }

    async fn reload(&self, id: &str) -> DbResult<OrderWithLines> {
        let mut conn = self.pool.acquire().await?;
        let order = fetch_order(&mut *conn, id)
            .await?
            .ok_or_else(|| DbError::consistency(format!("order {} missing after commit", id)))?;
        let lines = fetch_lines(&mut *conn, id).await?;
        Ok(OrderWithLines { order, lines })
    }
}

// =============================================================================
// Opening Balance
// =============================================================================

/// Inserts a line-less Debt order carrying `amount` and applies its debt
/// delta. Runs inside the caller's transaction.
pub(crate) async fn insert_opening_balance(
    tx: &mut Tx<'_>,
    ledger: &LedgerConfig,
    partner_id: &str,
    amount: Money,
    now: DateTime<Utc>,
) -> DbResult<Order> {
    if amount.is_zero() {
        return Err(ValidationError::NotAllowed {
            field: "amount".to_string(),
            reason: "an opening balance of zero has no effect".to_string(),
        }
        .into());
    }

    let partner = require_partner(tx, partner_id).await?;
    let order_type = if amount.is_positive() {
        OrderType::Sale
    } else {
        OrderType::Purchase
    };

    let order = Order {
        id: new_id(),
        display_id: ledger.opening_balance_display_id.clone(),
        order_day: ledger.business_day(now),
        day_seq: None,
        occurred_at: now,
        partner_id: Some(partner.id.clone()),
        order_type,
        payment_method: PaymentMethod::Debt,
        total_cents: amount.abs().cents(),
        amount_paid_cents: 0,
        previous_balance_cents: partner.debt_balance_cents,
        note: Some("Opening balance".to_string()),
        created_at: now,
        updated_at: now,
    };
    insert_order(tx, &order).await?;
    adjust_balance(
        tx,
        &partner.id,
        debt_delta(order.order_type, order.payment_method, order.total()),
    )
    .await?;

    Ok(order)
}

// =============================================================================
// Apply / Reverse
// =============================================================================

async fn resolve_partner(tx: &mut Tx<'_>, req: &OrderRequest) -> DbResult<Option<Partner>> {
    match &req.partner_id {
        Some(id) => Ok(Some(require_partner(tx, id).await?)),
        None => Ok(None),
    }
}

fn clean_note(note: Option<&str>) -> Option<String> {
    note.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string)
}

/// Applies the request's lines, stock, debt, settlement and bank effects to
/// an order row that already exists.
async fn apply_effects(
    tx: &mut Tx<'_>,
    order: &Order,
    req: &OrderRequest,
    allow_upfront: bool,
) -> DbResult<()> {
    // Lines and stock
    let direction = StockDirection::from(order.order_type);
    let mut deltas: Vec<StockDelta> = Vec::new();

    for (position, line) in req.lines.iter().enumerate() {
        let product = fetch_product(&mut **tx, &line.product_id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", line.product_id.clone()))?;

        let components = if product.is_bundle {
            fetch_components(&mut **tx, &product.id).await?
        } else {
            Vec::new()
        };
        deltas.extend(expand(&product, &components, line.quantity, direction)?);

        if order.order_type == OrderType::Purchase && !product.is_bundle {
            set_cost(tx, &product.id, line.unit_price_cents).await?;
        }

        let row = OrderLine {
            id: new_id(),
            order_id: order.id.clone(),
            product_id: product.id.clone(),
            name_override: line.name_override.clone(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price_cents,
            line_total_cents: line.line_total()?.cents(),
            position: position as i64,
        };
        insert_line(tx, &row).await?;
    }

    let moves = consolidate(deltas);
    for m in &moves {
        adjust_stock(tx, &m.product_id, m.delta).await?;
    }
    insert_stock_moves(tx, &order.id, &moves).await?;

    // Debt
    let total = order.total();
    if let (Some(partner_id), true) = (&order.partner_id, order.bears_debt()) {
        adjust_balance(tx, partner_id, debt_delta(order.order_type, order.payment_method, total)).await?;

        if order.payment_method == PaymentMethod::Debt && allow_upfront {
            let upfront = Money::from_cents(req.upfront_cents);
            if let Some(settlement) = upfront_settlement(order.order_type, total, upfront) {
                let voucher = CashVoucher {
                    id: new_id(),
                    partner_id: Some(partner_id.clone()),
                    order_id: Some(order.id.clone()),
                    amount_cents: settlement.amount.cents(),
                    voucher_type: settlement.voucher_type,
                    origin: VoucherOrigin::Settlement,
                    note: Some(format!("Upfront payment for order {}", order.display_id)),
                    occurred_at: order.occurred_at,
                    created_at: Utc::now(),
                };
                insert_voucher(tx, &voucher).await?;
                adjust_balance(tx, partner_id, settlement.debt_adjustment).await?;
            }
        }
    }

    // Bank
    if order.payment_method == PaymentMethod::Transfer {
        if let Some(account_id) = &req.bank_account_id {
            fetch_account(&mut **tx, account_id)
                .await?
                .ok_or_else(|| DbError::not_found("BankAccount", account_id.clone()))?;

            let transferred = Money::from_cents(req.upfront_cents);
            if let Some(movement) = bank_movement(order.order_type, total, transferred) {
                let txn = BankTransaction {
                    id: new_id(),
                    account_id: account_id.clone(),
                    order_id: Some(order.id.clone()),
                    partner_id: order.partner_id.clone(),
                    transaction_type: movement.kind,
                    amount_cents: movement.amount.cents(),
                    note: Some(format!("Transfer for order {}", order.display_id)),
                    occurred_at: order.occurred_at,
                    created_at: Utc::now(),
                };
                insert_transaction(tx, &txn).await?;
                adjust_account_balance(tx, account_id, movement.balance_delta).await?;
            }
        }
    }

    debug!(id = %order.id, lines = req.lines.len(), moves = moves.len(), "Order effects applied");
    Ok(())
}

/// Undoes what [`apply_effects`] did for `order`, leaving only the order row.
async fn reverse_effects(tx: &mut Tx<'_>, order: &Order, keep_vouchers: bool) -> DbResult<()> {
    for m in fetch_stock_moves(&mut **tx, &order.id).await? {
        adjust_stock(tx, &m.product_id, -m.delta).await?;
    }
    delete_stock_moves(tx, &order.id).await?;
    delete_lines(tx, &order.id).await?;

    if let (Some(partner_id), true) = (&order.partner_id, order.bears_debt()) {
        adjust_balance(
            tx,
            partner_id,
            -debt_delta(order.order_type, order.payment_method, order.total()),
        )
        .await?;
    }

    if !keep_vouchers {
        for voucher in vouchers_for_order(&mut **tx, &order.id).await? {
            if let Some(partner_id) = &voucher.partner_id {
                adjust_balance(tx, partner_id, -voucher_debt_delta(voucher.voucher_type, voucher.amount())).await?;
            }
            delete_voucher_row(tx, &voucher.id).await?;
        }
    }

    for txn in transactions_for_order(&mut **tx, &order.id).await? {
        adjust_account_balance(
            tx,
            &txn.account_id,
            -bank_balance_delta(txn.transaction_type, txn.amount()),
        )
        .await?;
        delete_transaction_row(tx, &txn.id).await?;
    }

    debug!(id = %order.id, keep_vouchers, "Order effects reversed");
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
