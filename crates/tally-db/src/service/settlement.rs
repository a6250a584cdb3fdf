//! # Settlement Service
//!
//! Cash vouchers and the single operation that keeps an order's
//! `amount_paid_cents` truthful: [`resync_in_tx`].
//!
//! ## Settled Amount
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  payment method      amount_paid                                        │
//! │  ──────────────      ──────────────────────────────────────────────     │
//! │  Debt / Pending      Σ linked vouchers, signed by order direction       │
//! │                        Sale:     Receipt +, Payment −                   │
//! │                        Purchase: Payment +, Receipt −                   │
//! │  Transfer            Σ linked bank transactions (signed), or total      │
//! │  Cash                total                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Resync is idempotent and runs at the end of every mutation that touches an
//! order's vouchers or bank transactions.

use chrono::Utc;
use sqlx::SqlitePool;
use tally_core::mutators::{settled_amount, voucher_debt_delta};
use tally_core::validation::validate_positive_amount;
use tally_core::{
    new_id, CashVoucher, Money, PaymentMethod, ValidationError, VoucherOrigin, VoucherRequest,
};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::pool::WriteGate;
use crate::repository::bank::transactions_for_order;
use crate::repository::order::{require_order, set_amount_paid, set_payment_state};
use crate::repository::partner::{adjust_balance, require_partner};
use crate::repository::voucher::{delete_voucher_row, fetch_voucher, insert_voucher, vouchers_for_order};
use crate::repository::Tx;

// =============================================================================
// Resync
// =============================================================================

/// Recomputes and stores an order's settled amount. Returns the new value.
pub(crate) async fn resync_in_tx(tx: &mut Tx<'_>, order_id: &str) -> DbResult<Money> {
    let order = require_order(tx, order_id).await?;

    let vouchers: Vec<_> = vouchers_for_order(&mut **tx, order_id)
        .await?
        .into_iter()
        .map(|v| (v.voucher_type, v.amount()))
        .collect();
    let transfers: Vec<_> = transactions_for_order(&mut **tx, order_id)
        .await?
        .into_iter()
        .map(|t| (t.transaction_type, t.amount()))
        .collect();

    let paid = settled_amount(
        order.order_type,
        order.payment_method,
        order.total(),
        &vouchers,
        &transfers,
    );

    if paid != order.amount_paid() {
        set_amount_paid(tx, order_id, paid).await?;
        debug!(
            order_id = %order_id,
            was = order.amount_paid_cents,
            now = paid.cents(),
            "Settled amount resynced"
        );
    }
    Ok(paid)
}

// =============================================================================
// Service
// =============================================================================

/// Cash voucher mutations.
#[derive(Debug, Clone)]
pub struct VoucherService {
    pool: SqlitePool,
    gate: WriteGate,
}

impl VoucherService {
    pub fn new(pool: SqlitePool, gate: WriteGate) -> Self {
        VoucherService { pool, gate }
    }

    /// Records a cash voucher.
    ///
    /// ## Rules
    /// - `amount_cents` must be positive
    /// - a voucher needs a partner or an order
    /// - a voucher linked to an order inherits the order's partner and may
    ///   not name a different one
    pub async fn create(&self, req: VoucherRequest) -> DbResult<CashVoucher> {
        validate_positive_amount("amount_cents", req.amount_cents)?;
        if req.partner_id.is_none() && req.order_id.is_none() {
            return Err(ValidationError::Required {
                field: "partner_id".to_string(),
            }
            .into());
        }

        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let partner_id = match &req.order_id {
            Some(order_id) => {
                let order = require_order(&mut tx, order_id).await?;
                match (order.partner_id, req.partner_id.clone()) {
                    (owner, None) => owner,
                    (Some(owner), Some(requested)) if owner == requested => Some(owner),
                    (_, Some(_)) => {
                        return Err(ValidationError::NotAllowed {
                            field: "partner_id".to_string(),
                            reason: format!("order {} belongs to another partner", order.display_id),
                        }
                        .into());
                    }
                }
            }
            None => req.partner_id.clone(),
        };
        if let Some(id) = &partner_id {
            require_partner(&mut tx, id).await?;
        }

        let now = Utc::now();
        let voucher = CashVoucher {
            id: new_id(),
            partner_id,
            order_id: req.order_id.clone(),
            amount_cents: req.amount_cents,
            voucher_type: req.voucher_type,
            origin: req.origin,
            note: req.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            occurred_at: req.occurred_at.unwrap_or(now),
            created_at: now,
        };
        insert_voucher(&mut tx, &voucher).await?;

        if let Some(id) = &voucher.partner_id {
            adjust_balance(&mut tx, id, voucher_debt_delta(voucher.voucher_type, voucher.amount())).await?;
        }
        if let Some(order_id) = &voucher.order_id {
            resync_in_tx(&mut tx, order_id).await?;
        }

        tx.commit().await?;

        info!(
            id = %voucher.id,
            voucher_type = ?voucher.voucher_type,
            amount = %voucher.amount(),
            order_id = ?voucher.order_id,
            "Voucher created"
        );
        Ok(voucher)
    }

    /// Deletes a voucher and reverses its debt effect.
    ///
    /// Deleting a settlement voucher from a `Debt` order voids the settlement:
    /// the order drops to `Pending` before the resync. Cash and Transfer
    /// orders keep their method since they never carried a debt delta.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let voucher = fetch_voucher(&mut *tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Voucher", id))?;

        if let Some(partner_id) = &voucher.partner_id {
            adjust_balance(
                &mut tx,
                partner_id,
                -voucher_debt_delta(voucher.voucher_type, voucher.amount()),
            )
            .await?;
        }
        delete_voucher_row(&mut tx, id).await?;

        if let Some(order_id) = &voucher.order_id {
            if voucher.origin == VoucherOrigin::Settlement {
                let order = require_order(&mut tx, order_id).await?;
                if order.payment_method == PaymentMethod::Debt {
                    set_payment_state(&mut tx, order_id, PaymentMethod::Pending, Money::zero())
                        .await?;
                }
            }
            resync_in_tx(&mut tx, order_id).await?;
        }

        tx.commit().await?;

        info!(id = %id, origin = ?voucher.origin, order_id = ?voucher.order_id, "Voucher deleted");
        Ok(())
    }

    /// Recomputes an order's settled amount on its own.
    pub async fn resync(&self, order_id: &str) -> DbResult<Money> {
        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;
        let paid = resync_in_tx(&mut tx, order_id).await?;
        tx.commit().await?;
        Ok(paid)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tally_core::{
        ErrorKind, NewPartner, NewProduct, OrderLineRequest, OrderRequest, OrderType, VoucherType,
    };

    async fn setup() -> (Database, String, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tea = db
            .products()
            .insert(NewProduct {
                sku: None,
                name: "Tea".to_string(),
                unit: "pcs".to_string(),
                secondary_unit: None,
                multiplier: 1,
                cost_cents: 500,
                price_cents: 1_000,
                stock: 100,
                expiry_date: None,
                is_bundle: false,
            })
            .await
            .unwrap();
        let customer = db
            .partners()
            .insert(NewPartner {
                name: "Acme".to_string(),
                is_customer: true,
                is_supplier: false,
                phone: None,
                address: None,
                opening_balance_cents: 0,
            })
            .await
            .unwrap();
        (db, tea.id, customer.id)
    }

    fn debt_sale(partner_id: &str, product_id: &str, quantity: i64, upfront: i64) -> OrderRequest {
        OrderRequest {
            partner_id: Some(partner_id.to_string()),
            order_type: OrderType::Sale,
            payment_method: PaymentMethod::Debt,
            lines: vec![OrderLineRequest {
                product_id: product_id.to_string(),
                quantity,
                unit_price_cents: 1_000,
                name_override: None,
            }],
            upfront_cents: upfront,
            bank_account_id: None,
            note: None,
            occurred_at: None,
        }
    }

    fn receipt(partner_id: Option<&str>, order_id: Option<&str>, amount: i64) -> VoucherRequest {
        VoucherRequest {
            partner_id: partner_id.map(str::to_string),
            order_id: order_id.map(str::to_string),
            voucher_type: VoucherType::Receipt,
            amount_cents: amount,
            origin: VoucherOrigin::Manual,
            note: None,
            occurred_at: None,
        }
    }

    async fn balance(db: &Database, id: &str) -> i64 {
        db.partners().get_by_id(id).await.unwrap().unwrap().debt_balance_cents
    }

    async fn paid(db: &Database, order_id: &str) -> i64 {
        db.order_records().get_by_id(order_id).await.unwrap().unwrap().order.amount_paid_cents
    }

    #[tokio::test]
    async fn test_manual_receipt_on_order_resyncs() {
        let (db, tea, customer) = setup().await;
        let order = db.orders().create(debt_sale(&customer, &tea, 10, 0)).await.unwrap().order;
        assert_eq!(order.amount_paid_cents, 0);

        let voucher = db.vouchers().create(receipt(None, Some(&order.id), 3_000)).await.unwrap();

        assert_eq!(voucher.partner_id.as_deref(), Some(customer.as_str()));
        assert_eq!(paid(&db, &order.id).await, 3_000);
        assert_eq!(balance(&db, &customer).await, 7_000);

        db.vouchers().delete(&voucher.id).await.unwrap();
        assert_eq!(paid(&db, &order.id).await, 0);
        assert_eq!(balance(&db, &customer).await, 10_000);
    }

    #[tokio::test]
    async fn test_deleting_settlement_voids_it() {
        let (db, tea, customer) = setup().await;
        let order = db.orders().create(debt_sale(&customer, &tea, 10, 4_000)).await.unwrap().order;
        assert_eq!(order.amount_paid_cents, 4_000);

        let vouchers = db.voucher_records().list_for_order(&order.id).await.unwrap();
        assert_eq!(vouchers.len(), 1);
        assert_eq!(vouchers[0].origin, VoucherOrigin::Settlement);

        db.vouchers().delete(&vouchers[0].id).await.unwrap();

        let after = db.order_records().get_by_id(&order.id).await.unwrap().unwrap().order;
        assert_eq!(after.payment_method, PaymentMethod::Pending);
        assert_eq!(after.amount_paid_cents, 0);
        assert_eq!(balance(&db, &customer).await, 10_000);
    }

    #[tokio::test]
    async fn test_settlement_voucher_on_cash_order_keeps_method() {
        let (db, tea, customer) = setup().await;
        let mut req = debt_sale(&customer, &tea, 10, 0);
        req.payment_method = PaymentMethod::Cash;
        let order = db.orders().create(req).await.unwrap().order;

        let mut settle = receipt(None, Some(&order.id), 3_000);
        settle.origin = VoucherOrigin::Settlement;
        let voucher = db.vouchers().create(settle).await.unwrap();
        assert_eq!(balance(&db, &customer).await, -3_000);

        db.vouchers().delete(&voucher.id).await.unwrap();

        let after = db.order_records().get_by_id(&order.id).await.unwrap().unwrap().order;
        assert_eq!(after.payment_method, PaymentMethod::Cash);
        assert_eq!(after.amount_paid_cents, 10_000);
        assert_eq!(balance(&db, &customer).await, 0);

        let audit = db.ledger().recalculate_debt(&customer).await.unwrap();
        assert_eq!(audit.new_balance_cents, 0);
        assert!(!audit.corrected());

        db.orders().delete(&order.id).await.unwrap();
        assert_eq!(balance(&db, &customer).await, 0);
    }

    #[tokio::test]
    async fn test_voucher_partner_must_match_order() {
        let (db, tea, customer) = setup().await;
        let other = db
            .partners()
            .insert(NewPartner {
                name: "Other".to_string(),
                is_customer: true,
                is_supplier: false,
                phone: None,
                address: None,
                opening_balance_cents: 0,
            })
            .await
            .unwrap();
        let order = db.orders().create(debt_sale(&customer, &tea, 1, 0)).await.unwrap().order;

        let err = db
            .vouchers()
            .create(receipt(Some(&other.id), Some(&order.id), 100))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(balance(&db, &other.id).await, 0);
    }

    #[tokio::test]
    async fn test_voucher_amount_must_be_positive() {
        let (db, _tea, customer) = setup().await;
        let err = db.vouchers().create(receipt(Some(&customer), None, 0)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = db.vouchers().create(receipt(None, None, 100)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_voucher_references_must_exist() {
        let (db, _tea, _customer) = setup().await;
        let err = db.vouchers().create(receipt(Some("ghost"), None, 100)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);

        let err = db.vouchers().create(receipt(None, Some("ghost"), 100)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);

        let err = db.vouchers().delete("ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
    }

    #[tokio::test]
    async fn test_payment_voucher_raises_balance() {
        let (db, _tea, customer) = setup().await;
        let mut req = receipt(Some(&customer), None, 2_500);
        req.voucher_type = VoucherType::Payment;
        db.vouchers().create(req).await.unwrap();
        assert_eq!(balance(&db, &customer).await, 2_500);
    }

    #[tokio::test]
    async fn test_resync_is_idempotent() {
        let (db, tea, customer) = setup().await;
        let order = db.orders().create(debt_sale(&customer, &tea, 10, 4_000)).await.unwrap().order;

        let first = db.vouchers().resync(&order.id).await.unwrap();
        let second = db.vouchers().resync(&order.id).await.unwrap();
        assert_eq!(first, Money::from_cents(4_000));
        assert_eq!(first, second);
    }
}
