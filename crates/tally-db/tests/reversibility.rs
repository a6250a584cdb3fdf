//! End-to-end checks of the reversibility and settlement guarantees against
//! an in-memory database.

use chrono::{DateTime, Duration, TimeZone, Utc};
use tally_core::ledger::CycleStatus;
use tally_core::{
    BundleComponentInput, NewPartner, NewProduct, OrderLineRequest, OrderRequest, OrderType,
    PaymentMethod, VoucherOrigin, VoucherRequest, VoucherType,
};
use tally_db::{Database, DbConfig};

// =============================================================================
// Helpers
// =============================================================================

async fn setup() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

async fn product(db: &Database, name: &str, stock: i64, is_bundle: bool) -> String {
    db.products()
        .insert(NewProduct {
            sku: None,
            name: name.to_string(),
            unit: "pcs".to_string(),
            secondary_unit: None,
            multiplier: 1,
            cost_cents: 1_000,
            price_cents: 2_000,
            stock,
            expiry_date: None,
            is_bundle,
        })
        .await
        .unwrap()
        .id
}

async fn customer(db: &Database) -> String {
    db.partners()
        .insert(NewPartner {
            name: "Acme".to_string(),
            is_customer: true,
            is_supplier: false,
            phone: None,
            address: None,
            opening_balance_cents: 0,
        })
        .await
        .unwrap()
        .id
}

fn order(
    partner_id: Option<&str>,
    payment_method: PaymentMethod,
    lines: &[(&str, i64, i64)],
    upfront_cents: i64,
) -> OrderRequest {
    OrderRequest {
        partner_id: partner_id.map(str::to_string),
        order_type: OrderType::Sale,
        payment_method,
        lines: lines
            .iter()
            .map(|(product_id, quantity, unit_price_cents)| OrderLineRequest {
                product_id: product_id.to_string(),
                quantity: *quantity,
                unit_price_cents: *unit_price_cents,
                name_override: None,
            })
            .collect(),
        upfront_cents,
        bank_account_id: None,
        note: None,
        occurred_at: None,
    }
}

async fn cash_sale_seq(db: &Database, product_id: &str, at: DateTime<Utc>) -> i64 {
    let mut req = order(None, PaymentMethod::Cash, &[(product_id, 1, 500)], 0);
    req.occurred_at = Some(at);
    let created = db.orders().create(req).await.unwrap();
    created.order.day_seq.unwrap()
}

async fn stock(db: &Database, id: &str) -> i64 {
    db.products().get_view(id).await.unwrap().stock
}

async fn balance(db: &Database, id: &str) -> i64 {
    db.partners().get_by_id(id).await.unwrap().unwrap().debt_balance_cents
}

// =============================================================================
// Inventory
// =============================================================================

#[tokio::test]
async fn create_then_delete_restores_plain_stock() {
    let db = setup().await;
    let tea = product(&db, "Tea", 25, false).await;
    let mug = product(&db, "Mug", 7, false).await;

    let created = db
        .orders()
        .create(order(None, PaymentMethod::Cash, &[(&tea, 4, 500), (&mug, 9, 300), (&tea, 1, 500)], 0))
        .await
        .unwrap();
    assert_eq!(stock(&db, &tea).await, 20);
    assert_eq!(stock(&db, &mug).await, -2);

    db.orders().delete(&created.order.id).await.unwrap();
    assert_eq!(stock(&db, &tea).await, 25);
    assert_eq!(stock(&db, &mug).await, 7);
}

#[tokio::test]
async fn bundle_sale_moves_components_and_derives_stock() {
    let db = setup().await;
    let a = product(&db, "A", 20, false).await;
    let b = product(&db, "B", 10, false).await;
    let bundle = product(&db, "A+B", 0, true).await;
    db.products()
        .set_bundle_components(
            &bundle,
            vec![
                BundleComponentInput { component_id: a.clone(), quantity_per_unit: 2 },
                BundleComponentInput { component_id: b.clone(), quantity_per_unit: 1 },
            ],
        )
        .await
        .unwrap();

    db.orders()
        .create(order(None, PaymentMethod::Cash, &[(&bundle, 3, 4_000)], 0))
        .await
        .unwrap();

    let a_after = stock(&db, &a).await;
    let b_after = stock(&db, &b).await;
    assert_eq!(a_after, 14);
    assert_eq!(b_after, 7);
    assert_eq!(stock(&db, &bundle).await, (a_after / 2).min(b_after));
}

// =============================================================================
// Display ids
// =============================================================================

#[tokio::test]
async fn concurrent_creates_on_one_day_get_distinct_numbers() {
    let db = setup().await;
    let tea = product(&db, "Tea", 100, false).await;
    let at = Utc.with_ymd_and_hms(2024, 6, 3, 11, 0, 0).unwrap();

    let (a, b, c, d) = tokio::join!(
        cash_sale_seq(&db, &tea, at),
        cash_sale_seq(&db, &tea, at),
        cash_sale_seq(&db, &tea, at),
        cash_sale_seq(&db, &tea, at),
    );

    let mut seqs = vec![a, b, c, d];
    seqs.sort_unstable();
    assert_eq!(seqs, vec![1, 2, 3, 4]);

    let day = db.ledger_config().business_day(at);
    let listed = db.order_records().list_for_day(day).await.unwrap();
    let mut ids: Vec<&str> = listed.iter().map(|o| o.display_id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 4);
    assert_eq!(stock(&db, &tea).await, 96);
}

// =============================================================================
// Debt and settlement
// =============================================================================

#[tokio::test]
async fn debt_sale_with_upfront_nets_out_and_reverses() {
    let db = setup().await;
    let tea = product(&db, "Tea", 10, false).await;
    let partner = customer(&db).await;
    let before = balance(&db, &partner).await;

    let created = db
        .orders()
        .create(order(Some(&partner), PaymentMethod::Debt, &[(&tea, 1, 1_000_000)], 400_000))
        .await
        .unwrap();

    assert_eq!(balance(&db, &partner).await - before, 600_000);
    let vouchers = db.voucher_records().list_for_order(&created.order.id).await.unwrap();
    assert_eq!(vouchers.len(), 1);
    assert_eq!(vouchers[0].voucher_type, VoucherType::Receipt);
    assert_eq!(vouchers[0].amount_cents, 400_000);
    assert_eq!(vouchers[0].origin, VoucherOrigin::Settlement);
    assert_eq!(created.order.amount_paid_cents, 400_000);

    db.orders().delete(&created.order.id).await.unwrap();
    assert_eq!(balance(&db, &partner).await, before);
    assert!(db.voucher_records().get_by_id(&vouchers[0].id).await.unwrap().is_none());
    assert!(db.voucher_records().list_for_partner(&partner).await.unwrap().is_empty());
}

#[tokio::test]
async fn auditor_is_idempotent_and_matches_incremental_balance() {
    let db = setup().await;
    let tea = product(&db, "Tea", 100, false).await;
    let partner = customer(&db).await;

    let first = db
        .orders()
        .create(order(Some(&partner), PaymentMethod::Debt, &[(&tea, 3, 7_000)], 5_000))
        .await
        .unwrap();
    db.orders()
        .create(order(Some(&partner), PaymentMethod::Debt, &[(&tea, -1, 7_000)], 0))
        .await
        .unwrap();
    db.orders()
        .update(
            &first.order.id,
            order(Some(&partner), PaymentMethod::Debt, &[(&tea, 4, 7_000)], 0),
        )
        .await
        .unwrap();
    db.vouchers()
        .create(VoucherRequest {
            partner_id: Some(partner.clone()),
            order_id: None,
            voucher_type: VoucherType::Payment,
            amount_cents: 1_200,
            origin: VoucherOrigin::Manual,
            note: None,
            occurred_at: None,
        })
        .await
        .unwrap();

    let incremental = balance(&db, &partner).await;
    let once = db.ledger().recalculate_debt(&partner).await.unwrap();
    let twice = db.ledger().recalculate_debt(&partner).await.unwrap();

    assert_eq!(once.new_balance_cents, incremental);
    assert!(!once.corrected());
    assert_eq!(twice.new_balance_cents, once.new_balance_cents);

    let ledger = db.ledger().partner_ledger(&partner).await.unwrap();
    assert_eq!(ledger.current_balance_cents, incremental);
}

#[tokio::test]
async fn debt_cycle_from_sale_and_receipt() {
    let db = setup().await;
    let tea = product(&db, "Tea", 10, false).await;
    let partner = customer(&db).await;
    let day1 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    let day3 = day1 + Duration::days(2);

    let mut sale = order(Some(&partner), PaymentMethod::Debt, &[(&tea, 1, 500)], 0);
    sale.occurred_at = Some(day1);
    db.orders().create(sale).await.unwrap();
    db.vouchers()
        .create(VoucherRequest {
            partner_id: Some(partner.clone()),
            order_id: None,
            voucher_type: VoucherType::Receipt,
            amount_cents: 500,
            origin: VoucherOrigin::Manual,
            note: None,
            occurred_at: Some(day3),
        })
        .await
        .unwrap();

    let cycles = db.ledger().debt_cycles(&partner).await.unwrap();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].start_date.date_naive(), day1.date_naive());
    assert_eq!(cycles[0].end_date.map(|d| d.date_naive()), Some(day3.date_naive()));
    assert_eq!(cycles[0].status, CycleStatus::Closed);
}

#[tokio::test]
async fn switching_debt_to_cash_drops_settlement_vouchers() {
    let db = setup().await;
    let tea = product(&db, "Tea", 10, false).await;
    let partner = customer(&db).await;

    let created = db
        .orders()
        .create(order(Some(&partner), PaymentMethod::Debt, &[(&tea, 2, 5_000)], 3_000))
        .await
        .unwrap();
    assert_eq!(balance(&db, &partner).await, 7_000);

    let updated = db
        .orders()
        .update(
            &created.order.id,
            order(Some(&partner), PaymentMethod::Cash, &[(&tea, 2, 5_000)], 0),
        )
        .await
        .unwrap();

    assert!(db.voucher_records().list_for_order(&created.order.id).await.unwrap().is_empty());
    assert_eq!(balance(&db, &partner).await, 0);
    assert_eq!(updated.order.payment_method, PaymentMethod::Cash);
    assert_eq!(updated.order.amount_paid_cents, 10_000);
    assert_eq!(stock(&db, &tea).await, 8);
}

#[tokio::test]
async fn deleting_settlement_voucher_voids_the_settlement() {
    let db = setup().await;
    let tea = product(&db, "Tea", 10, false).await;
    let partner = customer(&db).await;

    let created = db
        .orders()
        .create(order(Some(&partner), PaymentMethod::Debt, &[(&tea, 1, 8_000)], 8_000))
        .await
        .unwrap();
    assert_eq!(balance(&db, &partner).await, 0);

    let voucher = db.voucher_records().list_for_order(&created.order.id).await.unwrap().remove(0);
    db.vouchers().delete(&voucher.id).await.unwrap();

    let after = db.order_records().get_by_id(&created.order.id).await.unwrap().unwrap().order;
    assert_eq!(after.payment_method, PaymentMethod::Pending);
    assert_eq!(after.amount_paid_cents, 0);
    assert_eq!(balance(&db, &partner).await, 8_000);

    // A pending order still counts as debt
    let audit = db.ledger().recalculate_debt(&partner).await.unwrap();
    assert_eq!(audit.new_balance_cents, 8_000);
    assert!(!audit.corrected());

    // and deleting it clears the balance
    db.orders().delete(&created.order.id).await.unwrap();
    assert_eq!(balance(&db, &partner).await, 0);
}
