//! # Seed Data Generator
//!
//! Populates a database with a small demo back-office for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./tally_dev.db with 14 days of history (default)
//! cargo run -p tally-db --bin seed
//!
//! # Longer history
//! cargo run -p tally-db --bin seed -- --days 60
//!
//! # Specify database path
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db
//! ```
//!
//! ## Generated Data
//! - Plain products with stock, plus a gift-box bundle built from them
//! - Customers and suppliers, one with an opening balance
//! - A bank account
//! - Per day: a cash sale, a debt sale with an upfront payment, and every
//!   few days a supplier purchase paid by transfer and a customer receipt
//!
//! Finishes by printing each partner's ledger balance next to the audited
//! balance; the two always agree.

use chrono::{Duration, Utc};
use std::env;
use tally_core::{
    BundleComponentInput, Money, NewBankAccount, NewPartner, NewProduct, OrderLineRequest,
    OrderRequest, OrderType, PaymentMethod, VoucherOrigin, VoucherRequest, VoucherType,
};
use tally_db::{Database, DbConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// `(sku, name, unit, cost, price, opening stock)`
const PRODUCTS: &[(&str, &str, &str, i64, i64, i64)] = &[
    ("TEA-01", "Green Tea 250g", "pack", 42_000, 65_000, 120),
    ("TEA-02", "Black Tea 250g", "pack", 38_000, 58_000, 90),
    ("MUG-01", "Ceramic Mug", "pcs", 25_000, 45_000, 60),
    ("SPN-01", "Tea Spoon", "pcs", 5_000, 12_000, 200),
    ("HNY-01", "Honey Jar 500ml", "jar", 70_000, 110_000, 40),
];

const CUSTOMERS: &[&str] = &["Corner Cafe", "Riverside Hotel", "Mai's Bakery"];
const SUPPLIERS: &[&str] = &["Highland Tea Co.", "Pottery Works"];

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tally=debug,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn line(product_id: &str, quantity: i64, unit_price_cents: i64) -> OrderLineRequest {
    OrderLineRequest {
        product_id: product_id.to_string(),
        quantity,
        unit_price_cents,
        name_override: None,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut days: i64 = 14;
    let mut db_path = String::from("./tally_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--days" | "-n" => {
                if i + 1 < args.len() {
                    days = args[i + 1].parse().unwrap_or(14);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --days <N>     Days of order history to generate (default: 14)");
                println!("  -d, --db <PATH>    Database file path (default: ./tally_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Tally Seed Data Generator");
    println!("=========================");
    println!("Database: {}", db_path);
    println!("Days:     {}", days);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().list_views().await?;
    if !existing.is_empty() {
        println!("⚠ Database already has {} products", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Catalogue
    let mut product_ids = Vec::with_capacity(PRODUCTS.len());
    for (sku, name, unit, cost, price, stock) in PRODUCTS {
        let product = db
            .products()
            .insert(NewProduct {
                sku: Some(sku.to_string()),
                name: name.to_string(),
                unit: unit.to_string(),
                secondary_unit: None,
                multiplier: 1,
                cost_cents: *cost,
                price_cents: *price,
                stock: *stock,
                expiry_date: None,
                is_bundle: false,
            })
            .await?;
        product_ids.push(product.id);
    }

    let gift_box = db
        .products()
        .insert(NewProduct {
            sku: Some("GIFT-01".to_string()),
            name: "Tea Gift Box".to_string(),
            unit: "box".to_string(),
            secondary_unit: None,
            multiplier: 1,
            cost_cents: 0,
            price_cents: 180_000,
            stock: 0,
            expiry_date: None,
            is_bundle: true,
        })
        .await?;
    db.products()
        .set_bundle_components(
            &gift_box.id,
            vec![
                BundleComponentInput { component_id: product_ids[0].clone(), quantity_per_unit: 2 },
                BundleComponentInput { component_id: product_ids[2].clone(), quantity_per_unit: 1 },
                BundleComponentInput { component_id: product_ids[3].clone(), quantity_per_unit: 2 },
            ],
        )
        .await?;
    println!("✓ {} products and 1 bundle", product_ids.len());

    // Partners
    let mut customer_ids = Vec::new();
    for (idx, name) in CUSTOMERS.iter().enumerate() {
        let partner = db
            .partners()
            .insert(NewPartner {
                name: name.to_string(),
                is_customer: true,
                is_supplier: false,
                phone: None,
                address: None,
                opening_balance_cents: if idx == 0 { 350_000 } else { 0 },
            })
            .await?;
        customer_ids.push(partner.id);
    }
    let mut supplier_ids = Vec::new();
    for name in SUPPLIERS {
        let partner = db
            .partners()
            .insert(NewPartner {
                name: name.to_string(),
                is_customer: false,
                is_supplier: true,
                phone: None,
                address: None,
                opening_balance_cents: 0,
            })
            .await?;
        supplier_ids.push(partner.id);
    }
    println!("✓ {} customers, {} suppliers", customer_ids.len(), supplier_ids.len());

    let account = db
        .bank()
        .create_account(NewBankAccount {
            bank_name: "City Commercial Bank".to_string(),
            account_number: "0071-0001-2345".to_string(),
            account_holder: Some("Tally Demo Shop".to_string()),
            opening_balance_cents: 5_000_000,
        })
        .await?;
    println!("✓ Bank account {}", account.account_number);

    // History
    let start = Utc::now() - Duration::days(days);
    let mut orders = 0usize;
    let mut vouchers = 0usize;

    for day in 0..days {
        let at = start + Duration::days(day) + Duration::hours(9);
        let idx = day as usize;
        let customer = &customer_ids[idx % customer_ids.len()];

        db.orders()
            .create(OrderRequest {
                partner_id: None,
                order_type: OrderType::Sale,
                payment_method: PaymentMethod::Cash,
                lines: vec![line(&product_ids[idx % product_ids.len()], 2, PRODUCTS[idx % PRODUCTS.len()].4)],
                upfront_cents: 0,
                bank_account_id: None,
                note: None,
                occurred_at: Some(at),
            })
            .await?;

        db.orders()
            .create(OrderRequest {
                partner_id: Some(customer.clone()),
                order_type: OrderType::Sale,
                payment_method: PaymentMethod::Debt,
                lines: vec![line(&gift_box.id, 1, 180_000), line(&product_ids[4], 1, 110_000)],
                upfront_cents: 100_000,
                bank_account_id: None,
                note: None,
                occurred_at: Some(at + Duration::hours(2)),
            })
            .await?;
        orders += 2;
        vouchers += 1;

        if day % 3 == 0 {
            db.orders()
                .create(OrderRequest {
                    partner_id: Some(supplier_ids[idx % supplier_ids.len()].clone()),
                    order_type: OrderType::Purchase,
                    payment_method: PaymentMethod::Transfer,
                    lines: vec![
                        line(&product_ids[0], 10, PRODUCTS[0].3),
                        line(&product_ids[2], 5, PRODUCTS[2].3),
                        line(&product_ids[3], 10, PRODUCTS[3].3),
                    ],
                    upfront_cents: 0,
                    bank_account_id: Some(account.id.clone()),
                    note: Some("Weekly restock".to_string()),
                    occurred_at: Some(at + Duration::hours(4)),
                })
                .await?;
            orders += 1;

            db.vouchers()
                .create(VoucherRequest {
                    partner_id: Some(customer.clone()),
                    order_id: None,
                    voucher_type: VoucherType::Receipt,
                    amount_cents: 150_000,
                    origin: VoucherOrigin::Manual,
                    note: Some("Cash collected".to_string()),
                    occurred_at: Some(at + Duration::hours(6)),
                })
                .await?;
            vouchers += 1;
        }
    }
    println!("✓ {} orders, {} vouchers", orders, vouchers);

    // Verify
    println!();
    println!("Partner balances (ledger / audited):");
    for partner in db.partners().list().await? {
        let ledger = db.ledger().partner_ledger(&partner.id).await?;
        let audit = db.ledger().recalculate_debt(&partner.id).await?;
        let cycles = db.ledger().debt_cycles(&partner.id).await?;
        println!(
            "  {:<20} {:>14} / {:>14}  ({} cycles)",
            partner.name,
            Money::from_cents(ledger.current_balance_cents).to_string(),
            Money::from_cents(audit.new_balance_cents).to_string(),
            cycles.len()
        );
    }

    info!(orders, vouchers, "Seed complete");
    println!();
    println!("✓ Seed complete!");

    Ok(())
}
