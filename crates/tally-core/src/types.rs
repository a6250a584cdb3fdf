//! # Domain Types
//!
//! Core domain types used throughout the Tally back-office.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Order       │   │  CashVoucher    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  display_id     │   │  partner_id     │       │
//! │  │  stock          │   │  order_type     │   │  order_id (FK)  │       │
//! │  │  is_bundle ─────┼─┐ │  payment_method │   │  voucher_type   │       │
//! │  └─────────────────┘ │ │  total_cents    │   │  origin         │       │
//! │                      │ └────────┬────────┘   └─────────────────┘       │
//! │  ┌─────────────────┐ │          │ 1..n                                  │
//! │  │ BundleComponent │◄┘ ┌────────▼────────┐   ┌─────────────────┐       │
//! │  │  component_id   │   │   OrderLine     │   │ BankTransaction │       │
//! │  │  qty_per_unit   │   │  product_id     │   │  account_id     │       │
//! │  └─────────────────┘   │  quantity       │   │  order_id (FK)  │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │    Partner      │   │  BankAccount    │                             │
//! │  │  debt_balance   │   │  balance        │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, display_id, account_number) - human-readable
//!
//! ## Sign Conventions
//! - `Partner.debt_balance > 0`: the partner owes the business (receivable)
//! - `Partner.debt_balance < 0`: the business owes the partner (payable)
//! - `Order.total < 0`: a return (sales return or purchase return)

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::money::Money;
use crate::validation::ValidationResult;

/// Generates a fresh entity id (UUID v4, hyphenated).
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Classifications
// =============================================================================

/// Direction of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Goods leave the shop, the partner owes us.
    Sale,
    /// Goods enter the shop, we owe the partner.
    Purchase,
}

impl OrderType {
    /// +1 for Sale, -1 for Purchase. The sign of this order's effect on a
    /// partner's receivable.
    #[inline]
    pub const fn sign(&self) -> i64 {
        match self {
            OrderType::Sale => 1,
            OrderType::Purchase => -1,
        }
    }
}

/// How an order is paid.
///
/// ```text
///   Cash ──────── settled at the counter, no balance effect
///   Transfer ──── settled through a BankTransaction
///   Debt ──────── deferred; moves Partner.debt_balance
///   Pending ───── a Debt order whose settlement voucher was voided
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Debt,
    Transfer,
    Pending,
}

impl PaymentMethod {
    /// Whether orders paid this way contribute to the partner's balance.
    #[inline]
    pub const fn is_debt_bearing(&self) -> bool {
        matches!(self, PaymentMethod::Debt | PaymentMethod::Pending)
    }
}

/// Direction of a cash voucher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum VoucherType {
    /// Money received from the partner. Lowers the receivable.
    Receipt,
    /// Money paid out to the partner. Lowers the payable.
    Payment,
}

/// Where a voucher came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum VoucherOrigin {
    /// Entered by a user.
    #[default]
    Manual,
    /// Generated for the upfront payment of a Debt order.
    Settlement,
}

/// Direction of a bank transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BankTransactionType {
    Deposit,
    Withdrawal,
}

// =============================================================================
// Product
// =============================================================================

/// A stocked item, or a bundle of stocked items.
///
/// For bundles `stock` is always 0 and `cost_cents` is never read: both are
/// derived from the components (see [`crate::inventory`]).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: Option<String>,

    /// Display name shown on invoices.
    pub name: String,

    /// Primary unit of measure ("box").
    pub unit: String,

    /// Secondary unit of measure ("bottle").
    pub secondary_unit: Option<String>,

    /// Secondary units per primary unit.
    pub multiplier: i64,

    /// Last purchase cost.
    pub cost_cents: i64,

    /// Default sale price.
    pub price_cents: i64,

    /// Raw stock count, in primary units. May go negative.
    pub stock: i64,

    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,

    pub is_bundle: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }
}

/// One entry of a bundle's recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BundleComponent {
    pub bundle_id: String,
    pub component_id: String,
    /// Component units consumed per bundle unit (> 0).
    pub quantity_per_unit: i64,
    /// Position in the bundle's ordered component list.
    pub position: i64,
}

/// A product as the caller sees it: bundle stock and cost derived.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductView {
    pub product: Product,
    /// Raw stock for plain products, derived stock for bundles.
    pub stock: i64,
    /// Raw cost for plain products, derived cost for bundles.
    pub cost_cents: i64,
    pub components: Vec<BundleComponent>,
}

// =============================================================================
// Partner
// =============================================================================

/// A customer, a supplier, or both.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Partner {
    pub id: String,
    pub name: String,
    pub is_customer: bool,
    pub is_supplier: bool,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Positive: partner owes us. Negative: we owe the partner.
    pub debt_balance_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Partner {
    #[inline]
    pub fn debt_balance(&self) -> Money {
        Money::from_cents(self.debt_balance_cents)
    }
}

// =============================================================================
// Order
// =============================================================================

/// A sale or purchase, with its lines stored separately.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,

    /// Human-readable per-day identifier, `"{n}.{dd/mm/yy}"`.
    pub display_id: String,

    /// Business day the display id was allocated in.
    #[ts(as = "String")]
    pub order_day: NaiveDate,

    /// `n` of the display id. `None` for synthetic opening-balance orders.
    pub day_seq: Option<i64>,

    #[ts(as = "String")]
    pub occurred_at: DateTime<Utc>,

    /// `None` for walk-in customers.
    pub partner_id: Option<String>,

    pub order_type: OrderType,
    pub payment_method: PaymentMethod,

    /// Σ quantity × unit price over the lines.
    pub total_cents: i64,

    /// Derived by Settlement Sync, never taken from a request.
    pub amount_paid_cents: i64,

    /// Partner balance observed just before this order's own debt delta.
    pub previous_balance_cents: i64,

    pub note: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn amount_paid(&self) -> Money {
        Money::from_cents(self.amount_paid_cents)
    }

    /// Whether this order currently moves its partner's balance.
    #[inline]
    pub fn bears_debt(&self) -> bool {
        self.partner_id.is_some() && self.payment_method.is_debt_bearing()
    }
}

/// A line item in an order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderLine {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Printed instead of the product name when set.
    pub name_override: Option<String>,
    /// Signed; negative quantities are returns.
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    pub position: i64,
}

impl OrderLine {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// An order together with its lines.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderWithLines {
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

// =============================================================================
// Vouchers & Bank
// =============================================================================

/// A cash receipt or payment.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashVoucher {
    pub id: String,
    pub partner_id: Option<String>,
    /// The order this voucher settles, if any.
    pub order_id: Option<String>,
    /// Magnitude; direction comes from `voucher_type`.
    pub amount_cents: i64,
    pub voucher_type: VoucherType,
    pub origin: VoucherOrigin,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub occurred_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CashVoucher {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BankAccount {
    pub id: String,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: Option<String>,
    pub balance_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl BankAccount {
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BankTransaction {
    pub id: String,
    pub account_id: String,
    /// Set when the transaction was generated by a Transfer order.
    pub order_id: Option<String>,
    pub partner_id: Option<String>,
    pub transaction_type: BankTransactionType,
    /// Magnitude; direction comes from `transaction_type`.
    pub amount_cents: i64,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub occurred_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl BankTransaction {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Requests
// =============================================================================
// Typed inputs handed over by the caller layer.

/// One line of an [`OrderRequest`].
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    #[serde(default)]
    pub name_override: Option<String>,
}

impl OrderLineRequest {
    /// quantity × unit price, refused when it does not fit in `i64`.
    #[inline]
    pub fn line_total(&self) -> ValidationResult<Money> {
        Money::from_cents(self.unit_price_cents)
            .checked_multiply_quantity(self.quantity)
            .ok_or_else(|| ValidationError::out_of_range("line_total_cents", i64::MIN, i64::MAX))
    }
}

/// Create or replace an order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderRequest {
    #[serde(default)]
    pub partner_id: Option<String>,
    pub order_type: OrderType,
    pub payment_method: PaymentMethod,
    pub lines: Vec<OrderLineRequest>,
    /// Debt orders: amount paid immediately. Transfer orders: amount
    /// transferred (0 means the full total).
    #[serde(default)]
    pub upfront_cents: i64,
    /// Required for Transfer orders to move money.
    #[serde(default)]
    pub bank_account_id: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    /// Defaults to now.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub occurred_at: Option<DateTime<Utc>>,
}

impl OrderRequest {
    /// Σ quantity × unit price, refused when it does not fit in `i64`.
    pub fn total(&self) -> ValidationResult<Money> {
        self.lines.iter().try_fold(Money::zero(), |acc, line| {
            acc.checked_add(line.line_total()?)
                .ok_or_else(|| ValidationError::out_of_range("total_cents", i64::MIN, i64::MAX))
        })
    }
}

/// Create a cash voucher.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VoucherRequest {
    #[serde(default)]
    pub partner_id: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    pub voucher_type: VoucherType,
    pub amount_cents: i64,
    #[serde(default)]
    pub origin: VoucherOrigin,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Create a manual bank transaction.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BankTransactionRequest {
    pub account_id: String,
    #[serde(default)]
    pub partner_id: Option<String>,
    pub transaction_type: BankTransactionType,
    pub amount_cents: i64,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    #[serde(default)]
    pub sku: Option<String>,
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub secondary_unit: Option<String>,
    #[serde(default = "default_multiplier")]
    pub multiplier: i64,
    #[serde(default)]
    pub cost_cents: i64,
    #[serde(default)]
    pub price_cents: i64,
    /// Ignored for bundles.
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_bundle: bool,
}

fn default_multiplier() -> i64 {
    1
}

/// One entry when (re)defining a bundle's recipe.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BundleComponentInput {
    pub component_id: String,
    pub quantity_per_unit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPartner {
    pub name: String,
    #[serde(default)]
    pub is_customer: bool,
    #[serde(default)]
    pub is_supplier: bool,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// Recorded as an opening-balance order when non-zero.
    #[serde(default)]
    pub opening_balance_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewBankAccount {
    pub bank_name: String,
    pub account_number: String,
    #[serde(default)]
    pub account_holder: Option<String>,
    #[serde(default)]
    pub opening_balance_cents: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debt_bearing_methods() {
        assert!(PaymentMethod::Debt.is_debt_bearing());
        assert!(PaymentMethod::Pending.is_debt_bearing());
        assert!(!PaymentMethod::Cash.is_debt_bearing());
        assert!(!PaymentMethod::Transfer.is_debt_bearing());
    }

    #[test]
    fn test_order_request_total() {
        let req = OrderRequest {
            partner_id: None,
            order_type: OrderType::Sale,
            payment_method: PaymentMethod::Cash,
            lines: vec![
                OrderLineRequest {
                    product_id: "a".to_string(),
                    quantity: 3,
                    unit_price_cents: 1_500,
                    name_override: None,
                },
                OrderLineRequest {
                    product_id: "b".to_string(),
                    quantity: -1,
                    unit_price_cents: 2_000,
                    name_override: None,
                },
            ],
            upfront_cents: 0,
            bank_account_id: None,
            note: None,
            occurred_at: None,
        };
        assert_eq!(req.total().unwrap().cents(), 2_500);
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::Transfer).unwrap(),
            "\"transfer\""
        );
        let origin: VoucherOrigin = serde_json::from_str("\"settlement\"").unwrap();
        assert_eq!(origin, VoucherOrigin::Settlement);
        assert_eq!(VoucherOrigin::default(), VoucherOrigin::Manual);
    }

    #[test]
    fn test_request_defaults() {
        let json = r#"{
            "order_type": "purchase",
            "payment_method": "debt",
            "lines": [{"product_id": "p", "quantity": 2, "unit_price_cents": 10}]
        }"#;
        let req: OrderRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.upfront_cents, 0);
        assert!(req.partner_id.is_none());
        assert!(req.occurred_at.is_none());
        assert_eq!(req.total().unwrap().cents(), 20);
    }

    #[test]
    fn test_new_id_is_uuid() {
        let id = new_id();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_ne!(id, new_id());
    }
}
