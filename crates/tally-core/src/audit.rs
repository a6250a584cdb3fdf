//! # Balance Auditor
//!
//! Recomputes a partner's balance from first principles, independent of the
//! incremental mutators.
//!
//! ```text
//!   balance = (Σ sale debt − Σ purchase debt) − (Σ receipts − Σ payments)
//! ```
//!
//! The database layer aggregates the four sums; this module only combines
//! them, so the formula lives in exactly one place.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

/// The four aggregates the recomputation needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtTotals {
    /// Σ total of debt-bearing Sale orders.
    pub sale_debt: Money,
    /// Σ total of debt-bearing Purchase orders.
    pub purchase_debt: Money,
    /// Σ Receipt voucher amounts.
    pub receipts: Money,
    /// Σ Payment voucher amounts.
    pub payments: Money,
}

impl DebtTotals {
    /// The balance these totals imply.
    pub fn recompute(&self) -> Money {
        (self.sale_debt - self.purchase_debt) - (self.receipts - self.payments)
    }
}

/// Result of an audit run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AuditOutcome {
    pub previous_balance_cents: i64,
    pub new_balance_cents: i64,
}

impl AuditOutcome {
    /// Amount the stored balance was off by.
    pub fn drift(&self) -> Money {
        Money::from_cents(self.previous_balance_cents - self.new_balance_cents)
    }

    pub fn corrected(&self) -> bool {
        !self.drift().is_zero()
    }
}
