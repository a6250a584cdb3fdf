//! # Debt & Bank Mutators
//!
//! Every sign rule of the system, as small pure functions.
//!
//! ## Polarity Table
//! ```text
//! ┌──────────────┬──────────────┬───────────────┬──────────────┬──────────────┐
//! │ order_type   │ total        │ debt delta    │ upfront      │ transfer     │
//! ├──────────────┼──────────────┼───────────────┼──────────────┼──────────────┤
//! │ Sale         │ ≥ 0          │ +total        │ Receipt  -u  │ Deposit      │
//! │ Sale         │ < 0 (return) │ +total (neg)  │ Payment  +u  │ Withdrawal   │
//! │ Purchase     │ ≥ 0          │ -total        │ Payment  +u  │ Withdrawal   │
//! │ Purchase     │ < 0 (return) │ -total (pos)  │ Receipt  -u  │ Deposit      │
//! └──────────────┴──────────────┴───────────────┴──────────────┴──────────────┘
//!
//!   Voucher effect on debt:     Receipt → -amount      Payment → +amount
//!   Bank effect on balance:     Deposit → +amount      Withdrawal → -amount
//! ```
//!
//! Reversal of any effect is its negation. The database layer never
//! re-derives a sign on its own; it calls these functions for both the
//! forward and the reverse direction.

use crate::money::Money;
use crate::types::{BankTransactionType, OrderType, PaymentMethod, VoucherType};

// =============================================================================
// Debt
// =============================================================================

/// Change to the partner's balance caused by the order itself.
///
/// Zero unless the payment method is debt-bearing (Debt or Pending).
pub fn debt_delta(order_type: OrderType, method: PaymentMethod, total: Money) -> Money {
    if !method.is_debt_bearing() {
        return Money::zero();
    }
    total * order_type.sign()
}

/// Change to the partner's balance caused by a voucher.
#[inline]
pub fn voucher_debt_delta(voucher_type: VoucherType, amount: Money) -> Money {
    match voucher_type {
        VoucherType::Receipt => -amount,
        VoucherType::Payment => amount,
    }
}

/// The voucher generated for the immediate part-payment of a Debt order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub voucher_type: VoucherType,
    /// Voucher magnitude.
    pub amount: Money,
    /// Equal to `voucher_debt_delta(voucher_type, amount)`.
    pub debt_adjustment: Money,
}

/// Settlement for `upfront` paid against a Debt order of `total`.
///
/// Returns `None` when nothing was paid upfront.
///
/// ## Example
/// ```rust
/// use tally_core::money::Money;
/// use tally_core::mutators::upfront_settlement;
/// use tally_core::{OrderType, VoucherType};
///
/// let s = upfront_settlement(OrderType::Sale, Money::from_cents(-300), Money::from_cents(100)).unwrap();
/// assert_eq!(s.voucher_type, VoucherType::Payment);
/// assert_eq!(s.debt_adjustment.cents(), 100);
/// ```
pub fn upfront_settlement(order_type: OrderType, total: Money, upfront: Money) -> Option<Settlement> {
    if !upfront.is_positive() {
        return None;
    }

    let voucher_type = match (order_type, total.is_negative()) {
        (OrderType::Sale, false) | (OrderType::Purchase, true) => VoucherType::Receipt,
        (OrderType::Sale, true) | (OrderType::Purchase, false) => VoucherType::Payment,
    };

    Some(Settlement {
        voucher_type,
        amount: upfront,
        debt_adjustment: voucher_debt_delta(voucher_type, upfront),
    })
}

// =============================================================================
// Bank
// =============================================================================

/// Change to an account balance caused by a bank transaction.
#[inline]
pub fn bank_balance_delta(kind: BankTransactionType, amount: Money) -> Money {
    match kind {
        BankTransactionType::Deposit => amount,
        BankTransactionType::Withdrawal => -amount,
    }
}

/// The bank transaction generated for a Transfer order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankMovement {
    pub kind: BankTransactionType,
    /// Transaction magnitude.
    pub amount: Money,
    /// Equal to `bank_balance_delta(kind, amount)`.
    pub balance_delta: Money,
}

/// Movement for a Transfer order of `total`.
///
/// `transferred` of zero means the full total was transferred. Returns
/// `None` when the resulting magnitude is zero.
pub fn bank_movement(order_type: OrderType, total: Money, transferred: Money) -> Option<BankMovement> {
    let amount = if transferred.is_zero() {
        total.abs()
    } else {
        transferred.abs()
    };
    if amount.is_zero() {
        return None;
    }

    let kind = match (order_type, total.is_negative()) {
        (OrderType::Sale, false) | (OrderType::Purchase, true) => BankTransactionType::Deposit,
        (OrderType::Sale, true) | (OrderType::Purchase, false) => BankTransactionType::Withdrawal,
    };

    Some(BankMovement {
        kind,
        amount,
        balance_delta: bank_balance_delta(kind, amount),
    })
}

// =============================================================================
// Settled Amount
// =============================================================================

/// Contribution of a linked voucher to an order's `amount_paid`.
///
/// Money flowing in the order's natural direction counts positive.
#[inline]
pub fn voucher_paid_contribution(order_type: OrderType, voucher_type: VoucherType, amount: Money) -> Money {
    match (order_type, voucher_type) {
        (OrderType::Sale, VoucherType::Receipt) | (OrderType::Purchase, VoucherType::Payment) => amount,
        (OrderType::Sale, VoucherType::Payment) | (OrderType::Purchase, VoucherType::Receipt) => -amount,
    }
}

/// Contribution of a linked bank transaction to an order's `amount_paid`.
#[inline]
pub fn transfer_paid_contribution(
    order_type: OrderType,
    kind: BankTransactionType,
    amount: Money,
) -> Money {
    match (order_type, kind) {
        (OrderType::Sale, BankTransactionType::Deposit)
        | (OrderType::Purchase, BankTransactionType::Withdrawal) => amount,
        (OrderType::Sale, BankTransactionType::Withdrawal)
        | (OrderType::Purchase, BankTransactionType::Deposit) => -amount,
    }
}

/// The value `amount_paid` must hold for an order.
///
/// ```text
///   Debt / Pending ── Σ linked vouchers
///   Transfer ──────── Σ linked bank transactions (total when none)
///   Cash ──────────── total
/// ```
pub fn settled_amount(
    order_type: OrderType,
    method: PaymentMethod,
    total: Money,
    vouchers: &[(VoucherType, Money)],
    transfers: &[(BankTransactionType, Money)],
) -> Money {
    match method {
        PaymentMethod::Debt | PaymentMethod::Pending => vouchers
            .iter()
            .map(|(t, a)| voucher_paid_contribution(order_type, *t, *a))
            .sum(),
        PaymentMethod::Transfer if transfers.is_empty() => total,
        PaymentMethod::Transfer => transfers
            .iter()
            .map(|(k, a)| transfer_paid_contribution(order_type, *k, *a))
            .sum(),
        PaymentMethod::Cash => total,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn m(c: i64) -> Money {
        Money::from_cents(c)
    }

    #[test]
    fn test_debt_delta_only_for_debt_bearing() {
        assert_eq!(debt_delta(OrderType::Sale, PaymentMethod::Debt, m(500)), m(500));
        assert_eq!(debt_delta(OrderType::Purchase, PaymentMethod::Debt, m(500)), m(-500));
        assert_eq!(debt_delta(OrderType::Sale, PaymentMethod::Pending, m(500)), m(500));
        assert_eq!(debt_delta(OrderType::Sale, PaymentMethod::Cash, m(500)), m(0));
        assert_eq!(debt_delta(OrderType::Sale, PaymentMethod::Transfer, m(500)), m(0));
    }

    #[test]
    fn test_debt_sale_with_upfront_nets_out() {
        let total = m(1_000_000);
        let debt = debt_delta(OrderType::Sale, PaymentMethod::Debt, total);
        let s = upfront_settlement(OrderType::Sale, total, m(400_000)).unwrap();
        assert_eq!(s.voucher_type, VoucherType::Receipt);
        assert_eq!(s.amount, m(400_000));
        assert_eq!(debt + s.debt_adjustment, m(600_000));
    }

    #[test]
    fn test_upfront_polarity_table() {
        let cases = [
            (OrderType::Sale, 100, VoucherType::Receipt, -10),
            (OrderType::Sale, -100, VoucherType::Payment, 10),
            (OrderType::Purchase, 100, VoucherType::Payment, 10),
            (OrderType::Purchase, -100, VoucherType::Receipt, -10),
        ];
        for (order_type, total, voucher_type, adj) in cases {
            let s = upfront_settlement(order_type, m(total), m(10)).unwrap();
            assert_eq!(s.voucher_type, voucher_type, "{:?} {}", order_type, total);
            assert_eq!(s.debt_adjustment, m(adj), "{:?} {}", order_type, total);
        }
    }

    #[test]
    fn test_no_upfront_no_settlement() {
        assert!(upfront_settlement(OrderType::Sale, m(100), m(0)).is_none());
        assert!(upfront_settlement(OrderType::Sale, m(100), m(-5)).is_none());
    }

    #[test]
    fn test_voucher_debt_delta() {
        assert_eq!(voucher_debt_delta(VoucherType::Receipt, m(70)), m(-70));
        assert_eq!(voucher_debt_delta(VoucherType::Payment, m(70)), m(70));
    }

    #[test]
    fn test_bank_movement_defaults_to_total() {
        let mv = bank_movement(OrderType::Sale, m(900), m(0)).unwrap();
        assert_eq!(mv.kind, BankTransactionType::Deposit);
        assert_eq!(mv.amount, m(900));
        assert_eq!(mv.balance_delta, m(900));
    }

    #[test]
    fn test_bank_movement_polarity() {
        let mv = bank_movement(OrderType::Purchase, m(900), m(300)).unwrap();
        assert_eq!(mv.kind, BankTransactionType::Withdrawal);
        assert_eq!(mv.balance_delta, m(-300));

        let mv = bank_movement(OrderType::Sale, m(-900), m(0)).unwrap();
        assert_eq!(mv.kind, BankTransactionType::Withdrawal);
        assert_eq!(mv.amount, m(900));

        let mv = bank_movement(OrderType::Purchase, m(-900), m(0)).unwrap();
        assert_eq!(mv.kind, BankTransactionType::Deposit);

        assert!(bank_movement(OrderType::Sale, m(0), m(0)).is_none());
    }

    #[test]
    fn test_settled_amount_by_method() {
        let vouchers = [(VoucherType::Receipt, m(400)), (VoucherType::Payment, m(50))];
        assert_eq!(
            settled_amount(OrderType::Sale, PaymentMethod::Debt, m(1_000), &vouchers, &[]),
            m(350)
        );
        assert_eq!(
            settled_amount(OrderType::Purchase, PaymentMethod::Debt, m(1_000), &vouchers, &[]),
            m(-350)
        );
        assert_eq!(
            settled_amount(OrderType::Sale, PaymentMethod::Pending, m(1_000), &[], &[]),
            m(0)
        );
        assert_eq!(
            settled_amount(OrderType::Sale, PaymentMethod::Cash, m(1_000), &vouchers, &[]),
            m(1_000)
        );
        assert_eq!(
            settled_amount(OrderType::Sale, PaymentMethod::Transfer, m(1_000), &[], &[]),
            m(1_000)
        );
        assert_eq!(
            settled_amount(
                OrderType::Purchase,
                PaymentMethod::Transfer,
                m(1_000),
                &[],
                &[(BankTransactionType::Withdrawal, m(600))]
            ),
            m(600)
        );
    }

    #[test]
    fn test_sales_return_settlement_is_paid_back() {
        let total = m(-300);
        let s = upfront_settlement(OrderType::Sale, total, m(300)).unwrap();
        let paid = settled_amount(
            OrderType::Sale,
            PaymentMethod::Debt,
            total,
            &[(s.voucher_type, s.amount)],
            &[],
        );
        assert_eq!(paid, total);
        assert!((debt_delta(OrderType::Sale, PaymentMethod::Debt, total) + s.debt_adjustment).is_zero());
    }
}
