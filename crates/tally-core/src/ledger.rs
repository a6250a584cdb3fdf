//! # Ledger & Debt-Cycle Reconstruction
//!
//! Replays a partner's history to rebuild the running balance.
//!
//! ## Compute Forward, Display Backward
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  events (any order)                                                     │
//! │        │ sort by (occurred_at, orders-before-vouchers, created_at, id) │
//! │        ▼                                                                │
//! │  ┌──────────┬───────────┬──────────┬──────────┐                        │
//! │  │ 01/03    │ Sale 500  │  +500    │   500    │  ← walk accumulates    │
//! │  │ 02/03    │ Sale 200  │  +200    │   700    │                        │
//! │  │ 03/03    │ Receipt   │  -700    │     0    │                        │
//! │  └──────────┴───────────┴──────────┴──────────┘                        │
//! │        │ reverse                                                        │
//! │        ▼                                                                │
//! │  rows[0] = 03/03 (newest first), current_balance = 0                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only debt-bearing orders and vouchers are events. Cash and Transfer
//! orders never touch a partner's balance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::mutators::{debt_delta, voucher_debt_delta};
use crate::types::{CashVoucher, Order, OrderType, PaymentMethod, VoucherType};

// =============================================================================
// Events
// =============================================================================

/// What a ledger row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    Sale,
    Purchase,
    Receipt,
    Payment,
}

impl LedgerEntryKind {
    /// Orders sort before vouchers at the same instant.
    #[inline]
    fn rank(&self) -> u8 {
        match self {
            LedgerEntryKind::Sale | LedgerEntryKind::Purchase => 0,
            LedgerEntryKind::Receipt | LedgerEntryKind::Payment => 1,
        }
    }

    #[inline]
    pub fn is_order(&self) -> bool {
        self.rank() == 0
    }
}

/// One balance-affecting fact in a partner's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEvent {
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub source_id: String,
    pub reference: String,
    pub description: String,
    pub kind: LedgerEntryKind,
    /// Signed effect on the partner's balance.
    pub effect: Money,
}

impl LedgerEvent {
    /// Event for a debt-bearing order. Returns `None` for other orders.
    pub fn from_order(order: &Order) -> Option<Self> {
        if !order.bears_debt() {
            return None;
        }
        let kind = match order.order_type {
            OrderType::Sale => LedgerEntryKind::Sale,
            OrderType::Purchase => LedgerEntryKind::Purchase,
        };
        let description = match &order.note {
            Some(note) if !note.trim().is_empty() => note.clone(),
            _ => match kind {
                LedgerEntryKind::Sale => format!("Sale {}", order.display_id),
                _ => format!("Purchase {}", order.display_id),
            },
        };

        Some(LedgerEvent {
            occurred_at: order.occurred_at,
            created_at: order.created_at,
            source_id: order.id.clone(),
            reference: order.display_id.clone(),
            description,
            kind,
            effect: debt_delta(order.order_type, PaymentMethod::Debt, order.total()),
        })
    }

    /// Event for a voucher.
    pub fn from_voucher(voucher: &CashVoucher) -> Self {
        let (kind, prefix, label) = match voucher.voucher_type {
            VoucherType::Receipt => (LedgerEntryKind::Receipt, "RCV", "Cash receipt"),
            VoucherType::Payment => (LedgerEntryKind::Payment, "PAY", "Cash payment"),
        };
        let short: String = voucher.id.chars().take(8).collect();

        LedgerEvent {
            occurred_at: voucher.occurred_at,
            created_at: voucher.created_at,
            source_id: voucher.id.clone(),
            reference: format!("{}-{}", prefix, short.to_uppercase()),
            description: voucher.note.clone().unwrap_or_else(|| label.to_string()),
            kind,
            effect: voucher_debt_delta(voucher.voucher_type, voucher.amount()),
        }
    }
}

/// Sorts events into replay order.
pub fn chronological(mut events: Vec<LedgerEvent>) -> Vec<LedgerEvent> {
    events.sort_by(|a, b| {
        a.occurred_at
            .cmp(&b.occurred_at)
            .then(a.kind.rank().cmp(&b.kind.rank()))
            .then(a.created_at.cmp(&b.created_at))
            .then(a.source_id.cmp(&b.source_id))
    });
    events
}

// =============================================================================
// Ledger
// =============================================================================

/// One row of a partner ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerRow {
    #[ts(as = "String")]
    pub occurred_at: DateTime<Utc>,
    pub source_id: String,
    pub reference: String,
    pub description: String,
    pub kind: LedgerEntryKind,
    /// Balance increase (≥ 0).
    pub increase_cents: i64,
    /// Balance decrease (≥ 0).
    pub decrease_cents: i64,
    /// Running balance after this row.
    pub balance_cents: i64,
}

/// A partner's ledger, newest row first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PartnerLedger {
    pub rows: Vec<LedgerRow>,
    pub current_balance_cents: i64,
}

/// Walks the events forward and returns the rows newest first.
pub fn build_ledger(events: Vec<LedgerEvent>) -> PartnerLedger {
    let mut balance = Money::zero();
    let mut rows = Vec::with_capacity(events.len());

    for event in chronological(events) {
        balance += event.effect;
        let (increase, decrease) = if event.effect.is_negative() {
            (0, event.effect.abs().cents())
        } else {
            (event.effect.cents(), 0)
        };
        rows.push(LedgerRow {
            occurred_at: event.occurred_at,
            source_id: event.source_id,
            reference: event.reference,
            description: event.description,
            kind: event.kind,
            increase_cents: increase,
            decrease_cents: decrease,
            balance_cents: balance.cents(),
        });
    }

    rows.reverse();
    PartnerLedger {
        rows,
        current_balance_cents: balance.cents(),
    }
}

// =============================================================================
// Debt Cycles
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Open,
    Closed,
}

/// An interval during which the partner's balance stayed away from zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DebtCycle {
    #[ts(as = "String")]
    pub start_date: DateTime<Utc>,
    /// `None` while the cycle is open.
    #[ts(as = "Option<String>")]
    pub end_date: Option<DateTime<Utc>>,
    pub status: CycleStatus,
    /// Reference of the order that opened the cycle.
    pub opened_by: String,
    /// Largest absolute balance reached inside the cycle.
    pub peak_balance_cents: i64,
}

/// Splits a partner's history into debt cycles, oldest first.
///
/// ## Rules
/// - a cycle opens on an order event that leaves `|balance| >= tolerance`
///   while no cycle is open
/// - it closes on the first later event with `|balance| < tolerance`
/// - vouchers never open a cycle
///
/// The comparison is strict, so the default tolerance of 1 closes a cycle
/// only at an exact zero and a single unit still owed keeps it open.
pub fn debt_cycles(events: Vec<LedgerEvent>, tolerance: Money) -> Vec<DebtCycle> {
    let mut balance = Money::zero();
    let mut cycles = Vec::new();
    let mut open: Option<DebtCycle> = None;

    for event in chronological(events) {
        balance += event.effect;

        match open.as_mut() {
            None => {
                if event.kind.is_order() && !balance.is_below(tolerance) {
                    open = Some(DebtCycle {
                        start_date: event.occurred_at,
                        end_date: None,
                        status: CycleStatus::Open,
                        opened_by: event.reference.clone(),
                        peak_balance_cents: balance.abs().cents(),
                    });
                }
            }
            Some(cycle) => {
                cycle.peak_balance_cents = cycle.peak_balance_cents.max(balance.abs().cents());
                if balance.is_below(tolerance) {
                    cycle.end_date = Some(event.occurred_at);
                    cycle.status = CycleStatus::Closed;
                    if let Some(closed) = open.take() {
                        cycles.push(closed);
                    }
                }
            }
        }
    }

    if let Some(still_open) = open {
        cycles.push(still_open);
    }
    cycles
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 9, 0, 0).unwrap()
    }

    fn order_event(id: &str, d: u32, kind: LedgerEntryKind, effect: i64) -> LedgerEvent {
        LedgerEvent {
            occurred_at: day(d),
            created_at: day(d),
            source_id: id.to_string(),
            reference: format!("1.{:02}/03/24", d),
            description: String::new(),
            kind,
            effect: Money::from_cents(effect),
        }
    }

    fn receipt(id: &str, d: u32, amount: i64) -> LedgerEvent {
        order_event(id, d, LedgerEntryKind::Receipt, -amount)
    }

    #[test]
    fn test_ledger_is_newest_first_with_running_balance() {
        let ledger = build_ledger(vec![
            receipt("v1", 3, 700),
            order_event("o1", 1, LedgerEntryKind::Sale, 500),
            order_event("o2", 2, LedgerEntryKind::Sale, 200),
        ]);

        assert_eq!(ledger.current_balance_cents, 0);
        let balances: Vec<i64> = ledger.rows.iter().map(|r| r.balance_cents).collect();
        assert_eq!(balances, vec![0, 700, 500]);
        assert_eq!(ledger.rows[0].decrease_cents, 700);
        assert_eq!(ledger.rows[2].increase_cents, 500);
    }

    #[test]
    fn test_orders_precede_vouchers_at_same_instant() {
        let ledger = build_ledger(vec![
            receipt("v1", 1, 100),
            order_event("o1", 1, LedgerEntryKind::Sale, 100),
        ]);
        // Oldest row is the last one.
        assert_eq!(ledger.rows[1].source_id, "o1");
        assert_eq!(ledger.rows[1].balance_cents, 100);
    }

    #[test]
    fn test_single_closed_cycle() {
        let cycles = debt_cycles(
            vec![
                order_event("o1", 1, LedgerEntryKind::Sale, 500),
                receipt("v1", 3, 500),
            ],
            Money::from_cents(1),
        );
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].start_date, day(1));
        assert_eq!(cycles[0].end_date, Some(day(3)));
        assert_eq!(cycles[0].status, CycleStatus::Closed);
        assert_eq!(cycles[0].peak_balance_cents, 500);
    }

    #[test]
    fn test_open_cycle_at_end() {
        let cycles = debt_cycles(
            vec![
                order_event("o1", 1, LedgerEntryKind::Sale, 500),
                receipt("v1", 2, 500),
                order_event("o2", 4, LedgerEntryKind::Purchase, -300),
                receipt("v2", 5, 100),
            ],
            Money::from_cents(1),
        );
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[1].start_date, day(4));
        assert_eq!(cycles[1].end_date, None);
        assert_eq!(cycles[1].status, CycleStatus::Open);
        assert_eq!(cycles[1].peak_balance_cents, 400);
    }

    #[test]
    fn test_one_unit_owed_keeps_cycle_open() {
        let events = vec![
            order_event("o1", 1, LedgerEntryKind::Sale, 500),
            receipt("v1", 2, 499),
        ];

        let strict = debt_cycles(events.clone(), Money::from_cents(1));
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].status, CycleStatus::Open);

        let wide = debt_cycles(events, Money::from_cents(2));
        assert_eq!(wide[0].status, CycleStatus::Closed);
    }

    #[test]
    fn test_voucher_alone_never_opens_cycle() {
        let cycles = debt_cycles(vec![receipt("v1", 1, 300)], Money::from_cents(1));
        assert!(cycles.is_empty());
    }

    #[test]
    fn test_empty_history() {
        let ledger = build_ledger(vec![]);
        assert!(ledger.rows.is_empty());
        assert_eq!(ledger.current_balance_cents, 0);
    }
}
