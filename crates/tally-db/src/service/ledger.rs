//! # Ledger Service
//!
//! Read-side reconstruction of a partner's history and the balance auditor.
//!
//! ## Two Paths to the Same Number
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  incremental                         from first principles              │
//! │  ───────────                         ─────────────────────              │
//! │  every mutation adjusts              recalculate_debt():                │
//! │  partners.debt_balance_cents           Σ sale debt − Σ purchase debt    │
//! │                                      − (Σ receipts − Σ payments)        │
//! │                                        and overwrite the stored value   │
//! │                                                                         │
//! │  partner_ledger() walks the same events and must end on the same       │
//! │  balance as both                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Ledger and debt-cycle reads run in one transaction so orders and vouchers
//! come from the same snapshot.

use sqlx::SqlitePool;
use tally_core::audit::{AuditOutcome, DebtTotals};
use tally_core::ledger::{build_ledger, debt_cycles, DebtCycle, LedgerEvent, PartnerLedger};
use tally_core::LedgerConfig;
use tracing::{info, warn};

use crate::error::DbResult;
use crate::pool::WriteGate;
use crate::repository::order::{debt_order_totals, debt_orders_for_partner};
use crate::repository::partner::{require_partner, set_balance};
use crate::repository::voucher::{voucher_totals, vouchers_for_partner};
use crate::repository::Tx;

#[derive(Debug, Clone)]
pub struct LedgerService {
    pool: SqlitePool,
    gate: WriteGate,
    ledger: LedgerConfig,
}

impl LedgerService {
    pub fn new(pool: SqlitePool, gate: WriteGate, ledger: LedgerConfig) -> Self {
        LedgerService { pool, gate, ledger }
    }

    /// A partner's ledger, newest row first.
    pub async fn partner_ledger(&self, partner_id: &str) -> DbResult<PartnerLedger> {
        let mut tx = self.pool.begin().await?;
        let events = load_events(&mut tx, partner_id).await?;
        tx.commit().await?;

        Ok(build_ledger(events))
    }

    /// A partner's debt cycles, oldest first.
    pub async fn debt_cycles(&self, partner_id: &str) -> DbResult<Vec<DebtCycle>> {
        let mut tx = self.pool.begin().await?;
        let events = load_events(&mut tx, partner_id).await?;
        tx.commit().await?;

        Ok(debt_cycles(events, self.ledger.cycle_tolerance()))
    }

    /// Recomputes a partner's balance from orders and vouchers and stores it.
    ///
    /// Running it twice in a row gives the same result.
    pub async fn recalculate_debt(&self, partner_id: &str) -> DbResult<AuditOutcome> {
        let _guard = self.gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let partner = require_partner(&mut tx, partner_id).await?;
        let (sale_debt, purchase_debt) = debt_order_totals(&mut *tx, partner_id).await?;
        let (receipts, payments) = voucher_totals(&mut *tx, partner_id).await?;

        let totals = DebtTotals {
            sale_debt,
            purchase_debt,
            receipts,
            payments,
        };
        let recomputed = totals.recompute();
        set_balance(&mut tx, partner_id, recomputed).await?;

        tx.commit().await?;

        let outcome = AuditOutcome {
            previous_balance_cents: partner.debt_balance_cents,
            new_balance_cents: recomputed.cents(),
        };
        if outcome.corrected() {
            warn!(
                partner_id = %partner_id,
                stored = outcome.previous_balance_cents,
                recomputed = outcome.new_balance_cents,
                drift = %outcome.drift(),
                "Partner balance drift corrected"
            );
        } else {
            info!(partner_id = %partner_id, balance = %recomputed, "Partner balance verified");
        }
        Ok(outcome)
    }
}

async fn load_events(tx: &mut Tx<'_>, partner_id: &str) -> DbResult<Vec<LedgerEvent>> {
    require_partner(tx, partner_id).await?;

    let orders = debt_orders_for_partner(&mut **tx, partner_id).await?;
    let vouchers = vouchers_for_partner(&mut **tx, partner_id).await?;

    let mut events: Vec<LedgerEvent> = orders.iter().filter_map(LedgerEvent::from_order).collect();
    events.extend(vouchers.iter().map(LedgerEvent::from_voucher));
    Ok(events)
}
