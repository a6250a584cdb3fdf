//! # Service Module
//!
//! Atomic mutations that touch more than one table.
//!
//! ## Transaction Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  service call                                                           │
//! │    │                                                                    │
//! │    ├── validate request (tally-core, no I/O)                            │
//! │    ├── gate.lock()              ← one writer at a time                  │
//! │    ├── pool.begin()                                                     │
//! │    │     ├── repository helpers (&mut Tx)                               │
//! │    │     ├── pure deltas from tally_core::{inventory, mutators}         │
//! │    │     └── settlement resync                                          │
//! │    └── tx.commit()              ← any `?` before this rolls back        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! While a transaction is open every statement goes through it, never
//! through the pool.
//!
//! ## Available Services
//!
//! - [`OrderService`](orders::OrderService) - Create, update, delete orders
//! - [`VoucherService`](settlement::VoucherService) - Cash vouchers and settlement sync
//! - [`BankService`](bank::BankService) - Bank accounts and manual transactions
//! - [`LedgerService`](ledger::LedgerService) - Partner ledger, debt cycles, balance audit

pub mod bank;
pub mod ledger;
pub mod orders;
pub mod settlement;
