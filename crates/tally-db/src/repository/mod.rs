//! # Repository Module
//!
//! Row-level database access for the Tally back-office.
//!
//! ## Two Kinds of Entry Point
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  XxxRepository (struct, owns a pool clone)                              │
//! │  ├── get_by_id / list_* ........ plain reads for the caller layer      │
//! │  └── insert / delete ........... catalogue writes without balances     │
//! │                                                                         │
//! │  free functions (pub(crate))                                            │
//! │  ├── fetch_* ................... generic over the executor, so the     │
//! │  │                               same query runs on the pool or inside │
//! │  │                               an open transaction                   │
//! │  └── insert_* / adjust_* ....... take `&mut Tx`; only services call    │
//! │                                  them, inside one transaction          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Products and bundle recipes
//! - [`PartnerRepository`](partner::PartnerRepository) - Customers and suppliers
//! - [`OrderRepository`](order::OrderRepository) - Orders and lines
//! - [`VoucherRepository`](voucher::VoucherRepository) - Cash vouchers
//! - [`BankRepository`](bank::BankRepository) - Accounts and transactions

pub mod bank;
pub mod order;
pub mod partner;
pub mod product;
pub mod voucher;

/// An open SQLite transaction.
pub(crate) type Tx<'c> = sqlx::Transaction<'c, sqlx::Sqlite>;
