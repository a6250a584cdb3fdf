//! # tally-db: Persistence and Transactions for Tally
//!
//! SQLite storage for the Tally back-office through sqlx, plus the services
//! that turn one business operation into one database transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Data Flow                                │
//! │                                                                         │
//! │  Caller layer (HTTP / CLI, not part of this workspace)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Services    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │ (service/)    │───►│ (repository/) │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ OrderService  │    │ Product       │    │ 001_initial  │  │   │
//! │  │   │ VoucherService│    │ Partner       │    │  _schema.sql │  │   │
//! │  │   │ BankService   │    │ Order/Voucher │    │              │  │   │
//! │  │   │ LedgerService │    │ Bank          │    │              │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │ pure deltas                                         │   │
//! │  │           ▼                                                     │   │
//! │  │     tally-core (inventory, mutators, ledger, audit)             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, configuration and the write gate
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Row access (products, partners, orders, vouchers, bank)
//! - [`service`] - Atomic multi-table mutations and ledger reads
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::from_env()).await?;
//!
//! let order = db.orders().create(request).await?;
//! let ledger = db.ledger().partner_ledger(&partner_id).await?;
//! let audit = db.ledger().recalculate_debt(&partner_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, ErrorPayload};
pub use pool::{Database, DbConfig};

pub use repository::bank::BankRepository;
pub use repository::order::OrderRepository;
pub use repository::partner::PartnerRepository;
pub use repository::product::ProductRepository;
pub use repository::voucher::VoucherRepository;

pub use service::bank::BankService;
pub use service::ledger::LedgerService;
pub use service::orders::OrderService;
pub use service::settlement::VoucherService;
