//! # tally-core: Pure Business Logic for the Tally back-office
//!
//! This crate is the **heart** of the ledger & inventory consistency engine.
//! Every balance rule lives here as a pure function with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Tally Back-Office Architecture                    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Caller layer (HTTP / desktop, external)            │   │
//! │  │    createOrder, deleteVoucher, getPartnerLedger, ...            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ validated, typed requests             │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ inventory │  │ mutators  │  │  ledger   │  │   audit   │  │   │
//! │  │   │  bundle   │  │ debt/bank │  │  replay   │  │ recompute │  │   │
//! │  │   │ expansion │  │  deltas   │  │  cycles   │  │  balance  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-db (Database Layer)                    │   │
//! │  │        applies the deltas inside one SQLite transaction         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Partner, Order, CashVoucher, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`inventory`] - Bundle expansion and derived stock/cost
//! - [`mutators`] - Debt, settlement and bank delta functions
//! - [`ledger`] - Partner ledger and debt-cycle reconstruction
//! - [`audit`] - First-principles partner balance recomputation
//! - [`config`] - Ledger configuration
//! - [`error`] - Domain error types
//! - [`validation`] - Request validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::money::Money;
//! use tally_core::mutators::{debt_delta, upfront_settlement};
//! use tally_core::{OrderType, PaymentMethod, VoucherType};
//!
//! let total = Money::from_cents(1_000_000);
//! let debt = debt_delta(OrderType::Sale, PaymentMethod::Debt, total);
//! assert_eq!(debt.cents(), 1_000_000);
//!
//! let settlement = upfront_settlement(OrderType::Sale, total, Money::from_cents(400_000)).unwrap();
//! assert_eq!(settlement.voucher_type, VoucherType::Receipt);
//! assert_eq!((debt + settlement.debt_adjustment).cents(), 600_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod audit;
pub mod config;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod money;
pub mod mutators;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tally_core::Money` instead of
// `use tally_core::money::Money`

pub use config::LedgerConfig;
pub use error::{CoreError, ErrorKind, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of lines accepted in a single order request.
pub const MAX_ORDER_LINES: usize = 500;

/// Maximum number of components a bundle product may declare.
pub const MAX_BUNDLE_COMPONENTS: usize = 50;

/// Maximum absolute quantity on a single order line.
///
/// ## Business Reason
/// Catches a mistyped quantity before it moves stock, and keeps
/// quantity × price well inside `i64`.
pub const MAX_LINE_QUANTITY: i64 = 1_000_000;

/// Maximum unit price on a single order line, in minor units.
pub const MAX_UNIT_PRICE_CENTS: i64 = 1_000_000_000_000;

/// Maximum units of one component inside one bundle unit.
pub const MAX_COMPONENT_QUANTITY: i64 = 10_000;
