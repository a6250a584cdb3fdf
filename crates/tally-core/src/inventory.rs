//! # Inventory Expansion Engine
//!
//! Turns "N units of product P moved in direction D" into the raw stock
//! deltas that actually have to be written, and derives bundle stock/cost.
//!
//! ## Bundle Expansion
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Sell 3 × GIFT-BOX   (recipe: 2 × TEA, 1 × MUG)                         │
//! │                                                                         │
//! │        expand(GIFT-BOX, 3, Out)                                         │
//! │               │                                                         │
//! │       ┌───────┴────────┐                                                │
//! │       ▼                ▼                                                │
//! │   (TEA, -6)        (MUG, -3)         GIFT-BOX itself: untouched         │
//! │                                                                         │
//! │  Displayed GIFT-BOX stock = min(floor(TEA / 2), floor(MUG / 1))         │
//! │  Displayed GIFT-BOX cost  = TEA.cost × 2 + MUG.cost × 1                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Expansion is one level deep: components are never bundles.
//! Raw counts may go negative; floor happens only when deriving.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{BundleComponent, OrderType, Product, ProductView};
use crate::validation::ValidationResult;

// =============================================================================
// Direction & Delta
// =============================================================================

/// Which way stock moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDirection {
    /// Stock leaves (sale).
    Out,
    /// Stock arrives (purchase).
    In,
}

impl StockDirection {
    #[inline]
    pub const fn sign(&self) -> i64 {
        match self {
            StockDirection::Out => -1,
            StockDirection::In => 1,
        }
    }

    /// The direction that undoes this one.
    #[inline]
    pub const fn opposite(&self) -> Self {
        match self {
            StockDirection::Out => StockDirection::In,
            StockDirection::In => StockDirection::Out,
        }
    }
}

impl From<OrderType> for StockDirection {
    fn from(order_type: OrderType) -> Self {
        match order_type {
            OrderType::Sale => StockDirection::Out,
            OrderType::Purchase => StockDirection::In,
        }
    }
}

/// A signed change to one product's raw stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDelta {
    pub product_id: String,
    pub delta: i64,
}

// =============================================================================
// Expansion
// =============================================================================

/// Resolves a quantity movement into raw stock deltas.
///
/// - plain product: one delta on the product itself
/// - bundle: one delta per component, scaled by `quantity_per_unit`
/// - bundle without components: nothing to move
///
/// A delta that would not fit in `i64` is refused.
///
/// ## Example
/// ```rust,ignore
/// let deltas = expand(&gift_box, &recipe, 3, StockDirection::Out)?;
/// assert_eq!(deltas, vec![
///     StockDelta { product_id: "tea".into(), delta: -6 },
///     StockDelta { product_id: "mug".into(), delta: -3 },
/// ]);
/// ```
pub fn expand(
    product: &Product,
    components: &[BundleComponent],
    quantity: i64,
    direction: StockDirection,
) -> ValidationResult<Vec<StockDelta>> {
    let overflow = || ValidationError::out_of_range("quantity", i64::MIN, i64::MAX);
    let signed = quantity.checked_mul(direction.sign()).ok_or_else(overflow)?;

    if !product.is_bundle {
        return Ok(vec![StockDelta {
            product_id: product.id.clone(),
            delta: signed,
        }]);
    }

    components
        .iter()
        .map(|c| {
            Ok(StockDelta {
                product_id: c.component_id.clone(),
                delta: signed.checked_mul(c.quantity_per_unit).ok_or_else(overflow)?,
            })
        })
        .collect()
}

/// Merges deltas on the same product, keeping first-seen order and dropping
/// zeros.
pub fn consolidate(deltas: impl IntoIterator<Item = StockDelta>) -> Vec<StockDelta> {
    let mut merged: Vec<StockDelta> = Vec::new();
    for d in deltas {
        match merged.iter_mut().find(|m| m.product_id == d.product_id) {
            Some(existing) => existing.delta += d.delta,
            None => merged.push(d),
        }
    }
    merged.retain(|d| d.delta != 0);
    merged
}

// =============================================================================
// Derived Bundle Stock & Cost
// =============================================================================

/// A component's recipe quantity together with its current raw levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentLevel {
    pub quantity_per_unit: i64,
    pub stock: i64,
    pub cost_cents: i64,
}

/// `min over components of floor(stock / quantity_per_unit)`.
///
/// A bundle without components has stock 0.
pub fn derive_bundle_stock(levels: &[ComponentLevel]) -> i64 {
    levels
        .iter()
        .filter(|l| l.quantity_per_unit > 0)
        .map(|l| l.stock.div_euclid(l.quantity_per_unit))
        .min()
        .unwrap_or(0)
}

/// `sum over components of cost × quantity_per_unit`.
pub fn derive_bundle_cost(levels: &[ComponentLevel]) -> Money {
    levels
        .iter()
        .map(|l| Money::from_cents(l.cost_cents).multiply_quantity(l.quantity_per_unit))
        .sum()
}

/// Builds the caller-facing view of a product.
///
/// `levels` must line up with `components`; it is ignored for plain products.
pub fn product_view(
    product: Product,
    components: Vec<BundleComponent>,
    levels: &[ComponentLevel],
) -> ProductView {
    let (stock, cost_cents) = if product.is_bundle {
        (
            derive_bundle_stock(levels),
            derive_bundle_cost(levels).cents(),
        )
    } else {
        (product.stock, product.cost_cents)
    };

    ProductView {
        product,
        stock,
        cost_cents,
        components,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
