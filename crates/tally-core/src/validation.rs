//! # Validation Module
//!
//! Input validation for requests entering the core.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller layer (HTTP / desktop)                                 │
//! │  ├── Schema checks, required fields, types                             │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  └── Values that would corrupt balances (negative amounts,             │
//! │      zero quantities, self-referencing bundles)                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::{validate_amount, validate_product_name};
//!
//! validate_product_name("Green tea 500g").unwrap();
//! assert!(validate_amount("amount", -1).is_err());
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::types::{BundleComponentInput, OrderRequest, PaymentMethod};
use crate::{
    MAX_BUNDLE_COMPONENTS, MAX_COMPONENT_QUANTITY, MAX_LINE_QUANTITY, MAX_ORDER_LINES,
    MAX_UNIT_PRICE_CENTS,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name (product, partner, bank).
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a product name.
///
/// ```rust
/// use tally_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Green tea 500g").is_ok());
/// assert!(validate_product_name("   ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_name("name", name)
}

pub fn validate_partner_name(name: &str) -> ValidationResult<()> {
    validate_name("name", name)
}

pub fn validate_bank_name(name: &str) -> ValidationResult<()> {
    validate_name("bank_name", name)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a monetary amount that must not be negative.
pub fn validate_amount(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a strictly positive amount (voucher and bank magnitudes).
pub fn validate_positive_amount(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a unit-of-measure multiplier.
pub fn validate_multiplier(multiplier: i64) -> ValidationResult<()> {
    if multiplier < 1 {
        return Err(ValidationError::MustBePositive {
            field: "multiplier".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates an order request before any row is touched.
///
/// ## Rules
/// - 1 to `MAX_ORDER_LINES` lines
/// - every line has a product, a non-zero quantity within
///   ±`MAX_LINE_QUANTITY` and a price in `0..=MAX_UNIT_PRICE_CENTS`
/// - the order total fits in `i64`
/// - `upfront_cents` ≥ 0
/// - `Pending` cannot be requested; it is reached only by voiding a
///   settlement
/// - Debt orders need a partner
pub fn validate_order_request(req: &OrderRequest) -> ValidationResult<()> {
    if req.lines.is_empty() {
        return Err(ValidationError::required("lines"));
    }

    if req.lines.len() > MAX_ORDER_LINES {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_ORDER_LINES as i64,
        });
    }

    for line in &req.lines {
        if line.product_id.trim().is_empty() {
            return Err(ValidationError::required("product_id"));
        }
        if line.quantity == 0 {
            return Err(ValidationError::not_allowed("quantity", "must not be zero"));
        }
        if line.quantity.unsigned_abs() > MAX_LINE_QUANTITY as u64 {
            return Err(ValidationError::out_of_range(
                "quantity",
                -MAX_LINE_QUANTITY,
                MAX_LINE_QUANTITY,
            ));
        }
        validate_amount("unit_price_cents", line.unit_price_cents)?;
        if line.unit_price_cents > MAX_UNIT_PRICE_CENTS {
            return Err(ValidationError::out_of_range("unit_price_cents", 0, MAX_UNIT_PRICE_CENTS));
        }
    }
    req.total()?;

    validate_amount("upfront_cents", req.upfront_cents)?;

    if req.payment_method == PaymentMethod::Pending {
        return Err(ValidationError::not_allowed(
            "payment_method",
            "pending is set by voiding a settlement",
        ));
    }

    if req.payment_method == PaymentMethod::Debt && req.partner_id.is_none() {
        return Err(ValidationError::required("partner_id"));
    }

    Ok(())
}

/// Validates a bundle recipe against the bundle's own id.
///
/// ## Rules
/// - at most `MAX_BUNDLE_COMPONENTS` entries
/// - `quantity_per_unit` in `1..=MAX_COMPONENT_QUANTITY`
/// - no component appears twice
/// - the bundle is not its own component
///
/// Existence and "component is not itself a bundle" need the database and
/// are checked there.
pub fn validate_bundle_components(
    bundle_id: &str,
    components: &[BundleComponentInput],
) -> ValidationResult<()> {
    if components.len() > MAX_BUNDLE_COMPONENTS {
        return Err(ValidationError::OutOfRange {
            field: "components".to_string(),
            min: 0,
            max: MAX_BUNDLE_COMPONENTS as i64,
        });
    }

    let mut seen = HashSet::new();
    for c in components {
        if c.component_id == bundle_id {
            return Err(ValidationError::not_allowed(
                "component_id",
                "a bundle cannot contain itself",
            ));
        }
        if c.quantity_per_unit <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity_per_unit".to_string(),
            });
        }
        if c.quantity_per_unit > MAX_COMPONENT_QUANTITY {
            return Err(ValidationError::out_of_range(
                "quantity_per_unit",
                1,
                MAX_COMPONENT_QUANTITY,
            ));
        }
        if !seen.insert(c.component_id.as_str()) {
            return Err(ValidationError::not_allowed(
                "component_id",
                format!("{} listed twice", c.component_id),
            ));
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderLineRequest, OrderType};

    fn request() -> OrderRequest {
        OrderRequest {
            partner_id: Some("p1".to_string()),
            order_type: OrderType::Sale,
            payment_method: PaymentMethod::Debt,
            lines: vec![OrderLineRequest {
                product_id: "tea".to_string(),
                quantity: 2,
                unit_price_cents: 1_000,
                name_override: None,
            }],
            upfront_cents: 0,
            bank_account_id: None,
            note: None,
            occurred_at: None,
        }
    }

    #[test]
    fn test_valid_order() {
        assert!(validate_order_request(&request()).is_ok());
    }

    #[test]
    fn test_order_without_lines() {
        let mut req = request();
        req.lines.clear();
        assert!(matches!(
            validate_order_request(&req),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let mut req = request();
        req.lines[0].quantity = 0;
        assert!(validate_order_request(&req).is_err());
    }

    #[test]
    fn test_negative_amounts_rejected() {
        let mut req = request();
        req.upfront_cents = -1;
        assert!(matches!(
            validate_order_request(&req),
            Err(ValidationError::MustNotBeNegative { .. })
        ));

        let mut req = request();
        req.lines[0].unit_price_cents = -5;
        assert!(validate_order_request(&req).is_err());
    }

    #[test]
    fn test_return_quantity_allowed() {
        let mut req = request();
        req.lines[0].quantity = -3;
        assert!(validate_order_request(&req).is_ok());
    }

    #[test]
    fn test_line_bounds() {
        let mut req = request();
        req.lines[0].quantity = MAX_LINE_QUANTITY + 1;
        assert!(matches!(
            validate_order_request(&req),
            Err(ValidationError::OutOfRange { .. })
        ));

        req.lines[0].quantity = -MAX_LINE_QUANTITY;
        assert!(validate_order_request(&req).is_ok());

        req.lines[0].quantity = 1;
        req.lines[0].unit_price_cents = MAX_UNIT_PRICE_CENTS + 1;
        assert!(matches!(
            validate_order_request(&req),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_huge_line_is_refused_not_overflowed() {
        let mut req = request();
        req.lines[0].quantity = 4_000_000_000;
        req.lines[0].unit_price_cents = 4_000_000_000;
        assert!(validate_order_request(&req).is_err());
    }

    #[test]
    fn test_pending_cannot_be_requested() {
        let mut req = request();
        req.payment_method = PaymentMethod::Pending;
        assert!(matches!(
            validate_order_request(&req),
            Err(ValidationError::NotAllowed { .. })
        ));
    }

    #[test]
    fn test_debt_requires_partner() {
        let mut req = request();
        req.partner_id = None;
        assert!(validate_order_request(&req).is_err());

        req.payment_method = PaymentMethod::Cash;
        assert!(validate_order_request(&req).is_ok());
    }

    #[test]
    fn test_bundle_components() {
        let ok = vec![
            BundleComponentInput { component_id: "a".into(), quantity_per_unit: 2 },
            BundleComponentInput { component_id: "b".into(), quantity_per_unit: 1 },
        ];
        assert!(validate_bundle_components("box", &ok).is_ok());

        let selfref = vec![BundleComponentInput { component_id: "box".into(), quantity_per_unit: 1 }];
        assert!(validate_bundle_components("box", &selfref).is_err());

        let zero = vec![BundleComponentInput { component_id: "a".into(), quantity_per_unit: 0 }];
        assert!(validate_bundle_components("box", &zero).is_err());

        let huge = vec![BundleComponentInput {
            component_id: "a".into(),
            quantity_per_unit: MAX_COMPONENT_QUANTITY + 1,
        }];
        assert!(validate_bundle_components("box", &huge).is_err());

        let dup = vec![
            BundleComponentInput { component_id: "a".into(), quantity_per_unit: 1 },
            BundleComponentInput { component_id: "a".into(), quantity_per_unit: 2 },
        ];
        assert!(validate_bundle_components("box", &dup).is_err());
    }

    #[test]
    fn test_names() {
        assert!(validate_partner_name("Acme Traders").is_ok());
        assert!(validate_bank_name("").is_err());
        assert!(matches!(
            validate_product_name(&"x".repeat(201)),
            Err(ValidationError::TooLong { max: 200, .. })
        ));
    }

    #[test]
    fn test_amount_validators() {
        assert!(validate_amount("amount", 0).is_ok());
        assert!(validate_positive_amount("amount", 0).is_err());
        assert!(validate_multiplier(0).is_err());
        assert!(validate_multiplier(24).is_ok());
    }
}
