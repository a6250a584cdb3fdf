//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Reference / consistency / business failures    │
//! │  ├── ValidationError  - Malformed request values                       │
//! │  └── ErrorKind        - Taxonomy the caller layer switches on          │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures (wraps CoreError)  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller layer            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse error category handed to the caller layer.
///
/// The caller maps these onto its own transport (HTTP status, IPC code).
/// None of them is ever retried internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A referenced product/partner/account/order/voucher does not exist.
    Reference,
    /// A request value is malformed or not allowed.
    Validation,
    /// An invariant could not be maintained; nothing was committed.
    Consistency,
    /// The persistence substrate failed.
    Storage,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced entity cannot be found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The entity is owned by an order and can only change through it.
    ///
    /// ## When This Occurs
    /// - Deleting a bank transaction that was generated by a Transfer order
    #[error("{entity} {id} belongs to order {order_id}; edit or delete the order instead")]
    LinkedToOrder {
        entity: String,
        id: String,
        order_id: String,
    },

    /// An invariant (reversibility, derived-field sync) could not be kept.
    #[error("Consistency violation: {reason}")]
    Consistency { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Consistency error.
    pub fn consistency(reason: impl Into<String>) -> Self {
        CoreError::Consistency {
            reason: reason.into(),
        }
    }

    /// Returns the taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound { .. } => ErrorKind::Reference,
            CoreError::LinkedToOrder { .. } | CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::Consistency { .. } => ErrorKind::Consistency,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// The caller layer owns schema validation; the core still refuses values
/// that would corrupt balances (negative amounts, zero quantities).
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or greater.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// String exceeds maximum length.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not allowed in this context.
    #[error("{field} is not allowed: {reason}")]
    NotAllowed { field: String, reason: String },
}

impl ValidationError {
    pub(crate) fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }

    pub(crate) fn not_allowed(field: &str, reason: impl Into<String>) -> Self {
        ValidationError::NotAllowed {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn out_of_range(field: &str, min: i64, max: i64) -> Self {
        ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max,
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::not_found("Product", "p-1");
        assert_eq!(err.to_string(), "Product not found: p-1");

        let err = CoreError::LinkedToOrder {
            entity: "Bank transaction".to_string(),
            id: "bt-1".to_string(),
            order_id: "o-1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Bank transaction bt-1 belongs to order o-1; edit or delete the order instead"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::required("lines");
        assert_eq!(err.to_string(), "lines is required");

        let err = ValidationError::MustNotBeNegative {
            field: "amount".to_string(),
        };
        assert_eq!(err.to_string(), "amount must not be negative");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(CoreError::not_found("Partner", "x").kind(), ErrorKind::Reference);
        assert_eq!(
            CoreError::consistency("voucher reversal failed").kind(),
            ErrorKind::Consistency
        );
        let core_err: CoreError = ValidationError::required("sku").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::Validation);
    }
}
