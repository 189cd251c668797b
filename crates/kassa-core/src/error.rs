//! # Error Types
//!
//! Domain-specific error types for kassa-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kassa-core errors (this file)                                         │
//! │  ├── CoreError        - Document building / parsing failures           │
//! │  └── ValidationError  - Malformed numeric or regulatory fields         │
//! │                                                                         │
//! │  kassa-fiscal errors                                                    │
//! │  └── SettlementError  - Validation / DeviceNotReady / DeviceOperation  │
//! │                                                                         │
//! │  kassa-egais errors                                                     │
//! │  └── ReportingError   - Transport, reply and storage failures          │
//! │                                                                         │
//! │  Flow: ValidationError → SettlementError → SettlementResult (status)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include the offending field and value in the message
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// None of the order's items qualify for alcohol reporting.
    #[error("Order {order} has no alcohol items to report")]
    NoAlcoholItems { order: String },

    /// The ChequeV3 document could not be written.
    #[error("Failed to write EGAIS document: {0}")]
    XmlWrite(String),

    /// A UTM reply could not be read as XML.
    #[error("Malformed UTM reply: {0}")]
    XmlParse(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any fiscal register or network interaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// A numeric field could not be parsed.
    ///
    /// ## When This Occurs
    /// - `kolvo: "two"` on an order line
    /// - `price: "12,50"` (comma decimal separator)
    #[error("{field} is not a number: '{value}'")]
    NotANumber { field: String, value: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// A number, or a total derived from it, does not fit in 64 bits.
    #[error("{field} is too large")]
    TooLarge { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (marking barcode, EAN, price text).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates a NotANumber error for a field and its raw value.
    pub fn not_a_number(field: impl Into<String>, value: impl Into<String>) -> Self {
        ValidationError::NotANumber {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn too_large(field: impl Into<String>) -> Self {
        ValidationError::TooLarge {
            field: field.into(),
        }
    }

    /// Creates an InvalidFormat error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
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
        let err = CoreError::NoAlcoholItems {
            order: "477".to_string(),
        };
        assert_eq!(err.to_string(), "Order 477 has no alcohol items to report");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::not_a_number("products[0].kolvo", "two");
        assert_eq!(
            err.to_string(),
            "products[0].kolvo is not a number: 'two'"
        );

        let err = ValidationError::Required {
            field: "num".to_string(),
        };
        assert_eq!(err.to_string(), "num is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::invalid_format("ean", "must be 8, 12, 13 or 14 digits");
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
