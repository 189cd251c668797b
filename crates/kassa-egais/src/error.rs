//! # Reporting Error Types
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Reporting Error Categories                          │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Document     │  │      Transport          │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  NoAlcoholItems │  │  Transport              │ │
//! │  │                 │  │  Validation     │  │  Timeout                │ │
//! │  │                 │  │  Document       │  │  Rejected               │ │
//! │  │                 │  │                 │  │  MalformedResponse      │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Storage: the XML or reply file could not be written                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! None of these reach the settlement caller as an error: the reporter turns
//! each one into an error-status submission.

use kassa_core::{CoreError, ValidationError};
use thiserror::Error;

/// Result type alias for EGAIS reporting.
pub type ReportingResult<T> = Result<T, ReportingError>;

#[derive(Debug, Error)]
pub enum ReportingError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid EGAIS configuration: {0}")]
    InvalidConfig(String),

    // =========================================================================
    // Document Errors
    // =========================================================================
    /// Raised before any network call.
    #[error("Order {order} has no alcohol items to report")]
    NoAlcoholItems { order: String },

    /// A barcode, EAN or price failed its regulatory format.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to build EGAIS document: {0}")]
    Document(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    #[error("UTM request failed: {0}")]
    Transport(String),

    #[error("UTM did not answer within {0} seconds")]
    Timeout(u64),

    /// The UTM answered with an error body or a non-success status.
    #[error("UTM rejected the cheque: {0}")]
    Rejected(String),

    #[error("Malformed UTM reply: {0}")]
    MalformedResponse(String),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    #[error("Failed to write EGAIS file: {0}")]
    Storage(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<CoreError> for ReportingError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NoAlcoholItems { order } => ReportingError::NoAlcoholItems { order },
            CoreError::Validation(e) => ReportingError::Validation(e),
            CoreError::XmlWrite(msg) => ReportingError::Document(msg),
            CoreError::XmlParse(msg) => ReportingError::MalformedResponse(msg),
        }
    }
}

impl From<std::io::Error> for ReportingError {
    fn from(err: std::io::Error) -> Self {
        ReportingError::Storage(err.to_string())
    }
}

impl From<url::ParseError> for ReportingError {
    fn from(err: url::ParseError) -> Self {
        ReportingError::InvalidConfig(format!("bad UTM endpoint: {}", err))
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl ReportingError {
    /// Whether an operator resubmitting the same cheque could succeed.
    ///
    /// Nothing is retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReportingError::Transport(_) | ReportingError::Timeout(_)
        )
    }

    pub fn is_config_error(&self) -> bool {
        matches!(self, ReportingError::InvalidConfig(_))
    }

    /// Errors found while building the document, before any network call.
    pub fn is_document_error(&self) -> bool {
        matches!(
            self,
            ReportingError::NoAlcoholItems { .. }
                | ReportingError::Validation(_)
                | ReportingError::Document(_)
        )
    }
}
