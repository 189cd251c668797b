//! # Fiscal Error Types
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Settlement Errors                                  │
//! │                                                                         │
//! │  Validation        malformed order fields        before the register   │
//! │  DeviceNotReady    still not ready after one      nothing printed      │
//! │                    recovery attempt                                     │
//! │  DeviceOperation   a driver call failed mid-      check state unknown, │
//! │                    sequence                       re-verified next time│
//! │  Internal          lock / worker thread failure                        │
//! │                                                                         │
//! │  None of these escape `settle`: they become an error SettlementResult. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use kassa_core::ValidationError;
use thiserror::Error;

/// A failed driver call.
///
/// Carries the driver's result code and description exactly as the register
/// reported them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: [{code}] {description}")]
pub struct DeviceError {
    pub operation: String,
    pub code: i32,
    pub description: String,
}

impl DeviceError {
    pub fn new(operation: impl Into<String>, code: i32, description: impl Into<String>) -> Self {
        DeviceError {
            operation: operation.into(),
            code,
            description: description.into(),
        }
    }
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Why a settlement (or a bill, or a report) did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The register stayed not-ready after the single recovery attempt.
    #[error("Register not ready: mode {mode} ({description})")]
    DeviceNotReady { mode: u8, description: String },

    #[error("Register error: {0}")]
    DeviceOperation(#[from] DeviceError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SettlementError {
    /// Driver result code, when the register reported one.
    pub fn result_code(&self) -> Option<i32> {
        match self {
            SettlementError::DeviceOperation(e) => Some(e.code),
            _ => None,
        }
    }

    pub fn result_description(&self) -> Option<String> {
        match self {
            SettlementError::DeviceOperation(e) => Some(e.description.clone()),
            SettlementError::DeviceNotReady { description, .. } => Some(description.clone()),
            _ => None,
        }
    }

    /// True when nothing was sent to the register.
    pub fn is_validation(&self) -> bool {
        matches!(self, SettlementError::Validation(_))
    }
}

pub type FiscalResult<T> = Result<T, SettlementError>;
