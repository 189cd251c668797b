//! # Device Port
//!
//! The fiscal register as the settlement pipeline sees it.
//!
//! ## Call Surface
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        FiscalDevice                                     │
//! │                                                                         │
//! │  channel     connect · disconnect · status · last_result               │
//! │  recovery    continue_print · cancel_document                          │
//! │  identity    read_identity                                             │
//! │  check       register_line · send_line_tag · send_item_barcode         │
//! │              check_marking_code · accept_marking_code ·                │
//! │              send_marking_code · send_tag · close_check                │
//! │  paper       print_line · print_wide_line · print_qr · feed · cut      │
//! │  shift       print_x_report · begin_close_session · close_session      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every call is synchronous and blocking, like the vendor driver behind it.
//! Callers reach the device only through [`crate::DeviceHandle`], which
//! serialises access and moves the calls off the async runtime.

pub mod emulator;

use chrono::NaiveDateTime;
use kassa_core::{DeviceIdentity, MeasureUnit, Money, PaymentItemSign, PaymentMethod, Quantity};
use serde::{Deserialize, Serialize};

use crate::error::DeviceResult;

pub use emulator::{DeviceCall, EmulatedRegister};

// =============================================================================
// Register Modes
// =============================================================================

/// Main register modes the pipeline cares about.
pub mod mode {
    /// Session open, less than 24 hours old.
    pub const SESSION_OPEN: u8 = 2;
    /// Session open, more than 24 hours old (a Z-report is due).
    pub const SESSION_EXPIRED: u8 = 3;
    /// Session closed.
    pub const SESSION_CLOSED: u8 = 4;
    /// A fiscal document is open.
    pub const DOCUMENT_OPEN: u8 = 8;
}

/// Printer sub-modes.
pub mod advanced_mode {
    pub const IDLE: u8 = 0;
    pub const PAPER_OUT_PASSIVE: u8 = 1;
    pub const PAPER_OUT_ACTIVE: u8 = 2;
    /// Paper was reloaded mid-print; waiting for "continue printing".
    pub const AWAITING_CONTINUE: u8 = 3;
    pub const PRINTING: u8 = 5;
}

/// Register state as reported by a status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub mode: u8,
    pub advanced_mode: u8,
    pub description: String,
}

impl DeviceStatus {
    pub fn new(mode: u8, advanced_mode: u8, description: impl Into<String>) -> Self {
        DeviceStatus {
            mode,
            advanced_mode,
            description: description.into(),
        }
    }
}

/// Result of the last driver call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverResult {
    pub code: i32,
    pub description: String,
}

// =============================================================================
// Check Operations
// =============================================================================

/// Sale or refund of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckKind {
    Sale,
    SaleReturn,
}

impl CheckKind {
    /// Calculation sign (tag 1054).
    pub const fn code(&self) -> u8 {
        match self {
            CheckKind::Sale => 1,
            CheckKind::SaleReturn => 2,
        }
    }
}

/// Payment method sign (tag 1214). Checks here are always settled in full.
pub const FULL_PAYMENT: u8 = 4;

/// One registered line of a fiscal check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalLine {
    pub kind: CheckKind,
    pub name: String,
    pub quantity: Quantity,
    /// Post-discount price per `measure_unit`.
    pub unit_price: Money,
    /// Explicit line amount; the register does not recompute it.
    pub line_total: Money,
    pub sign: PaymentItemSign,
    pub measure_unit: MeasureUnit,
    pub payment_type: u8,
}

/// A string tag, either on the current line or on the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalTag {
    pub number: u16,
    pub value: String,
}

impl FiscalTag {
    pub fn new(number: u16, value: impl Into<String>) -> Self {
        FiscalTag {
            number,
            value: value.into(),
        }
    }
}

/// Local verdict of the fiscal storage on a marking code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkingCheck {
    /// `CheckItemLocalResult` bit field.
    pub local_result: u8,
    pub description: String,
}

/// Payment that closes the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckPayment {
    pub method: PaymentMethod,
    pub amount: Money,
}

/// What the register reports after closing a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedDocument {
    pub document_number: u32,
    pub fiscal_sign: String,
    pub session_number: u32,
    pub closed_at: NaiveDateTime,
}

// =============================================================================
// Port
// =============================================================================

/// A fiscal register driver.
///
/// ## Implementing
/// Each method maps onto one vendor-driver call and reports the driver's
/// result code through [`crate::DeviceError`] when it is non-zero.
pub trait FiscalDevice: Send {
    fn connect(&mut self) -> DeviceResult<()>;
    fn disconnect(&mut self) -> DeviceResult<()>;
    fn status(&mut self) -> DeviceResult<DeviceStatus>;
    fn last_result(&self) -> DriverResult;

    /// Resumes a print interrupted by a paper change.
    fn continue_print(&mut self) -> DeviceResult<()>;
    /// Cancels whatever fiscal document is open (privileged).
    fn cancel_document(&mut self) -> DeviceResult<()>;

    fn read_identity(&mut self) -> DeviceResult<DeviceIdentity>;

    fn register_line(&mut self, line: &FiscalLine) -> DeviceResult<()>;
    /// Attaches a tag to the line registered last.
    fn send_line_tag(&mut self, tag: &FiscalTag) -> DeviceResult<()>;
    /// Sends a GTIN for a line sold by measure (no per-unit code).
    fn send_item_barcode(&mut self, gtin: &str) -> DeviceResult<()>;
    fn check_marking_code(&mut self, code: &str) -> DeviceResult<MarkingCheck>;
    fn accept_marking_code(&mut self) -> DeviceResult<()>;
    fn send_marking_code(&mut self, code: &str) -> DeviceResult<()>;
    /// Attaches a tag to the whole document.
    fn send_tag(&mut self, tag: &FiscalTag) -> DeviceResult<()>;
    fn close_check(&mut self, payment: &CheckPayment) -> DeviceResult<ClosedDocument>;

    fn print_line(&mut self, text: &str) -> DeviceResult<()>;
    fn print_wide_line(&mut self, text: &str) -> DeviceResult<()>;
    fn print_qr(&mut self, payload: &str) -> DeviceResult<()>;
    fn feed(&mut self, lines: u8) -> DeviceResult<()>;
    fn cut(&mut self) -> DeviceResult<()>;

    fn print_x_report(&mut self, password: u32) -> DeviceResult<()>;
    fn begin_close_session(&mut self, password: u32) -> DeviceResult<()>;
    /// Closes the shift and returns its number.
    fn close_session(&mut self, password: u32) -> DeviceResult<u32>;
}
