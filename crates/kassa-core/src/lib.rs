//! # kassa-core: Pure Business Logic for Kassa
//!
//! Pricing, validation, item classification and EGAIS documents as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Kassa Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   Front-end (waiter terminal)                   │   │
//! │  │      Bill ──► Pay cash / card ──► X / Z report                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP JSON                              │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 kassa-server (axum handlers)                    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kassa-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  pricing  │  │   types   │  │   egais   │  │ validation│  │   │
//! │  │   │ discounts │  │  Order    │  │ ChequeV3  │  │  formats  │  │   │
//! │  │   │  totals   │  │  Result   │  │ UTM reply │  │  numbers  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │            ┌───────────────────┼────────────────────┐                   │
//! │            ▼                   ▼                    ▼                   │
//! │       kassa-db           kassa-fiscal          kassa-egais              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Wire order, catalog facts, settlement and EGAIS outcomes
//! - [`money`] - Money type with integer arithmetic (kopecks)
//! - [`quantity`] - Fractional quantities (thousandths)
//! - [`pricing`] - Discount policy and totals
//! - [`egais`] - ChequeV3 builder and UTM reply reader
//! - [`receipt`] - Printed text helpers
//! - [`validation`] - Numeric parsing and regulatory formats
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use kassa_core::money::Money;
//! use kassa_core::types::DiscountRate;
//!
//! let line = Money::from_kopecks(20_000);
//! let discounted = line.checked_apply_discount(DiscountRate::from_percent(5));
//! assert_eq!(discounted.map(|m| m.to_string()).as_deref(), Some("190.00"));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod egais;
pub mod error;
pub mod money;
pub mod pricing;
pub mod quantity;
pub mod receipt;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::{price_order, PricedItem, PricedOrder, PricingPolicy};
pub use quantity::Quantity;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Printable characters per receipt line on an 80 mm ribbon.
pub const DEFAULT_LINE_WIDTH: usize = 45;

/// Fixed regulatory values for draught sales in food service.
pub mod horeca {
    /// Federal authority id (tag 1262).
    pub const AUTHORITY_ID: &str = "030";
    /// Industry attribute value (tag 1265).
    pub const MODE: &str = "mode=horeca";
    /// Date format of the basis document (tag 1263).
    pub const DATE_FORMAT: &str = "%d.%m.%Y";
}

/// Fiscal tag numbers written by the settlement pipeline.
pub mod tags {
    pub const CASHIER: u16 = 1021;
    pub const CASHIER_INN: u16 = 1203;
    pub const AUTHORITY_ID: u16 = 1262;
    pub const BASIS_DATE: u16 = 1263;
    pub const BASIS_NUMBER: u16 = 1264;
    pub const INDUSTRY_VALUE: u16 = 1265;
}
