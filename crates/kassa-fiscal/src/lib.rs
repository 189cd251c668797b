//! # kassa-fiscal: Fiscal Register Layer for Kassa
//!
//! Everything that talks to the register: the device port, the readiness
//! state machine, the settlement sequence, bills, shift reports and the
//! async checkout that ties them to the audit log and EGAIS.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  kassa-server handlers                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 kassa-fiscal (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │  checkout ──► handle ──► settlement / bill / reports           │   │
//! │  │     │            │              │                               │   │
//! │  │     │            │              ▼                               │   │
//! │  │     │            │          session (ready? recover once)       │   │
//! │  │     │            │              │                               │   │
//! │  │     │            └──────────────▼                               │   │
//! │  │     │                    device::FiscalDevice                   │   │
//! │  │     │                    (emulator | vendor driver)             │   │
//! │  │     ▼                                                           │   │
//! │  │  kassa-db AuditStore, AlcoholReporter (kassa-egais)             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`device`] - The register port and the in-memory emulator
//! - [`session`] - Scoped channel and readiness recovery
//! - [`settlement`] - The per-order fiscal sequence
//! - [`bill`] - Non-fiscal pre-check
//! - [`reports`] - X/Z reports and the EGAIS confirmation slip
//! - [`handle`] - Serialised async access to the register
//! - [`checkout`] - Audit + EGAIS around each settlement
//! - [`error`] - Device and settlement errors

pub mod bill;
pub mod checkout;
pub mod device;
pub mod error;
pub mod handle;
pub mod reports;
pub mod session;
pub mod settlement;

pub use bill::BillLayout;
pub use checkout::{AlcoholReporter, FiscalRegister, SettlementOutcome};
pub use device::{EmulatedRegister, FiscalDevice};
pub use error::{DeviceError, DeviceResult, FiscalResult, SettlementError};
pub use handle::DeviceHandle;
pub use session::{DeviceSession, DeviceState, Recovery};
pub use settlement::{settle, Settlement, SettlementOptions};
