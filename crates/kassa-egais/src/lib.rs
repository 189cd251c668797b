//! # kassa-egais: EGAIS Reporting for Kassa
//!
//! Reports the alcohol lines of closed checks to the UTM transport agent
//! and prints the confirmation it returns.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  kassa-fiscal::FiscalRegister                                          │
//! │       │  check closed, alcohol lines present                           │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 kassa-egais (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   EgaisReporter ──► ChequeV3 (kassa-core) ──► UtmClient        │   │
//! │  │        │                                        │ HTTP POST     │   │
//! │  │        ▼                                        ▼               │   │
//! │  │   xml_dir (cheque + reply)                 UTM :8080           │   │
//! │  │        │                                                        │   │
//! │  │        ▼                                                        │   │
//! │  │   QR slip on the register (DeviceHandle)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`] - `[egais]` and `[register]` settings
//! - [`client`] - UTM HTTP transport
//! - [`reporter`] - [`AlcoholReporter`](kassa_fiscal::AlcoholReporter) implementation
//! - [`error`] - Reporting errors

pub mod client;
pub mod config;
pub mod error;
pub mod reporter;

pub use client::{UtmClient, UtmResponse};
pub use config::{EgaisSettings, RegisterDefaults};
pub use error::{ReportingError, ReportingResult};
pub use reporter::EgaisReporter;
