//! # kassa-server
//!
//! HTTP front of the Kassa service.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          kassa-server                                   │
//! │                                                                         │
//! │  waiter terminal ──► axum (routes) ──► FiscalRegister ──► register     │
//! │                          │                   │                          │
//! │                          │                   ├──► AuditStore (SQLite)   │
//! │                          │                   └──► EgaisReporter (UTM)   │
//! │                          ▼                                              │
//! │                    request log (x-request-id)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! `kassa.toml` plus `KASSA_*` environment overrides; see [`config`].

pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

pub use config::{ConfigError, KassaConfig};
pub use error::{ApiError, ErrorCode};
pub use routes::router;
pub use state::AppState;
