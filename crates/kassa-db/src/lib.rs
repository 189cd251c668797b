//! # kassa-db: Database Layer for Kassa
//!
//! SQLite persistence for settlement and EGAIS outcomes, catalog lookups,
//! and the file fallback used when the database is unavailable.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kassa Data Flow                                  │
//! │                                                                         │
//! │  FiscalRegister::settle / EgaisReporter::report                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     kassa-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  AuditStore   │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │  (audit.rs)   │───►│ CheckLogRepo  │    │  (embedded)  │  │   │
//! │  │   │               │    │ EgaisLogRepo  │    │ 001_audit    │  │   │
//! │  │   │ primary, then │    │ ProductRepo   │    │ 002_products │  │   │
//! │  │   │ fallback file │    └───────┬───────┘    └──────────────┘  │   │
//! │  │   └───────┬───────┘            │                               │   │
//! │  └───────────┼────────────────────┼───────────────────────────────┘   │
//! │              ▼                    ▼                                     │
//! │     logs/YYYY-MM-DD/*.txt    SQLite (kassa.db, WAL)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Log and catalog repositories
//! - [`audit`] - Primary-then-fallback audit writer
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kassa_db::{AuditRecord, AuditStore, Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("kassa.db")).await.ok();
//! let audit = AuditStore::new(db, "logs");
//! audit.record(&AuditRecord::settlement(result, order_json)).await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod audit;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use audit::{AuditKind, AuditRecord, AuditStore};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::check_log::{CheckLog, CheckLogRepository, NewCheckLog};
pub use repository::egais_log::{EgaisLog, EgaisLogRepository, NewEgaisLog};
pub use repository::product::ProductRepository;
