//! # Repository Module
//!
//! Database repository implementations for Kassa.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories                                         │
//! │                                                                         │
//! │  AuditStore / settlement pipeline                                      │
//! │       │                                                                 │
//! │       │  db.check_logs().insert(&row)                                  │
//! │       ▼                                                                 │
//! │  CheckLogRepository   insert, get, for_order, recent, count            │
//! │  EgaisLogRepository   insert, get, for_order, recent, count            │
//! │  ProductRepository    find_by_legacy_id, upsert                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Log tables are append-only: there is no update or delete here.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod check_log;
pub mod egais_log;
pub mod product;
