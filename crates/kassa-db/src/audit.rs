//! # Audit Store
//!
//! Durable record of every settlement and EGAIS outcome.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        AuditStore::record                               │
//! │                                                                         │
//! │  AuditRecord ──► primary (check_logs / egais_logs) ──ok──► true        │
//! │                        │                                                │
//! │                        │ any error (no pool, closed, locked, disk)     │
//! │                        ▼                                                │
//! │                  fallback file ──────────────────────────► false       │
//! │                  {fallback_dir}/{YYYY-MM-DD}/                          │
//! │                     {HHMMSS_micros}_{seq}_{kind}.txt                   │
//! │                                                                         │
//! │  One attempt at each step. No retries, no queueing, never an error     │
//! │  to the caller.                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Callers never write to the log tables directly; this is the only writer.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::check_log::NewCheckLog;
use crate::repository::egais_log::NewEgaisLog;
use kassa_core::{EgaisSubmission, SettlementResult};

// =============================================================================
// Records
// =============================================================================

/// Which log an outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditKind {
    Settlement,
    Egais,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::Settlement => "settlement",
            AuditKind::Egais => "egais",
        }
    }
}

/// An outcome to persist, with the order as it was received.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditRecord {
    Settlement {
        result: SettlementResult,
        order: serde_json::Value,
    },
    Egais {
        submission: EgaisSubmission,
        order: serde_json::Value,
    },
}

impl AuditRecord {
    pub fn settlement(result: SettlementResult, order: serde_json::Value) -> Self {
        AuditRecord::Settlement { result, order }
    }

    pub fn egais(submission: EgaisSubmission, order: serde_json::Value) -> Self {
        AuditRecord::Egais { submission, order }
    }

    pub fn kind(&self) -> AuditKind {
        match self {
            AuditRecord::Settlement { .. } => AuditKind::Settlement,
            AuditRecord::Egais { .. } => AuditKind::Egais,
        }
    }

    pub fn order_number(&self) -> &str {
        match self {
            AuditRecord::Settlement { result, .. } => &result.order_number,
            AuditRecord::Egais { submission, .. } => &submission.order_number,
        }
    }

    fn status(&self) -> &'static str {
        match self {
            AuditRecord::Settlement { result, .. } => result.status.as_str(),
            AuditRecord::Egais { submission, .. } => submission.status.as_str(),
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// Primary-then-fallback writer for audit records.
///
/// ## Example
/// ```rust,ignore
/// let store = AuditStore::new(Some(db), "/var/lib/kassa/logs");
/// let structured = store.record(&AuditRecord::settlement(result, order)).await;
/// ```
#[derive(Debug)]
pub struct AuditStore {
    db: Option<Database>,
    fallback_dir: PathBuf,
    seq: AtomicU64,
}

impl AuditStore {
    /// Creates a store. `db` is `None` when the database could not be
    /// opened at start-up; every record then goes to the fallback directory.
    pub fn new(db: Option<Database>, fallback_dir: impl Into<PathBuf>) -> Self {
        AuditStore {
            db,
            fallback_dir: fallback_dir.into(),
            seq: AtomicU64::new(0),
        }
    }

    pub fn database(&self) -> Option<&Database> {
        self.db.as_ref()
    }

    pub fn fallback_dir(&self) -> &Path {
        &self.fallback_dir
    }

    /// Persists a record. Returns `true` when it reached the primary store.
    pub async fn record(&self, record: &AuditRecord) -> bool {
        let primary_error = match self.write_primary(record).await {
            Ok(id) => {
                debug!(
                    id,
                    kind = record.kind().as_str(),
                    order = %record.order_number(),
                    "Audit record stored"
                );
                return true;
            }
            Err(e) => e,
        };

        warn!(
            kind = record.kind().as_str(),
            order = %record.order_number(),
            error = %primary_error,
            "Primary audit store unavailable, writing fallback file"
        );

        let now = Utc::now();
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let path = fallback_path(&self.fallback_dir, record.kind(), now, seq);
        let text = render(record, now, &primary_error);

        if let Err(e) = write_file(&path, &text).await {
            error!(
                path = %path.display(),
                error = %e,
                "Fallback audit write failed, record is lost"
            );
        }

        false
    }

    async fn write_primary(&self, record: &AuditRecord) -> DbResult<i64> {
        let db = self
            .db
            .as_ref()
            .ok_or_else(|| DbError::ConnectionFailed("no database configured".to_string()))?;

        match record {
            AuditRecord::Settlement { result, order } => {
                let row = NewCheckLog::from_result(result, serde_json::to_string(order)?);
                db.check_logs().insert(&row).await
            }
            AuditRecord::Egais { submission, order } => {
                let row = NewEgaisLog::from_submission(submission, serde_json::to_string(order)?);
                db.egais_logs().insert(&row).await
            }
        }
    }
}

// =============================================================================
// Fallback Files
// =============================================================================

/// `{dir}/{YYYY-MM-DD}/{HHMMSS}_{micros}_{seq}_{kind}.txt`
///
/// Names sort in write order within a day.
fn fallback_path(dir: &Path, kind: AuditKind, at: DateTime<Utc>, seq: u64) -> PathBuf {
    dir.join(at.format("%Y-%m-%d").to_string()).join(format!(
        "{}_{:06}_{}.txt",
        at.format("%H%M%S_%6f"),
        seq,
        kind.as_str()
    ))
}

/// Plain-text rendering: a fixed header followed by the record as pretty
/// JSON (object keys are emitted in sorted order).
fn render(record: &AuditRecord, at: DateTime<Utc>, primary_error: &DbError) -> String {
    let body = serde_json::to_value(record)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|e| format!("<unserialisable record: {e}>\n{record:?}"));

    format!(
        "kind: {}\norder: {}\nstatus: {}\nrecorded_at: {}\nprimary_error: {}\n---\n{}\n",
        record.kind().as_str(),
        record.order_number(),
        record.status(),
        at.to_rfc3339(),
        primary_error,
        body
    )
}

async fn write_file(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, text).await
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use kassa_core::{Money, PaymentMethod, SettlementStatus};

    fn failed_settlement(order: &str) -> SettlementResult {
        SettlementResult {
            status: SettlementStatus::Error,
            order_number: order.to_string(),
            payment_method: PaymentMethod::Cash,
            message: "Ошибка ККТ".to_string(),
            error: Some("paper out".to_string()),
            total: Money::from_kopecks(18_000),
            document_number: None,
            fiscal_sign: None,
            session_number: None,
            result_code: Some(-3),
            result_description: Some("Нет бумаги".to_string()),
            created_at: Utc::now(),
        }
    }

    fn files_under(dir: &Path) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for day in std::fs::read_dir(dir).unwrap() {
            for file in std::fs::read_dir(day.unwrap().path()).unwrap() {
                found.push(file.unwrap().path());
            }
        }
        found.sort();
        found
    }

    #[tokio::test]
    async fn test_primary_store() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = AuditStore::new(Some(db.clone()), dir.path().join("logs"));

        let record = AuditRecord::settlement(failed_settlement("477"), serde_json::json!({"num": "477"}));
        assert!(store.record(&record).await);

        assert_eq!(db.check_logs().count().await.unwrap(), 1);
        assert!(!dir.path().join("logs").exists());
    }

    #[tokio::test]
    async fn test_unreachable_primary_writes_fallback_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;
        let store = AuditStore::new(Some(db), dir.path());

        let record = AuditRecord::settlement(failed_settlement("477"), serde_json::json!({"num": "477"}));
        assert!(!store.record(&record).await);

        let files = files_under(dir.path());
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("_000000_settlement.txt"));

        let text = std::fs::read_to_string(&files[0]).unwrap();
        assert!(text.starts_with("kind: settlement\norder: 477\nstatus: error\n"));
        assert!(text.contains("paper out"));
    }

    #[tokio::test]
    async fn test_without_database_names_are_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let store = AuditStore::new(None, dir.path());

        for order in ["1", "2", "3"] {
            let submission = EgaisSubmission::failed(order, "no alcohol items");
            assert!(!store.record(&AuditRecord::egais(submission, serde_json::Value::Null)).await);
        }

        let files = files_under(dir.path());
        assert_eq!(files.len(), 3);
        for (i, file) in files.iter().enumerate() {
            let name = file.file_name().unwrap().to_string_lossy().to_string();
            assert!(name.ends_with(&format!("_{:06}_egais.txt", i)));
        }
    }

    #[tokio::test]
    async fn test_unwritable_fallback_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        let store = AuditStore::new(None, &blocker);

        let record = AuditRecord::settlement(failed_settlement("5"), serde_json::Value::Null);
        assert!(!store.record(&record).await);
    }
}
