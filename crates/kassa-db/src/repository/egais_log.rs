//! # EGAIS Log Repository
//!
//! One row per reporting attempt in `egais_logs`. `qr_code` holds the
//! confirmation URL returned by the transport module.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use kassa_core::{EgaisStatus, EgaisSubmission};

/// A stored reporting attempt.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct EgaisLog {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub order_data: String,
    pub xml_data: Option<String>,
    pub response_data: Option<String>,
    pub qr_code: Option<String>,
    pub sign: Option<String>,
    pub status: EgaisStatus,
    pub error: Option<String>,
    pub xml_file: Option<String>,
    pub saved_file: Option<String>,
    pub legacynum: String,
}

/// Insert payload for `egais_logs`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEgaisLog {
    pub timestamp: DateTime<Utc>,
    pub order_data: String,
    pub xml_data: Option<String>,
    pub response_data: Option<String>,
    pub qr_code: Option<String>,
    pub sign: Option<String>,
    pub status: EgaisStatus,
    pub error: Option<String>,
    pub xml_file: Option<String>,
    pub saved_file: Option<String>,
    pub legacynum: String,
}

impl NewEgaisLog {
    pub fn from_submission(submission: &EgaisSubmission, order_data: String) -> Self {
        NewEgaisLog {
            timestamp: submission.created_at,
            order_data,
            xml_data: submission.xml.clone(),
            response_data: submission.response.clone(),
            qr_code: submission.url.clone(),
            sign: submission.sign.clone(),
            status: submission.status,
            error: submission.error.clone(),
            xml_file: submission.xml_file.clone(),
            saved_file: submission.response_file.clone(),
            legacynum: submission.order_number.clone(),
        }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, timestamp, order_data, xml_data, response_data, qr_code, sign,
           status, error, xml_file, saved_file, legacynum
    FROM egais_logs
"#;

/// Repository for `egais_logs`.
#[derive(Debug, Clone)]
pub struct EgaisLogRepository {
    pool: SqlitePool,
}

impl EgaisLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        EgaisLogRepository { pool }
    }

    /// Appends a row and returns its id.
    pub async fn insert(&self, row: &NewEgaisLog) -> DbResult<i64> {
        debug!(order = %row.legacynum, status = row.status.as_str(), "Inserting EGAIS log");

        let result = sqlx::query(
            r#"
            INSERT INTO egais_logs (
                timestamp, order_data, xml_data, response_data, qr_code, sign,
                status, error, xml_file, saved_file, legacynum
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(row.timestamp)
        .bind(&row.order_data)
        .bind(&row.xml_data)
        .bind(&row.response_data)
        .bind(&row.qr_code)
        .bind(&row.sign)
        .bind(row.status)
        .bind(&row.error)
        .bind(&row.xml_file)
        .bind(&row.saved_file)
        .bind(&row.legacynum)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<EgaisLog>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        let row = sqlx::query_as::<_, EgaisLog>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// All attempts for one order, oldest first.
    pub async fn for_order(&self, order_number: &str) -> DbResult<Vec<EgaisLog>> {
        let sql = format!("{SELECT_COLUMNS} WHERE legacynum = ?1 ORDER BY id");
        let rows = sqlx::query_as::<_, EgaisLog>(&sql)
            .bind(order_number)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// The most recent attempts, newest first.
    pub async fn recent(&self, limit: i64) -> DbResult<Vec<EgaisLog>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ?1");
        let rows = sqlx::query_as::<_, EgaisLog>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM egais_logs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
