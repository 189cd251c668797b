//! # Settlement Log Repository
//!
//! One row per settlement attempt in `check_logs`, success or failure.
//! `legacynum` carries the order number so attempts can be grouped per
//! order.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use kassa_core::{PaymentMethod, SettlementResult, SettlementStatus};

/// A stored settlement attempt.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CheckLog {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub status: SettlementStatus,
    pub message: String,
    pub error: Option<String>,
    /// The order as received, JSON.
    pub order_data: String,
    pub payment_method: PaymentMethod,
    pub total_kopecks: i64,
    pub result_code: Option<i32>,
    pub result_description: Option<String>,
    /// Fallback file written for this attempt, if any.
    pub filename: Option<String>,
    pub document_number: Option<i64>,
    pub fiscal_sign: Option<String>,
    pub session_number: Option<i64>,
    pub legacynum: String,
}

/// Insert payload for `check_logs`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCheckLog {
    pub timestamp: DateTime<Utc>,
    pub status: SettlementStatus,
    pub message: String,
    pub error: Option<String>,
    pub order_data: String,
    pub payment_method: PaymentMethod,
    pub total_kopecks: i64,
    pub result_code: Option<i32>,
    pub result_description: Option<String>,
    pub filename: Option<String>,
    pub document_number: Option<i64>,
    pub fiscal_sign: Option<String>,
    pub session_number: Option<i64>,
    pub legacynum: String,
}

impl NewCheckLog {
    /// Builds a row from a settlement outcome and the order snapshot.
    pub fn from_result(result: &SettlementResult, order_data: String) -> Self {
        NewCheckLog {
            timestamp: result.created_at,
            status: result.status,
            message: result.message.clone(),
            error: result.error.clone(),
            order_data,
            payment_method: result.payment_method,
            total_kopecks: result.total.kopecks(),
            result_code: result.result_code,
            result_description: result.result_description.clone(),
            filename: None,
            document_number: result.document_number.map(i64::from),
            fiscal_sign: result.fiscal_sign.clone(),
            session_number: result.session_number.map(i64::from),
            legacynum: result.order_number.clone(),
        }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, timestamp, status, message, error, order_data, payment_method,
           total_kopecks, result_code, result_description, filename,
           document_number, fiscal_sign, session_number, legacynum
    FROM check_logs
"#;

/// Repository for `check_logs`.
#[derive(Debug, Clone)]
pub struct CheckLogRepository {
    pool: SqlitePool,
}

impl CheckLogRepository {
    /// Creates a new CheckLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CheckLogRepository { pool }
    }

    /// Appends a row and returns its id.
    pub async fn insert(&self, row: &NewCheckLog) -> DbResult<i64> {
        debug!(order = %row.legacynum, status = row.status.as_str(), "Inserting check log");

        let result = sqlx::query(
            r#"
            INSERT INTO check_logs (
                timestamp, status, message, error, order_data, payment_method,
                total_kopecks, result_code, result_description, filename,
                document_number, fiscal_sign, session_number, legacynum
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(row.timestamp)
        .bind(row.status)
        .bind(&row.message)
        .bind(&row.error)
        .bind(&row.order_data)
        .bind(row.payment_method)
        .bind(row.total_kopecks)
        .bind(row.result_code)
        .bind(&row.result_description)
        .bind(&row.filename)
        .bind(row.document_number)
        .bind(&row.fiscal_sign)
        .bind(row.session_number)
        .bind(&row.legacynum)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Gets a row by id.
    pub async fn get(&self, id: i64) -> DbResult<Option<CheckLog>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        let row = sqlx::query_as::<_, CheckLog>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// All attempts for one order, oldest first.
    pub async fn for_order(&self, order_number: &str) -> DbResult<Vec<CheckLog>> {
        let sql = format!("{SELECT_COLUMNS} WHERE legacynum = ?1 ORDER BY id");
        let rows = sqlx::query_as::<_, CheckLog>(&sql)
            .bind(order_number)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// The most recent attempts, newest first.
    pub async fn recent(&self, limit: i64) -> DbResult<Vec<CheckLog>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ?1");
        let rows = sqlx::query_as::<_, CheckLog>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM check_logs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
