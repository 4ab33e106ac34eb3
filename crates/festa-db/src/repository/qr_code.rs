//! # QR Code Repository
//!
//! QR codes and the batches that produced them.
//!
//! ## Status Guard
//! Every status change names the status it expects to replace. If another
//! transaction moved the code first, zero rows match and the write fails
//! with [`DbError::Conflict`] instead of overwriting.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use festa_core::{QrBatch, QrCode, QrStatus};

const SELECT_QR_CODE: &str = r#"
    SELECT label, status, assigned_customer_id, batch_id, created_at, updated_at
    FROM qr_codes
"#;

/// Repository for QR code operations.
pub struct QrCodeRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> QrCodeRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        QrCodeRepository { conn }
    }

    /// Gets a code by label.
    pub async fn get(&mut self, label: &str) -> DbResult<Option<QrCode>> {
        let sql = format!("{SELECT_QR_CODE} WHERE label = ?1");
        let code = sqlx::query_as::<_, QrCode>(&sql)
            .bind(label)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(code)
    }

    pub async fn exists(&mut self, label: &str) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM qr_codes WHERE label = ?1")
            .bind(label)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(found.is_some())
    }

    /// Inserts a new code.
    pub async fn insert(&mut self, code: &QrCode) -> DbResult<()> {
        debug!(label = %code.label, batch_id = ?code.batch_id, "Inserting QR code");

        sqlx::query(
            r#"
            INSERT INTO qr_codes (
                label, status, assigned_customer_id, batch_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&code.label)
        .bind(code.status)
        .bind(&code.assigned_customer_id)
        .bind(&code.batch_id)
        .bind(code.created_at)
        .bind(code.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Moves a code from `expected` to `status`, setting its customer link.
    pub async fn update_status(
        &mut self,
        label: &str,
        expected: QrStatus,
        status: QrStatus,
        assigned_customer_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(
            label = %label,
            from = %expected,
            to = %status,
            "Updating QR code status"
        );

        let result = sqlx::query(
            r#"
            UPDATE qr_codes
            SET status = ?1, assigned_customer_id = ?2, updated_at = ?3
            WHERE label = ?4 AND status = ?5
            "#,
        )
        .bind(status)
        .bind(assigned_customer_id)
        .bind(now)
        .bind(label)
        .bind(expected)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(format!(
                "QR code {label} is no longer {expected}"
            )));
        }

        Ok(())
    }

    /// Creates a batch record or adds `count` to an existing one.
    pub async fn upsert_batch(
        &mut self,
        batch_name: &str,
        generated_by: &str,
        count: i64,
        now: DateTime<Utc>,
    ) -> DbResult<QrBatch> {
        debug!(batch_name = %batch_name, count, "Upserting QR batch");

        let batch = sqlx::query_as::<_, QrBatch>(
            r#"
            INSERT INTO qr_batches (batch_name, generated_by, count, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(batch_name) DO UPDATE SET
                count = count + excluded.count,
                generated_by = excluded.generated_by,
                updated_at = excluded.updated_at
            RETURNING batch_name, generated_by, count, created_at, updated_at
            "#,
        )
        .bind(batch_name)
        .bind(generated_by)
        .bind(count)
        .bind(now)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(batch)
    }

    pub async fn get_batch(&mut self, batch_name: &str) -> DbResult<Option<QrBatch>> {
        let batch = sqlx::query_as::<_, QrBatch>(
            r#"
            SELECT batch_name, generated_by, count, created_at, updated_at
            FROM qr_batches WHERE batch_name = ?1
            "#,
        )
        .bind(batch_name)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(batch)
    }

    /// Number of codes currently in `status`.
    pub async fn count_by_status(&mut self, status: QrStatus) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM qr_codes WHERE status = ?1")
            .bind(status)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(count)
    }
}
