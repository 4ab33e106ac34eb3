//! # Idempotency Repository
//!
//! Write-once records keyed by the client's idempotency key. The primary
//! key makes a second insert fail, which is how two concurrent first uses
//! of one key are told apart: the loser gets [`DbError::Conflict`], re-runs,
//! and then finds the winner's record.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use festa_core::IdempotencyRecord;

pub struct IdempotencyRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> IdempotencyRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        IdempotencyRepository { conn }
    }

    pub async fn get(&mut self, key: &str) -> DbResult<Option<IdempotencyRecord>> {
        let record = sqlx::query_as::<_, IdempotencyRecord>(
            "SELECT key, operation, result, created_at FROM idempotency_keys WHERE key = ?1",
        )
        .bind(key)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(record)
    }

    /// Records a key as processed.
    pub async fn insert(&mut self, record: &IdempotencyRecord) -> DbResult<()> {
        debug!(key = %record.key, operation = %record.operation, "Recording idempotency key");

        sqlx::query(
            r#"
            INSERT INTO idempotency_keys (key, operation, result, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&record.key)
        .bind(&record.operation)
        .bind(&record.result)
        .bind(record.created_at)
        .execute(&mut *self.conn)
        .await
        .map_err(|err| match DbError::from(err) {
            DbError::UniqueViolation { .. } => {
                DbError::conflict(format!("idempotency key {} already recorded", record.key))
            }
            other => other,
        })?;

        Ok(())
    }
}
