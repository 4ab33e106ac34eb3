//! # Payment Repository
//!
//! Checkout payments. Each payment is paired with a settlement entry in
//! `transactions` that points back to it through `payment_id`.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use festa_core::Payment;

const SELECT_PAYMENT: &str = r#"
    SELECT id, method, amount_cents, operator_id, customer_id,
           stall_id, idempotency_key, created_at
    FROM payments
"#;

/// Repository for payment operations.
pub struct PaymentRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> PaymentRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        PaymentRepository { conn }
    }

    /// Inserts a payment.
    pub async fn insert(&mut self, payment: &Payment) -> DbResult<()> {
        debug!(
            id = %payment.id,
            customer_id = %payment.customer_id,
            amount_cents = payment.amount_cents,
            "Inserting payment"
        );

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, method, amount_cents, operator_id, customer_id,
                stall_id, idempotency_key, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&payment.id)
        .bind(payment.method)
        .bind(payment.amount_cents)
        .bind(&payment.operator_id)
        .bind(&payment.customer_id)
        .bind(&payment.stall_id)
        .bind(&payment.idempotency_key)
        .bind(payment.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Gets a payment by ID.
    pub async fn get(&mut self, id: &str) -> DbResult<Option<Payment>> {
        let sql = format!("{SELECT_PAYMENT} WHERE id = ?1");
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(payment)
    }

    /// Finds the payment recorded under an idempotency key.
    pub async fn find_by_idempotency_key(&mut self, key: &str) -> DbResult<Option<Payment>> {
        let sql = format!("{SELECT_PAYMENT} WHERE idempotency_key = ?1");
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(key)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(payment)
    }

    /// Deletes a payment. Its settlement entry must be deleted first.
    pub async fn delete(&mut self, id: &str) -> DbResult<bool> {
        debug!(id = %id, "Deleting payment");

        let result = sqlx::query("DELETE FROM payments WHERE id = ?1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All payments for a customer.
    pub async fn list_for_customer(&mut self, customer_id: &str) -> DbResult<Vec<Payment>> {
        let sql = format!("{SELECT_PAYMENT} WHERE customer_id = ?1");
        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(customer_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(payments)
    }

    /// Timestamp of the most recent payment still on record for a customer.
    ///
    /// Compared as parsed timestamps, not as stored text.
    pub async fn latest_paid_at(&mut self, customer_id: &str) -> DbResult<Option<DateTime<Utc>>> {
        let latest = self
            .list_for_customer(customer_id)
            .await?
            .into_iter()
            .map(|p| p.created_at)
            .max();
        Ok(latest)
    }

    /// Number of payments for a customer.
    pub async fn count_for_customer(&mut self, customer_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE customer_id = ?1")
            .bind(customer_id)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(count)
    }

    /// Sum of all payments.
    pub async fn total_amount(&mut self) -> DbResult<i64> {
        let cents: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(amount_cents), 0) FROM payments")
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(cents)
    }

    /// Payment sums grouped by the stall that took them.
    pub async fn totals_by_stall(&mut self) -> DbResult<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT stall_id, COALESCE(SUM(amount_cents), 0)
            FROM payments
            GROUP BY stall_id
            "#,
        )
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(rows)
    }
}
