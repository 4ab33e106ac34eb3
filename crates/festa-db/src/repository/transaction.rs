//! # Transaction Repository
//!
//! Ledger entries: sales, refunds and settlements.
//!
//! Entries are never updated. Cancellation deletes the row and the caller
//! reverses its balance effect in the same store transaction.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use festa_core::{LedgerTransaction, Money, TransactionType};

const SELECT_TRANSACTION: &str = r#"
    SELECT id, stall_id, operator_id, operator_name, customer_id,
           amount_cents, txn_type, refund_of_txn_id, payment_id,
           idempotency_key, created_at
    FROM transactions
"#;

/// Ledger-wide sums used when rebuilding statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionTotals {
    pub sale_count: i64,
    pub sale_cents: i64,
    pub refund_cents: i64,
}

/// Net sale minus refund total recorded at one stall.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StallRevenue {
    pub stall_id: String,
    pub net_cents: i64,
}

/// Repository for ledger entry operations.
pub struct TransactionRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> TransactionRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        TransactionRepository { conn }
    }

    /// Inserts a ledger entry.
    pub async fn insert(&mut self, txn: &LedgerTransaction) -> DbResult<()> {
        debug!(
            id = %txn.id,
            txn_type = %txn.txn_type,
            amount_cents = txn.amount_cents,
            customer_id = %txn.customer_id,
            "Inserting ledger entry"
        );

        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, stall_id, operator_id, operator_name, customer_id,
                amount_cents, txn_type, refund_of_txn_id, payment_id,
                idempotency_key, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&txn.id)
        .bind(&txn.stall_id)
        .bind(&txn.operator_id)
        .bind(&txn.operator_name)
        .bind(&txn.customer_id)
        .bind(txn.amount_cents)
        .bind(txn.txn_type)
        .bind(&txn.refund_of_txn_id)
        .bind(&txn.payment_id)
        .bind(&txn.idempotency_key)
        .bind(txn.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Gets an entry by ID.
    pub async fn get(&mut self, id: &str) -> DbResult<Option<LedgerTransaction>> {
        let sql = format!("{SELECT_TRANSACTION} WHERE id = ?1");
        let txn = sqlx::query_as::<_, LedgerTransaction>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(txn)
    }

    /// Finds the sale or refund recorded under an idempotency key.
    ///
    /// Settlements share their key with a payment and are excluded; payment
    /// cancellation reaches them through [`Self::find_settlement_for_payment`].
    pub async fn find_by_idempotency_key(
        &mut self,
        key: &str,
    ) -> DbResult<Option<LedgerTransaction>> {
        let sql = format!(
            "{SELECT_TRANSACTION} WHERE idempotency_key = ?1 AND txn_type != 'settlement' LIMIT 1"
        );
        let txn = sqlx::query_as::<_, LedgerTransaction>(&sql)
            .bind(key)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(txn)
    }

    /// Sum of refunds already recorded against a sale.
    pub async fn sum_refunds_for(&mut self, sale_id: &str) -> DbResult<Money> {
        let cents: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount_cents), 0)
            FROM transactions
            WHERE refund_of_txn_id = ?1 AND txn_type = 'refund'
            "#,
        )
        .bind(sale_id)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(Money::from_cents(cents))
    }

    /// Number of refunds recorded against a sale.
    pub async fn count_refunds_for(&mut self, sale_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE refund_of_txn_id = ?1",
        )
        .bind(sale_id)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(count)
    }

    /// The settlement entry written alongside a payment.
    pub async fn find_settlement_for_payment(
        &mut self,
        payment_id: &str,
    ) -> DbResult<Option<LedgerTransaction>> {
        let sql = format!(
            "{SELECT_TRANSACTION} WHERE payment_id = ?1 AND txn_type = 'settlement' LIMIT 1"
        );
        let txn = sqlx::query_as::<_, LedgerTransaction>(&sql)
            .bind(payment_id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(txn)
    }

    /// Deletes an entry. Returns whether a row was removed.
    pub async fn delete(&mut self, id: &str) -> DbResult<bool> {
        debug!(id = %id, "Deleting ledger entry");

        let result = sqlx::query("DELETE FROM transactions WHERE id = ?1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of entries of any type for a customer.
    pub async fn count_for_customer(&mut self, customer_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE customer_id = ?1")
                .bind(customer_id)
                .fetch_one(&mut *self.conn)
                .await?;
        Ok(count)
    }

    /// Sale count, sale sum and refund sum across the whole ledger.
    pub async fn totals(&mut self) -> DbResult<TransactionTotals> {
        let (sale_count, sale_cents, refund_cents): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN txn_type = 'sale' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN txn_type = 'sale' THEN amount_cents ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN txn_type = 'refund' THEN amount_cents ELSE 0 END), 0)
            FROM transactions
            "#,
        )
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(TransactionTotals {
            sale_count,
            sale_cents,
            refund_cents,
        })
    }

    /// Sales minus refunds, grouped by the stall that recorded them.
    pub async fn net_by_stall(&mut self) -> DbResult<Vec<StallRevenue>> {
        let rows = sqlx::query_as::<_, StallRevenue>(
            r#"
            SELECT stall_id,
                   COALESCE(SUM(CASE txn_type
                       WHEN 'sale' THEN amount_cents
                       WHEN 'refund' THEN -amount_cents
                       ELSE 0 END), 0) AS net_cents
            FROM transactions
            WHERE txn_type IN ('sale', 'refund')
            GROUP BY stall_id
            "#,
        )
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(rows)
    }

    /// Entries of one type for a customer, oldest first.
    pub async fn list_for_customer(
        &mut self,
        customer_id: &str,
        txn_type: TransactionType,
    ) -> DbResult<Vec<LedgerTransaction>> {
        let sql = format!(
            "{SELECT_TRANSACTION} WHERE customer_id = ?1 AND txn_type = ?2 ORDER BY created_at"
        );
        let rows = sqlx::query_as::<_, LedgerTransaction>(&sql)
            .bind(customer_id)
            .bind(txn_type)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_customer, seed_stall};
    use crate::{Database, DbConfig};
    use chrono::Utc;
    use festa_core::StallType;

    fn entry(
        id: &str,
        txn_type: TransactionType,
        amount_cents: i64,
        refund_of: Option<&str>,
    ) -> LedgerTransaction {
        LedgerTransaction {
            id: id.to_string(),
            stall_id: "stall-food".to_string(),
            operator_id: "op-1".to_string(),
            operator_name: "Ada".to_string(),
            customer_id: "c-1".to_string(),
            amount_cents,
            txn_type,
            refund_of_txn_id: refund_of.map(str::to_string),
            payment_id: None,
            idempotency_key: format!("key-{id}-0000"),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_refund_sums_and_totals() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        seed_stall(&mut tx, "stall-food", StallType::Commerce).await;
        seed_customer(&mut tx, "c-1", "QR-000001").await;

        let mut txns = tx.transactions();
        txns.insert(&entry("t-1", TransactionType::Sale, 1000, None))
            .await
            .unwrap();
        txns.insert(&entry("t-2", TransactionType::Refund, 300, Some("t-1")))
            .await
            .unwrap();
        txns.insert(&entry("t-3", TransactionType::Refund, 200, Some("t-1")))
            .await
            .unwrap();

        assert_eq!(txns.sum_refunds_for("t-1").await.unwrap().cents(), 500);
        assert_eq!(txns.count_refunds_for("t-1").await.unwrap(), 2);
        assert_eq!(txns.sum_refunds_for("t-2").await.unwrap().cents(), 0);

        let totals = txns.totals().await.unwrap();
        assert_eq!(totals.sale_count, 1);
        assert_eq!(totals.sale_cents, 1000);
        assert_eq!(totals.refund_cents, 500);

        let by_stall = txns.net_by_stall().await.unwrap();
        assert_eq!(
            by_stall,
            vec![StallRevenue {
                stall_id: "stall-food".to_string(),
                net_cents: 500
            }]
        );
    }

    #[tokio::test]
    async fn test_find_by_key_and_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        seed_stall(&mut tx, "stall-food", StallType::Commerce).await;
        seed_customer(&mut tx, "c-1", "QR-000001").await;

        let sale = entry("t-1", TransactionType::Sale, 1000, None);
        tx.transactions().insert(&sale).await.unwrap();

        let found = tx
            .transactions()
            .find_by_idempotency_key(&sale.idempotency_key)
            .await
            .unwrap();
        assert_eq!(found.map(|t| t.amount_cents), Some(1000));

        assert!(tx.transactions().delete("t-1").await.unwrap());
        assert!(!tx.transactions().delete("t-1").await.unwrap());
        assert_eq!(tx.transactions().count_for_customer("c-1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_refund_requires_target() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        seed_stall(&mut tx, "stall-food", StallType::Commerce).await;
        seed_customer(&mut tx, "c-1", "QR-000001").await;

        // A refund row without refund_of_txn_id violates the table CHECK.
        let err = tx
            .transactions()
            .insert(&entry("t-9", TransactionType::Refund, 100, None))
            .await;
        assert!(err.is_err());
    }
}
