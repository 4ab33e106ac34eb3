//! # Customer Repository
//!
//! Customers and their embedded accounts.
//!
//! ## Optimistic Concurrency
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Operator A                          Operator B                         │
//! │  read customer (version 4)           read customer (version 4)          │
//! │  balance 1000 → 1500                 balance 1000 → 1200                │
//! │  UPDATE ... WHERE version = 4  ✓     UPDATE ... WHERE version = 4  ✗   │
//! │  (version becomes 5)                 0 rows → DbError::Conflict         │
//! │                                      ledger re-runs B: 1500 → 1700     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use festa_core::{Account, Customer};

const SELECT_CUSTOMER: &str = r#"
    SELECT id, name, phone, qr_code_id,
           balance_cents, status, last_paid_at,
           version, created_at, updated_at
    FROM customers
"#;

/// Repository for customer operations.
pub struct CustomerRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> CustomerRepository<'c> {
    /// Creates a new CustomerRepository on an open connection.
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        CustomerRepository { conn }
    }

    /// Gets a customer by ID.
    pub async fn get(&mut self, id: &str) -> DbResult<Option<Customer>> {
        let sql = format!("{SELECT_CUSTOMER} WHERE id = ?1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(customer)
    }

    /// Gets the customer currently linked to a QR label.
    pub async fn get_by_qr_code(&mut self, label: &str) -> DbResult<Option<Customer>> {
        let sql = format!("{SELECT_CUSTOMER} WHERE qr_code_id = ?1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(label)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(customer)
    }

    /// Inserts a new customer.
    pub async fn insert(&mut self, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.id, qr_code_id = ?customer.qr_code_id, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, name, phone, qr_code_id,
                balance_cents, status, last_paid_at,
                version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.qr_code_id)
        .bind(customer.account.balance_cents)
        .bind(customer.account.status)
        .bind(customer.account.last_paid_at)
        .bind(customer.version)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Writes an account state, guarded by the version that was read.
    ///
    /// Returns the new version. Zero matched rows means another
    /// transaction got there first: [`DbError::Conflict`].
    pub async fn update_account(
        &mut self,
        id: &str,
        expected_version: i64,
        account: &Account,
    ) -> DbResult<i64> {
        debug!(
            id = %id,
            expected_version,
            balance_cents = account.balance_cents,
            status = %account.status,
            "Updating account"
        );

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET balance_cents = ?1,
                status = ?2,
                last_paid_at = ?3,
                version = version + 1,
                updated_at = ?4
            WHERE id = ?5 AND version = ?6
            "#,
        )
        .bind(account.balance_cents)
        .bind(account.status)
        .bind(account.last_paid_at)
        .bind(now)
        .bind(id)
        .bind(expected_version)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(format!(
                "customer {id} changed since version {expected_version}"
            )));
        }

        Ok(expected_version + 1)
    }

    /// Relinks a customer to a different QR label (reissue), version-guarded.
    pub async fn set_qr_code(
        &mut self,
        id: &str,
        expected_version: i64,
        label: &str,
        now: DateTime<Utc>,
    ) -> DbResult<i64> {
        debug!(id = %id, label = %label, "Relinking customer QR code");

        let result = sqlx::query(
            r#"
            UPDATE customers
            SET qr_code_id = ?1, version = version + 1, updated_at = ?2
            WHERE id = ?3 AND version = ?4
            "#,
        )
        .bind(label)
        .bind(now)
        .bind(id)
        .bind(expected_version)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(format!(
                "customer {id} changed since version {expected_version}"
            )));
        }

        Ok(expected_version + 1)
    }

    /// Hard-deletes a customer. Only registration cancellation does this.
    pub async fn delete(&mut self, id: &str, expected_version: i64) -> DbResult<()> {
        debug!(id = %id, "Deleting customer");

        let result = sqlx::query("DELETE FROM customers WHERE id = ?1 AND version = ?2")
            .bind(id)
            .bind(expected_version)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(format!(
                "customer {id} changed since version {expected_version}"
            )));
        }

        Ok(())
    }

    /// Number of customers.
    pub async fn count(&mut self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig, DbError};
    use chrono::Utc;
    use festa_core::{Account, AccountStatus, Customer};

    fn customer(id: &str, label: &str) -> Customer {
        let now = Utc::now();
        Customer {
            id: id.to_string(),
            name: "Grace".to_string(),
            phone: "+15550100".to_string(),
            qr_code_id: Some(label.to_string()),
            account: Account::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();

        tx.customers().insert(&customer("c-1", "QR-000001")).await.unwrap();

        let by_id = tx.customers().get("c-1").await.unwrap().unwrap();
        assert_eq!(by_id.account.status, AccountStatus::Clean);
        let by_qr = tx.customers().get_by_qr_code("QR-000001").await.unwrap();
        assert_eq!(by_qr.map(|c| c.id), Some("c-1".to_string()));
        assert!(tx.customers().get("missing").await.unwrap().is_none());
        assert_eq!(tx.customers().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_account_version_guard() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        tx.customers().insert(&customer("c-1", "QR-000001")).await.unwrap();

        let mut account = Account::new();
        account.apply_sale(festa_core::Money::from_cents(500)).unwrap();

        let v = tx.customers().update_account("c-1", 0, &account).await.unwrap();
        assert_eq!(v, 1);

        // Stale version is a conflict, not a silent overwrite.
        let err = tx.customers().update_account("c-1", 0, &account).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        let stored = tx.customers().get("c-1").await.unwrap().unwrap();
        assert_eq!(stored.account.balance_cents, 500);
        assert_eq!(stored.account.status, AccountStatus::Unpaid);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_qr_code_unique_across_customers() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        tx.customers().insert(&customer("c-1", "QR-000001")).await.unwrap();

        let err = tx
            .customers()
            .insert(&customer("c-2", "QR-000001"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }
}
