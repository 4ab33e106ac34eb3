//! # Registration Repository

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use festa_core::Registration;

const SELECT_REGISTRATION: &str = r#"
    SELECT id, customer_id, stall_id, operator_id, operator_name,
           qr_code_id, idempotency_key, created_at
    FROM registrations
"#;

/// Repository for registration records.
pub struct RegistrationRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> RegistrationRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        RegistrationRepository { conn }
    }

    pub async fn insert(&mut self, registration: &Registration) -> DbResult<()> {
        debug!(
            id = %registration.id,
            customer_id = %registration.customer_id,
            "Inserting registration"
        );

        sqlx::query(
            r#"
            INSERT INTO registrations (
                id, customer_id, stall_id, operator_id, operator_name,
                qr_code_id, idempotency_key, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&registration.id)
        .bind(&registration.customer_id)
        .bind(&registration.stall_id)
        .bind(&registration.operator_id)
        .bind(&registration.operator_name)
        .bind(&registration.qr_code_id)
        .bind(&registration.idempotency_key)
        .bind(registration.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// The registration that created a customer.
    pub async fn get_by_customer(&mut self, customer_id: &str) -> DbResult<Option<Registration>> {
        let sql = format!("{SELECT_REGISTRATION} WHERE customer_id = ?1");
        let registration = sqlx::query_as::<_, Registration>(&sql)
            .bind(customer_id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(registration)
    }

    pub async fn delete(&mut self, id: &str) -> DbResult<bool> {
        debug!(id = %id, "Deleting registration");

        let result = sqlx::query("DELETE FROM registrations WHERE id = ?1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&mut self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM registrations")
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_customer, seed_stall};
    use crate::{Database, DbConfig, DbError};
    use chrono::Utc;
    use festa_core::StallType;

    fn registration(id: &str) -> Registration {
        Registration {
            id: id.to_string(),
            customer_id: "c-1".to_string(),
            stall_id: "stall-gate".to_string(),
            operator_id: "op-1".to_string(),
            operator_name: "Ada".to_string(),
            qr_code_id: "QR-000001".to_string(),
            idempotency_key: "reg-key-0001".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_one_registration_per_customer() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        seed_stall(&mut tx, "stall-gate", StallType::Registration).await;
        seed_customer(&mut tx, "c-1", "QR-000001").await;

        tx.registrations().insert(&registration("r-1")).await.unwrap();
        let err = tx
            .registrations()
            .insert(&registration("r-2"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        let found = tx.registrations().get_by_customer("c-1").await.unwrap();
        assert_eq!(found.map(|r| r.id), Some("r-1".to_string()));
        assert_eq!(tx.registrations().count().await.unwrap(), 1);

        assert!(tx.registrations().delete("r-1").await.unwrap());
        assert_eq!(tx.registrations().count().await.unwrap(), 0);
    }
}
