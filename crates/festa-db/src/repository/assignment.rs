//! # Assignment Repository
//!
//! Which stall each operator is currently working. One row per operator.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use festa_core::Assignment;

pub struct AssignmentRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> AssignmentRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        AssignmentRepository { conn }
    }

    /// Gets the assignment for an operator.
    pub async fn get(&mut self, operator_id: &str) -> DbResult<Option<Assignment>> {
        let assignment = sqlx::query_as::<_, Assignment>(
            r#"
            SELECT operator_id, stall_id, stall_name, stall_type, user_name, updated_at
            FROM assignments WHERE operator_id = ?1
            "#,
        )
        .bind(operator_id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(assignment)
    }

    /// Creates or replaces an operator's assignment.
    pub async fn upsert(&mut self, assignment: &Assignment) -> DbResult<()> {
        debug!(
            operator_id = %assignment.operator_id,
            stall_id = %assignment.stall_id,
            "Assigning operator"
        );

        sqlx::query(
            r#"
            INSERT INTO assignments (
                operator_id, stall_id, stall_name, stall_type, user_name, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(operator_id) DO UPDATE SET
                stall_id = excluded.stall_id,
                stall_name = excluded.stall_name,
                stall_type = excluded.stall_type,
                user_name = excluded.user_name,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&assignment.operator_id)
        .bind(&assignment.stall_id)
        .bind(&assignment.stall_name)
        .bind(assignment.stall_type)
        .bind(&assignment.user_name)
        .bind(assignment.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::seed_stall;
    use crate::{Database, DbConfig};
    use chrono::Utc;
    use festa_core::{Assignment, StallType};

    #[tokio::test]
    async fn test_upsert_replaces() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        seed_stall(&mut tx, "stall-a", StallType::Commerce).await;
        seed_stall(&mut tx, "stall-b", StallType::Checkout).await;

        let mut assignment = Assignment {
            operator_id: "op-1".to_string(),
            stall_id: "stall-a".to_string(),
            stall_name: "Stall stall-a".to_string(),
            stall_type: StallType::Commerce,
            user_name: "Ada".to_string(),
            updated_at: Utc::now(),
        };
        tx.assignments().upsert(&assignment).await.unwrap();

        assignment.stall_id = "stall-b".to_string();
        assignment.stall_type = StallType::Checkout;
        tx.assignments().upsert(&assignment).await.unwrap();

        let stored = tx.assignments().get("op-1").await.unwrap().unwrap();
        assert_eq!(stored.stall_id, "stall-b");
        assert_eq!(stored.stall_type, StallType::Checkout);
        assert!(tx.assignments().get("op-2").await.unwrap().is_none());
    }
}
