//! # Stall Repository
//!
//! Stalls and their running totals. Totals are projected data: the ledger
//! entries are authoritative and a rebuild overwrites them.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use festa_core::Stall;

const SELECT_STALL: &str = r#"
    SELECT id, name, stall_type, total_amount_cents, created_at
    FROM stalls
"#;

pub struct StallRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> StallRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        StallRepository { conn }
    }

    pub async fn get(&mut self, id: &str) -> DbResult<Option<Stall>> {
        let sql = format!("{SELECT_STALL} WHERE id = ?1");
        let stall = sqlx::query_as::<_, Stall>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(stall)
    }

    pub async fn insert(&mut self, stall: &Stall) -> DbResult<()> {
        debug!(id = %stall.id, stall_type = %stall.stall_type, "Inserting stall");

        sqlx::query(
            r#"
            INSERT INTO stalls (id, name, stall_type, total_amount_cents, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&stall.id)
        .bind(&stall.name)
        .bind(stall.stall_type)
        .bind(stall.total_amount_cents)
        .bind(stall.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// All stalls, by name.
    pub async fn list(&mut self) -> DbResult<Vec<Stall>> {
        let sql = format!("{SELECT_STALL} ORDER BY name");
        let stalls = sqlx::query_as::<_, Stall>(&sql)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(stalls)
    }

    /// Adds a signed delta to a stall's total. Unknown stalls are ignored.
    pub async fn add_to_total(&mut self, id: &str, delta_cents: i64) -> DbResult<()> {
        sqlx::query(
            "UPDATE stalls SET total_amount_cents = total_amount_cents + ?1 WHERE id = ?2",
        )
        .bind(delta_cents)
        .bind(id)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    pub async fn set_total(&mut self, id: &str, total_cents: i64) -> DbResult<()> {
        sqlx::query("UPDATE stalls SET total_amount_cents = ?1 WHERE id = ?2")
            .bind(total_cents)
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    pub async fn reset_totals(&mut self) -> DbResult<()> {
        sqlx::query("UPDATE stalls SET total_amount_cents = 0")
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }
}
