//! # Live Stats Repository
//!
//! The single statistics document (row `id = 1`, seeded by the migration).

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use festa_core::LiveStats;

/// Signed increments applied to the statistics document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsDelta {
    pub sales: i64,
    pub revenue_cents: i64,
    pub registrations: i64,
    pub checkout_cents: i64,
    pub customers: i64,
}

impl StatsDelta {
    pub fn is_empty(&self) -> bool {
        *self == StatsDelta::default()
    }
}

pub struct LiveStatsRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> LiveStatsRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        LiveStatsRepository { conn }
    }

    pub async fn get(&mut self) -> DbResult<LiveStats> {
        let stats = sqlx::query_as::<_, LiveStats>(
            r#"
            SELECT total_sales, total_revenue_cents, total_customers_registered,
                   top_performing_stall, total_checkout_amount_cents,
                   total_customers, updated_at
            FROM live_stats WHERE id = 1
            "#,
        )
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(stats)
    }

    /// Adds a delta to every counter.
    pub async fn apply_delta(&mut self, delta: &StatsDelta) -> DbResult<()> {
        debug!(?delta, "Applying stats delta");

        sqlx::query(
            r#"
            UPDATE live_stats SET
                total_sales = total_sales + ?1,
                total_revenue_cents = total_revenue_cents + ?2,
                total_customers_registered = total_customers_registered + ?3,
                total_checkout_amount_cents = total_checkout_amount_cents + ?4,
                total_customers = total_customers + ?5,
                updated_at = ?6
            WHERE id = 1
            "#,
        )
        .bind(delta.sales)
        .bind(delta.revenue_cents)
        .bind(delta.registrations)
        .bind(delta.checkout_cents)
        .bind(delta.customers)
        .bind(Utc::now())
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Replaces the whole document (rebuild).
    pub async fn overwrite(&mut self, stats: &LiveStats) -> DbResult<()> {
        debug!(total_sales = stats.total_sales, "Overwriting live stats");

        sqlx::query(
            r#"
            UPDATE live_stats SET
                total_sales = ?1,
                total_revenue_cents = ?2,
                total_customers_registered = ?3,
                top_performing_stall = ?4,
                total_checkout_amount_cents = ?5,
                total_customers = ?6,
                updated_at = ?7
            WHERE id = 1
            "#,
        )
        .bind(stats.total_sales)
        .bind(stats.total_revenue_cents)
        .bind(stats.total_customers_registered)
        .bind(&stats.top_performing_stall)
        .bind(stats.total_checkout_amount_cents)
        .bind(stats.total_customers)
        .bind(stats.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    pub async fn set_top_stall(&mut self, stall_id: Option<&str>) -> DbResult<()> {
        sqlx::query("UPDATE live_stats SET top_performing_stall = ?1, updated_at = ?2 WHERE id = 1")
            .bind(stall_id)
            .bind(Utc::now())
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }
}
