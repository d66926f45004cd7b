use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::usage::UserUsageResetLog;

/// Writer for the hourly traffic counters. Samples land in the row for the
/// current hour window, created on first write and incremented afterwards.
#[derive(Debug, Clone)]
pub struct UsageRepository {
    pool: PgPool,
}

impl UsageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Records node-level traffic and folds it into the panel-wide totals.
    /// `node_id` None attributes the sample to the master core.
    pub async fn record_node_usage(
        &self,
        node_id: Option<i64>,
        uplink: i64,
        downlink: i64,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO node_usages (node_id, created_at, uplink, downlink)
            VALUES ($1, date_trunc('hour', CURRENT_TIMESTAMP), $2, $3)
            ON CONFLICT (COALESCE(node_id, 0), created_at) DO UPDATE SET
                uplink = node_usages.uplink + excluded.uplink,
                downlink = node_usages.downlink + excluded.downlink
            "#,
        )
        .bind(node_id)
        .bind(uplink)
        .bind(downlink)
        .execute(&mut *tx)
        .await
        .context("Failed to record node usage")?;

        sqlx::query("UPDATE system SET uplink = uplink + $1, downlink = downlink + $2")
            .bind(uplink)
            .bind(downlink)
            .execute(&mut *tx)
            .await
            .context("Failed to update system traffic totals")?;

        tx.commit().await?;
        Ok(())
    }

    /// Records one user's traffic on a node and bumps the user's quota
    /// counter and last-seen timestamp.
    pub async fn record_user_usage(
        &self,
        node_id: Option<i64>,
        user_id: i64,
        used_traffic: i64,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO node_user_usages (node_id, user_id, created_at, used_traffic)
            VALUES ($1, $2, date_trunc('hour', CURRENT_TIMESTAMP), $3)
            ON CONFLICT (COALESCE(node_id, 0), user_id, created_at) DO UPDATE SET
                used_traffic = node_user_usages.used_traffic + excluded.used_traffic
            "#,
        )
        .bind(node_id)
        .bind(user_id)
        .bind(used_traffic)
        .execute(&mut *tx)
        .await
        .context("Failed to record user usage")?;

        sqlx::query(
            "UPDATE users SET used_traffic = used_traffic + $1, online_at = CURRENT_TIMESTAMP WHERE id = $2",
        )
        .bind(used_traffic)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to bump user traffic counter")?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_reset_logs(&self, user_id: i64) -> Result<Vec<UserUsageResetLog>> {
        sqlx::query_as::<_, UserUsageResetLog>(
            "SELECT * FROM user_usage_reset_logs WHERE user_id = $1 ORDER BY reset_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch usage reset logs")
    }
}
