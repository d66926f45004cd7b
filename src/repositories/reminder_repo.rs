use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::reminder::{NotificationReminder, ReminderType};

#[derive(Debug, Clone)]
pub struct ReminderRepository {
    pool: PgPool,
}

impl ReminderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: i64,
        reminder_type: ReminderType,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<NotificationReminder> {
        sqlx::query_as::<_, NotificationReminder>(
            r#"
            INSERT INTO notification_reminders (user_id, type, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(reminder_type.as_str())
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create notification reminder")
    }

    /// Returns the pending reminder, dropping it first when its expiry has
    /// passed so a fresh notification goes out next cycle.
    pub async fn get(
        &self,
        user_id: i64,
        reminder_type: ReminderType,
    ) -> Result<Option<NotificationReminder>> {
        let reminder = sqlx::query_as::<_, NotificationReminder>(
            "SELECT * FROM notification_reminders WHERE user_id = $1 AND type = $2 LIMIT 1",
        )
        .bind(user_id)
        .bind(reminder_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch notification reminder")?;

        let Some(reminder) = reminder else {
            return Ok(None);
        };

        if let Some(expires_at) = reminder.expires_at {
            if expires_at < Utc::now() {
                self.delete(reminder.id).await?;
                return Ok(None);
            }
        }

        Ok(Some(reminder))
    }

    pub async fn delete_by_type(&self, user_id: i64, reminder_type: ReminderType) -> Result<()> {
        sqlx::query("DELETE FROM notification_reminders WHERE user_id = $1 AND type = $2")
            .bind(user_id)
            .bind(reminder_type.as_str())
            .execute(&self.pool)
            .await
            .context("Failed to delete notification reminders by type")?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM notification_reminders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete notification reminder")?;
        Ok(())
    }
}
