use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::RepoError;
use crate::models::network::InboundHost;
use crate::models::reminder::ReminderType;
use crate::models::usage::{UserUsageSummary, summarize_user_usage};
use crate::models::user::{
    NewUser, NodeUserEntry, User, UserFilter, UserStatus, UserUpdate,
    status_after_data_limit_change, status_after_expire_change,
};
use crate::settings::NotificationThresholds;

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by username")
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by ID")
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
        if filter.usernames.len() == 1 {
            builder
                .push(" AND username ILIKE ")
                .push_bind(format!("%{}%", filter.usernames[0]));
        } else if !filter.usernames.is_empty() {
            builder
                .push(" AND username = ANY(")
                .push_bind(filter.usernames.clone())
                .push(")");
        }

        if !filter.statuses.is_empty() {
            let statuses: Vec<String> = filter
                .statuses
                .iter()
                .map(|s| s.as_str().to_string())
                .collect();
            builder
                .push(" AND status = ANY(")
                .push_bind(statuses)
                .push(")");
        }

        if !filter.reset_strategies.is_empty() {
            let strategies: Vec<String> = filter
                .reset_strategies
                .iter()
                .map(|s| s.as_str().to_string())
                .collect();
            builder
                .push(" AND data_limit_reset_strategy = ANY(")
                .push_bind(strategies)
                .push(")");
        }

        if let Some(admin_id) = filter.admin_id {
            builder.push(" AND admin_id = ").push_bind(admin_id);
        }
    }

    pub async fn list(&self, filter: &UserFilter) -> Result<Vec<User>> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM users WHERE 1=1");
        Self::push_filters(&mut query, filter);

        if !filter.sort.is_empty() {
            let clauses: Vec<String> = filter.sort.iter().map(|s| s.order_clause()).collect();
            query.push(" ORDER BY ").push(clauses.join(", "));
        }
        if let Some(offset) = filter.offset {
            query.push(" OFFSET ").push_bind(offset);
        }
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit);
        }

        query
            .build_query_as::<User>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list users")
    }

    /// Like [`list`](Self::list), also returning the total row count before
    /// pagination was applied.
    pub async fn list_with_count(&self, filter: &UserFilter) -> Result<(Vec<User>, i64)> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE 1=1");
        Self::push_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?;

        let users = self.list(filter).await?;
        Ok((users, total))
    }

    pub async fn count(&self, status: Option<UserStatus>, admin_id: Option<i64>) -> Result<i64> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE 1=1");
        if let Some(status) = status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(admin_id) = admin_id {
            query.push(" AND admin_id = ").push_bind(admin_id);
        }
        query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")
    }

    pub async fn create(&self, user: NewUser, admin_id: Option<i64>) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let user_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (
                username, key, status, data_limit, expire,
                data_limit_reset_strategy, note,
                on_hold_expire_duration, on_hold_timeout, admin_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(user.key)
        .bind(user.status.as_str())
        .bind(user.data_limit.filter(|v| *v != 0))
        .bind(user.expire.filter(|v| *v != 0))
        .bind(user.data_limit_reset_strategy.as_str())
        .bind(&user.note)
        .bind(user.on_hold_expire_duration.filter(|v| *v != 0))
        .bind(user.on_hold_timeout)
        .bind(admin_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to create user")?;

        if !user.service_ids.is_empty() {
            sqlx::query(
                "INSERT INTO user_services (user_id, service_id)
                 SELECT $1, id FROM services WHERE id = ANY($2)",
            )
            .bind(user_id)
            .bind(&user.service_ids)
            .execute(&mut *tx)
            .await
            .context("Failed to link user services")?;
        }

        tx.commit().await?;
        self.must_get(user_id).await
    }

    pub async fn remove(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete user")?;
        Ok(())
    }

    /// Applies a field-wise update together with the status-transition rules:
    /// changing the data limit can flip the user between active and limited,
    /// changing the expiration between active and expired. Reminders that the
    /// change made stale are dropped in the same transaction.
    pub async fn update(
        &self,
        current: &User,
        changes: UserUpdate,
        thresholds: NotificationThresholds,
    ) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let mut status = changes.status.unwrap_or_else(|| current.status_enum());

        let mut data_limit = current.data_limit;
        if let Some(limit) = changes.data_limit {
            let limit = (limit != 0).then_some(limit);
            data_limit = limit;
            let (next, reminder_stale) = status_after_data_limit_change(
                status,
                current.used_traffic,
                limit,
                thresholds.reached_usage_percent,
            );
            status = next;
            if reminder_stale {
                Self::delete_reminder(&mut tx, current.id, ReminderType::DataUsage).await?;
            }
        }

        let mut expire = current.expire;
        if let Some(ts) = changes.expire {
            let ts = (ts != 0).then_some(ts);
            expire = ts;
            let (next, reminder_stale) =
                status_after_expire_change(status, ts, Utc::now().timestamp(), thresholds.days_left);
            status = next;
            if reminder_stale {
                Self::delete_reminder(&mut tx, current.id, ReminderType::ExpirationDate).await?;
            }
        }

        let note = match changes.note {
            Some(note) => (!note.is_empty()).then_some(note),
            None => current.note.clone(),
        };
        let reset_strategy = changes
            .data_limit_reset_strategy
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| current.data_limit_reset_strategy.clone());
        let on_hold_expire_duration = changes
            .on_hold_expire_duration
            .or(current.on_hold_expire_duration);
        let on_hold_timeout = changes.on_hold_timeout.or(current.on_hold_timeout);

        sqlx::query(
            r#"
            UPDATE users
            SET status = $1, data_limit = $2, expire = $3, note = $4,
                data_limit_reset_strategy = $5,
                on_hold_expire_duration = $6, on_hold_timeout = $7,
                edited_at = CURRENT_TIMESTAMP
            WHERE id = $8
            "#,
        )
        .bind(status.as_str())
        .bind(data_limit)
        .bind(expire)
        .bind(&note)
        .bind(&reset_strategy)
        .bind(on_hold_expire_duration)
        .bind(on_hold_timeout)
        .bind(current.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update user")?;

        if let Some(service_ids) = &changes.service_ids {
            sqlx::query("DELETE FROM user_services WHERE user_id = $1")
                .bind(current.id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO user_services (user_id, service_id)
                 SELECT $1, id FROM services WHERE id = ANY($2)",
            )
            .bind(current.id)
            .bind(service_ids)
            .execute(&mut *tx)
            .await
            .context("Failed to relink user services")?;
        }

        tx.commit().await?;
        self.must_get(current.id).await
    }

    pub async fn update_status(&self, id: i64, status: UserStatus) -> Result<User> {
        sqlx::query("UPDATE users SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update user status")?;
        self.must_get(id).await
    }

    pub async fn set_owner(&self, id: i64, admin_id: i64) -> Result<User> {
        sqlx::query("UPDATE users SET admin_id = $1 WHERE id = $2")
            .bind(admin_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to set user owner")?;
        self.must_get(id).await
    }

    /// Starts the expiration clock of an on-hold user on first connect. The
    /// duration is set when the user is put on hold; a user without one
    /// cannot be started and is reported as an error.
    pub async fn start_expire(&self, user: &User) -> Result<User> {
        let expire = user
            .on_hold_expire_at(Utc::now().timestamp())
            .ok_or(RepoError::MissingOnHoldDuration { id: user.id })?;
        sqlx::query("UPDATE users SET expire = $1 WHERE id = $2")
            .bind(expire)
            .bind(user.id)
            .execute(&self.pool)
            .await
            .context("Failed to start user expiration")?;
        self.must_get(user.id).await
    }

    /// Zeroes the traffic counter, keeping an audit log row and dropping the
    /// per-node samples. Expired and disabled users stay in their status.
    pub async fn reset_data_usage(&self, user: &User) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO user_usage_reset_logs (user_id, used_traffic_at_reset) VALUES ($1, $2)",
        )
        .bind(user.id)
        .bind(user.used_traffic)
        .execute(&mut *tx)
        .await
        .context("Failed to log usage reset")?;

        sqlx::query(
            r#"
            UPDATE users
            SET used_traffic = 0,
                status = CASE WHEN status IN ('expired', 'disabled') THEN status ELSE 'active' END
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM node_user_usages WHERE user_id = $1")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.must_get(user.id).await
    }

    /// Resets every user, or only the users owned by one admin.
    pub async fn reset_all_data_usage(&self, admin_id: Option<i64>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let mut update = QueryBuilder::<Postgres>::new(
            "UPDATE users SET used_traffic = 0, status = CASE \
             WHEN status IN ('on_hold', 'expired', 'disabled') THEN status \
             ELSE 'active' END WHERE 1=1",
        );
        if let Some(admin_id) = admin_id {
            update.push(" AND admin_id = ").push_bind(admin_id);
        }
        update.build().execute(&mut *tx).await?;

        for table in ["node_user_usages", "user_usage_reset_logs"] {
            let mut delete = QueryBuilder::<Postgres>::new(format!("DELETE FROM {table}"));
            if let Some(admin_id) = admin_id {
                delete
                    .push(" WHERE user_id IN (SELECT id FROM users WHERE admin_id = ")
                    .push_bind(admin_id)
                    .push(")");
            }
            delete.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        tracing::info!(admin_id = ?admin_id, "reset data usage for all users");
        Ok(())
    }

    /// Invalidates the subscription link by rotating the user's key.
    pub async fn revoke_sub(&self, id: i64) -> Result<User> {
        sqlx::query("UPDATE users SET sub_revoked_at = CURRENT_TIMESTAMP, key = $1 WHERE id = $2")
            .bind(Uuid::new_v4())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to revoke user subscription")?;
        self.must_get(id).await
    }

    pub async fn update_sub(&self, id: i64, user_agent: &str) -> Result<User> {
        sqlx::query(
            "UPDATE users SET sub_updated_at = CURRENT_TIMESTAMP, sub_last_user_agent = $1 WHERE id = $2",
        )
        .bind(user_agent)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to record subscription fetch")?;
        self.must_get(id).await
    }

    pub async fn get_usages(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UserUsageSummary>> {
        let nodes = sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM nodes")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch nodes for usage summary")?;

        let samples = sqlx::query_as::<_, (Option<i64>, i64)>(
            "SELECT node_id, used_traffic FROM node_user_usages
             WHERE user_id = $1 AND created_at >= $2 AND created_at <= $3",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch user usage samples")?;

        Ok(summarize_user_usage(&nodes, &samples))
    }

    /// Users reachable through a node's inbounds, one row per (user, inbound).
    pub async fn get_node_users(
        &self,
        node_id: i64,
        statuses: &[UserStatus],
    ) -> Result<Vec<NodeUserEntry>> {
        let base = r#"
            SELECT DISTINCT u.id AS user_id, u.username, u.key, i.protocol, i.tag
            FROM users u
            JOIN user_services us ON us.user_id = u.id
            JOIN inbound_services isv ON isv.service_id = us.service_id
            JOIN inbounds i ON i.id = isv.inbound_id
            WHERE i.node_id = $1
        "#;

        if statuses.is_empty() {
            sqlx::query_as::<_, NodeUserEntry>(base)
                .bind(node_id)
                .fetch_all(&self.pool)
                .await
                .context("Failed to fetch node users")
        } else {
            let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
            sqlx::query_as::<_, NodeUserEntry>(&format!("{base} AND u.status = ANY($2)"))
                .bind(node_id)
                .bind(statuses)
                .fetch_all(&self.pool)
                .await
                .context("Failed to fetch node users")
        }
    }

    /// All hosts the user can connect through, across services and inbounds.
    pub async fn get_hosts(&self, user_id: i64) -> Result<Vec<InboundHost>> {
        sqlx::query_as::<_, InboundHost>(
            r#"
            SELECT DISTINCT h.*
            FROM inbound_hosts h
            JOIN inbound_services isv ON isv.inbound_id = h.inbound_id
            JOIN user_services us ON us.service_id = isv.service_id
            WHERE us.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch user hosts")
    }

    async fn delete_reminder(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        user_id: i64,
        reminder_type: ReminderType,
    ) -> Result<()> {
        sqlx::query("DELETE FROM notification_reminders WHERE user_id = $1 AND type = $2")
            .bind(user_id)
            .bind(reminder_type.as_str())
            .execute(&mut **tx)
            .await
            .context("Failed to delete stale reminder")?;
        Ok(())
    }

    async fn must_get(&self, id: i64) -> Result<User> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| RepoError::NotFoundAfterWrite { entity: "user", id }.into())
    }
}
