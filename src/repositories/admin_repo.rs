use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::admin::{Admin, AdminPartialUpdate, AdminUpdate, NewAdmin};

#[derive(Debug, Clone)]
pub struct AdminRepository {
    pool: PgPool,
}

impl AdminRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<Admin>> {
        sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch admin by username")
    }

    pub async fn create(&self, admin: NewAdmin) -> Result<Admin> {
        sqlx::query_as::<_, Admin>(
            r#"
            INSERT INTO admins (username, hashed_password, is_sudo)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&admin.username)
        .bind(&admin.hashed_password)
        .bind(admin.is_sudo)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create admin")
    }

    /// Full update. A changed password hash stamps `password_reset_at`, which
    /// invalidates tokens issued before the change.
    pub async fn update(&self, current: &Admin, changes: AdminUpdate) -> Result<Admin> {
        let password_changed = current.hashed_password != changes.hashed_password;

        sqlx::query_as::<_, Admin>(
            r#"
            UPDATE admins
            SET is_sudo = $1,
                hashed_password = $2,
                password_reset_at = CASE WHEN $3 THEN CURRENT_TIMESTAMP ELSE password_reset_at END
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(changes.is_sudo)
        .bind(&changes.hashed_password)
        .bind(password_changed)
        .bind(current.id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to update admin")
    }

    pub async fn partial_update(
        &self,
        current: &Admin,
        changes: AdminPartialUpdate,
    ) -> Result<Admin> {
        let is_sudo = changes.is_sudo.unwrap_or(current.is_sudo);
        let (hashed_password, password_changed) = match changes.hashed_password {
            Some(hash) if hash != current.hashed_password => (hash, true),
            Some(hash) => (hash, false),
            None => (current.hashed_password.clone(), false),
        };

        sqlx::query_as::<_, Admin>(
            r#"
            UPDATE admins
            SET is_sudo = $1,
                hashed_password = $2,
                password_reset_at = CASE WHEN $3 THEN CURRENT_TIMESTAMP ELSE password_reset_at END
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(is_sudo)
        .bind(&hashed_password)
        .bind(password_changed)
        .bind(current.id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to partially update admin")
    }

    pub async fn remove(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM admins WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete admin")?;
        Ok(())
    }

    pub async fn list(
        &self,
        username: Option<&str>,
        offset: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<Admin>> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM admins WHERE 1=1");
        if let Some(username) = username {
            query
                .push(" AND username ILIKE ")
                .push_bind(format!("%{}%", username));
        }
        query.push(" ORDER BY username ASC");
        if let Some(offset) = offset {
            query.push(" OFFSET ").push_bind(offset);
        }
        if let Some(limit) = limit {
            query.push(" LIMIT ").push_bind(limit);
        }

        query
            .build_query_as::<Admin>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list admins")
    }
}
