use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::system::{Jwt, System, Tls};

#[derive(Debug, Clone)]
pub struct SystemRepository {
    pool: PgPool,
}

impl SystemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_system_stats(&self) -> Result<System> {
        sqlx::query_as::<_, System>("SELECT * FROM system LIMIT 1")
            .fetch_one(&self.pool)
            .await
            .context("Failed to fetch system stats")
    }

    pub async fn record_traffic(&self, uplink: i64, downlink: i64) -> Result<()> {
        sqlx::query("UPDATE system SET uplink = uplink + $1, downlink = downlink + $2")
            .bind(uplink)
            .bind(downlink)
            .execute(&self.pool)
            .await
            .context("Failed to record system traffic")?;
        Ok(())
    }

    /// The signing secret, generated on first access.
    pub async fn get_jwt_secret_key(&self) -> Result<String> {
        let existing: Option<String> = sqlx::query_scalar("SELECT secret_key FROM jwt LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch JWT secret")?;

        if let Some(secret) = existing {
            return Ok(secret);
        }

        let secret = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let row: Jwt = sqlx::query_as::<_, Jwt>(
            "INSERT INTO jwt (secret_key) VALUES ($1) RETURNING *",
        )
        .bind(&secret)
        .fetch_one(&self.pool)
        .await
        .context("Failed to seed JWT secret")?;

        tracing::info!("generated JWT signing secret");
        Ok(row.secret_key)
    }

    pub async fn get_tls_certificate(&self) -> Result<Option<Tls>> {
        sqlx::query_as::<_, Tls>("SELECT * FROM tls LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch TLS certificate")
    }

    pub async fn set_tls_certificate(&self, key: &str, certificate: &str) -> Result<Tls> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM tls").execute(&mut *tx).await?;
        let row = sqlx::query_as::<_, Tls>(
            "INSERT INTO tls (key, certificate) VALUES ($1, $2) RETURNING *",
        )
        .bind(key)
        .bind(certificate)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to store TLS certificate")?;

        tx.commit().await?;
        Ok(row)
    }
}
