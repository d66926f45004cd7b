use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::error::RepoError;
use crate::models::service::{NewService, Service, ServiceWithRelations};

#[derive(Debug, Clone)]
pub struct ServiceRepository {
    pool: PgPool,
}

impl ServiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, service: NewService) -> Result<ServiceWithRelations> {
        let mut tx = self.pool.begin().await?;

        let service_id: i64 =
            sqlx::query_scalar("INSERT INTO services (name) VALUES ($1) RETURNING id")
                .bind(&service.name)
                .fetch_one(&mut *tx)
                .await
                .context("Failed to create service")?;

        if !service.inbound_ids.is_empty() {
            sqlx::query(
                "INSERT INTO inbound_services (inbound_id, service_id)
                 SELECT id, $1 FROM inbounds WHERE id = ANY($2)",
            )
            .bind(service_id)
            .bind(&service.inbound_ids)
            .execute(&mut *tx)
            .await
            .context("Failed to link service inbounds")?;
        }

        if !service.user_ids.is_empty() {
            sqlx::query(
                "INSERT INTO user_services (user_id, service_id)
                 SELECT id, $1 FROM users WHERE id = ANY($2)",
            )
            .bind(service_id)
            .bind(&service.user_ids)
            .execute(&mut *tx)
            .await
            .context("Failed to link service users")?;
        }

        tx.commit().await?;
        self.must_get(service_id).await
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Service>> {
        sqlx::query_as::<_, Service>("SELECT * FROM services WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch service by name")
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Service>> {
        sqlx::query_as::<_, Service>("SELECT * FROM services WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch service by ID")
    }

    pub async fn get_with_relations(&self, id: i64) -> Result<Option<ServiceWithRelations>> {
        let Some(service) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let inbound_ids: Vec<i64> =
            sqlx::query_scalar("SELECT inbound_id FROM inbound_services WHERE service_id = $1")
                .bind(id)
                .fetch_all(&self.pool)
                .await
                .context("Failed to fetch service inbound links")?;
        let user_ids: Vec<i64> =
            sqlx::query_scalar("SELECT user_id FROM user_services WHERE service_id = $1")
                .bind(id)
                .fetch_all(&self.pool)
                .await
                .context("Failed to fetch service user links")?;

        Ok(Some(ServiceWithRelations {
            id: service.id,
            name: service.name,
            inbound_ids,
            user_ids,
        }))
    }

    pub async fn list(&self) -> Result<Vec<Service>> {
        sqlx::query_as::<_, Service>("SELECT * FROM services ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list services")
    }

    /// Rename and relink in one transaction; `None` keeps the existing links.
    pub async fn update(
        &self,
        id: i64,
        name: Option<&str>,
        inbound_ids: Option<&[i64]>,
        user_ids: Option<&[i64]>,
    ) -> Result<ServiceWithRelations> {
        let mut tx = self.pool.begin().await?;

        if let Some(name) = name {
            sqlx::query("UPDATE services SET name = $1 WHERE id = $2")
                .bind(name)
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to rename service")?;
        }

        if let Some(inbound_ids) = inbound_ids {
            sqlx::query("DELETE FROM inbound_services WHERE service_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO inbound_services (inbound_id, service_id)
                 SELECT id, $1 FROM inbounds WHERE id = ANY($2)",
            )
            .bind(id)
            .bind(inbound_ids)
            .execute(&mut *tx)
            .await
            .context("Failed to relink service inbounds")?;
        }

        if let Some(user_ids) = user_ids {
            sqlx::query("DELETE FROM user_services WHERE service_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO user_services (user_id, service_id)
                 SELECT id, $1 FROM users WHERE id = ANY($2)",
            )
            .bind(id)
            .bind(user_ids)
            .execute(&mut *tx)
            .await
            .context("Failed to relink service users")?;
        }

        tx.commit().await?;
        self.must_get(id).await
    }

    pub async fn remove(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM services WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete service")?;
        Ok(())
    }

    async fn must_get(&self, id: i64) -> Result<ServiceWithRelations> {
        self.get_with_relations(id)
            .await?
            .ok_or_else(|| {
                RepoError::NotFoundAfterWrite {
                    entity: "service",
                    id,
                }
                .into()
            })
    }
}
