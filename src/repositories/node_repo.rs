use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::node::{NewNode, Node, NodeStatus, NodeUpdate};
use crate::models::usage::{NodeUsageSummary, summarize_node_usage};

#[derive(Debug, Clone)]
pub struct NodeRepository {
    pool: PgPool,
}

impl NodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Node>> {
        sqlx::query_as::<_, Node>("SELECT * FROM nodes WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch node by name")
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Node>> {
        sqlx::query_as::<_, Node>("SELECT * FROM nodes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch node by ID")
    }

    /// `enabled` keeps every status except `disabled`.
    pub async fn list(&self, statuses: &[NodeStatus], enabled: bool) -> Result<Vec<Node>> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM nodes WHERE 1=1");
        if !statuses.is_empty() {
            let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
            query.push(" AND status = ANY(").push_bind(statuses).push(")");
        }
        if enabled {
            query
                .push(" AND status <> ")
                .push_bind(NodeStatus::Disabled.as_str());
        }
        query.push(" ORDER BY name ASC");

        query
            .build_query_as::<Node>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list nodes")
    }

    pub async fn create(&self, node: NewNode) -> Result<Node> {
        sqlx::query_as::<_, Node>(
            r#"
            INSERT INTO nodes (name, address, port, api_port)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&node.name)
        .bind(&node.address)
        .bind(node.port)
        .bind(node.api_port)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create node")
    }

    pub async fn remove(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM nodes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete node")?;
        Ok(())
    }

    /// Any change other than disabling sends the node back through the
    /// connection handshake; disabling also clears the reported core version
    /// and status message.
    pub async fn update(&self, current: &Node, changes: NodeUpdate) -> Result<Node> {
        let name = changes.name.unwrap_or_else(|| current.name.clone());
        let address = changes.address.unwrap_or_else(|| current.address.clone());
        let port = changes.port.unwrap_or(current.port);
        let api_port = changes.api_port.unwrap_or(current.api_port);
        let usage_coefficient = changes
            .usage_coefficient
            .filter(|c| *c != 0.0)
            .unwrap_or(current.usage_coefficient);

        let disabling = changes.status == Some(NodeStatus::Disabled);
        let status = if disabling {
            NodeStatus::Disabled
        } else {
            NodeStatus::Connecting
        };

        sqlx::query_as::<_, Node>(
            r#"
            UPDATE nodes
            SET name = $1, address = $2, port = $3, api_port = $4,
                usage_coefficient = $5, status = $6,
                xray_version = CASE WHEN $7 THEN NULL ELSE xray_version END,
                message = CASE WHEN $7 THEN NULL ELSE message END
            WHERE id = $8
            RETURNING *
            "#,
        )
        .bind(&name)
        .bind(&address)
        .bind(port)
        .bind(api_port)
        .bind(usage_coefficient)
        .bind(status.as_str())
        .bind(disabling)
        .bind(current.id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to update node")
    }

    pub async fn update_status(
        &self,
        id: i64,
        status: NodeStatus,
        message: Option<&str>,
        version: Option<&str>,
    ) -> Result<Node> {
        sqlx::query_as::<_, Node>(
            r#"
            UPDATE nodes
            SET status = $1, message = $2, xray_version = $3,
                last_status_change = CURRENT_TIMESTAMP
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(status.as_str())
        .bind(message)
        .bind(version)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to update node status")
    }

    pub async fn get_usage(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<NodeUsageSummary>> {
        let nodes = sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM nodes")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch nodes for usage summary")?;

        let samples = sqlx::query_as::<_, (Option<i64>, i64, i64)>(
            "SELECT node_id, uplink, downlink FROM node_usages
             WHERE created_at >= $1 AND created_at <= $2",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch node usage samples")?;

        Ok(summarize_node_usage(&nodes, &samples))
    }
}
