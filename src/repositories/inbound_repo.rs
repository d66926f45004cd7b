use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::network::{Inbound, InboundHost, InboundSpec, NewInboundHost};

/// Template host seeded for every freshly discovered inbound; placeholders are
/// substituted by the subscription renderer.
pub const DEFAULT_HOST_REMARK: &str = "🚀 Corsair ({USERNAME}) [{PROTOCOL} - {TRANSPORT}]";
pub const DEFAULT_HOST_ADDRESS: &str = "{SERVER_IP}";

#[derive(Debug, Clone)]
pub struct InboundRepository {
    pool: PgPool,
}

impl InboundRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_all(&self) -> Result<Vec<Inbound>> {
        sqlx::query_as::<_, Inbound>("SELECT * FROM inbounds")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch all inbounds")
    }

    pub async fn get_by_node(&self, node_id: i64) -> Result<Vec<Inbound>> {
        sqlx::query_as::<_, Inbound>("SELECT * FROM inbounds WHERE node_id = $1")
            .bind(node_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch inbounds for node")
    }

    /// Reconciles a node's inbound rows with the set the node just reported.
    /// When the (protocol, tag) sets already match this is a no-op; otherwise
    /// the rows are replaced wholesale and each new inbound gets the default
    /// host. Host customizations on replaced inbounds are discarded, which is
    /// why the set comparison matters.
    pub async fn assure_node_inbounds(&self, node_id: i64, desired: &[InboundSpec]) -> Result<()> {
        let existing = self.get_by_node(node_id).await?;
        let existing_specs: Vec<InboundSpec> = existing
            .iter()
            .map(|i| InboundSpec {
                tag: i.tag.clone(),
                protocol: i.protocol.clone(),
            })
            .collect();

        if inbound_sets_match(&existing_specs, desired) {
            return Ok(());
        }

        tracing::info!(node_id, count = desired.len(), "replacing node inbounds");

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM inbounds WHERE node_id = $1")
            .bind(node_id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear node inbounds")?;

        for spec in desired {
            let inbound_id: i64 = sqlx::query_scalar(
                "INSERT INTO inbounds (node_id, tag, protocol) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(node_id)
            .bind(&spec.tag)
            .bind(&spec.protocol)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to insert inbound")?;

            sqlx::query(
                "INSERT INTO inbound_hosts (inbound_id, remark, address) VALUES ($1, $2, $3)",
            )
            .bind(inbound_id)
            .bind(DEFAULT_HOST_REMARK)
            .bind(DEFAULT_HOST_ADDRESS)
            .execute(&mut *tx)
            .await
            .context("Failed to insert default host")?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_hosts(&self, inbound_id: i64) -> Result<Vec<InboundHost>> {
        sqlx::query_as::<_, InboundHost>("SELECT * FROM inbound_hosts WHERE inbound_id = $1")
            .bind(inbound_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch inbound hosts")
    }

    /// Hosts of every inbound, keyed by inbound id. Inbounds without hosts
    /// still get an (empty) entry.
    pub async fn get_all_hosts(&self) -> Result<HashMap<i64, Vec<InboundHost>>> {
        let inbound_ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM inbounds")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch inbound IDs")?;

        let hosts = sqlx::query_as::<_, InboundHost>("SELECT * FROM inbound_hosts")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch all hosts")?;

        let mut map: HashMap<i64, Vec<InboundHost>> =
            inbound_ids.into_iter().map(|id| (id, Vec::new())).collect();
        for host in hosts {
            map.entry(host.inbound_id).or_default().push(host);
        }
        Ok(map)
    }

    pub async fn add_host(&self, inbound_id: i64, host: NewInboundHost) -> Result<Vec<InboundHost>> {
        sqlx::query(
            r#"
            INSERT INTO inbound_hosts (
                inbound_id, remark, address, port, path, sni, host,
                security, alpn, fingerprint, allowinsecure, is_disabled
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(inbound_id)
        .bind(&host.remark)
        .bind(&host.address)
        .bind(host.port)
        .bind(&host.path)
        .bind(&host.sni)
        .bind(&host.host)
        .bind(&host.security)
        .bind(&host.alpn)
        .bind(&host.fingerprint)
        .bind(host.allowinsecure)
        .bind(host.is_disabled)
        .execute(&self.pool)
        .await
        .context("Failed to add inbound host")?;

        self.get_hosts(inbound_id).await
    }

    /// Replaces the inbound's host list with the edited one.
    pub async fn replace_hosts(
        &self,
        inbound_id: i64,
        hosts: Vec<NewInboundHost>,
    ) -> Result<Vec<InboundHost>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM inbound_hosts WHERE inbound_id = $1")
            .bind(inbound_id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear inbound hosts")?;

        for host in &hosts {
            sqlx::query(
                r#"
                INSERT INTO inbound_hosts (
                    inbound_id, remark, address, port, path, sni, host,
                    security, alpn, fingerprint, allowinsecure, is_disabled
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(inbound_id)
            .bind(&host.remark)
            .bind(&host.address)
            .bind(host.port)
            .bind(&host.path)
            .bind(&host.sni)
            .bind(&host.host)
            .bind(&host.security)
            .bind(&host.alpn)
            .bind(&host.fingerprint)
            .bind(host.allowinsecure)
            .bind(host.is_disabled)
            .execute(&mut *tx)
            .await
            .context("Failed to insert inbound host")?;
        }

        tx.commit().await?;
        self.get_hosts(inbound_id).await
    }
}

/// Order- and duplicate-insensitive equality on (protocol, tag) pairs.
pub fn inbound_sets_match(existing: &[InboundSpec], desired: &[InboundSpec]) -> bool {
    let existing: HashSet<&InboundSpec> = existing.iter().collect();
    let desired: HashSet<&InboundSpec> = desired.iter().collect();
    existing == desired
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(protocol: &str, tag: &str) -> InboundSpec {
        InboundSpec {
            tag: tag.to_string(),
            protocol: protocol.to_string(),
        }
    }

    #[test]
    fn matching_sets_ignore_order() {
        let a = vec![spec("vless", "in-1"), spec("trojan", "in-2")];
        let b = vec![spec("trojan", "in-2"), spec("vless", "in-1")];
        assert!(inbound_sets_match(&a, &b));
    }

    #[test]
    fn extra_inbound_breaks_the_match() {
        let a = vec![spec("vless", "in-1")];
        let b = vec![spec("vless", "in-1"), spec("vless", "in-3")];
        assert!(!inbound_sets_match(&a, &b));
    }

    #[test]
    fn protocol_change_on_same_tag_breaks_the_match() {
        let a = vec![spec("vless", "in-1")];
        let b = vec![spec("vmess", "in-1")];
        assert!(!inbound_sets_match(&a, &b));
    }

    #[test]
    fn both_empty_is_a_match() {
        assert!(inbound_sets_match(&[], &[]));
    }
}
