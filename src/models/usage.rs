use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One hour-window traffic sample for a node. `node_id` NULL is the master
/// core running alongside the panel.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NodeUsage {
    pub id: i64,
    pub node_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub uplink: i64,
    pub downlink: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NodeUserUsage {
    pub id: i64,
    pub node_id: Option<i64>,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub used_traffic: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserUsageResetLog {
    pub id: i64,
    pub user_id: i64,
    pub used_traffic_at_reset: i64,
    pub reset_at: DateTime<Utc>,
}

/// Per-node aggregation of one user's traffic over a time range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUsageSummary {
    pub node_id: Option<i64>,
    pub node_name: String,
    pub used_traffic: i64,
}

/// Per-node uplink/downlink aggregation over a time range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeUsageSummary {
    pub node_id: Option<i64>,
    pub node_name: String,
    pub uplink: i64,
    pub downlink: i64,
}

pub const MASTER_NODE_NAME: &str = "Master";

/// Folds raw (node_id, used_traffic) samples into one summary per known node,
/// plus the master entry. Samples for nodes that were deleted since are
/// dropped; nodes without samples report zero.
pub fn summarize_user_usage(
    nodes: &[(i64, String)],
    samples: &[(Option<i64>, i64)],
) -> Vec<UserUsageSummary> {
    let mut usages = std::collections::BTreeMap::new();
    usages.insert(
        0,
        UserUsageSummary {
            node_id: None,
            node_name: MASTER_NODE_NAME.to_string(),
            used_traffic: 0,
        },
    );
    for (id, name) in nodes {
        usages.insert(
            *id,
            UserUsageSummary {
                node_id: Some(*id),
                node_name: name.clone(),
                used_traffic: 0,
            },
        );
    }

    for (node_id, used) in samples {
        if let Some(entry) = usages.get_mut(&node_id.unwrap_or(0)) {
            entry.used_traffic += used;
        }
    }

    usages.into_values().collect()
}

/// Same shape as [`summarize_user_usage`] for node uplink/downlink samples.
pub fn summarize_node_usage(
    nodes: &[(i64, String)],
    samples: &[(Option<i64>, i64, i64)],
) -> Vec<NodeUsageSummary> {
    let mut usages = std::collections::BTreeMap::new();
    usages.insert(
        0,
        NodeUsageSummary {
            node_id: None,
            node_name: MASTER_NODE_NAME.to_string(),
            uplink: 0,
            downlink: 0,
        },
    );
    for (id, name) in nodes {
        usages.insert(
            *id,
            NodeUsageSummary {
                node_id: Some(*id),
                node_name: name.clone(),
                uplink: 0,
                downlink: 0,
            },
        );
    }

    for (node_id, uplink, downlink) in samples {
        if let Some(entry) = usages.get_mut(&node_id.unwrap_or(0)) {
            entry.uplink += uplink;
            entry.downlink += downlink;
        }
    }

    usages.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes() -> Vec<(i64, String)> {
        vec![(1, "tokyo".to_string()), (2, "frankfurt".to_string())]
    }

    #[test]
    fn master_entry_is_always_present() {
        let out = summarize_user_usage(&nodes(), &[]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].node_id, None);
        assert_eq!(out[0].node_name, MASTER_NODE_NAME);
        assert!(out.iter().all(|u| u.used_traffic == 0));
    }

    #[test]
    fn samples_accumulate_per_node() {
        let samples = vec![(Some(1), 100), (Some(1), 50), (None, 7), (Some(2), 1)];
        let out = summarize_user_usage(&nodes(), &samples);
        assert_eq!(out[0].used_traffic, 7); // master
        assert_eq!(out[1].used_traffic, 150);
        assert_eq!(out[2].used_traffic, 1);
    }

    #[test]
    fn samples_for_deleted_nodes_are_skipped() {
        let samples = vec![(Some(99), 1 << 40)];
        let out = summarize_user_usage(&nodes(), &samples);
        assert!(out.iter().all(|u| u.used_traffic == 0));
    }

    #[test]
    fn node_usage_sums_both_directions() {
        let samples = vec![(Some(2), 10, 20), (Some(2), 1, 2), (None, 5, 6)];
        let out = summarize_node_usage(&nodes(), &samples);
        assert_eq!((out[0].uplink, out[0].downlink), (5, 6));
        assert_eq!((out[2].uplink, out[2].downlink), (11, 22));
    }
}
