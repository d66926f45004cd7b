use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Node {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub port: i32,
    pub api_port: i32,
    pub status: String,
    pub xray_version: Option<String>,
    pub message: Option<String>,
    pub usage_coefficient: f64,
    pub last_status_change: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Node {
    pub fn status_enum(&self) -> NodeStatus {
        NodeStatus::from(self.status.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Connecting,
    Connected,
    Error,
    Disabled,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Connecting => "connecting",
            NodeStatus::Connected => "connected",
            NodeStatus::Error => "error",
            NodeStatus::Disabled => "disabled",
        }
    }
}

impl From<String> for NodeStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "connected" => NodeStatus::Connected,
            "error" => NodeStatus::Error,
            "disabled" => NodeStatus::Disabled,
            _ => NodeStatus::Connecting,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewNode {
    pub name: String,
    pub address: String,
    pub port: i32,
    pub api_port: i32,
}

#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub port: Option<i32>,
    pub api_port: Option<i32>,
    pub status: Option<NodeStatus>,
    pub usage_coefficient: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_falls_back_to_connecting() {
        assert_eq!(NodeStatus::from(String::new()), NodeStatus::Connecting);
        assert_eq!(
            NodeStatus::from("disabled".to_string()),
            NodeStatus::Disabled
        );
    }
}
