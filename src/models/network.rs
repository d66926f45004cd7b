use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Inbound {
    pub id: i64,
    pub node_id: i64,
    pub tag: String,
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InboundSpec {
    pub tag: String,
    pub protocol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InboundHost {
    pub id: i64,
    pub inbound_id: i64,
    pub remark: String,
    pub address: String,
    pub port: Option<i32>,
    pub path: Option<String>,
    pub sni: Option<String>,
    pub host: Option<String>,
    pub security: String,
    pub alpn: String,
    pub fingerprint: String,
    pub allowinsecure: bool,
    pub is_disabled: bool,
}

/// Host fields as they arrive from the API, before a row exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInboundHost {
    pub remark: String,
    pub address: String,
    pub port: Option<i32>,
    pub path: Option<String>,
    pub sni: Option<String>,
    pub host: Option<String>,
    #[serde(default = "default_security")]
    pub security: String,
    #[serde(default)]
    pub alpn: String,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub allowinsecure: bool,
    #[serde(default)]
    pub is_disabled: bool,
}

fn default_security() -> String {
    "inbound_default".to_string()
}
