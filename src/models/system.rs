use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Singleton row with panel-wide traffic totals.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct System {
    pub id: i64,
    pub uplink: i64,
    pub downlink: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Jwt {
    pub id: i64,
    pub secret_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tls {
    pub id: i64,
    pub key: String,
    pub certificate: String,
}
