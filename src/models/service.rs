use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Service {
    pub id: i64,
    pub name: String,
}

/// Service together with its link rows, as the API returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceWithRelations {
    pub id: i64,
    pub name: String,
    pub inbound_ids: Vec<i64>,
    pub user_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct NewService {
    pub name: String,
    pub inbound_ids: Vec<i64>,
    pub user_ids: Vec<i64>,
}
