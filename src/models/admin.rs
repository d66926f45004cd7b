use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Admin {
    pub id: i64,
    pub username: String,
    pub hashed_password: String,
    pub is_sudo: bool,
    pub password_reset_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub username: String,
    pub hashed_password: String,
    pub is_sudo: bool,
}

/// Full update: both fields are always applied.
#[derive(Debug, Clone)]
pub struct AdminUpdate {
    pub hashed_password: String,
    pub is_sudo: bool,
}

/// Partial update: only the fields that are present change.
#[derive(Debug, Clone, Default)]
pub struct AdminPartialUpdate {
    pub hashed_password: Option<String>,
    pub is_sudo: Option<bool>,
}
