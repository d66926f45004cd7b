use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationReminder {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub reminder_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReminderType {
    ExpirationDate,
    DataUsage,
}

impl ReminderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderType::ExpirationDate => "expiration_date",
            ReminderType::DataUsage => "data_usage",
        }
    }
}

impl From<String> for ReminderType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "data_usage" => ReminderType::DataUsage,
            _ => ReminderType::ExpirationDate,
        }
    }
}
