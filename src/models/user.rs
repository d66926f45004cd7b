use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub key: Uuid,
    pub status: String,
    pub used_traffic: i64,
    pub data_limit: Option<i64>,
    /// Unix seconds; NULL means the account never expires.
    pub expire: Option<i64>,
    pub data_limit_reset_strategy: String,
    pub note: Option<String>,
    pub sub_revoked_at: Option<DateTime<Utc>>,
    pub sub_updated_at: Option<DateTime<Utc>>,
    pub sub_last_user_agent: Option<String>,
    pub on_hold_expire_duration: Option<i64>,
    pub on_hold_timeout: Option<DateTime<Utc>>,
    pub admin_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub online_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn status_enum(&self) -> UserStatus {
        UserStatus::from(self.status.clone())
    }

    /// Expiration timestamp an on-hold user gets when its clock starts, or
    /// `None` when no duration was ever configured.
    pub fn on_hold_expire_at(&self, now_ts: i64) -> Option<i64> {
        self.on_hold_expire_duration.map(|duration| now_ts + duration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserStatus {
    Active,
    Disabled,
    Limited,
    Expired,
    OnHold,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Disabled => "disabled",
            UserStatus::Limited => "limited",
            UserStatus::Expired => "expired",
            UserStatus::OnHold => "on_hold",
        }
    }
}

impl From<String> for UserStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "disabled" => UserStatus::Disabled,
            "limited" => UserStatus::Limited,
            "expired" => UserStatus::Expired,
            "on_hold" => UserStatus::OnHold,
            _ => UserStatus::Active,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataLimitResetStrategy {
    NoReset,
    Day,
    Week,
    Month,
    Year,
}

impl DataLimitResetStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataLimitResetStrategy::NoReset => "no_reset",
            DataLimitResetStrategy::Day => "day",
            DataLimitResetStrategy::Week => "week",
            DataLimitResetStrategy::Month => "month",
            DataLimitResetStrategy::Year => "year",
        }
    }
}

impl From<String> for DataLimitResetStrategy {
    fn from(s: String) -> Self {
        match s.as_str() {
            "day" => DataLimitResetStrategy::Day,
            "week" => DataLimitResetStrategy::Week,
            "month" => DataLimitResetStrategy::Month,
            "year" => DataLimitResetStrategy::Year,
            _ => DataLimitResetStrategy::NoReset,
        }
    }
}

/// Sort keys accepted by the user listing endpoint. A leading `-` flips the
/// direction, mirroring the query-string convention of the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserSorting {
    pub field: UserSortField,
    pub descending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSortField {
    Username,
    UsedTraffic,
    DataLimit,
    Expire,
    CreatedAt,
}

impl UserSortField {
    fn column(&self) -> &'static str {
        match self {
            UserSortField::Username => "username",
            UserSortField::UsedTraffic => "used_traffic",
            UserSortField::DataLimit => "data_limit",
            UserSortField::Expire => "expire",
            UserSortField::CreatedAt => "created_at",
        }
    }
}

impl UserSorting {
    pub fn parse(s: &str) -> Option<Self> {
        let (name, descending) = match s.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (s, false),
        };
        let field = match name {
            "username" => UserSortField::Username,
            "used_traffic" => UserSortField::UsedTraffic,
            "data_limit" => UserSortField::DataLimit,
            "expire" => UserSortField::Expire,
            "created_at" => UserSortField::CreatedAt,
            _ => return None,
        };
        Some(Self { field, descending })
    }

    /// Column and direction as a safe SQL fragment (columns are whitelisted).
    pub fn order_clause(&self) -> String {
        format!(
            "{} {}",
            self.field.column(),
            if self.descending { "DESC" } else { "ASC" }
        )
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub key: Uuid,
    pub status: UserStatus,
    pub data_limit: Option<i64>,
    pub expire: Option<i64>,
    pub data_limit_reset_strategy: DataLimitResetStrategy,
    pub note: Option<String>,
    pub on_hold_expire_duration: Option<i64>,
    pub on_hold_timeout: Option<DateTime<Utc>>,
    pub service_ids: Vec<i64>,
}

/// Field-wise update; absent fields keep their current value. A `Some(0)`
/// data limit or expire clears the column, matching the API's "0 disables"
/// convention.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub status: Option<UserStatus>,
    pub data_limit: Option<i64>,
    pub expire: Option<i64>,
    pub note: Option<String>,
    pub data_limit_reset_strategy: Option<DataLimitResetStrategy>,
    pub on_hold_expire_duration: Option<i64>,
    pub on_hold_timeout: Option<DateTime<Utc>>,
    pub service_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// One entry filters as a case-insensitive substring; several entries
    /// match exactly.
    pub usernames: Vec<String>,
    pub statuses: Vec<UserStatus>,
    pub reset_strategies: Vec<DataLimitResetStrategy>,
    pub admin_id: Option<i64>,
    pub sort: Vec<UserSorting>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// A user's credentials on one inbound of a node, as handed to the node
/// configuration push.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NodeUserEntry {
    pub user_id: i64,
    pub username: String,
    pub key: Uuid,
    pub protocol: String,
    pub tag: String,
}

pub fn usage_percent(used_traffic: i64, data_limit: i64) -> f64 {
    if data_limit == 0 {
        return 0.0;
    }
    (used_traffic as f64 / data_limit as f64) * 100.0
}

pub fn expiration_days_left(expire: i64, now_ts: i64) -> i64 {
    (expire - now_ts) / 86_400
}

/// Status after the data limit changed, plus whether the pending `data_usage`
/// reminder is now stale and must be dropped.
///
/// Expired and disabled accounts are never touched. An account over its new
/// limit becomes limited; one back under it becomes active again (unless it is
/// on hold), and if usage also fell under the notification threshold the
/// reminder that was queued for the old limit no longer applies.
pub fn status_after_data_limit_change(
    current: UserStatus,
    used_traffic: i64,
    new_limit: Option<i64>,
    reached_usage_percent: f64,
) -> (UserStatus, bool) {
    if matches!(current, UserStatus::Expired | UserStatus::Disabled) {
        return (current, false);
    }

    match new_limit {
        Some(limit) if used_traffic >= limit => (UserStatus::Limited, false),
        Some(limit) => {
            let next = if current == UserStatus::OnHold {
                current
            } else {
                UserStatus::Active
            };
            let stale = usage_percent(used_traffic, limit) < reached_usage_percent;
            (next, stale)
        }
        None => {
            let next = if current == UserStatus::OnHold {
                current
            } else {
                UserStatus::Active
            };
            (next, true)
        }
    }
}

/// Status after the expiration timestamp changed, plus whether the pending
/// `expiration_date` reminder is stale. Only active and expired accounts flip
/// between the two states here.
pub fn status_after_expire_change(
    current: UserStatus,
    new_expire: Option<i64>,
    now_ts: i64,
    notify_days_left: i64,
) -> (UserStatus, bool) {
    if !matches!(current, UserStatus::Active | UserStatus::Expired) {
        return (current, false);
    }

    match new_expire {
        Some(expire) if expire <= now_ts => (UserStatus::Expired, false),
        Some(expire) => {
            let stale = expiration_days_left(expire, now_ts) > notify_days_left;
            (UserStatus::Active, stale)
        }
        None => (UserStatus::Active, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GB: i64 = 1 << 30;

    fn on_hold_user(on_hold_expire_duration: Option<i64>) -> User {
        User {
            id: 1,
            username: "marta".to_string(),
            key: Uuid::new_v4(),
            status: UserStatus::OnHold.as_str().to_string(),
            used_traffic: 0,
            data_limit: None,
            expire: None,
            data_limit_reset_strategy: DataLimitResetStrategy::NoReset.as_str().to_string(),
            note: None,
            sub_revoked_at: None,
            sub_updated_at: None,
            sub_last_user_agent: None,
            on_hold_expire_duration,
            on_hold_timeout: None,
            admin_id: None,
            created_at: Utc::now(),
            edited_at: None,
            online_at: None,
        }
    }

    #[test]
    fn on_hold_clock_starts_from_the_configured_duration() {
        let now = 1_700_000_000;
        assert_eq!(
            on_hold_user(Some(86_400)).on_hold_expire_at(now),
            Some(now + 86_400)
        );
    }

    #[test]
    fn on_hold_clock_without_a_duration_does_not_start() {
        assert_eq!(on_hold_user(None).on_hold_expire_at(1_700_000_000), None);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            UserStatus::Active,
            UserStatus::Disabled,
            UserStatus::Limited,
            UserStatus::Expired,
            UserStatus::OnHold,
        ] {
            assert_eq!(UserStatus::from(status.as_str().to_string()), status);
        }
        assert_eq!(UserStatus::from("garbage".to_string()), UserStatus::Active);
    }

    #[test]
    fn sorting_parses_descending_prefix() {
        let s = UserSorting::parse("-expire").unwrap();
        assert_eq!(s.field, UserSortField::Expire);
        assert!(s.descending);
        assert_eq!(s.order_clause(), "expire DESC");

        let s = UserSorting::parse("username").unwrap();
        assert!(!s.descending);
        assert_eq!(s.order_clause(), "username ASC");

        assert!(UserSorting::parse("password").is_none());
    }

    #[test]
    fn over_limit_user_becomes_limited() {
        let (next, stale) =
            status_after_data_limit_change(UserStatus::Active, 10 * GB, Some(5 * GB), 80.0);
        assert_eq!(next, UserStatus::Limited);
        assert!(!stale);
    }

    #[test]
    fn raising_the_limit_reactivates_a_limited_user() {
        let (next, stale) =
            status_after_data_limit_change(UserStatus::Limited, 10 * GB, Some(100 * GB), 80.0);
        assert_eq!(next, UserStatus::Active);
        // 10% of the new limit, well under the 80% notification mark.
        assert!(stale);
    }

    #[test]
    fn usage_near_new_limit_keeps_the_reminder() {
        let (next, stale) =
            status_after_data_limit_change(UserStatus::Active, 9 * GB, Some(10 * GB), 80.0);
        assert_eq!(next, UserStatus::Active);
        assert!(!stale);
    }

    #[test]
    fn removing_the_limit_clears_the_reminder() {
        let (next, stale) = status_after_data_limit_change(UserStatus::Limited, 10 * GB, None, 80.0);
        assert_eq!(next, UserStatus::Active);
        assert!(stale);
    }

    #[test]
    fn expired_and_disabled_users_keep_their_status() {
        for current in [UserStatus::Expired, UserStatus::Disabled] {
            let (next, stale) = status_after_data_limit_change(current, 0, Some(GB), 80.0);
            assert_eq!(next, current);
            assert!(!stale);
        }
    }

    #[test]
    fn on_hold_user_stays_on_hold_under_the_limit() {
        let (next, _) = status_after_data_limit_change(UserStatus::OnHold, GB, Some(10 * GB), 80.0);
        assert_eq!(next, UserStatus::OnHold);
    }

    #[test]
    fn on_hold_user_over_the_limit_is_still_limited() {
        let (next, _) = status_after_data_limit_change(UserStatus::OnHold, 10 * GB, Some(GB), 80.0);
        assert_eq!(next, UserStatus::Limited);
    }

    #[test]
    fn past_expire_marks_the_user_expired() {
        let now = 1_700_000_000;
        let (next, stale) =
            status_after_expire_change(UserStatus::Active, Some(now - 60), now, 3);
        assert_eq!(next, UserStatus::Expired);
        assert!(!stale);
    }

    #[test]
    fn future_expire_revives_an_expired_user() {
        let now = 1_700_000_000;
        let (next, stale) =
            status_after_expire_change(UserStatus::Expired, Some(now + 30 * 86_400), now, 3);
        assert_eq!(next, UserStatus::Active);
        assert!(stale);
    }

    #[test]
    fn imminent_expire_keeps_the_reminder() {
        let now = 1_700_000_000;
        let (next, stale) =
            status_after_expire_change(UserStatus::Active, Some(now + 86_400), now, 3);
        assert_eq!(next, UserStatus::Active);
        assert!(!stale);
    }

    #[test]
    fn expire_change_leaves_other_statuses_alone() {
        for current in [UserStatus::Limited, UserStatus::Disabled, UserStatus::OnHold] {
            let (next, _) = status_after_expire_change(current, None, 1_700_000_000, 3);
            assert_eq!(next, current);
        }
    }

    #[test]
    fn usage_percent_handles_zero_limit() {
        assert_eq!(usage_percent(GB, 0), 0.0);
        assert_eq!(usage_percent(GB, 2 * GB), 50.0);
    }
}
