use std::env;

pub const DEFAULT_NOTIFY_DAYS_LEFT: i64 = 3;
pub const DEFAULT_NOTIFY_REACHED_USAGE_PERCENT: f64 = 80.0;

/// Thresholds that decide when a pending notification reminder becomes stale.
#[derive(Debug, Clone, Copy)]
pub struct NotificationThresholds {
    pub days_left: i64,
    pub reached_usage_percent: f64,
}

impl Default for NotificationThresholds {
    fn default() -> Self {
        Self {
            days_left: DEFAULT_NOTIFY_DAYS_LEFT,
            reached_usage_percent: DEFAULT_NOTIFY_REACHED_USAGE_PERCENT,
        }
    }
}

impl NotificationThresholds {
    pub fn from_env() -> Self {
        let days_left = env::var("NOTIFY_DAYS_LEFT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_NOTIFY_DAYS_LEFT);
        let reached_usage_percent = env::var("NOTIFY_REACHED_USAGE_PERCENT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_NOTIFY_REACHED_USAGE_PERCENT);

        Self {
            days_left,
            reached_usage_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_panel_config() {
        let t = NotificationThresholds::default();
        assert_eq!(t.days_left, 3);
        assert_eq!(t.reached_usage_percent, 80.0);
    }
}
