use chrono::NaiveTime;

/// Application-level constants
pub const APP_NAME: &str = "Adhera";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Storage formats for chrono values (TEXT columns).
pub const DATE_FMT: &str = "%Y-%m-%d";
pub const TIME_FMT: &str = "%H:%M:%S";
pub const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// How many calendar days of dose logs are materialized at schedule
/// creation.
pub const DEFAULT_LOOKAHEAD_DAYS: u32 = 7;

/// Default lookahead for the upcoming-doses view.
pub const DEFAULT_UPCOMING_HOURS: i64 = 24;

/// Interval-mode schedules anchor their first daily dose here,
/// regardless of the schedule's start time-of-day.
pub fn interval_anchor() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).expect("valid anchor time")
}

/// Notification-settings defaults, used when a patient's row is
/// created lazily on first read.
pub const DEFAULT_REMIND_BEFORE_MINUTES: i64 = 5;
pub const DEFAULT_SNOOZE_DURATION_MINUTES: i64 = 10;
pub const DEFAULT_MAX_SNOOZE_COUNT: i64 = 2;

/// Default log filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "adhera=info"
}
