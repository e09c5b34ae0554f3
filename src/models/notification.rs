use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Per-patient push delivery preferences and snooze limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub setting_id: String,
    pub patient_id: String,
    pub push_enabled: bool,
    pub sound_enabled: bool,
    pub vibration_enabled: bool,
    pub remind_before_minutes: i64,
    pub snooze_enabled: bool,
    pub snooze_duration_minutes: i64,
    pub max_snooze_count: i64,
    pub quiet_hours_enabled: bool,
    pub quiet_hours_start: Option<NaiveTime>,
    pub quiet_hours_end: Option<NaiveTime>,
}

/// Partial patch for notification settings (merge-by-presence).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationSettingsPatch {
    pub push_enabled: Option<bool>,
    pub sound_enabled: Option<bool>,
    pub vibration_enabled: Option<bool>,
    pub remind_before_minutes: Option<i64>,
    pub snooze_enabled: Option<bool>,
    pub snooze_duration_minutes: Option<i64>,
    pub max_snooze_count: Option<i64>,
    pub quiet_hours_enabled: Option<bool>,
    pub quiet_hours_start: Option<NaiveTime>,
    pub quiet_hours_end: Option<NaiveTime>,
}

/// Audit record of a reminder handed to the push sender.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationRecord {
    pub notification_id: String,
    pub patient_id: String,
    pub notification_type: String,
    pub title: String,
    pub body: String,
    pub sent_at: NaiveDateTime,
    pub delivered: bool,
}
