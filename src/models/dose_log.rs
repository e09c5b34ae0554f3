use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::enums::{AdjustmentType, DoseStatus, FrequencyType};

/// One concrete, dated occurrence of a dose.
///
/// `scheduled_datetime` is immutable except through the adjustment
/// engine; `completed` is a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoseLog {
    pub log_id: String,
    pub schedule_id: String,
    /// Absent for interval-mode occurrences.
    pub dose_time_id: Option<String>,
    pub patient_id: String,
    pub medication_id: String,
    pub scheduled_datetime: NaiveDateTime,
    pub actual_datetime: Option<NaiveDateTime>,
    pub status: DoseStatus,
    pub dose_sequence: i64,
    pub snooze_count: i64,
    pub snooze_until: Option<NaiveDateTime>,
    pub skip_reason: Option<String>,
    pub skip_notes: Option<String>,
    pub notes: Option<String>,
    /// Post-dose wait window for spaced multi-dose sequences (UI only).
    pub wait_started_at: Option<NaiveDateTime>,
    pub wait_completed_at: Option<NaiveDateTime>,
    pub is_adjusted: bool,
    pub adjustment_type: Option<AdjustmentType>,
    pub adjustment_minutes: Option<i64>,
    pub adjustment_reason: Option<String>,
    pub reminder_sent_at: Option<NaiveDateTime>,
}

/// A dose log joined with the schedule context the state machine needs.
#[derive(Debug, Clone)]
pub struct DoseLogWithSchedule {
    pub log: DoseLog,
    pub frequency_type: FrequencyType,
    pub interval_hours: Option<i64>,
    pub times_per_day: i64,
    pub calculate_from_actual: bool,
    pub dose_spacing_minutes: i64,
}

/// Row of the upcoming-doses view.
#[derive(Debug, Clone, Serialize)]
pub struct UpcomingDose {
    pub log_id: String,
    pub schedule_id: String,
    pub medication_id: String,
    pub medication_name: String,
    pub scheduled_datetime: NaiveDateTime,
    pub status: DoseStatus,
    pub dose_sequence: i64,
    pub snooze_count: i64,
    pub snooze_until: Option<NaiveDateTime>,
    pub frequency_type: FrequencyType,
    pub dose_spacing_minutes: i64,
    pub dose_label: Option<String>,
    pub dose_time: Option<NaiveTime>,
}

/// Result of a successful dose confirmation.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedDose {
    pub log_id: String,
    pub actual_datetime: NaiveDateTime,
    /// ID of the chained follow-up log, when one was generated.
    pub next_log_id: Option<String>,
}

/// Result of a successful snooze.
#[derive(Debug, Clone, Serialize)]
pub struct SnoozedDose {
    pub log_id: String,
    pub snooze_until: NaiveDateTime,
    pub snooze_count: i64,
}
