use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::enums::FrequencyType;

/// One active prescription-driven reminder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationSchedule {
    pub schedule_id: String,
    pub patient_id: String,
    pub prescription_id: Option<String>,
    pub medication_id: String,
    pub frequency_type: FrequencyType,
    /// Required (and > 0) iff `frequency_type` is `Interval`.
    pub interval_hours: Option<i64>,
    pub times_per_day: i64,
    /// Re-anchor interval chaining to the actually-confirmed time.
    pub calculate_from_actual: bool,
    pub dose_spacing_minutes: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub sleep_mode_enabled: bool,
    pub sleep_start_time: NaiveTime,
    pub sleep_end_time: NaiveTime,
    /// Omit generated doses that fall inside the sleep window.
    pub sleep_skip_dose: bool,
    pub reminder_advance_minutes: i64,
    pub is_active: bool,
    pub notes: Option<String>,
}

/// A named time-of-day slot belonging to a fixed_times schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoseTime {
    pub dose_time_id: String,
    pub schedule_id: String,
    pub dose_time: NaiveTime,
    pub dose_label: String,
    pub dose_order: i64,
    pub is_active: bool,
}

/// Input for schedule creation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSchedule {
    pub prescription_id: Option<String>,
    pub medication_id: String,
    pub frequency_type: FrequencyType,
    pub interval_hours: Option<i64>,
    pub times_per_day: i64,
    pub dose_times: Vec<NewDoseTime>,
    pub calculate_from_actual: bool,
    pub dose_spacing_minutes: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub sleep_mode_enabled: bool,
    pub sleep_start_time: NaiveTime,
    pub sleep_end_time: NaiveTime,
    pub sleep_skip_dose: bool,
    pub reminder_advance_minutes: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDoseTime {
    pub dose_time: NaiveTime,
    /// Defaults to "Dose N" when absent.
    pub dose_label: Option<String>,
}

/// Partial patch for schedule updates. `None` fields keep their prior
/// value (merge-by-presence); no field can be cleared through a patch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulePatch {
    pub times_per_day: Option<i64>,
    pub dose_spacing_minutes: Option<i64>,
    pub end_date: Option<NaiveDate>,
    pub sleep_mode_enabled: Option<bool>,
    pub sleep_start_time: Option<NaiveTime>,
    pub sleep_end_time: Option<NaiveTime>,
    pub sleep_skip_dose: Option<bool>,
    pub reminder_advance_minutes: Option<i64>,
    pub is_active: Option<bool>,
    pub notes: Option<String>,
}

/// A schedule with its medication name and ordered dose times, for the
/// schedule list view.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleWithTimes {
    pub schedule: MedicationSchedule,
    pub medication_name: String,
    pub dose_times: Vec<DoseTime>,
}
