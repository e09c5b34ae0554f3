//! Dose-Time Generator — materializes concrete dose logs for a
//! schedule over a lookahead window.
//!
//! Fixed-times schedules emit one occurrence per active dose time per
//! day; interval schedules step from the 08:00 anchor by
//! `interval_hours`. Occurrences inside an active sleep window are
//! omitted entirely when `sleep_skip_dose` is set — they are never
//! created, which is distinct from a patient skipping a dose.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::Connection;

use crate::config;
use crate::db::repository::dose_log::{insert_dose_log, new_pending_log};
use crate::db::DatabaseError;
use crate::ids::generate_id;
use crate::models::enums::FrequencyType;
use crate::models::{DoseTime, MedicationSchedule};
use crate::time_slot::is_within_sleep_window;

/// One occurrence the generator decided to materialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDose {
    pub scheduled: NaiveDateTime,
    /// Present for fixed_times occurrences only.
    pub dose_time_id: Option<String>,
    pub dose_sequence: i64,
}

/// Plan the occurrences for one calendar day.
///
/// `dose_times` must already be filtered to active slots and ordered by
/// dose_order; it is ignored for interval schedules. Custom schedules
/// plan nothing.
pub fn planned_doses_for_date(
    schedule: &MedicationSchedule,
    dose_times: &[DoseTime],
    date: NaiveDate,
) -> Vec<PlannedDose> {
    let mut planned = Vec::new();

    match schedule.frequency_type {
        FrequencyType::FixedTimes => {
            for (idx, dose_time) in dose_times.iter().enumerate() {
                let in_sleep = is_within_sleep_window(
                    dose_time.dose_time,
                    schedule.sleep_mode_enabled,
                    schedule.sleep_start_time,
                    schedule.sleep_end_time,
                );
                if schedule.sleep_skip_dose && in_sleep {
                    continue;
                }
                planned.push(PlannedDose {
                    scheduled: date.and_time(dose_time.dose_time),
                    dose_time_id: Some(dose_time.dose_time_id.clone()),
                    dose_sequence: idx as i64 + 1,
                });
            }
        }
        FrequencyType::Interval => {
            let Some(interval_hours) = schedule.interval_hours.filter(|h| *h > 0) else {
                return planned;
            };
            let times_per_day = 24 / interval_hours;
            let mut cursor = date.and_time(config::interval_anchor());

            for i in 0..times_per_day {
                // Only the time-of-day is kept; a step past midnight
                // stays pinned to the generation date.
                let time_of_day = cursor.time();

                let in_sleep = is_within_sleep_window(
                    time_of_day,
                    schedule.sleep_mode_enabled,
                    schedule.sleep_start_time,
                    schedule.sleep_end_time,
                );
                if !(schedule.sleep_skip_dose && in_sleep) {
                    planned.push(PlannedDose {
                        scheduled: date.and_time(time_of_day),
                        dose_time_id: None,
                        dose_sequence: i + 1,
                    });
                }

                // The step continues past omitted occurrences.
                cursor += Duration::hours(interval_hours);
            }
        }
        FrequencyType::Custom => {}
    }

    planned
}

/// Insert pending dose logs for `days` calendar days starting at
/// `start`. Returns how many logs were created.
///
/// Not idempotent — the caller invokes this once, inside the
/// schedule-creation transaction.
pub fn materialize_logs(
    conn: &Connection,
    schedule: &MedicationSchedule,
    dose_times: &[DoseTime],
    start: NaiveDate,
    days: u32,
    now: NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let mut created = 0;

    for day in 0..days {
        let date = start + Duration::days(day as i64);
        for planned in planned_doses_for_date(schedule, dose_times, date) {
            let log = new_pending_log(
                generate_id("LOG"),
                schedule.schedule_id.clone(),
                planned.dose_time_id,
                schedule.patient_id.clone(),
                schedule.medication_id.clone(),
                planned.scheduled,
                planned.dose_sequence,
            );
            insert_dose_log(conn, &log, now)?;
            created += 1;
        }
    }

    tracing::debug!(
        schedule_id = %schedule.schedule_id,
        days,
        created,
        "Materialized dose logs"
    );
    Ok(created)
}
