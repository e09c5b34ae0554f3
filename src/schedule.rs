//! Schedule lifecycle: create (with log materialization), partial
//! update, sleep-mode toggle, listing and cascade delete.
//!
//! Every operation is scoped to the requesting patient; ownership is
//! folded into the lookup so a foreign schedule surfaces as not-found.

use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::config;
use crate::db::repository::medication::medication_name;
use crate::db::repository::schedule as repo;
use crate::error::ReminderError;
use crate::generator::materialize_logs;
use crate::ids::generate_id;
use crate::models::enums::FrequencyType;
use crate::models::{
    DoseTime, MedicationSchedule, NewSchedule, SchedulePatch, ScheduleWithTimes,
};

fn validate(def: &NewSchedule) -> Result<(), ReminderError> {
    match def.frequency_type {
        FrequencyType::Interval => {
            if !def.interval_hours.is_some_and(|h| h > 0) {
                return Err(ReminderError::Validation(
                    "interval schedules require interval_hours > 0".into(),
                ));
            }
        }
        FrequencyType::FixedTimes => {
            if def.dose_times.is_empty() {
                return Err(ReminderError::Validation(
                    "fixed_times schedules require at least one dose time".into(),
                ));
            }
        }
        FrequencyType::Custom => {}
    }
    if def.times_per_day < 1 {
        return Err(ReminderError::Validation("times_per_day must be >= 1".into()));
    }
    Ok(())
}

/// Create a schedule and materialize its lookahead window of pending
/// dose logs, atomically. Returns the new schedule_id.
pub fn create_schedule(
    conn: &Connection,
    patient_id: &str,
    def: &NewSchedule,
    now: NaiveDateTime,
) -> Result<String, ReminderError> {
    validate(def)?;

    let schedule = MedicationSchedule {
        schedule_id: generate_id("SCH"),
        patient_id: patient_id.to_string(),
        prescription_id: def.prescription_id.clone(),
        medication_id: def.medication_id.clone(),
        frequency_type: def.frequency_type.clone(),
        interval_hours: def.interval_hours,
        times_per_day: def.times_per_day,
        calculate_from_actual: def.calculate_from_actual,
        dose_spacing_minutes: def.dose_spacing_minutes,
        start_date: def.start_date,
        end_date: def.end_date,
        sleep_mode_enabled: def.sleep_mode_enabled,
        sleep_start_time: def.sleep_start_time,
        sleep_end_time: def.sleep_end_time,
        sleep_skip_dose: def.sleep_skip_dose,
        reminder_advance_minutes: def.reminder_advance_minutes,
        is_active: true,
        notes: def.notes.clone(),
    };

    let mut dose_times = Vec::with_capacity(def.dose_times.len());
    for (idx, new_time) in def.dose_times.iter().enumerate() {
        let order = idx as i64 + 1;
        dose_times.push(DoseTime {
            dose_time_id: generate_id("DT"),
            schedule_id: schedule.schedule_id.clone(),
            dose_time: new_time.dose_time,
            dose_label: new_time
                .dose_label
                .clone()
                .unwrap_or_else(|| format!("Dose {order}")),
            dose_order: order,
            is_active: true,
        });
    }

    let tx = conn.unchecked_transaction()?;
    repo::insert_schedule(&tx, &schedule, now)?;
    for dose_time in &dose_times {
        repo::insert_dose_time(&tx, dose_time)?;
    }
    let created = materialize_logs(
        &tx,
        &schedule,
        &dose_times,
        def.start_date,
        config::DEFAULT_LOOKAHEAD_DAYS,
        now,
    )?;
    tx.commit()?;

    tracing::info!(
        patient_id,
        schedule_id = %schedule.schedule_id,
        frequency = schedule.frequency_type.as_str(),
        logs_created = created,
        "Created medication schedule"
    );
    Ok(schedule.schedule_id)
}

/// Apply a partial patch; fields absent from the patch keep their prior
/// value.
pub fn update_schedule(
    conn: &Connection,
    patient_id: &str,
    schedule_id: &str,
    patch: &SchedulePatch,
    now: NaiveDateTime,
) -> Result<(), ReminderError> {
    let mut schedule = repo::get_schedule(conn, schedule_id, patient_id)?
        .ok_or_else(|| ReminderError::not_found("schedule", schedule_id))?;

    if let Some(v) = patch.times_per_day {
        schedule.times_per_day = v;
    }
    if let Some(v) = patch.dose_spacing_minutes {
        schedule.dose_spacing_minutes = v;
    }
    if let Some(v) = patch.end_date {
        schedule.end_date = Some(v);
    }
    if let Some(v) = patch.sleep_mode_enabled {
        schedule.sleep_mode_enabled = v;
    }
    if let Some(v) = patch.sleep_start_time {
        schedule.sleep_start_time = v;
    }
    if let Some(v) = patch.sleep_end_time {
        schedule.sleep_end_time = v;
    }
    if let Some(v) = patch.sleep_skip_dose {
        schedule.sleep_skip_dose = v;
    }
    if let Some(v) = patch.reminder_advance_minutes {
        schedule.reminder_advance_minutes = v;
    }
    if let Some(v) = patch.is_active {
        schedule.is_active = v;
    }
    if let Some(v) = &patch.notes {
        schedule.notes = Some(v.clone());
    }

    repo::update_schedule(conn, &schedule, now)?;
    tracing::info!(patient_id, schedule_id, "Updated medication schedule");
    Ok(())
}

/// Direct sleep-window update on a schedule.
pub fn update_sleep_mode(
    conn: &Connection,
    patient_id: &str,
    schedule_id: &str,
    enabled: bool,
    start: chrono::NaiveTime,
    end: chrono::NaiveTime,
    skip_dose: bool,
    now: NaiveDateTime,
) -> Result<(), ReminderError> {
    let patch = SchedulePatch {
        sleep_mode_enabled: Some(enabled),
        sleep_start_time: Some(start),
        sleep_end_time: Some(end),
        sleep_skip_dose: Some(skip_dose),
        ..SchedulePatch::default()
    };
    update_schedule(conn, patient_id, schedule_id, &patch, now)
}

/// A patient's schedules with their medication names and dose times,
/// newest first.
pub fn get_schedules(
    conn: &Connection,
    patient_id: &str,
    is_active: Option<bool>,
) -> Result<Vec<ScheduleWithTimes>, ReminderError> {
    let schedules = repo::list_schedules(conn, patient_id, is_active)?;

    let mut out = Vec::with_capacity(schedules.len());
    for schedule in schedules {
        let name = medication_name(conn, &schedule.medication_id)?
            .unwrap_or_else(|| schedule.medication_id.clone());
        let dose_times = repo::dose_times_for_schedule(conn, &schedule.schedule_id, false)?;
        out.push(ScheduleWithTimes {
            schedule,
            medication_name: name,
            dose_times,
        });
    }
    Ok(out)
}

/// Delete a schedule; its dose times and logs are removed with it.
pub fn delete_schedule(
    conn: &Connection,
    patient_id: &str,
    schedule_id: &str,
) -> Result<(), ReminderError> {
    repo::get_schedule(conn, schedule_id, patient_id)?
        .ok_or_else(|| ReminderError::not_found("schedule", schedule_id))?;
    repo::delete_schedule_cascade(conn, schedule_id)?;
    tracing::info!(patient_id, schedule_id, "Deleted medication schedule");
    Ok(())
}
