use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{fmt_date, fmt_datetime, fmt_time, parse_date, parse_time, DatabaseError};
use crate::models::enums::FrequencyType;
use crate::models::{DoseTime, MedicationSchedule};

const SCHEDULE_COLS: &str = "schedule_id, patient_id, prescription_id, medication_id, \
     frequency_type, interval_hours, times_per_day, calculate_from_actual, \
     dose_spacing_minutes, start_date, end_date, sleep_mode_enabled, \
     sleep_start_time, sleep_end_time, sleep_skip_dose, \
     reminder_advance_minutes, is_active, notes";

pub fn insert_schedule(
    conn: &Connection,
    schedule: &MedicationSchedule,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medication_schedules (
            schedule_id, patient_id, prescription_id, medication_id,
            frequency_type, interval_hours, times_per_day, calculate_from_actual,
            dose_spacing_minutes, start_date, end_date, sleep_mode_enabled,
            sleep_start_time, sleep_end_time, sleep_skip_dose,
            reminder_advance_minutes, is_active, notes, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?19)",
        params![
            schedule.schedule_id,
            schedule.patient_id,
            schedule.prescription_id,
            schedule.medication_id,
            schedule.frequency_type.as_str(),
            schedule.interval_hours,
            schedule.times_per_day,
            schedule.calculate_from_actual as i32,
            schedule.dose_spacing_minutes,
            fmt_date(schedule.start_date),
            schedule.end_date.map(fmt_date),
            schedule.sleep_mode_enabled as i32,
            fmt_time(schedule.sleep_start_time),
            fmt_time(schedule.sleep_end_time),
            schedule.sleep_skip_dose as i32,
            schedule.reminder_advance_minutes,
            schedule.is_active as i32,
            schedule.notes,
            fmt_datetime(now),
        ],
    )?;
    Ok(())
}

/// Fetch a schedule scoped to its owning patient (ownership check
/// folded into the lookup).
pub fn get_schedule(
    conn: &Connection,
    schedule_id: &str,
    patient_id: &str,
) -> Result<Option<MedicationSchedule>, DatabaseError> {
    let sql = format!(
        "SELECT {SCHEDULE_COLS} FROM medication_schedules
         WHERE schedule_id = ?1 AND patient_id = ?2"
    );
    let row = conn
        .query_row(&sql, params![schedule_id, patient_id], |row| {
            Ok(schedule_row_from_rusqlite(row))
        })
        .optional()?;

    match row {
        Some(r) => Ok(Some(schedule_from_row(r?)?)),
        None => Ok(None),
    }
}

/// Rewrite all mutable schedule fields (the caller merged the patch).
pub fn update_schedule(
    conn: &Connection,
    schedule: &MedicationSchedule,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE medication_schedules SET
            times_per_day = ?1, dose_spacing_minutes = ?2, end_date = ?3,
            sleep_mode_enabled = ?4, sleep_start_time = ?5, sleep_end_time = ?6,
            sleep_skip_dose = ?7, reminder_advance_minutes = ?8,
            is_active = ?9, notes = ?10, updated_at = ?11
         WHERE schedule_id = ?12",
        params![
            schedule.times_per_day,
            schedule.dose_spacing_minutes,
            schedule.end_date.map(fmt_date),
            schedule.sleep_mode_enabled as i32,
            fmt_time(schedule.sleep_start_time),
            fmt_time(schedule.sleep_end_time),
            schedule.sleep_skip_dose as i32,
            schedule.reminder_advance_minutes,
            schedule.is_active as i32,
            schedule.notes,
            fmt_datetime(now),
            schedule.schedule_id,
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "MedicationSchedule".into(),
            id: schedule.schedule_id.clone(),
        });
    }
    Ok(())
}

/// Delete a schedule; dose times and logs go with it via CASCADE.
pub fn delete_schedule_cascade(conn: &Connection, schedule_id: &str) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM medication_schedules WHERE schedule_id = ?1",
        params![schedule_id],
    )?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "MedicationSchedule".into(),
            id: schedule_id.into(),
        });
    }
    Ok(())
}

pub fn list_schedules(
    conn: &Connection,
    patient_id: &str,
    is_active: Option<bool>,
) -> Result<Vec<MedicationSchedule>, DatabaseError> {
    let mut sql = format!(
        "SELECT {SCHEDULE_COLS} FROM medication_schedules WHERE patient_id = ?1"
    );
    if let Some(active) = is_active {
        sql.push_str(if active { " AND is_active = 1" } else { " AND is_active = 0" });
    }
    sql.push_str(" ORDER BY created_at DESC, schedule_id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![patient_id], |row| Ok(schedule_row_from_rusqlite(row)))?;

    let mut schedules = Vec::new();
    for row in rows {
        schedules.push(schedule_from_row(row??)?);
    }
    Ok(schedules)
}

pub fn insert_dose_time(conn: &Connection, dose_time: &DoseTime) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO dose_times (dose_time_id, schedule_id, dose_time, dose_label, dose_order, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            dose_time.dose_time_id,
            dose_time.schedule_id,
            fmt_time(dose_time.dose_time),
            dose_time.dose_label,
            dose_time.dose_order,
            dose_time.is_active as i32,
        ],
    )?;
    Ok(())
}

/// Dose times for a schedule, ordered by dose_order.
pub fn dose_times_for_schedule(
    conn: &Connection,
    schedule_id: &str,
    active_only: bool,
) -> Result<Vec<DoseTime>, DatabaseError> {
    let mut sql = String::from(
        "SELECT dose_time_id, schedule_id, dose_time, dose_label, dose_order, is_active
         FROM dose_times WHERE schedule_id = ?1",
    );
    if active_only {
        sql.push_str(" AND is_active = 1");
    }
    sql.push_str(" ORDER BY dose_order");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![schedule_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, i64>(4)?,
            row.get::<_, i32>(5)?,
        ))
    })?;

    let mut times = Vec::new();
    for row in rows {
        let (id, sched, time, label, order, active) = row?;
        times.push(DoseTime {
            dose_time_id: id,
            schedule_id: sched,
            dose_time: parse_time(&time)?,
            dose_label: label,
            dose_order: order,
            is_active: active != 0,
        });
    }
    Ok(times)
}

/// Rewrite a dose time's time-of-day (permanent adjustment path).
pub fn update_dose_time(
    conn: &Connection,
    dose_time_id: &str,
    new_time: chrono::NaiveTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE dose_times SET dose_time = ?1 WHERE dose_time_id = ?2",
        params![fmt_time(new_time), dose_time_id],
    )?;
    Ok(())
}

// Internal row type for MedicationSchedule mapping
struct ScheduleRow {
    schedule_id: String,
    patient_id: String,
    prescription_id: Option<String>,
    medication_id: String,
    frequency_type: String,
    interval_hours: Option<i64>,
    times_per_day: i64,
    calculate_from_actual: i32,
    dose_spacing_minutes: i64,
    start_date: String,
    end_date: Option<String>,
    sleep_mode_enabled: i32,
    sleep_start_time: String,
    sleep_end_time: String,
    sleep_skip_dose: i32,
    reminder_advance_minutes: i64,
    is_active: i32,
    notes: Option<String>,
}

fn schedule_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<ScheduleRow, rusqlite::Error> {
    Ok(ScheduleRow {
        schedule_id: row.get(0)?,
        patient_id: row.get(1)?,
        prescription_id: row.get(2)?,
        medication_id: row.get(3)?,
        frequency_type: row.get(4)?,
        interval_hours: row.get(5)?,
        times_per_day: row.get(6)?,
        calculate_from_actual: row.get(7)?,
        dose_spacing_minutes: row.get(8)?,
        start_date: row.get(9)?,
        end_date: row.get(10)?,
        sleep_mode_enabled: row.get(11)?,
        sleep_start_time: row.get(12)?,
        sleep_end_time: row.get(13)?,
        sleep_skip_dose: row.get(14)?,
        reminder_advance_minutes: row.get(15)?,
        is_active: row.get(16)?,
        notes: row.get(17)?,
    })
}

fn schedule_from_row(row: ScheduleRow) -> Result<MedicationSchedule, DatabaseError> {
    Ok(MedicationSchedule {
        schedule_id: row.schedule_id,
        patient_id: row.patient_id,
        prescription_id: row.prescription_id,
        medication_id: row.medication_id,
        frequency_type: FrequencyType::from_str(&row.frequency_type)?,
        interval_hours: row.interval_hours,
        times_per_day: row.times_per_day,
        calculate_from_actual: row.calculate_from_actual != 0,
        dose_spacing_minutes: row.dose_spacing_minutes,
        start_date: parse_date(&row.start_date)?,
        end_date: row.end_date.as_deref().map(parse_date).transpose()?,
        sleep_mode_enabled: row.sleep_mode_enabled != 0,
        sleep_start_time: parse_time(&row.sleep_start_time)?,
        sleep_end_time: parse_time(&row.sleep_end_time)?,
        sleep_skip_dose: row.sleep_skip_dose != 0,
        reminder_advance_minutes: row.reminder_advance_minutes,
        is_active: row.is_active != 0,
        notes: row.notes,
    })
}
