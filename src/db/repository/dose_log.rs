use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{fmt_datetime, parse_datetime, DatabaseError};
use crate::models::enums::{AdjustmentType, DoseStatus, FrequencyType};
use crate::models::{DoseLog, DoseLogWithSchedule};

/// The 21 dose_log columns in canonical order, each prefixed (e.g.
/// `"ml."` in joins, `""` for single-table selects). Rows selected this
/// way map through [`dose_log_from_row`].
pub fn dose_log_columns(prefix: &str) -> String {
    [
        "log_id",
        "schedule_id",
        "dose_time_id",
        "patient_id",
        "medication_id",
        "scheduled_datetime",
        "actual_datetime",
        "status",
        "dose_sequence",
        "snooze_count",
        "snooze_until",
        "skip_reason",
        "skip_notes",
        "notes",
        "wait_started_at",
        "wait_completed_at",
        "is_adjusted",
        "adjustment_type",
        "adjustment_minutes",
        "adjustment_reason",
        "reminder_sent_at",
    ]
    .map(|c| format!("{prefix}{c}"))
    .join(", ")
}

/// Map a row whose leading columns follow [`dose_log_columns`] order.
pub fn dose_log_from_row(row: &rusqlite::Row<'_>) -> Result<DoseLog, DatabaseError> {
    let status: String = row.get(7)?;
    let adjustment_type: Option<String> = row.get(17)?;

    Ok(DoseLog {
        log_id: row.get(0)?,
        schedule_id: row.get(1)?,
        dose_time_id: row.get(2)?,
        patient_id: row.get(3)?,
        medication_id: row.get(4)?,
        scheduled_datetime: parse_datetime(&row.get::<_, String>(5)?)?,
        actual_datetime: row
            .get::<_, Option<String>>(6)?
            .as_deref()
            .map(parse_datetime)
            .transpose()?,
        status: DoseStatus::from_str(&status)?,
        dose_sequence: row.get(8)?,
        snooze_count: row.get(9)?,
        snooze_until: row
            .get::<_, Option<String>>(10)?
            .as_deref()
            .map(parse_datetime)
            .transpose()?,
        skip_reason: row.get(11)?,
        skip_notes: row.get(12)?,
        notes: row.get(13)?,
        wait_started_at: row
            .get::<_, Option<String>>(14)?
            .as_deref()
            .map(parse_datetime)
            .transpose()?,
        wait_completed_at: row
            .get::<_, Option<String>>(15)?
            .as_deref()
            .map(parse_datetime)
            .transpose()?,
        is_adjusted: row.get::<_, i32>(16)? != 0,
        adjustment_type: adjustment_type
            .as_deref()
            .map(AdjustmentType::from_str)
            .transpose()?,
        adjustment_minutes: row.get(18)?,
        adjustment_reason: row.get(19)?,
        reminder_sent_at: row
            .get::<_, Option<String>>(20)?
            .as_deref()
            .map(parse_datetime)
            .transpose()?,
    })
}

pub fn insert_dose_log(
    conn: &Connection,
    log: &DoseLog,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO dose_logs (
            log_id, schedule_id, dose_time_id, patient_id, medication_id,
            scheduled_datetime, actual_datetime, status, dose_sequence,
            snooze_count, snooze_until, skip_reason, skip_notes, notes,
            wait_started_at, wait_completed_at, is_adjusted,
            adjustment_type, adjustment_minutes, adjustment_reason,
            reminder_sent_at, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                   ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?22)",
        params![
            log.log_id,
            log.schedule_id,
            log.dose_time_id,
            log.patient_id,
            log.medication_id,
            fmt_datetime(log.scheduled_datetime),
            log.actual_datetime.map(fmt_datetime),
            log.status.as_str(),
            log.dose_sequence,
            log.snooze_count,
            log.snooze_until.map(fmt_datetime),
            log.skip_reason,
            log.skip_notes,
            log.notes,
            log.wait_started_at.map(fmt_datetime),
            log.wait_completed_at.map(fmt_datetime),
            log.is_adjusted as i32,
            log.adjustment_type.as_ref().map(|a| a.as_str()),
            log.adjustment_minutes,
            log.adjustment_reason,
            log.reminder_sent_at.map(fmt_datetime),
            fmt_datetime(now),
        ],
    )?;
    Ok(())
}

/// Fetch a dose log (patient-scoped) together with the schedule fields
/// the state machine consults.
pub fn get_dose_log_with_schedule(
    conn: &Connection,
    log_id: &str,
    patient_id: &str,
) -> Result<Option<DoseLogWithSchedule>, DatabaseError> {
    let sql = format!(
        "SELECT {}, ms.frequency_type, ms.interval_hours, ms.times_per_day,
                ms.calculate_from_actual, ms.dose_spacing_minutes
         FROM dose_logs ml
         JOIN medication_schedules ms ON ml.schedule_id = ms.schedule_id
         WHERE ml.log_id = ?1 AND ml.patient_id = ?2",
        dose_log_columns("ml.")
    );

    struct Extra {
        frequency_type: String,
        interval_hours: Option<i64>,
        times_per_day: i64,
        calculate_from_actual: i32,
        dose_spacing_minutes: i64,
    }

    let row = conn
        .query_row(&sql, params![log_id, patient_id], |row| {
            Ok((
                dose_log_from_row(row),
                Extra {
                    frequency_type: row.get(21)?,
                    interval_hours: row.get(22)?,
                    times_per_day: row.get(23)?,
                    calculate_from_actual: row.get(24)?,
                    dose_spacing_minutes: row.get(25)?,
                },
            ))
        })
        .optional()?;

    match row {
        Some((log, extra)) => Ok(Some(DoseLogWithSchedule {
            log: log?,
            frequency_type: FrequencyType::from_str(&extra.frequency_type)?,
            interval_hours: extra.interval_hours,
            times_per_day: extra.times_per_day,
            calculate_from_actual: extra.calculate_from_actual != 0,
            dose_spacing_minutes: extra.dose_spacing_minutes,
        })),
        None => Ok(None),
    }
}

/// A pending DoseLog with every optional field empty, ready for insert.
pub fn new_pending_log(
    log_id: String,
    schedule_id: String,
    dose_time_id: Option<String>,
    patient_id: String,
    medication_id: String,
    scheduled_datetime: NaiveDateTime,
    dose_sequence: i64,
) -> DoseLog {
    DoseLog {
        log_id,
        schedule_id,
        dose_time_id,
        patient_id,
        medication_id,
        scheduled_datetime,
        actual_datetime: None,
        status: DoseStatus::Pending,
        dose_sequence,
        snooze_count: 0,
        snooze_until: None,
        skip_reason: None,
        skip_notes: None,
        notes: None,
        wait_started_at: None,
        wait_completed_at: None,
        is_adjusted: false,
        adjustment_type: None,
        adjustment_minutes: None,
        adjustment_reason: None,
        reminder_sent_at: None,
    }
}
