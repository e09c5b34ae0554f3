//! Dose Log State Machine.
//!
//! pending → completed | skipped | snoozed; snoozed → completed |
//! skipped | snoozed (bounded). `completed` is terminal: no later call
//! may change it. Every mutation runs inside one transaction so a
//! chained follow-up insert is never observable without its confirm.

use chrono::{Duration, NaiveDateTime};
use rusqlite::{params, Connection};

use crate::config;
use crate::db::repository::dose_log::{
    dose_log_columns, get_dose_log_with_schedule, insert_dose_log, new_pending_log,
};
use crate::db::{fmt_datetime, parse_datetime, parse_time, DatabaseError};
use crate::error::ReminderError;
use crate::ids::generate_id;
use crate::models::enums::{DoseStatus, FrequencyType};
use crate::models::{ConfirmedDose, DoseLogWithSchedule, SnoozedDose, UpcomingDose};
use crate::reminders::get_notification_settings;

fn load_log(
    conn: &Connection,
    log_id: &str,
    patient_id: &str,
) -> Result<DoseLogWithSchedule, ReminderError> {
    get_dose_log_with_schedule(conn, log_id, patient_id)?
        .ok_or_else(|| ReminderError::not_found("dose log", log_id))
}

fn reject_terminal(entry: &DoseLogWithSchedule) -> Result<(), ReminderError> {
    if entry.log.status == DoseStatus::Completed {
        return Err(ReminderError::InvalidState {
            id: entry.log.log_id.clone(),
            status: entry.log.status.as_str().into(),
        });
    }
    Ok(())
}

/// Confirm a dose as taken.
///
/// Records the actual time (defaulting to `now`), the post-dose wait
/// window for spaced multi-dose sequences, and — when the schedule
/// chains from actual intake — generates the next interval occurrence.
pub fn confirm_dose(
    conn: &Connection,
    patient_id: &str,
    log_id: &str,
    actual_datetime: Option<NaiveDateTime>,
    notes: Option<&str>,
    now: NaiveDateTime,
) -> Result<ConfirmedDose, ReminderError> {
    let tx = conn.unchecked_transaction()?;
    let entry = load_log(&tx, log_id, patient_id)?;
    reject_terminal(&entry)?;

    let actual = actual_datetime.unwrap_or(now);

    // Wait window for spaced multi-dose sequences (surface-only, no
    // gating attached).
    let (wait_start, wait_end) =
        if entry.log.dose_sequence > 1 && entry.dose_spacing_minutes > 0 {
            (
                Some(actual),
                Some(actual + Duration::minutes(entry.dose_spacing_minutes)),
            )
        } else {
            (None, None)
        };

    tx.execute(
        "UPDATE dose_logs SET
            status = 'completed', actual_datetime = ?1, notes = COALESCE(?2, notes),
            wait_started_at = ?3, wait_completed_at = ?4, updated_at = ?5
         WHERE log_id = ?6",
        params![
            fmt_datetime(actual),
            notes,
            wait_start.map(fmt_datetime),
            wait_end.map(fmt_datetime),
            fmt_datetime(now),
            log_id,
        ],
    )?;

    // Chain the next interval dose from the actually-confirmed time
    // when this was the last dose of the day's sequence.
    let mut next_log_id = None;
    if entry.calculate_from_actual
        && entry.frequency_type == FrequencyType::Interval
        && entry.log.dose_sequence == entry.times_per_day
    {
        if let Some(hours) = entry.interval_hours.filter(|h| *h > 0) {
            let next = new_pending_log(
                generate_id("LOG"),
                entry.log.schedule_id.clone(),
                None,
                entry.log.patient_id.clone(),
                entry.log.medication_id.clone(),
                actual + Duration::hours(hours),
                1,
            );
            insert_dose_log(&tx, &next, now)?;
            next_log_id = Some(next.log_id);
        }
    }

    tx.commit()?;
    tracing::info!(
        patient_id,
        log_id,
        actual = %actual,
        chained = next_log_id.is_some(),
        "Confirmed dose"
    );
    Ok(ConfirmedDose {
        log_id: log_id.to_string(),
        actual_datetime: actual,
        next_log_id,
    })
}

/// Mark a dose as skipped with a reason. Rejected once completed.
pub fn skip_dose(
    conn: &Connection,
    patient_id: &str,
    log_id: &str,
    reason: &str,
    notes: Option<&str>,
    now: NaiveDateTime,
) -> Result<(), ReminderError> {
    let tx = conn.unchecked_transaction()?;
    let entry = load_log(&tx, log_id, patient_id)?;
    reject_terminal(&entry)?;

    tx.execute(
        "UPDATE dose_logs SET
            status = 'skipped', skip_reason = ?1, skip_notes = ?2, updated_at = ?3
         WHERE log_id = ?4",
        params![reason, notes, fmt_datetime(now), log_id],
    )?;
    tx.commit()?;

    tracing::info!(patient_id, log_id, reason, "Skipped dose");
    Ok(())
}

/// Defer a dose's reminder. Bounded by the patient's
/// `max_snooze_count`; the duration defaults to their configured
/// snooze length.
pub fn snooze_dose(
    conn: &Connection,
    patient_id: &str,
    log_id: &str,
    minutes: Option<i64>,
    now: NaiveDateTime,
) -> Result<SnoozedDose, ReminderError> {
    let tx = conn.unchecked_transaction()?;
    let entry = load_log(&tx, log_id, patient_id)?;
    if entry.log.status != DoseStatus::Pending && entry.log.status != DoseStatus::Snoozed {
        return Err(ReminderError::InvalidState {
            id: entry.log.log_id,
            status: entry.log.status.as_str().into(),
        });
    }

    let settings = get_notification_settings(&tx, patient_id, now)?;
    if entry.log.snooze_count >= settings.max_snooze_count {
        return Err(ReminderError::SnoozeLimitExceeded {
            max: settings.max_snooze_count,
        });
    }

    let minutes = minutes.unwrap_or(settings.snooze_duration_minutes);
    let snooze_until = now + Duration::minutes(minutes);
    let snooze_count = entry.log.snooze_count + 1;

    tx.execute(
        "UPDATE dose_logs SET
            status = 'snoozed', snooze_until = ?1, snooze_count = ?2, updated_at = ?3
         WHERE log_id = ?4",
        params![
            fmt_datetime(snooze_until),
            snooze_count,
            fmt_datetime(now),
            log_id,
        ],
    )?;
    tx.commit()?;

    tracing::info!(patient_id, log_id, snooze_count, "Snoozed dose");
    Ok(SnoozedDose {
        log_id: log_id.to_string(),
        snooze_until,
        snooze_count,
    })
}

/// Pending and snoozed doses due up to `hours` (default 24) past `now`,
/// soonest first. Overdue doses are included.
pub fn get_upcoming_doses(
    conn: &Connection,
    patient_id: &str,
    now: NaiveDateTime,
    hours: Option<i64>,
) -> Result<Vec<UpcomingDose>, ReminderError> {
    let hours = hours.unwrap_or(config::DEFAULT_UPCOMING_HOURS);
    let horizon = now + Duration::hours(hours);

    let sql = format!(
        "SELECT {}, m.name, ms.frequency_type, ms.dose_spacing_minutes,
                dt.dose_label, dt.dose_time
         FROM dose_logs ml
         JOIN medication_schedules ms ON ml.schedule_id = ms.schedule_id
         JOIN medications m ON ml.medication_id = m.medication_id
         LEFT JOIN dose_times dt ON ml.dose_time_id = dt.dose_time_id
         WHERE ml.patient_id = ?1
           AND ml.status IN ('pending', 'snoozed')
           AND ml.scheduled_datetime <= ?2
         ORDER BY ml.scheduled_datetime",
        dose_log_columns("ml.")
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![patient_id, fmt_datetime(horizon)], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(7)?,
            row.get::<_, i64>(8)?,
            row.get::<_, i64>(9)?,
            row.get::<_, Option<String>>(10)?,
            row.get::<_, String>(21)?,
            row.get::<_, String>(22)?,
            row.get::<_, i64>(23)?,
            row.get::<_, Option<String>>(24)?,
            row.get::<_, Option<String>>(25)?,
        ))
    })?;

    let mut upcoming = Vec::new();
    for row in rows {
        let (
            log_id,
            schedule_id,
            medication_id,
            scheduled,
            status,
            dose_sequence,
            snooze_count,
            snooze_until,
            medication_name,
            frequency_type,
            dose_spacing_minutes,
            dose_label,
            dose_time,
        ) = row.map_err(DatabaseError::Sqlite)?;

        upcoming.push(UpcomingDose {
            log_id,
            schedule_id,
            medication_id,
            medication_name,
            scheduled_datetime: parse_datetime(&scheduled)?,
            status: status.parse()?,
            dose_sequence,
            snooze_count,
            snooze_until: snooze_until.as_deref().map(parse_datetime).transpose()?,
            frequency_type: frequency_type.parse()?,
            dose_spacing_minutes,
            dose_label,
            dose_time: dose_time.as_deref().map(parse_time).transpose()?,
        });
    }
    Ok(upcoming)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::medication::insert_medication;
    use crate::db::repository::schedule::insert_schedule;
    use crate::db::sqlite::open_memory_database;
    use crate::models::MedicationSchedule;
    use chrono::{NaiveDate, NaiveTime};

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn dt(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    struct Setup {
        frequency_type: FrequencyType,
        interval_hours: Option<i64>,
        times_per_day: i64,
        calculate_from_actual: bool,
        dose_spacing_minutes: i64,
    }

    impl Default for Setup {
        fn default() -> Self {
            Setup {
                frequency_type: FrequencyType::FixedTimes,
                interval_hours: None,
                times_per_day: 1,
                calculate_from_actual: false,
                dose_spacing_minutes: 0,
            }
        }
    }

    fn seed(conn: &Connection, setup: Setup) {
        insert_medication(conn, "MED1", "Timolol", None).unwrap();
        let schedule = MedicationSchedule {
            schedule_id: "S1".into(),
            patient_id: "PAT1".into(),
            prescription_id: None,
            medication_id: "MED1".into(),
            frequency_type: setup.frequency_type,
            interval_hours: setup.interval_hours,
            times_per_day: setup.times_per_day,
            calculate_from_actual: setup.calculate_from_actual,
            dose_spacing_minutes: setup.dose_spacing_minutes,
            start_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            end_date: None,
            sleep_mode_enabled: false,
            sleep_start_time: hm(22, 0),
            sleep_end_time: hm(6, 0),
            sleep_skip_dose: false,
            reminder_advance_minutes: 5,
            is_active: true,
            notes: None,
        };
        insert_schedule(conn, &schedule, dt(7, 0)).unwrap();
    }

    fn seed_log(conn: &Connection, log_id: &str, scheduled: NaiveDateTime, sequence: i64) {
        let log = new_pending_log(
            log_id.into(),
            "S1".into(),
            None,
            "PAT1".into(),
            "MED1".into(),
            scheduled,
            sequence,
        );
        insert_dose_log(conn, &log, dt(7, 0)).unwrap();
    }

    #[test]
    fn confirm_defaults_actual_to_now() {
        let conn = open_memory_database().unwrap();
        seed(&conn, Setup::default());
        seed_log(&conn, "L1", dt(8, 0), 1);

        let confirmed = confirm_dose(&conn, "PAT1", "L1", None, None, dt(8, 3)).unwrap();
        assert_eq!(confirmed.actual_datetime, dt(8, 3));
        assert!(confirmed.next_log_id.is_none());

        let entry = get_dose_log_with_schedule(&conn, "L1", "PAT1")
            .unwrap()
            .unwrap();
        assert_eq!(entry.log.status, DoseStatus::Completed);
        assert_eq!(entry.log.actual_datetime, Some(dt(8, 3)));
    }

    #[test]
    fn double_confirm_is_rejected() {
        let conn = open_memory_database().unwrap();
        seed(&conn, Setup::default());
        seed_log(&conn, "L1", dt(8, 0), 1);

        confirm_dose(&conn, "PAT1", "L1", None, None, dt(8, 0)).unwrap();
        let err = confirm_dose(&conn, "PAT1", "L1", None, None, dt(8, 5)).unwrap_err();
        assert!(matches!(err, ReminderError::InvalidState { .. }));
    }

    #[test]
    fn confirm_records_wait_window_for_spaced_sequences() {
        let conn = open_memory_database().unwrap();
        seed(
            &conn,
            Setup {
                times_per_day: 2,
                dose_spacing_minutes: 10,
                ..Setup::default()
            },
        );
        seed_log(&conn, "L2", dt(8, 5), 2);

        confirm_dose(&conn, "PAT1", "L2", Some(dt(8, 6)), None, dt(8, 6)).unwrap();
        let entry = get_dose_log_with_schedule(&conn, "L2", "PAT1")
            .unwrap()
            .unwrap();
        assert_eq!(entry.log.wait_started_at, Some(dt(8, 6)));
        assert_eq!(entry.log.wait_completed_at, Some(dt(8, 16)));
    }

    #[test]
    fn confirm_chains_next_interval_dose_from_actual() {
        let conn = open_memory_database().unwrap();
        seed(
            &conn,
            Setup {
                frequency_type: FrequencyType::Interval,
                interval_hours: Some(8),
                times_per_day: 2,
                calculate_from_actual: true,
                dose_spacing_minutes: 10,
            },
        );
        seed_log(&conn, "L2", dt(9, 45), 2);

        let confirmed =
            confirm_dose(&conn, "PAT1", "L2", Some(dt(10, 0)), None, dt(10, 0)).unwrap();
        let next_id = confirmed.next_log_id.unwrap();

        let next = get_dose_log_with_schedule(&conn, &next_id, "PAT1")
            .unwrap()
            .unwrap();
        assert_eq!(next.log.status, DoseStatus::Pending);
        assert_eq!(next.log.scheduled_datetime, dt(18, 0));
        assert_eq!(next.log.dose_sequence, 1);
    }

    #[test]
    fn confirm_does_not_chain_mid_sequence() {
        let conn = open_memory_database().unwrap();
        seed(
            &conn,
            Setup {
                frequency_type: FrequencyType::Interval,
                interval_hours: Some(8),
                times_per_day: 2,
                calculate_from_actual: true,
                ..Setup::default()
            },
        );
        seed_log(&conn, "L1", dt(8, 0), 1);

        let confirmed = confirm_dose(&conn, "PAT1", "L1", None, None, dt(8, 0)).unwrap();
        assert!(confirmed.next_log_id.is_none());
    }

    #[test]
    fn skip_sets_reason_and_rejects_completed() {
        let conn = open_memory_database().unwrap();
        seed(&conn, Setup::default());
        seed_log(&conn, "L1", dt(8, 0), 1);
        seed_log(&conn, "L2", dt(20, 0), 1);

        skip_dose(&conn, "PAT1", "L1", "nausea", Some("felt unwell"), dt(8, 1)).unwrap();
        let entry = get_dose_log_with_schedule(&conn, "L1", "PAT1")
            .unwrap()
            .unwrap();
        assert_eq!(entry.log.status, DoseStatus::Skipped);
        assert_eq!(entry.log.skip_reason.as_deref(), Some("nausea"));

        confirm_dose(&conn, "PAT1", "L2", None, None, dt(20, 0)).unwrap();
        let err = skip_dose(&conn, "PAT1", "L2", "late", None, dt(20, 5)).unwrap_err();
        assert!(matches!(err, ReminderError::InvalidState { .. }));
    }

    #[test]
    fn snooze_respects_the_configured_limit() {
        let conn = open_memory_database().unwrap();
        seed(&conn, Setup::default());
        seed_log(&conn, "L1", dt(8, 0), 1);

        // Default settings allow two snoozes of 10 minutes.
        let first = snooze_dose(&conn, "PAT1", "L1", None, dt(8, 0)).unwrap();
        assert_eq!(first.snooze_count, 1);
        assert_eq!(first.snooze_until, dt(8, 10));

        let second = snooze_dose(&conn, "PAT1", "L1", Some(15), dt(8, 10)).unwrap();
        assert_eq!(second.snooze_count, 2);
        assert_eq!(second.snooze_until, dt(8, 25));

        let err = snooze_dose(&conn, "PAT1", "L1", None, dt(8, 25)).unwrap_err();
        assert!(matches!(err, ReminderError::SnoozeLimitExceeded { max: 2 }));
    }

    #[test]
    fn snooze_rejects_terminal_logs() {
        let conn = open_memory_database().unwrap();
        seed(&conn, Setup::default());
        seed_log(&conn, "L1", dt(8, 0), 1);
        skip_dose(&conn, "PAT1", "L1", "nausea", None, dt(8, 0)).unwrap();

        let err = snooze_dose(&conn, "PAT1", "L1", None, dt(8, 5)).unwrap_err();
        assert!(matches!(err, ReminderError::InvalidState { .. }));
    }

    #[test]
    fn foreign_log_is_not_found() {
        let conn = open_memory_database().unwrap();
        seed(&conn, Setup::default());
        seed_log(&conn, "L1", dt(8, 0), 1);

        let err = confirm_dose(&conn, "PAT2", "L1", None, None, dt(8, 0)).unwrap_err();
        assert!(matches!(err, ReminderError::NotFound { .. }));
    }

    #[test]
    fn upcoming_doses_window_and_order() {
        let conn = open_memory_database().unwrap();
        seed(&conn, Setup::default());
        seed_log(&conn, "L1", dt(20, 0), 1);
        seed_log(&conn, "L2", dt(8, 0), 1);
        // Beyond the 24h horizon.
        seed_log(
            &conn,
            "L3",
            NaiveDate::from_ymd_opt(2025, 6, 3)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            1,
        );
        // Terminal logs are excluded.
        seed_log(&conn, "L4", dt(9, 0), 1);
        skip_dose(&conn, "PAT1", "L4", "nausea", None, dt(9, 0)).unwrap();

        let upcoming = get_upcoming_doses(&conn, "PAT1", dt(7, 0), None).unwrap();
        let ids: Vec<_> = upcoming.iter().map(|u| u.log_id.as_str()).collect();
        assert_eq!(ids, vec!["L2", "L1"]);
        assert_eq!(upcoming[0].medication_name, "Timolol");
    }
}
