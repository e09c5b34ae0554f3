//! Schedule Adjustment Engine.
//!
//! `one_time` shifts a single day's pending occurrences; `permanent`
//! rewrites the canonical dose-time list and every still-pending future
//! occurrence. Past and completed logs are never touched. Repeated
//! permanent adjustments compound; minutes may be negative.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rusqlite::{params, Connection};

use crate::db::repository::schedule as repo;
use crate::db::{fmt_date, fmt_datetime, DatabaseError};
use crate::error::ReminderError;
use crate::models::enums::AdjustmentType;

/// Shift a time-of-day by `minutes`, wrapping within the 24h clock.
/// Seconds are preserved.
fn shift_time(t: NaiveTime, minutes: i64) -> Result<NaiveTime, ReminderError> {
    let shifted =
        (t.num_seconds_from_midnight() as i64 + minutes * 60).rem_euclid(24 * 60 * 60);
    NaiveTime::from_num_seconds_from_midnight_opt(shifted as u32, 0).ok_or_else(|| {
        ReminderError::Database(DatabaseError::ConstraintViolation(format!(
            "unrepresentable shifted time: {shifted}s"
        )))
    })
}

/// Shift a schedule's dose times.
///
/// `one_time` moves only the pending logs dated `apply_date` (default:
/// today); `permanent` rewrites the dose-time list and all pending logs
/// scheduled at or after `now`.
pub fn adjust_dose_time(
    conn: &Connection,
    patient_id: &str,
    schedule_id: &str,
    adjustment_type: AdjustmentType,
    minutes: i64,
    reason: &str,
    apply_date: Option<NaiveDate>,
    now: NaiveDateTime,
) -> Result<(), ReminderError> {
    repo::get_schedule(conn, schedule_id, patient_id)?
        .ok_or_else(|| ReminderError::not_found("schedule", schedule_id))?;

    // SQLite datetime modifier, e.g. "+30 minutes" / "-15 minutes".
    let modifier = format!("{minutes:+} minutes");

    let tx = conn.unchecked_transaction()?;
    let shifted_logs = match adjustment_type {
        AdjustmentType::OneTime => {
            let date = apply_date.unwrap_or_else(|| now.date());
            tx.execute(
                "UPDATE dose_logs SET
                    scheduled_datetime = datetime(scheduled_datetime, ?1),
                    is_adjusted = 1, adjustment_type = 'one_time',
                    adjustment_minutes = ?2, adjustment_reason = ?3, updated_at = ?4
                 WHERE schedule_id = ?5 AND status = 'pending'
                   AND DATE(scheduled_datetime) = ?6",
                params![
                    modifier,
                    minutes,
                    reason,
                    fmt_datetime(now),
                    schedule_id,
                    fmt_date(date),
                ],
            )?
        }
        AdjustmentType::Permanent => {
            for dose_time in repo::dose_times_for_schedule(&tx, schedule_id, false)? {
                let shifted = shift_time(dose_time.dose_time, minutes)?;
                repo::update_dose_time(&tx, &dose_time.dose_time_id, shifted)?;
            }
            tx.execute(
                "UPDATE dose_logs SET
                    scheduled_datetime = datetime(scheduled_datetime, ?1),
                    is_adjusted = 1, adjustment_type = 'permanent',
                    adjustment_minutes = ?2, adjustment_reason = ?3, updated_at = ?4
                 WHERE schedule_id = ?5 AND status = 'pending'
                   AND scheduled_datetime >= ?6",
                params![
                    modifier,
                    minutes,
                    reason,
                    fmt_datetime(now),
                    schedule_id,
                    fmt_datetime(now),
                ],
            )?
        }
    };
    tx.commit()?;

    tracing::info!(
        patient_id,
        schedule_id,
        kind = adjustment_type.as_str(),
        minutes,
        shifted_logs,
        "Adjusted dose times"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::dose_log::{
        get_dose_log_with_schedule, insert_dose_log, new_pending_log,
    };
    use crate::db::repository::medication::insert_medication;
    use crate::db::repository::schedule::{insert_dose_time, insert_schedule};
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::FrequencyType;
    use crate::models::{DoseTime, MedicationSchedule};

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn seed(conn: &Connection) {
        insert_medication(conn, "MED1", "Timolol", None).unwrap();
        let schedule = MedicationSchedule {
            schedule_id: "S1".into(),
            patient_id: "PAT1".into(),
            prescription_id: None,
            medication_id: "MED1".into(),
            frequency_type: FrequencyType::FixedTimes,
            interval_hours: None,
            times_per_day: 1,
            calculate_from_actual: false,
            dose_spacing_minutes: 0,
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
        insert_schedule(conn, &schedule, at(1, 7, 0)).unwrap();
        insert_dose_time(
            conn,
            &DoseTime {
                dose_time_id: "D1".into(),
                schedule_id: "S1".into(),
                dose_time: hm(8, 0),
                dose_label: "Dose 1".into(),
                dose_order: 1,
                is_active: true,
            },
        )
        .unwrap();
    }

    fn seed_log(conn: &Connection, log_id: &str, scheduled: NaiveDateTime) {
        let log = new_pending_log(
            log_id.into(),
            "S1".into(),
            Some("D1".into()),
            "PAT1".into(),
            "MED1".into(),
            scheduled,
            1,
        );
        insert_dose_log(conn, &log, at(1, 7, 0)).unwrap();
    }

    fn scheduled_of(conn: &Connection, log_id: &str) -> NaiveDateTime {
        get_dose_log_with_schedule(conn, log_id, "PAT1")
            .unwrap()
            .unwrap()
            .log
            .scheduled_datetime
    }

    #[test]
    fn shift_time_wraps_forward_and_back() {
        assert_eq!(shift_time(hm(8, 0), 30).unwrap(), hm(8, 30));
        assert_eq!(shift_time(hm(23, 50), 30).unwrap(), hm(0, 20));
        assert_eq!(shift_time(hm(0, 10), -30).unwrap(), hm(23, 40));
    }

    #[test]
    fn permanent_rewrites_times_and_future_pending_logs() {
        let conn = open_memory_database().unwrap();
        seed(&conn);
        seed_log(&conn, "L_past", at(1, 8, 0));
        seed_log(&conn, "L_future", at(2, 8, 0));
        // Completed logs keep their original time.
        seed_log(&conn, "L_done", at(3, 8, 0));
        conn.execute(
            "UPDATE dose_logs SET status = 'completed' WHERE log_id = 'L_done'",
            [],
        )
        .unwrap();

        adjust_dose_time(
            &conn,
            "PAT1",
            "S1",
            AdjustmentType::Permanent,
            30,
            "after breakfast",
            None,
            at(1, 12, 0),
        )
        .unwrap();

        let times = repo::dose_times_for_schedule(&conn, "S1", false).unwrap();
        assert_eq!(times[0].dose_time, hm(8, 30));

        assert_eq!(scheduled_of(&conn, "L_past"), at(1, 8, 0));
        assert_eq!(scheduled_of(&conn, "L_future"), at(2, 8, 30));
        assert_eq!(scheduled_of(&conn, "L_done"), at(3, 8, 0));

        let future = get_dose_log_with_schedule(&conn, "L_future", "PAT1")
            .unwrap()
            .unwrap()
            .log;
        assert!(future.is_adjusted);
        assert_eq!(future.adjustment_type, Some(AdjustmentType::Permanent));
        assert_eq!(future.adjustment_minutes, Some(30));
    }

    #[test]
    fn permanent_adjustments_compound() {
        let conn = open_memory_database().unwrap();
        seed(&conn);

        for _ in 0..2 {
            adjust_dose_time(
                &conn,
                "PAT1",
                "S1",
                AdjustmentType::Permanent,
                45,
                "later",
                None,
                at(1, 7, 0),
            )
            .unwrap();
        }

        let times = repo::dose_times_for_schedule(&conn, "S1", false).unwrap();
        assert_eq!(times[0].dose_time, hm(9, 30));
    }

    #[test]
    fn one_time_shifts_only_the_apply_date() {
        let conn = open_memory_database().unwrap();
        seed(&conn);
        seed_log(&conn, "L_today", at(2, 8, 0));
        seed_log(&conn, "L_tomorrow", at(3, 8, 0));

        adjust_dose_time(
            &conn,
            "PAT1",
            "S1",
            AdjustmentType::OneTime,
            -20,
            "early appointment",
            Some(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()),
            at(1, 12, 0),
        )
        .unwrap();

        assert_eq!(scheduled_of(&conn, "L_today"), at(2, 7, 40));
        assert_eq!(scheduled_of(&conn, "L_tomorrow"), at(3, 8, 0));
        // Canonical dose times are untouched by one_time.
        let times = repo::dose_times_for_schedule(&conn, "S1", false).unwrap();
        assert_eq!(times[0].dose_time, hm(8, 0));
    }

    #[test]
    fn unknown_schedule_is_not_found() {
        let conn = open_memory_database().unwrap();
        seed(&conn);
        let err = adjust_dose_time(
            &conn,
            "PAT1",
            "NOPE",
            AdjustmentType::OneTime,
            10,
            "x",
            None,
            at(1, 7, 0),
        )
        .unwrap_err();
        assert!(matches!(err, ReminderError::NotFound { .. }));
    }
}
