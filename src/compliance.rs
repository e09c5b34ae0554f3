//! Compliance Aggregator.
//!
//! Daily view groups a day's dose logs into morning/afternoon/evening
//! slots with per-slot and overall completion ratios; the range report
//! aggregates status counts with a per-medication breakdown.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::db::{fmt_date, parse_datetime, DatabaseError};
use crate::error::ReminderError;
use crate::models::enums::{DoseStatus, SlotStatus, TimeSlot};
use crate::time_slot::classify_slot;

/// One dose log inside a slot's detail list.
#[derive(Debug, Clone, Serialize)]
pub struct SlotDose {
    pub log_id: String,
    pub medication_id: String,
    pub medication_name: String,
    pub scheduled_datetime: NaiveDateTime,
    pub status: DoseStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotCompliance {
    pub slot: TimeSlot,
    pub scheduled_count: i64,
    pub completed_count: i64,
    pub status: SlotStatus,
    /// completed/scheduled × 100, rounded to 2 decimals; 0 when nothing
    /// was scheduled.
    pub compliance_rate: f64,
    pub doses: Vec<SlotDose>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyCompliance {
    pub date: NaiveDate,
    pub slots: Vec<SlotCompliance>,
    pub total_scheduled: i64,
    pub total_completed: i64,
    pub overall_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MedicationCompliance {
    pub medication_id: String,
    pub medication_name: String,
    pub scheduled_count: i64,
    pub completed_count: i64,
    pub compliance_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_scheduled: i64,
    pub completed_count: i64,
    pub skipped_count: i64,
    pub pending_count: i64,
    pub snoozed_count: i64,
    pub compliance_rate: f64,
    pub by_medication: Vec<MedicationCompliance>,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn rate(completed: i64, scheduled: i64) -> f64 {
    if scheduled == 0 {
        0.0
    } else {
        round2(completed as f64 / scheduled as f64 * 100.0)
    }
}

fn slot_status(scheduled: i64, completed: i64) -> SlotStatus {
    if scheduled == 0 {
        SlotStatus::NoMedication
    } else if completed == scheduled {
        SlotStatus::Completed
    } else if completed > 0 {
        SlotStatus::Partial
    } else {
        SlotStatus::Missed
    }
}

fn day_doses(
    conn: &Connection,
    patient_id: &str,
    date: NaiveDate,
) -> Result<Vec<SlotDose>, ReminderError> {
    let mut stmt = conn.prepare(
        "SELECT ml.log_id, ml.medication_id, m.name, ml.scheduled_datetime, ml.status
         FROM dose_logs ml
         JOIN medications m ON ml.medication_id = m.medication_id
         WHERE ml.patient_id = ?1 AND DATE(ml.scheduled_datetime) = ?2
         ORDER BY ml.scheduled_datetime",
    )?;
    let rows = stmt.query_map(params![patient_id, fmt_date(date)], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut doses = Vec::new();
    for row in rows {
        let (log_id, medication_id, medication_name, scheduled, status) =
            row.map_err(DatabaseError::Sqlite)?;
        doses.push(SlotDose {
            log_id,
            medication_id,
            medication_name,
            scheduled_datetime: parse_datetime(&scheduled)?,
            status: status.parse()?,
        });
    }
    Ok(doses)
}

/// Per-slot compliance for one calendar day. All three slots are always
/// present, in morning/afternoon/evening order.
pub fn get_compliance(
    conn: &Connection,
    patient_id: &str,
    date: NaiveDate,
) -> Result<DailyCompliance, ReminderError> {
    let doses = day_doses(conn, patient_id, date)?;

    let mut slots = Vec::with_capacity(3);
    let mut total_scheduled = 0;
    let mut total_completed = 0;

    for slot in [TimeSlot::Morning, TimeSlot::Afternoon, TimeSlot::Evening] {
        let slot_doses: Vec<SlotDose> = doses
            .iter()
            .filter(|d| classify_slot(d.scheduled_datetime.time()) == slot)
            .cloned()
            .collect();
        let scheduled = slot_doses.len() as i64;
        let completed = slot_doses
            .iter()
            .filter(|d| d.status == DoseStatus::Completed)
            .count() as i64;

        total_scheduled += scheduled;
        total_completed += completed;
        slots.push(SlotCompliance {
            slot,
            scheduled_count: scheduled,
            completed_count: completed,
            status: slot_status(scheduled, completed),
            compliance_rate: rate(completed, scheduled),
            doses: slot_doses,
        });
    }

    Ok(DailyCompliance {
        date,
        slots,
        total_scheduled,
        total_completed,
        overall_rate: rate(total_completed, total_scheduled),
    })
}

/// Daily compliance for the `days` days ending at `today`, oldest
/// first.
pub fn get_compliance_history(
    conn: &Connection,
    patient_id: &str,
    days: u32,
    today: NaiveDate,
) -> Result<Vec<DailyCompliance>, ReminderError> {
    let mut history = Vec::with_capacity(days as usize);
    for back in (0..days).rev() {
        let date = today - Duration::days(back as i64);
        history.push(get_compliance(conn, patient_id, date)?);
    }
    Ok(history)
}

/// Aggregate status counts over a date range, optionally restricted to
/// one schedule, with a per-medication breakdown.
pub fn get_compliance_report(
    conn: &Connection,
    patient_id: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    schedule_id: Option<&str>,
) -> Result<ComplianceReport, ReminderError> {
    let mut sql = String::from(
        "SELECT ml.medication_id, m.name, ml.status
         FROM dose_logs ml
         JOIN medications m ON ml.medication_id = m.medication_id
         WHERE ml.patient_id = ?1
           AND DATE(ml.scheduled_datetime) BETWEEN ?2 AND ?3",
    );
    if schedule_id.is_some() {
        sql.push_str(" AND ml.schedule_id = ?4");
    }

    let mut stmt = conn.prepare(&sql)?;
    let map_row = |row: &rusqlite::Row<'_>| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    };
    let rows: Vec<(String, String, String)> = match schedule_id {
        Some(sid) => stmt
            .query_map(
                params![patient_id, fmt_date(start_date), fmt_date(end_date), sid],
                map_row,
            )?
            .collect::<Result<_, _>>()
            .map_err(DatabaseError::Sqlite)?,
        None => stmt
            .query_map(
                params![patient_id, fmt_date(start_date), fmt_date(end_date)],
                map_row,
            )?
            .collect::<Result<_, _>>()
            .map_err(DatabaseError::Sqlite)?,
    };

    let mut completed = 0;
    let mut skipped = 0;
    let mut pending = 0;
    let mut snoozed = 0;
    // Insertion-ordered per-medication tallies.
    let mut meds: Vec<(String, String, i64, i64)> = Vec::new();

    for (medication_id, medication_name, status) in rows {
        let status: DoseStatus = status.parse()?;
        match status {
            DoseStatus::Completed => completed += 1,
            DoseStatus::Skipped => skipped += 1,
            DoseStatus::Pending => pending += 1,
            DoseStatus::Snoozed => snoozed += 1,
        }

        let idx = match meds.iter().position(|(id, ..)| *id == medication_id) {
            Some(idx) => idx,
            None => {
                meds.push((medication_id, medication_name, 0, 0));
                meds.len() - 1
            }
        };
        meds[idx].2 += 1;
        if status == DoseStatus::Completed {
            meds[idx].3 += 1;
        }
    }

    let total = completed + skipped + pending + snoozed;
    let by_medication = meds
        .into_iter()
        .map(
            |(medication_id, medication_name, scheduled, done)| MedicationCompliance {
                medication_id,
                medication_name,
                scheduled_count: scheduled,
                completed_count: done,
                compliance_rate: rate(done, scheduled),
            },
        )
        .collect();

    Ok(ComplianceReport {
        start_date,
        end_date,
        total_scheduled: total,
        completed_count: completed,
        skipped_count: skipped,
        pending_count: pending,
        snoozed_count: snoozed,
        compliance_rate: rate(completed, total),
        by_medication,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::dose_log::{insert_dose_log, new_pending_log};
    use crate::db::repository::medication::insert_medication;
    use crate::db::repository::schedule::insert_schedule;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::FrequencyType;
    use crate::models::MedicationSchedule;
    use chrono::NaiveTime;

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
        insert_medication(conn, "MED2", "Latanoprost", None).unwrap();
        for (schedule_id, medication_id) in [("S1", "MED1"), ("S2", "MED2")] {
            let schedule = MedicationSchedule {
                schedule_id: schedule_id.into(),
                patient_id: "PAT1".into(),
                prescription_id: None,
                medication_id: medication_id.into(),
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
        }
    }

    fn seed_log(
        conn: &Connection,
        log_id: &str,
        schedule_id: &str,
        medication_id: &str,
        scheduled: NaiveDateTime,
        status: &str,
    ) {
        let log = new_pending_log(
            log_id.into(),
            schedule_id.into(),
            None,
            "PAT1".into(),
            medication_id.into(),
            scheduled,
            1,
        );
        insert_dose_log(conn, &log, at(1, 7, 0)).unwrap();
        conn.execute(
            "UPDATE dose_logs SET status = ?1 WHERE log_id = ?2",
            params![status, log_id],
        )
        .unwrap();
    }

    #[test]
    fn partial_morning_slot_rates_to_two_decimals() {
        let conn = open_memory_database().unwrap();
        seed(&conn);
        seed_log(&conn, "L1", "S1", "MED1", at(1, 8, 0), "completed");
        seed_log(&conn, "L2", "S1", "MED1", at(1, 9, 0), "completed");
        seed_log(&conn, "L3", "S2", "MED2", at(1, 10, 0), "pending");

        let daily =
            get_compliance(&conn, "PAT1", NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()).unwrap();
        let morning = &daily.slots[0];
        assert_eq!(morning.slot, TimeSlot::Morning);
        assert_eq!(morning.scheduled_count, 3);
        assert_eq!(morning.completed_count, 2);
        assert_eq!(morning.status, SlotStatus::Partial);
        assert_eq!(morning.compliance_rate, 66.67);

        assert_eq!(daily.total_scheduled, 3);
        assert_eq!(daily.overall_rate, 66.67);
    }

    #[test]
    fn empty_slot_is_no_medication_with_zero_rate() {
        let conn = open_memory_database().unwrap();
        seed(&conn);
        seed_log(&conn, "L1", "S1", "MED1", at(1, 8, 0), "completed");

        let daily =
            get_compliance(&conn, "PAT1", NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()).unwrap();
        let afternoon = &daily.slots[1];
        assert_eq!(afternoon.status, SlotStatus::NoMedication);
        assert_eq!(afternoon.compliance_rate, 0.0);
        assert_eq!(daily.slots[0].status, SlotStatus::Completed);
        assert_eq!(daily.slots[0].compliance_rate, 100.0);
    }

    #[test]
    fn missed_slot_has_zero_completed() {
        let conn = open_memory_database().unwrap();
        seed(&conn);
        seed_log(&conn, "L1", "S1", "MED1", at(1, 20, 0), "skipped");

        let daily =
            get_compliance(&conn, "PAT1", NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()).unwrap();
        let evening = &daily.slots[2];
        assert_eq!(evening.status, SlotStatus::Missed);
        assert_eq!(evening.scheduled_count, 1);
        assert_eq!(evening.completed_count, 0);
    }

    #[test]
    fn history_runs_oldest_to_newest() {
        let conn = open_memory_database().unwrap();
        seed(&conn);
        seed_log(&conn, "L1", "S1", "MED1", at(2, 8, 0), "completed");
        seed_log(&conn, "L2", "S1", "MED1", at(3, 8, 0), "pending");

        let today = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        let history = get_compliance_history(&conn, "PAT1", 3, today).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(history[2].date, today);
        assert_eq!(history[0].total_scheduled, 0);
        assert_eq!(history[1].total_completed, 1);
    }

    #[test]
    fn report_breaks_down_by_medication() {
        let conn = open_memory_database().unwrap();
        seed(&conn);
        seed_log(&conn, "L1", "S1", "MED1", at(1, 8, 0), "completed");
        seed_log(&conn, "L2", "S1", "MED1", at(2, 8, 0), "skipped");
        seed_log(&conn, "L3", "S2", "MED2", at(2, 9, 0), "completed");
        seed_log(&conn, "L4", "S2", "MED2", at(3, 9, 0), "snoozed");

        let report = get_compliance_report(
            &conn,
            "PAT1",
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
            None,
        )
        .unwrap();

        assert_eq!(report.total_scheduled, 4);
        assert_eq!(report.completed_count, 2);
        assert_eq!(report.skipped_count, 1);
        assert_eq!(report.snoozed_count, 1);
        assert_eq!(report.compliance_rate, 50.0);

        assert_eq!(report.by_medication.len(), 2);
        let timolol = &report.by_medication[0];
        assert_eq!(timolol.medication_name, "Timolol");
        assert_eq!(timolol.scheduled_count, 2);
        assert_eq!(timolol.completed_count, 1);
        assert_eq!(timolol.compliance_rate, 50.0);
    }

    #[test]
    fn report_filters_to_one_schedule() {
        let conn = open_memory_database().unwrap();
        seed(&conn);
        seed_log(&conn, "L1", "S1", "MED1", at(1, 8, 0), "completed");
        seed_log(&conn, "L2", "S2", "MED2", at(1, 9, 0), "completed");

        let report = get_compliance_report(
            &conn,
            "PAT1",
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            Some("S1"),
        )
        .unwrap();
        assert_eq!(report.total_scheduled, 1);
        assert_eq!(report.by_medication.len(), 1);
        assert_eq!(report.by_medication[0].medication_id, "MED1");
    }
}
