//! Reminder dispatch and notification preferences.
//!
//! `process_due_reminders` is the entry point a periodic external
//! invoker calls once a minute: it finds doses due for a reminder,
//! gates on the patient's notification settings, hands messages to the
//! injected [`PushSender`] fire-and-forget, records history, and marks
//! each log so the same dose is not re-notified on the next tick.

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::config;
use crate::db::repository::notification as repo;
use crate::db::{fmt_datetime, DatabaseError};
use crate::error::ReminderError;
use crate::ids::generate_id;
use crate::models::{NotificationRecord, NotificationSettings, NotificationSettingsPatch};
use crate::time_slot::is_within_sleep_window;

/// Message handed to the push transport.
#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub priority: String,
}

#[derive(Error, Debug)]
#[error("push delivery failed: {0}")]
pub struct PushSendError(pub String);

/// Push transport, implemented by the caller. Delivery failure is
/// logged and recorded but never fails the triggering operation.
pub trait PushSender {
    fn send(&self, patient_id: &str, message: &PushMessage) -> Result<(), PushSendError>;
}

/// Outcome of one reminder pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReminderRun {
    pub due: usize,
    pub sent: usize,
    pub suppressed: usize,
    pub failed: usize,
}

/// A patient's notification settings; the row is created with defaults
/// on first read.
pub fn get_notification_settings(
    conn: &Connection,
    patient_id: &str,
    now: NaiveDateTime,
) -> Result<NotificationSettings, ReminderError> {
    if let Some(settings) = repo::get_settings(conn, patient_id)? {
        return Ok(settings);
    }

    let defaults = NotificationSettings {
        setting_id: generate_id("NS"),
        patient_id: patient_id.to_string(),
        push_enabled: true,
        sound_enabled: true,
        vibration_enabled: true,
        remind_before_minutes: config::DEFAULT_REMIND_BEFORE_MINUTES,
        snooze_enabled: true,
        snooze_duration_minutes: config::DEFAULT_SNOOZE_DURATION_MINUTES,
        max_snooze_count: config::DEFAULT_MAX_SNOOZE_COUNT,
        quiet_hours_enabled: false,
        quiet_hours_start: None,
        quiet_hours_end: None,
    };
    repo::insert_settings(conn, &defaults, now)?;
    tracing::debug!(patient_id, "Created default notification settings");
    Ok(defaults)
}

/// Apply a partial patch to a patient's settings; absent fields keep
/// their prior (or default) value. Returns the merged settings.
pub fn update_notification_settings(
    conn: &Connection,
    patient_id: &str,
    patch: &NotificationSettingsPatch,
    now: NaiveDateTime,
) -> Result<NotificationSettings, ReminderError> {
    let mut settings = get_notification_settings(conn, patient_id, now)?;

    if let Some(v) = patch.push_enabled {
        settings.push_enabled = v;
    }
    if let Some(v) = patch.sound_enabled {
        settings.sound_enabled = v;
    }
    if let Some(v) = patch.vibration_enabled {
        settings.vibration_enabled = v;
    }
    if let Some(v) = patch.remind_before_minutes {
        settings.remind_before_minutes = v;
    }
    if let Some(v) = patch.snooze_enabled {
        settings.snooze_enabled = v;
    }
    if let Some(v) = patch.snooze_duration_minutes {
        settings.snooze_duration_minutes = v;
    }
    if let Some(v) = patch.max_snooze_count {
        settings.max_snooze_count = v;
    }
    if let Some(v) = patch.quiet_hours_enabled {
        settings.quiet_hours_enabled = v;
    }
    if let Some(v) = patch.quiet_hours_start {
        settings.quiet_hours_start = Some(v);
    }
    if let Some(v) = patch.quiet_hours_end {
        settings.quiet_hours_end = Some(v);
    }

    repo::update_settings(conn, &settings, now)?;
    tracing::info!(patient_id, "Updated notification settings");
    Ok(settings)
}

/// Delivery audit trail, newest first.
pub fn get_notification_history(
    conn: &Connection,
    patient_id: &str,
    date_range: Option<(chrono::NaiveDate, chrono::NaiveDate)>,
    notification_type: Option<&str>,
    limit: Option<i64>,
) -> Result<Vec<NotificationRecord>, ReminderError> {
    let limit = limit.unwrap_or(50);
    Ok(repo::list_history(
        conn,
        patient_id,
        date_range,
        notification_type,
        limit,
    )?)
}

struct DueDose {
    log_id: String,
    schedule_id: String,
    patient_id: String,
    medication_name: String,
    scheduled_datetime: String,
}

/// Pending doses inside their reminder-advance window that have not
/// been notified, plus snoozed doses whose snooze has elapsed and have
/// not been re-notified since being snoozed.
fn due_doses(conn: &Connection, now: NaiveDateTime) -> Result<Vec<DueDose>, ReminderError> {
    let mut stmt = conn.prepare(
        "SELECT ml.log_id, ml.schedule_id, ml.patient_id, m.name, ml.scheduled_datetime
         FROM dose_logs ml
         JOIN medication_schedules ms ON ml.schedule_id = ms.schedule_id
         JOIN medications m ON ml.medication_id = m.medication_id
         WHERE ms.is_active = 1
           AND (
             (ml.status = 'pending'
              AND ml.reminder_sent_at IS NULL
              AND ml.scheduled_datetime <=
                  datetime(?1, '+' || ms.reminder_advance_minutes || ' minutes'))
             OR
             (ml.status = 'snoozed'
              AND ml.snooze_until IS NOT NULL
              AND ml.snooze_until <= ?1
              AND (ml.reminder_sent_at IS NULL OR ml.reminder_sent_at < ml.snooze_until))
           )
         ORDER BY ml.scheduled_datetime",
    )?;
    let rows = stmt.query_map(params![fmt_datetime(now)], |row| {
        Ok(DueDose {
            log_id: row.get(0)?,
            schedule_id: row.get(1)?,
            patient_id: row.get(2)?,
            medication_name: row.get(3)?,
            scheduled_datetime: row.get(4)?,
        })
    })?;

    let mut due = Vec::new();
    for row in rows {
        due.push(row.map_err(DatabaseError::Sqlite)?);
    }
    Ok(due)
}

fn reminder_message(dose: &DueDose) -> PushMessage {
    PushMessage {
        title: "Medication Reminder".into(),
        body: format!("Time to take your {}", dose.medication_name),
        data: json!({
            "type": "medication_reminder",
            "log_id": dose.log_id,
            "schedule_id": dose.schedule_id,
            "scheduled_datetime": dose.scheduled_datetime,
        }),
        priority: "high".into(),
    }
}

/// One reminder pass over all patients at `now`.
///
/// Sender failures are logged and recorded as undelivered; they never
/// surface to the caller. Doses suppressed by disabled push or quiet
/// hours stay unmarked and are re-evaluated on the next tick.
pub fn process_due_reminders(
    conn: &Connection,
    sender: &dyn PushSender,
    now: NaiveDateTime,
) -> Result<ReminderRun, ReminderError> {
    let due = due_doses(conn, now)?;
    let mut run = ReminderRun {
        due: due.len(),
        ..ReminderRun::default()
    };

    for dose in due {
        let settings = get_notification_settings(conn, &dose.patient_id, now)?;

        let quiet = match (settings.quiet_hours_start, settings.quiet_hours_end) {
            (Some(start), Some(end)) => {
                is_within_sleep_window(now.time(), settings.quiet_hours_enabled, start, end)
            }
            _ => false,
        };
        if !settings.push_enabled || quiet {
            run.suppressed += 1;
            continue;
        }

        let message = reminder_message(&dose);
        let delivered = match sender.send(&dose.patient_id, &message) {
            Ok(()) => {
                run.sent += 1;
                true
            }
            Err(e) => {
                tracing::warn!(
                    patient_id = %dose.patient_id,
                    log_id = %dose.log_id,
                    error = %e,
                    "Push delivery failed"
                );
                run.failed += 1;
                false
            }
        };

        repo::insert_history(
            conn,
            &NotificationRecord {
                notification_id: generate_id("NTF"),
                patient_id: dose.patient_id.clone(),
                notification_type: "medication_reminder".into(),
                title: message.title.clone(),
                body: message.body.clone(),
                sent_at: now,
                delivered,
            },
        )?;
        conn.execute(
            "UPDATE dose_logs SET reminder_sent_at = ?1, updated_at = ?1 WHERE log_id = ?2",
            params![fmt_datetime(now), dose.log_id],
        )?;
    }

    tracing::info!(
        due = run.due,
        sent = run.sent,
        suppressed = run.suppressed,
        failed = run.failed,
        "Processed due reminders"
    );
    Ok(run)
}
