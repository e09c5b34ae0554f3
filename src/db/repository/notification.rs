use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{fmt_date, fmt_datetime, fmt_time, parse_datetime, parse_time, DatabaseError};
use crate::models::{NotificationRecord, NotificationSettings};

const SETTINGS_COLS: &str = "setting_id, patient_id, push_enabled, sound_enabled, \
     vibration_enabled, remind_before_minutes, snooze_enabled, \
     snooze_duration_minutes, max_snooze_count, quiet_hours_enabled, \
     quiet_hours_start, quiet_hours_end";

pub fn get_settings(
    conn: &Connection,
    patient_id: &str,
) -> Result<Option<NotificationSettings>, DatabaseError> {
    let sql = format!("SELECT {SETTINGS_COLS} FROM notification_settings WHERE patient_id = ?1");
    let row = conn
        .query_row(&sql, params![patient_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i32>(2)?,
                row.get::<_, i32>(3)?,
                row.get::<_, i32>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, i32>(6)?,
                row.get::<_, i64>(7)?,
                row.get::<_, i64>(8)?,
                row.get::<_, i32>(9)?,
                row.get::<_, Option<String>>(10)?,
                row.get::<_, Option<String>>(11)?,
            ))
        })
        .optional()?;

    let Some((
        setting_id,
        patient_id,
        push,
        sound,
        vibration,
        remind_before,
        snooze_enabled,
        snooze_duration,
        max_snooze,
        quiet_enabled,
        quiet_start,
        quiet_end,
    )) = row
    else {
        return Ok(None);
    };

    Ok(Some(NotificationSettings {
        setting_id,
        patient_id,
        push_enabled: push != 0,
        sound_enabled: sound != 0,
        vibration_enabled: vibration != 0,
        remind_before_minutes: remind_before,
        snooze_enabled: snooze_enabled != 0,
        snooze_duration_minutes: snooze_duration,
        max_snooze_count: max_snooze,
        quiet_hours_enabled: quiet_enabled != 0,
        quiet_hours_start: quiet_start.as_deref().map(parse_time).transpose()?,
        quiet_hours_end: quiet_end.as_deref().map(parse_time).transpose()?,
    }))
}

pub fn insert_settings(
    conn: &Connection,
    settings: &NotificationSettings,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO notification_settings (
            setting_id, patient_id, push_enabled, sound_enabled, vibration_enabled,
            remind_before_minutes, snooze_enabled, snooze_duration_minutes,
            max_snooze_count, quiet_hours_enabled, quiet_hours_start,
            quiet_hours_end, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            settings.setting_id,
            settings.patient_id,
            settings.push_enabled as i32,
            settings.sound_enabled as i32,
            settings.vibration_enabled as i32,
            settings.remind_before_minutes,
            settings.snooze_enabled as i32,
            settings.snooze_duration_minutes,
            settings.max_snooze_count,
            settings.quiet_hours_enabled as i32,
            settings.quiet_hours_start.map(fmt_time),
            settings.quiet_hours_end.map(fmt_time),
            fmt_datetime(now),
        ],
    )?;
    Ok(())
}

/// Rewrite all mutable settings fields (the caller merged the patch).
pub fn update_settings(
    conn: &Connection,
    settings: &NotificationSettings,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE notification_settings SET
            push_enabled = ?1, sound_enabled = ?2, vibration_enabled = ?3,
            remind_before_minutes = ?4, snooze_enabled = ?5,
            snooze_duration_minutes = ?6, max_snooze_count = ?7,
            quiet_hours_enabled = ?8, quiet_hours_start = ?9,
            quiet_hours_end = ?10, updated_at = ?11
         WHERE patient_id = ?12",
        params![
            settings.push_enabled as i32,
            settings.sound_enabled as i32,
            settings.vibration_enabled as i32,
            settings.remind_before_minutes,
            settings.snooze_enabled as i32,
            settings.snooze_duration_minutes,
            settings.max_snooze_count,
            settings.quiet_hours_enabled as i32,
            settings.quiet_hours_start.map(fmt_time),
            settings.quiet_hours_end.map(fmt_time),
            fmt_datetime(now),
            settings.patient_id,
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "NotificationSettings".into(),
            id: settings.patient_id.clone(),
        });
    }
    Ok(())
}

pub fn insert_history(
    conn: &Connection,
    record: &NotificationRecord,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO notification_history (
            notification_id, patient_id, notification_type, title, body,
            sent_at, delivered
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.notification_id,
            record.patient_id,
            record.notification_type,
            record.title,
            record.body,
            fmt_datetime(record.sent_at),
            record.delivered as i32,
        ],
    )?;
    Ok(())
}

/// Notification history, newest first, with optional date-range and
/// type filters.
pub fn list_history(
    conn: &Connection,
    patient_id: &str,
    date_range: Option<(NaiveDate, NaiveDate)>,
    notification_type: Option<&str>,
    limit: i64,
) -> Result<Vec<NotificationRecord>, DatabaseError> {
    let mut sql = String::from(
        "SELECT notification_id, patient_id, notification_type, title, body,
                sent_at, delivered
         FROM notification_history
         WHERE patient_id = ?1",
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(patient_id.to_string())];
    let mut param_idx = 2;

    if let Some((start, end)) = date_range {
        sql.push_str(&format!(
            " AND DATE(sent_at) BETWEEN ?{param_idx} AND ?{}",
            param_idx + 1
        ));
        params_vec.push(Box::new(fmt_date(start)));
        params_vec.push(Box::new(fmt_date(end)));
        param_idx += 2;
    }

    if let Some(kind) = notification_type {
        sql.push_str(&format!(" AND notification_type = ?{param_idx}"));
        params_vec.push(Box::new(kind.to_string()));
        param_idx += 1;
    }

    sql.push_str(&format!(" ORDER BY sent_at DESC LIMIT ?{param_idx}"));
    params_vec.push(Box::new(limit));

    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, i32>(6)?,
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (id, patient, kind, title, body, sent_at, delivered) = row?;
        records.push(NotificationRecord {
            notification_id: id,
            patient_id: patient,
            notification_type: kind,
            title,
            body,
            sent_at: parse_datetime(&sent_at)?,
            delivered: delivered != 0,
        });
    }
    Ok(records)
}
