//! Dose-spacing collision detection.
//!
//! A proposed clock time collides with an existing active dose time of
//! another schedule when the two are closer together than the existing
//! dose's configured spacing. Comparison is time-of-day only; the
//! difference is a plain absolute minute gap, not circular distance.

use chrono::NaiveTime;
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::db::{parse_time, DatabaseError};
use crate::error::ReminderError;
use crate::time_slot::minutes_since_midnight;

/// One existing dose time the proposal clashes with.
#[derive(Debug, Clone, Serialize)]
pub struct DoseCollision {
    pub schedule_id: String,
    pub medication_name: String,
    pub existing_time: NaiveTime,
    pub dose_label: String,
    pub required_spacing_minutes: i64,
    pub actual_spacing_minutes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollisionCheck {
    pub has_collision: bool,
    pub proposed_time: NaiveTime,
    pub collisions: Vec<DoseCollision>,
}

/// Check `proposed_time` against every active dose time of the
/// patient's other active schedules. All clashes are reported, not just
/// the first. Each comparison uses the existing dose's own spacing.
pub fn check_dose_collision(
    conn: &Connection,
    patient_id: &str,
    proposed_time: NaiveTime,
    exclude_schedule_id: Option<&str>,
) -> Result<CollisionCheck, ReminderError> {
    let mut sql = String::from(
        "SELECT ms.schedule_id, m.name, dt.dose_time, dt.dose_label, ms.dose_spacing_minutes
         FROM dose_times dt
         JOIN medication_schedules ms ON dt.schedule_id = ms.schedule_id
         JOIN medications m ON ms.medication_id = m.medication_id
         WHERE ms.patient_id = ?1 AND ms.is_active = 1 AND dt.is_active = 1",
    );
    if exclude_schedule_id.is_some() {
        sql.push_str(" AND ms.schedule_id != ?2");
    }
    sql.push_str(" ORDER BY dt.dose_time");

    let mut stmt = conn.prepare(&sql)?;
    let map_row = |row: &rusqlite::Row<'_>| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, i64>(4)?,
        ))
    };
    let rows: Vec<_> = match exclude_schedule_id {
        Some(exclude) => stmt
            .query_map(params![patient_id, exclude], map_row)?
            .collect::<Result<_, _>>()
            .map_err(DatabaseError::Sqlite)?,
        None => stmt
            .query_map(params![patient_id], map_row)?
            .collect::<Result<_, _>>()
            .map_err(DatabaseError::Sqlite)?,
    };

    let proposed_minutes = minutes_since_midnight(proposed_time);
    let mut collisions = Vec::new();

    for (schedule_id, medication_name, dose_time, dose_label, spacing) in rows {
        let existing_time = parse_time(&dose_time)?;
        let gap = (proposed_minutes - minutes_since_midnight(existing_time)).abs();
        if gap < spacing {
            collisions.push(DoseCollision {
                schedule_id,
                medication_name,
                existing_time,
                dose_label,
                required_spacing_minutes: spacing,
                actual_spacing_minutes: gap,
            });
        }
    }

    if !collisions.is_empty() {
        tracing::debug!(
            patient_id,
            proposed = %proposed_time,
            count = collisions.len(),
            "Dose-spacing collision detected"
        );
    }

    Ok(CollisionCheck {
        has_collision: !collisions.is_empty(),
        proposed_time,
        collisions,
    })
}
