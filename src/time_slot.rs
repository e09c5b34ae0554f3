//! Time-of-day classification and suppression windows.
//!
//! Two pure helpers shared by the generator, the adjustment engine, the
//! compliance aggregator and the reminder dispatcher. All comparisons
//! use minutes-since-midnight; dates never enter into it.

use chrono::{NaiveTime, Timelike};

use crate::models::enums::TimeSlot;

/// Map a clock time to its dose-window bucket.
///
/// Morning is [06:00, 12:00), afternoon [12:00, 18:00), evening
/// everything else (wraps past midnight).
pub fn classify_slot(t: NaiveTime) -> TimeSlot {
    match t.hour() {
        6..=11 => TimeSlot::Morning,
        12..=17 => TimeSlot::Afternoon,
        _ => TimeSlot::Evening,
    }
}

/// Whether `t` falls inside a sleep (or quiet-hours) window.
///
/// A window whose start is later than its end crosses midnight, e.g.
/// 22:00–06:00. Both window shapes are half-open at the end.
pub fn is_within_sleep_window(
    t: NaiveTime,
    enabled: bool,
    start: NaiveTime,
    end: NaiveTime,
) -> bool {
    if !enabled {
        return false;
    }

    let t = minutes_since_midnight(t);
    let start = minutes_since_midnight(start);
    let end = minutes_since_midnight(end);

    if start > end {
        t >= start || t < end
    } else {
        t >= start && t < end
    }
}

pub fn minutes_since_midnight(t: NaiveTime) -> i64 {
    (t.hour() * 60 + t.minute()) as i64
}
