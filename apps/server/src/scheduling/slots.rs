use chrono::{NaiveDate, NaiveTime};

use super::blocks::{has_full_day_block, partial_windows};
use super::conflict::intervals_overlap;
use super::hours::{format_hhmm, DayHours};
use crate::models::{BusyAppointment, DayBlock};

/// Slot grid step (minutes). Steps are anchored at the day's opening
/// time regardless of service duration.
pub const SLOT_STEP_MIN: i64 = 30;

/// Busy appointments as minute-of-day intervals relative to `date`.
pub fn busy_minute_intervals(busy: &[BusyAppointment], date: NaiveDate) -> Vec<(i64, i64)> {
    let day_start = date.and_time(NaiveTime::MIN);
    busy.iter()
        .map(|b| {
            let start = (b.start_at - day_start).num_minutes();
            (start, start + b.duration_min)
        })
        .collect()
}

/// Generate bookable start times (`HH:MM`, ascending) for one day.
///
/// A step survives when the whole `[step, step + duration)` window fits
/// before closing and touches no busy interval. Partial blocks only
/// test the step's start minute; a window that merely runs into a
/// partial block is still offered. Pure: same inputs, same output.
pub fn generate_slots(
    hours: &DayHours,
    duration_min: i64,
    busy: &[(i64, i64)],
    blocks: &[DayBlock],
    date: NaiveDate,
) -> Vec<String> {
    let (open, close) = match hours.open_window() {
        Some(window) => window,
        None => return Vec::new(),
    };
    if duration_min <= 0 {
        return Vec::new();
    }
    if has_full_day_block(blocks, date) {
        return Vec::new();
    }
    let partial = partial_windows(blocks, date);

    let mut out = Vec::new();
    let mut step = open;
    while step + duration_min <= close {
        let end = step + duration_min;
        let free = busy
            .iter()
            .all(|&(bs, be)| !intervals_overlap(step, end, bs, be));
        let unblocked = partial.iter().all(|&(ps, pe)| !(step >= ps && step < pe));
        if free && unblocked {
            out.push(format_hhmm(step));
        }
        step += SLOT_STEP_MIN;
    }
    out
}

// ── Tests ──
