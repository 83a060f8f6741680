use chrono::{NaiveDate, Timelike};

use super::conflict::intervals_overlap;
use super::hours::parse_hhmm;
use crate::models::{BusyAppointment, DayBlock, BLOCK_FULL_DAY, BLOCK_PARTIAL, STATUS_CANCELLED};

/// Inclusive date-range containment.
pub fn block_covers(block: &DayBlock, date: NaiveDate) -> bool {
    block.start_date <= date && date <= block.end_date
}

/// Any full-day block covering `date`?
pub fn has_full_day_block(blocks: &[DayBlock], date: NaiveDate) -> bool {
    blocks
        .iter()
        .any(|b| b.block_type == BLOCK_FULL_DAY && block_covers(b, date))
}

/// Partial-block windows covering `date`, as minutes from midnight.
/// Windows with missing or unparsable times are skipped.
pub fn partial_windows(blocks: &[DayBlock], date: NaiveDate) -> Vec<(i64, i64)> {
    blocks
        .iter()
        .filter(|b| b.block_type == BLOCK_PARTIAL && block_covers(b, date))
        .filter_map(|b| {
            let start = parse_hhmm(b.start_time.as_deref()?)?;
            let end = parse_hhmm(b.end_time.as_deref()?)?;
            if start < end {
                Some((start, end))
            } else {
                None
            }
        })
        .collect()
}

/// Validate a block before creation.
///
/// Full-day blocks carry no times; partial blocks need a non-empty
/// `HH:MM` window. Blocks cannot start in the past.
pub fn validate_new_block(
    start_date: NaiveDate,
    end_date: NaiveDate,
    block_type: &str,
    start_time: Option<&str>,
    end_time: Option<&str>,
    today: NaiveDate,
) -> Result<(), String> {
    if end_date < start_date {
        return Err("end_date must not be before start_date".into());
    }
    if start_date < today {
        return Err("blocks cannot be created for past dates".into());
    }
    match block_type {
        BLOCK_FULL_DAY => {
            if start_time.is_some() || end_time.is_some() {
                return Err("full_day blocks do not take times".into());
            }
        }
        BLOCK_PARTIAL => {
            let start = start_time
                .and_then(parse_hhmm)
                .ok_or_else(|| "partial blocks need a valid start_time".to_string())?;
            let end = end_time
                .and_then(parse_hhmm)
                .ok_or_else(|| "partial blocks need a valid end_time".to_string())?;
            if start >= end {
                return Err("block start_time must be before end_time".into());
            }
        }
        other => return Err(format!("unknown block_type '{}'", other)),
    }
    Ok(())
}

/// Active appointments a proposed block would cover.
///
/// Full-day blocks hit every appointment on the covered dates; partial
/// blocks hit appointments whose `[start, end)` overlaps the window on
/// their own date.
pub fn affected_appointments<'a>(
    busy: &'a [BusyAppointment],
    start_date: NaiveDate,
    end_date: NaiveDate,
    block_type: &str,
    start_time: Option<&str>,
    end_time: Option<&str>,
) -> Vec<&'a BusyAppointment> {
    let window = match block_type {
        BLOCK_PARTIAL => {
            match (start_time.and_then(parse_hhmm), end_time.and_then(parse_hhmm)) {
                (Some(s), Some(e)) if s < e => Some((s, e)),
                _ => return Vec::new(),
            }
        }
        _ => None,
    };

    busy.iter()
        .filter(|appt| {
            if appt.status == STATUS_CANCELLED {
                return false;
            }
            let date = appt.start_at.date();
            if date < start_date || date > end_date {
                return false;
            }
            match window {
                None => true,
                Some((ws, we)) => {
                    let start = i64::from(appt.start_at.hour()) * 60
                        + i64::from(appt.start_at.minute());
                    let end = start + appt.duration_min;
                    intervals_overlap(start, end, ws, we)
                }
            }
        })
        .collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use crate::models::STATUS_CONFIRMED;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn full_day(start: &str, end: &str) -> DayBlock {
        DayBlock {
            id: 1,
            start_date: date(start),
            end_date: date(end),
            block_type: BLOCK_FULL_DAY.into(),
            start_time: None,
            end_time: None,
            reason: None,
            created_by: 1,
            created_at: String::new(),
        }
    }

    fn partial(day: &str, from: &str, to: &str) -> DayBlock {
        DayBlock {
            id: 2,
            start_date: date(day),
            end_date: date(day),
            block_type: BLOCK_PARTIAL.into(),
            start_time: Some(from.into()),
            end_time: Some(to.into()),
            reason: None,
            created_by: 1,
            created_at: String::new(),
        }
    }

    fn busy(id: i64, start: &str, duration_min: i64) -> BusyAppointment {
        BusyAppointment {
            id,
            client_name: format!("client {}", id),
            start_at: at(start),
            duration_min,
            status: STATUS_CONFIRMED.into(),
        }
    }

    // ── block_covers ──

    #[test]
    fn test_covers_start_and_end_inclusive() {
        let block = full_day("2026-03-10", "2026-03-12");
        assert!(block_covers(&block, date("2026-03-10")));
        assert!(block_covers(&block, date("2026-03-11")));
        assert!(block_covers(&block, date("2026-03-12")));
    }

    #[test]
    fn test_covers_outside_range() {
        let block = full_day("2026-03-10", "2026-03-12");
        assert!(!block_covers(&block, date("2026-03-09")));
        assert!(!block_covers(&block, date("2026-03-13")));
    }

    #[test]
    fn test_covers_single_day_range() {
        let block = full_day("2026-03-10", "2026-03-10");
        assert!(block_covers(&block, date("2026-03-10")));
        assert!(!block_covers(&block, date("2026-03-11")));
    }

    // ── has_full_day_block / partial_windows ──

    #[test]
    fn test_full_day_detection_ignores_partial() {
        let blocks = vec![partial("2026-03-10", "10:00", "12:00")];
        assert!(!has_full_day_block(&blocks, date("2026-03-10")));
    }

    #[test]
    fn test_full_day_detection() {
        let blocks = vec![full_day("2026-03-10", "2026-03-10")];
        assert!(has_full_day_block(&blocks, date("2026-03-10")));
        assert!(!has_full_day_block(&blocks, date("2026-03-11")));
    }

    #[test]
    fn test_partial_windows_collects_covering_blocks() {
        let blocks = vec![
            partial("2026-03-10", "10:00", "12:00"),
            partial("2026-03-11", "13:00", "14:00"),
            full_day("2026-03-10", "2026-03-10"),
        ];
        assert_eq!(partial_windows(&blocks, date("2026-03-10")), vec![(600, 720)]);
    }

    #[test]
    fn test_partial_windows_skips_bad_times() {
        let mut block = partial("2026-03-10", "10:00", "12:00");
        block.end_time = Some("xx".into());
        assert!(partial_windows(&[block], date("2026-03-10")).is_empty());
    }

    // ── validate_new_block ──

    #[test]
    fn test_validate_accepts_full_day() {
        let today = date("2026-03-01");
        let ok = validate_new_block(
            date("2026-03-10"),
            date("2026-03-12"),
            BLOCK_FULL_DAY,
            None,
            None,
            today,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_validate_accepts_partial() {
        let today = date("2026-03-01");
        let ok = validate_new_block(
            date("2026-03-10"),
            date("2026-03-10"),
            BLOCK_PARTIAL,
            Some("13:00"),
            Some("15:00"),
            today,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let today = date("2026-03-01");
        let err = validate_new_block(
            date("2026-03-12"),
            date("2026-03-10"),
            BLOCK_FULL_DAY,
            None,
            None,
            today,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_validate_rejects_past_start() {
        let today = date("2026-03-11");
        let err = validate_new_block(
            date("2026-03-10"),
            date("2026-03-12"),
            BLOCK_FULL_DAY,
            None,
            None,
            today,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_validate_allows_today() {
        let today = date("2026-03-10");
        let ok = validate_new_block(
            date("2026-03-10"),
            date("2026-03-10"),
            BLOCK_FULL_DAY,
            None,
            None,
            today,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_validate_partial_needs_times() {
        let today = date("2026-03-01");
        let err = validate_new_block(
            date("2026-03-10"),
            date("2026-03-10"),
            BLOCK_PARTIAL,
            Some("13:00"),
            None,
            today,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_validate_partial_rejects_empty_window() {
        let today = date("2026-03-01");
        let err = validate_new_block(
            date("2026-03-10"),
            date("2026-03-10"),
            BLOCK_PARTIAL,
            Some("15:00"),
            Some("13:00"),
            today,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_validate_full_day_rejects_times() {
        let today = date("2026-03-01");
        let err = validate_new_block(
            date("2026-03-10"),
            date("2026-03-10"),
            BLOCK_FULL_DAY,
            Some("13:00"),
            Some("15:00"),
            today,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_validate_unknown_type() {
        let today = date("2026-03-01");
        let err = validate_new_block(
            date("2026-03-10"),
            date("2026-03-10"),
            "holiday",
            None,
            None,
            today,
        );
        assert!(err.is_err());
    }

    // ── affected_appointments ──

    #[test]
    fn test_full_day_block_hits_every_appointment_on_date() {
        let busy = vec![busy(1, "2026-03-10 10:00", 30), busy(2, "2026-03-10 15:00", 60)];
        let hits = affected_appointments(
            &busy,
            date("2026-03-10"),
            date("2026-03-10"),
            BLOCK_FULL_DAY,
            None,
            None,
        );
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_partial_block_hits_overlapping_appointment() {
        let busy = vec![busy(1, "2026-03-10 10:30", 30)];
        let hits = affected_appointments(
            &busy,
            date("2026-03-10"),
            date("2026-03-10"),
            BLOCK_PARTIAL,
            Some("10:00"),
            Some("12:00"),
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);
    }

    #[test]
    fn test_partial_block_half_open_boundaries() {
        // Ends exactly at window start / starts exactly at window end.
        let busy = vec![busy(1, "2026-03-10 09:00", 60), busy(2, "2026-03-10 12:00", 30)];
        let hits = affected_appointments(
            &busy,
            date("2026-03-10"),
            date("2026-03-10"),
            BLOCK_PARTIAL,
            Some("10:00"),
            Some("12:00"),
        );
        assert!(hits.is_empty());
    }

    #[test]
    fn test_appointments_outside_date_range_ignored() {
        let busy = vec![busy(1, "2026-03-09 10:00", 30), busy(2, "2026-03-13 10:00", 30)];
        let hits = affected_appointments(
            &busy,
            date("2026-03-10"),
            date("2026-03-12"),
            BLOCK_FULL_DAY,
            None,
            None,
        );
        assert!(hits.is_empty());
    }

    #[test]
    fn test_cancelled_appointments_ignored() {
        let mut appt = busy(1, "2026-03-10 10:00", 30);
        appt.status = crate::models::STATUS_CANCELLED.into();
        let busy = [appt];
        let hits = affected_appointments(
            &busy,
            date("2026-03-10"),
            date("2026-03-10"),
            BLOCK_FULL_DAY,
            None,
            None,
        );
        assert!(hits.is_empty());
    }
}
