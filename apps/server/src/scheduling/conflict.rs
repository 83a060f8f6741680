use chrono::{Duration, NaiveDateTime};

use crate::models::{BusyAppointment, STATUS_CANCELLED};

/// Half-open interval overlap: `[s1, e1)` intersects `[s2, e2)`.
/// Back-to-back intervals do not overlap.
pub fn intervals_overlap(s1: i64, e1: i64, s2: i64, e2: i64) -> bool {
    s1 < e2 && s2 < e1
}

/// Find the first appointment whose window collides with
/// `[start, start + duration_min)`.
///
/// Cancelled rows and `exclude_id` (the appointment being rescheduled)
/// are skipped. Callers pass `existing` sorted by start ascending, so
/// the reported conflict is the earliest one.
pub fn find_conflict<'a>(
    start: NaiveDateTime,
    duration_min: i64,
    existing: &'a [BusyAppointment],
    exclude_id: Option<i64>,
) -> Option<&'a BusyAppointment> {
    let end = start + Duration::minutes(duration_min);
    for appt in existing {
        if Some(appt.id) == exclude_id {
            continue;
        }
        if appt.status == STATUS_CANCELLED {
            continue;
        }
        let busy_start = appt.start_at;
        let busy_end = busy_start + Duration::minutes(appt.duration_min);

        let starts_inside = start >= busy_start && start < busy_end;
        let ends_inside = end > busy_start && end <= busy_end;
        let encloses = start <= busy_start && end >= busy_end;

        if starts_inside || ends_inside || encloses {
            return Some(appt);
        }
    }
    None
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{STATUS_CONFIRMED, STATUS_PENDING};

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
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

    // ── intervals_overlap ──

    #[test]
    fn test_overlap_plain() {
        assert!(intervals_overlap(600, 660, 630, 690));
    }

    #[test]
    fn test_overlap_symmetric() {
        assert_eq!(
            intervals_overlap(600, 660, 630, 690),
            intervals_overlap(630, 690, 600, 660)
        );
    }

    #[test]
    fn test_overlap_touching_intervals_do_not_overlap() {
        assert!(!intervals_overlap(600, 630, 630, 660));
        assert!(!intervals_overlap(630, 660, 600, 630));
    }

    #[test]
    fn test_overlap_contained() {
        assert!(intervals_overlap(600, 720, 630, 660));
    }

    // ── find_conflict ──

    #[test]
    fn test_candidate_starting_inside_conflicts() {
        // 10:15–10:45 against 10:00–10:30.
        let existing = vec![busy(1, "2026-03-02 10:00", 30)];
        let hit = find_conflict(at("2026-03-02 10:15"), 30, &existing, None);
        assert_eq!(hit.map(|a| a.id), Some(1));
    }

    #[test]
    fn test_candidate_ending_inside_conflicts() {
        let existing = vec![busy(1, "2026-03-02 10:00", 30)];
        let hit = find_conflict(at("2026-03-02 09:45"), 30, &existing, None);
        assert_eq!(hit.map(|a| a.id), Some(1));
    }

    #[test]
    fn test_candidate_enclosing_conflicts() {
        let existing = vec![busy(1, "2026-03-02 10:00", 30)];
        let hit = find_conflict(at("2026-03-02 09:00"), 180, &existing, None);
        assert_eq!(hit.map(|a| a.id), Some(1));
    }

    #[test]
    fn test_identical_window_conflicts() {
        let existing = vec![busy(1, "2026-03-02 10:00", 30)];
        let hit = find_conflict(at("2026-03-02 10:00"), 30, &existing, None);
        assert_eq!(hit.map(|a| a.id), Some(1));
    }

    #[test]
    fn test_back_to_back_after_is_free() {
        let existing = vec![busy(1, "2026-03-02 10:00", 30)];
        assert!(find_conflict(at("2026-03-02 10:30"), 30, &existing, None).is_none());
    }

    #[test]
    fn test_back_to_back_before_is_free() {
        let existing = vec![busy(1, "2026-03-02 10:00", 30)];
        assert!(find_conflict(at("2026-03-02 09:30"), 30, &existing, None).is_none());
    }

    #[test]
    fn test_cancelled_appointment_is_skipped() {
        // The slot freed by a cancellation is immediately bookable again.
        let mut existing = vec![busy(1, "2026-03-02 10:00", 30)];
        existing[0].status = STATUS_CANCELLED.into();
        assert!(find_conflict(at("2026-03-02 10:00"), 30, &existing, None).is_none());
    }

    #[test]
    fn test_pending_appointment_still_blocks() {
        let mut existing = vec![busy(1, "2026-03-02 10:00", 30)];
        existing[0].status = STATUS_PENDING.into();
        assert!(find_conflict(at("2026-03-02 10:00"), 30, &existing, None).is_some());
    }

    #[test]
    fn test_exclude_id_allows_rescheduling_over_self() {
        let existing = vec![busy(7, "2026-03-02 10:00", 30)];
        assert!(find_conflict(at("2026-03-02 10:00"), 30, &existing, Some(7)).is_none());
    }

    #[test]
    fn test_exclude_id_does_not_hide_others() {
        let existing = vec![
            busy(7, "2026-03-02 10:00", 30),
            busy(8, "2026-03-02 10:00", 30),
        ];
        let hit = find_conflict(at("2026-03-02 10:00"), 30, &existing, Some(7));
        assert_eq!(hit.map(|a| a.id), Some(8));
    }

    #[test]
    fn test_earliest_overlap_reported_first() {
        let existing = vec![
            busy(1, "2026-03-02 10:00", 60),
            busy(2, "2026-03-02 10:30", 60),
        ];
        let hit = find_conflict(at("2026-03-02 10:45"), 30, &existing, None);
        assert_eq!(hit.map(|a| a.id), Some(1));
    }

    #[test]
    fn test_no_conflict_on_empty_day() {
        assert!(find_conflict(at("2026-03-02 10:00"), 30, &[], None).is_none());
    }
}
