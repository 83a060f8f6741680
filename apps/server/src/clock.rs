use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};

/// Current wall-clock time in the salon's frame. Every stored datetime
/// is naive and lives in this one frame, so comparisons against it
/// need no further conversion.
pub fn salon_now(utc_offset_minutes: i64) -> NaiveDateTime {
    Utc::now().naive_utc() + Duration::minutes(utc_offset_minutes)
}

pub fn salon_today(utc_offset_minutes: i64) -> NaiveDate {
    salon_now(utc_offset_minutes).date()
}
