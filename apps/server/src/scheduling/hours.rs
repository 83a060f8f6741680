use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// Opening hours for a single weekday. Times are `HH:MM` strings, the
/// same shape the settings JSON stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    pub start: String,
    pub end: String,
    pub is_open: bool,
}

impl DayHours {
    pub fn open(start: &str, end: &str) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            is_open: true,
        }
    }

    pub fn closed() -> Self {
        Self {
            start: "00:00".into(),
            end: "00:00".into(),
            is_open: false,
        }
    }

    /// Open window as minutes from midnight.
    ///
    /// `None` when the day is closed, a time does not parse, or the
    /// window is empty. A `None` day generates no slots.
    pub fn open_window(&self) -> Option<(i64, i64)> {
        if !self.is_open {
            return None;
        }
        let start = parse_hhmm(&self.start)?;
        let end = parse_hhmm(&self.end)?;
        if start >= end {
            return None;
        }
        Some((start, end))
    }
}

/// Weekly opening hours, stored as JSON inside business settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekSchedule {
    pub monday: DayHours,
    pub tuesday: DayHours,
    pub wednesday: DayHours,
    pub thursday: DayHours,
    pub friday: DayHours,
    pub saturday: DayHours,
    pub sunday: DayHours,
}

impl Default for WeekSchedule {
    fn default() -> Self {
        Self {
            monday: DayHours::open("09:00", "18:00"),
            tuesday: DayHours::open("09:00", "18:00"),
            wednesday: DayHours::open("09:00", "18:00"),
            thursday: DayHours::open("09:00", "18:00"),
            friday: DayHours::open("09:00", "18:00"),
            saturday: DayHours::open("09:00", "14:00"),
            sunday: DayHours::closed(),
        }
    }
}

impl WeekSchedule {
    /// Parse the stored JSON, falling back to the built-in default when
    /// the value is missing or corrupt. Reading hours never fails.
    pub fn from_json(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_default()
    }

    pub fn day(&self, weekday: Weekday) -> &DayHours {
        match weekday {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }

    /// Validate before saving: open days need parseable times and a
    /// non-empty window.
    pub fn validate(&self) -> Result<(), String> {
        for (name, day) in self.days() {
            if !day.is_open {
                continue;
            }
            let start = parse_hhmm(&day.start)
                .ok_or_else(|| format!("{}: invalid start time '{}'", name, day.start))?;
            let end = parse_hhmm(&day.end)
                .ok_or_else(|| format!("{}: invalid end time '{}'", name, day.end))?;
            if start >= end {
                return Err(format!("{}: start must be before end", name));
            }
        }
        Ok(())
    }

    fn days(&self) -> [(&'static str, &DayHours); 7] {
        [
            ("monday", &self.monday),
            ("tuesday", &self.tuesday),
            ("wednesday", &self.wednesday),
            ("thursday", &self.thursday),
            ("friday", &self.friday),
            ("saturday", &self.saturday),
            ("sunday", &self.sunday),
        ]
    }
}

/// Parse `HH:MM` into minutes from midnight.
pub fn parse_hhmm(s: &str) -> Option<i64> {
    let (h, m) = s.split_once(':')?;
    let h: i64 = h.parse().ok()?;
    let m: i64 = m.parse().ok()?;
    if !(0..=23).contains(&h) || !(0..=59).contains(&m) {
        return None;
    }
    Some(h * 60 + m)
}

/// Format minutes from midnight as `HH:MM`.
pub fn format_hhmm(minutes: i64) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

// ── Tests ──
