pub mod appointments;
pub mod blocks;
pub mod clients;
pub mod health;
pub mod public;
pub mod services;
pub mod settings;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::ApiError;

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::Validation("Invalid date format, expected YYYY-MM-DD".into()))
}

pub(crate) fn parse_time(raw: &str) -> Result<NaiveTime, ApiError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| ApiError::Validation("Invalid time format, expected HH:MM".into()))
}

pub(crate) fn parse_start_at(date: &str, time: &str) -> Result<NaiveDateTime, ApiError> {
    Ok(parse_date(date)?.and_time(parse_time(time)?))
}
