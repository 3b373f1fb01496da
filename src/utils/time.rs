use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc, Weekday};

use crate::config::get_config;

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current wall-clock date and time at the business location. Interviews are
/// booked against this clock, not UTC.
pub fn business_now() -> NaiveDateTime {
    let offset = get_config().business_utc_offset_minutes;
    (Utc::now() + Duration::minutes(offset as i64)).naive_utc()
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
