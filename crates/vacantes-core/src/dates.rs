//! Listing dates are published as `DD/MM/YYYY` in the source's civil time,
//! a fixed UTC-05:00 offset with no daylight saving. Every date, and "today"
//! for day counts, is evaluated in that offset regardless of the host zone.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use thiserror::Error;

/// Seconds west of UTC for the civil timezone.
pub const CIVIL_OFFSET_WEST_SECS: i32 = 5 * 3600;

const SECS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("malformed date {0:?}, expected DD/MM/YYYY")]
    Malformed(String),
    #[error("date {0:?} is not a valid calendar day")]
    OutOfRange(String),
}

pub fn civil_offset() -> FixedOffset {
    FixedOffset::west_opt(CIVIL_OFFSET_WEST_SECS).expect("civil offset is within one day")
}

/// Midnight of `date` in the civil timezone.
pub fn civil_midnight(date: NaiveDate) -> DateTime<FixedOffset> {
    let naive = date.and_time(chrono::NaiveTime::MIN);
    civil_offset()
        .from_local_datetime(&naive)
        .single()
        .expect("fixed offsets have no gaps or folds")
}

/// Parse a `DD/MM/YYYY` listing date into midnight of that day at UTC-05:00.
///
/// One-digit day and month components are accepted and treated as zero-padded.
pub fn normalize_date(input: &str) -> Result<DateTime<FixedOffset>, DateError> {
    let trimmed = input.trim();
    let parts: Vec<&str> = trimmed.split('/').collect();
    let &[day, month, year] = parts.as_slice() else {
        return Err(DateError::Malformed(input.to_string()));
    };

    let parse = |s: &str| -> Result<u32, DateError> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DateError::Malformed(input.to_string()));
        }
        s.parse().map_err(|_| DateError::Malformed(input.to_string()))
    };
    if year.len() != 4 || day.len() > 2 || month.len() > 2 {
        return Err(DateError::Malformed(input.to_string()));
    }
    let (day, month, year) = (parse(day)?, parse(month)?, parse(year)?);

    let date = NaiveDate::from_ymd_opt(year as i32, month, day)
        .ok_or_else(|| DateError::OutOfRange(input.to_string()))?;
    Ok(civil_midnight(date))
}

/// The civil calendar day containing `now`.
pub fn civil_today(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&civil_offset()).date_naive()
}

/// Whole days from civil midnight of `today` until `closing`, floored.
pub fn days_remaining(closing: DateTime<FixedOffset>, today: NaiveDate) -> i64 {
    let elapsed = closing.signed_duration_since(civil_midnight(today));
    elapsed.num_seconds().div_euclid(SECS_PER_DAY)
}

/// Render an instant back as the source's `DD/MM/YYYY`.
pub fn format_civil_date(value: DateTime<FixedOffset>) -> String {
    value.with_timezone(&civil_offset()).format("%d/%m/%Y").to_string()
}
