use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const DATE_FORMAT: &str = "%Y-%m-%d";

const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Reads a calendar date, keeping only the date part of a timestamp.
///
/// `"2024-01-10"` and `"2024-01-10T23:30:00+02:00"` both read as 2024-01-10.
#[must_use]
pub fn parse_date_prefix(input: &str) -> Option<NaiveDate> {
    let input = input.trim();

    NaiveDate::parse_from_str(input, DATE_FORMAT)
        .ok()
        .or_else(|| {
            input
                .get(..10)
                .and_then(|head| NaiveDate::parse_from_str(head, DATE_FORMAT).ok())
        })
}

/// Reads a timestamp as written by the store.
///
/// Accepts RFC 3339, Postgres `timestamptz` text (`2024-01-10 08:00:00.5+00`),
/// and zone-less timestamps or bare dates, which are taken as UTC.
#[must_use]
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}
