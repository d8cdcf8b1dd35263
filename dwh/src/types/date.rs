use chrono::{Datelike, NaiveDate};

/// Smart key locating a fact event in the pre-generated date dimension,
/// encoded as `YYYYMMDD`.
pub type DateKey = i32;

/// Format used for calendar dates in JSON encodings.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Encodes a calendar date as a [`DateKey`].
pub fn date_key(date: NaiveDate) -> DateKey {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}
