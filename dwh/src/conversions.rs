//! Lenient coercions from untyped staging cells to the types the engine needs.
//!
//! Staging snapshots are untyped, so identifiers may arrive as floats from
//! columnar intermediates and dates as several string shapes. These helpers
//! accept the shapes that legitimately occur and return [`None`] for everything
//! else; callers decide whether a failed coercion quarantines the row.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::types::{Cell, DATE_FORMAT};

/// Timestamp shape without an offset, as emitted by some staging writers.
const NAIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Coerces a cell to an integer identifier.
///
/// Floats are accepted only when they carry an exact integer value.
pub fn to_i64(cell: &Cell) -> Option<i64> {
    match cell {
        Cell::I64(value) => Some(*value),
        Cell::F64(value) if value.is_finite() && value.fract() == 0.0 => {
            if *value >= i64::MIN as f64 && *value <= i64::MAX as f64 {
                Some(*value as i64)
            } else {
                None
            }
        }
        Cell::String(value) => value.trim().parse().ok(),
        _ => None,
    }
}

/// Coerces a cell to a float measure.
pub fn to_f64(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::F64(value) => Some(*value),
        Cell::I64(value) => Some(*value as f64),
        Cell::String(value) => value.trim().parse().ok(),
        _ => None,
    }
}

/// Coerces a cell to an exact decimal, for money measures.
pub fn to_numeric(cell: &Cell) -> Option<BigDecimal> {
    match cell {
        Cell::Numeric(value) => Some(value.clone()),
        Cell::I64(value) => Some(BigDecimal::from(*value)),
        Cell::F64(value) => BigDecimal::try_from(*value).ok(),
        Cell::String(value) => BigDecimal::from_str(value.trim()).ok(),
        _ => None,
    }
}

/// Coerces a cell to a calendar date.
///
/// Strings are accepted as plain dates, RFC 3339 timestamps, or naive
/// timestamps; timestamps contribute their date part.
pub fn to_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Date(value) => Some(*value),
        Cell::Timestamp(value) => Some(value.date_naive()),
        Cell::String(value) => {
            let raw = value.trim();
            if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
                return Some(date);
            }
            to_timestamp(cell).map(|timestamp| timestamp.date_naive())
        }
        _ => None,
    }
}

/// Coerces a cell to a UTC timestamp.
pub fn to_timestamp(cell: &Cell) -> Option<DateTime<Utc>> {
    match cell {
        Cell::Timestamp(value) => Some(*value),
        Cell::String(value) => {
            let raw = value.trim();
            if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
                return Some(timestamp.with_timezone(&Utc));
            }
            NaiveDateTime::parse_from_str(raw, NAIVE_TIMESTAMP_FORMAT)
                .ok()
                .map(|naive| naive.and_utc())
        }
        _ => None,
    }
}

/// Coerces a cell to text.
pub fn to_text(cell: &Cell) -> Option<String> {
    match cell {
        Cell::String(value) => Some(value.clone()),
        Cell::I64(value) => Some(value.to_string()),
        Cell::F64(value) => Some(value.to_string()),
        Cell::Bool(value) => Some(value.to_string()),
        Cell::Numeric(value) => Some(value.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_i64_accepts_integral_floats() {
        assert_eq!(to_i64(&Cell::I64(55)), Some(55));
        assert_eq!(to_i64(&Cell::F64(55.0)), Some(55));
        assert_eq!(to_i64(&Cell::String(" 55 ".to_string())), Some(55));
        assert_eq!(to_i64(&Cell::F64(55.5)), None);
        assert_eq!(to_i64(&Cell::F64(f64::NAN)), None);
        assert_eq!(to_i64(&Cell::Null), None);
    }

    #[test]
    fn test_to_numeric_from_common_shapes() {
        assert_eq!(
            to_numeric(&Cell::String("1500.50".to_string())),
            Some(BigDecimal::from_str("1500.50").unwrap())
        );
        assert_eq!(to_numeric(&Cell::I64(25)), Some(BigDecimal::from(25)));
        assert_eq!(to_numeric(&Cell::Bool(true)), None);
    }

    #[test]
    fn test_to_date_from_string_shapes() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(to_date(&Cell::String("2024-03-05".to_string())), Some(expected));
        assert_eq!(
            to_date(&Cell::String("2024-03-05T10:30:00Z".to_string())),
            Some(expected)
        );
        assert_eq!(
            to_date(&Cell::String("2024-03-05T10:30:00.123".to_string())),
            Some(expected)
        );
        assert_eq!(to_date(&Cell::String("garbage".to_string())), None);
    }

    #[test]
    fn test_to_timestamp_normalizes_offsets() {
        let timestamp = to_timestamp(&Cell::String("2024-03-05T10:30:00+02:00".to_string()));
        assert_eq!(
            timestamp,
            Some("2024-03-05T08:30:00Z".parse::<DateTime<Utc>>().unwrap())
        );
    }
}
