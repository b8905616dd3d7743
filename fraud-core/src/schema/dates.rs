//! Date parsing for admission/discharge columns

use chrono::{NaiveDate, NaiveDateTime};

/// Date-only formats, tried in order
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Datetime formats; the time of day is discarded
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse a calendar date, or `None` when the cell is empty or unrecognized
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        for raw in [
            "2024-03-07",
            "2024/03/07",
            "03/07/2024",
            " 2024-03-07 ",
            "2024-03-07 14:30:00",
            "2024-03-07T14:30",
        ] {
            assert_eq!(parse_date(raw), Some(expected), "format {:?}", raw);
        }
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("   "), None);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("2024-02-30"), None);
    }
}
