//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for action request/completion times and event times.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Render a timestamp the way Thing descriptions carry it,
/// e.g. `2024-01-31T12:00:00+00:00`.
#[must_use]
pub fn format(ts: &Timestamp) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_format_with_explicit_utc_offset() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 31, 12, 5, 9).unwrap();
        assert_eq!(format(&ts), "2024-01-31T12:05:09+00:00");
    }
}
