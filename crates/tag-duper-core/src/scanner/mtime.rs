use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use std::time::SystemTime;

const BASE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How a recorded modification time relates to the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MtimeComparison {
    Same,
    /// Equal at whole-second precision, different below it (or only in notation).
    SubsecondOnly,
    Different,
}

/// Render a filesystem timestamp as `YYYY-MM-DD HH:MM:SS[.fraction]` in UTC.
pub fn canonical_mtime(time: SystemTime) -> String {
    let datetime: DateTime<Utc> = time.into();
    format_canonical(&datetime.naive_utc())
}

/// Canonical text for a UTC timestamp: the fraction is omitted when zero and
/// trailing zeros are trimmed otherwise.
pub fn format_canonical(datetime: &NaiveDateTime) -> String {
    let mut text = datetime.format(BASE_FORMAT).to_string();
    let nanos = datetime.nanosecond() % 1_000_000_000;
    if nanos > 0 {
        let fraction = format!("{:09}", nanos);
        text.push('.');
        text.push_str(fraction.trim_end_matches('0'));
    }
    text
}

/// Parse a recorded timestamp in any of the notations TMSU has stored over time
/// (optional fraction, optional `T` separator, optional `Z`/offset suffix).
pub fn parse_mtime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();

    for format in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(datetime) = DateTime::parse_from_str(text, format) {
            return Some(datetime.naive_utc());
        }
    }

    let text = text.strip_suffix('Z').unwrap_or(text);
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

/// Normalize recorded text to canonical form, or `None` if it cannot be parsed.
pub fn normalize_mtime(text: &str) -> Option<String> {
    parse_mtime(text).map(|datetime| format_canonical(&datetime))
}

/// True when both texts name the same instant.
pub fn same_instant(recorded: &str, live: &str) -> bool {
    recorded == live
        || matches!(
            (normalize_mtime(recorded), normalize_mtime(live)),
            (Some(a), Some(b)) if a == b
        )
}

pub fn compare_mtimes(recorded: &str, live: &str) -> MtimeComparison {
    if recorded == live {
        return MtimeComparison::Same;
    }

    match (parse_mtime(recorded), parse_mtime(live)) {
        (Some(a), Some(b)) if a.and_utc().timestamp() == b.and_utc().timestamp() => {
            MtimeComparison::SubsecondOnly
        }
        _ => MtimeComparison::Different,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_canonical_mtime_whole_seconds() {
        let time = UNIX_EPOCH + Duration::from_secs(1_346_679_318);
        assert_eq!(canonical_mtime(time), "2012-09-03 13:35:18");
    }

    #[test]
    fn test_canonical_mtime_trims_trailing_zeros() {
        let time = UNIX_EPOCH + Duration::new(1_346_679_318, 500_000_000);
        assert_eq!(canonical_mtime(time), "2012-09-03 13:35:18.5");

        let time = UNIX_EPOCH + Duration::new(1_346_679_318, 123_456_789);
        assert_eq!(canonical_mtime(time), "2012-09-03 13:35:18.123456789");
    }

    #[test]
    fn test_normalize_recorded_notations() {
        assert_eq!(
            normalize_mtime("2012-09-03 13:35:18.50").as_deref(),
            Some("2012-09-03 13:35:18.5")
        );
        assert_eq!(
            normalize_mtime("2012-09-03 13:35:18.000").as_deref(),
            Some("2012-09-03 13:35:18")
        );
        assert_eq!(
            normalize_mtime("2012-09-03 15:35:18.25+02:00").as_deref(),
            Some("2012-09-03 13:35:18.25")
        );
        assert_eq!(
            normalize_mtime("2012-09-03T13:35:18Z").as_deref(),
            Some("2012-09-03 13:35:18")
        );
        assert_eq!(normalize_mtime("yesterday"), None);
    }

    #[test]
    fn test_compare_subsecond_only() {
        assert_eq!(
            compare_mtimes("2020-01-01 00:00:00", "2020-01-01 00:00:00.0"),
            MtimeComparison::SubsecondOnly
        );
        assert_eq!(
            compare_mtimes("2020-01-01 00:00:00", "2020-01-01 00:00:00.75"),
            MtimeComparison::SubsecondOnly
        );
    }

    #[test]
    fn test_compare_same_and_different() {
        assert_eq!(
            compare_mtimes("2020-01-01 00:00:00.5", "2020-01-01 00:00:00.5"),
            MtimeComparison::Same
        );
        assert_eq!(
            compare_mtimes("2020-01-01 00:00:00", "2020-01-01 00:00:01"),
            MtimeComparison::Different
        );
        assert_eq!(
            compare_mtimes("garbage", "2020-01-01 00:00:01"),
            MtimeComparison::Different
        );
    }

    #[test]
    fn test_same_instant_ignores_notation() {
        assert!(same_instant("2020-01-01 00:00:00.500", "2020-01-01 00:00:00.5"));
        assert!(!same_instant("2020-01-01 00:00:00", "2020-01-01 00:00:00.5"));
    }
}
