/*!
 * Timestamp and magnitude codec
 *
 * Converts the free-form timestamps found in SnapMirror audit logs
 * (`Wed Jul  8 18:27:44 CEST 2020`) into a linear seconds count, and formats
 * durations and byte magnitudes for the report.
 *
 * The seconds count starts at 2000-01-01 00:00:00 and accumulates one leap
 * day every four years with no century exception. Values produced here are
 * only comparable with each other, not with any real epoch.
 */

use thiserror::Error;
use tracing::trace;

/// Linear seconds value produced by [`parse_timestamp`]
pub type EpochSeconds = i64;

pub const MIN_SECONDS: i32 = 60;
pub const HOUR_SECONDS: i32 = 60 * MIN_SECONDS;
pub const DAY_SECONDS: i32 = 24 * HOUR_SECONDS;
/// A year without its Feb 29th
pub const YEAR_SECONDS: i32 = 365 * DAY_SECONDS;

/// First year accepted in a timestamp
pub const MIN_YEAR: i32 = 2003;
/// Years from here on are rejected
pub const MAX_YEAR: i32 = 2999;

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const MONTH_LENGTHS: [i32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Suffixes applied by [`format_scaled_magnitude`], one per division by 1024
const MAGNITUDE_SUFFIXES: [&str; 5] = ["", "k", "M", "G", "T"];

/// Largest value rendered without scaling
const MAGNITUDE_LIMIT: f64 = 9999.0;

/// Errors raised while parsing a timestamp
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("timestamp '{input}' has no {field} [www MMM dd HH:mm:ss (TZ) YYYY]")]
    MissingField {
        field: TimestampField,
        input: String,
    },

    #[error("timestamp '{input}' has an invalid day for {month}: {day}")]
    InvalidDayForMonth {
        month: &'static str,
        day: u32,
        input: String,
    },
}

/// The mandatory parts of a timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampField {
    Year,
    Month,
    Day,
    TimeOfDay,
}

impl std::fmt::Display for TimestampField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimestampField::Year => write!(f, "year"),
            TimestampField::Month => write!(f, "month"),
            TimestampField::Day => write!(f, "day of month"),
            TimestampField::TimeOfDay => write!(f, "HH:mm:ss time"),
        }
    }
}

/// Parse a whitespace separated timestamp into [`EpochSeconds`]
///
/// Token order does not matter. The weekday is consumed but not checked
/// against the date, and any token that is not a weekday, month, day,
/// `HH:MM:SS` time or year (a timezone name, for instance) is discarded.
///
/// # Errors
///
/// [`TimestampError::MissingField`] when year, month, day or time of day is
/// absent, [`TimestampError::InvalidDayForMonth`] when the day does not exist
/// in the month. Feb 29th is accepted in every year divisible by four.
pub fn parse_timestamp(text: &str) -> Result<EpochSeconds, TimestampError> {
    let mut weekday: Option<usize> = None;
    let mut month: Option<u32> = None;
    let mut day: Option<u32> = None;
    let mut time_of_day: Option<i32> = None;
    let mut year: Option<i32> = None;

    for token in text.split_whitespace() {
        if weekday.is_none() {
            if let Some(idx) = weekday_index(token) {
                weekday = Some(idx);
                continue;
            }
        }
        if month.is_none() {
            if let Some(idx) = month_index(token) {
                month = Some(idx);
                continue;
            }
        }
        if day.is_none() {
            if let Some(value) = parse_day(token) {
                day = Some(value);
                continue;
            }
        }
        if time_of_day.is_none() {
            if let Some(value) = parse_time_of_day(token) {
                time_of_day = Some(value);
                continue;
            }
        }
        if year.is_none() {
            if let Some(value) = parse_year(token) {
                year = Some(value);
                continue;
            }
        }
        trace!("Discarding timestamp token '{}'", token);
    }

    let missing = |field| TimestampError::MissingField {
        field,
        input: text.to_string(),
    };
    let year = year.ok_or_else(|| missing(TimestampField::Year))?;
    let month = month.ok_or_else(|| missing(TimestampField::Month))?;
    let day = day.ok_or_else(|| missing(TimestampField::Day))?;
    let time_of_day = time_of_day.ok_or_else(|| missing(TimestampField::TimeOfDay))?;

    let month_length = MONTH_LENGTHS[(month - 1) as usize];
    let leap_day = year % 4 == 0 && month == 2 && day == 29;
    if day as i32 > month_length && !leap_day {
        return Err(TimestampError::InvalidDayForMonth {
            month: MONTH_NAMES[(month - 1) as usize],
            day,
            input: text.to_string(),
        });
    }

    let seconds = epoch_seconds(year, month, day, time_of_day);
    trace!(
        "Converted {}/{}/{:02} +{}s to {} seconds",
        year,
        MONTH_NAMES[(month - 1) as usize],
        day,
        time_of_day,
        seconds
    );
    Ok(seconds)
}

/// Linear seconds for an already validated date
fn epoch_seconds(year: i32, month: u32, day: u32, time_of_day: i32) -> EpochSeconds {
    // Feb 29th days over the years, including the current year
    let mut total = i64::from(DAY_SECONDS * ((year - 1996) / 4));

    let elapsed_years = year - 2000;
    if elapsed_years > i32::MAX / YEAR_SECONDS {
        for _ in 0..elapsed_years {
            total += i64::from(YEAR_SECONDS);
        }
    } else {
        total += i64::from(YEAR_SECONDS * elapsed_years);
    }

    for length in &MONTH_LENGTHS[..(month - 1) as usize] {
        total += i64::from(length * DAY_SECONDS);
    }
    // this year's Feb 29th has not been reached yet
    if year % 4 == 0 && month <= 2 {
        total -= i64::from(DAY_SECONDS);
    }

    total + i64::from((day as i32 - 1) * DAY_SECONDS + time_of_day)
}

fn weekday_index(token: &str) -> Option<usize> {
    if token.len() != 3 {
        return None;
    }
    WEEKDAYS
        .iter()
        .position(|name| name.eq_ignore_ascii_case(token))
}

/// Month number (Jan = 1), using only the first three characters
fn month_index(token: &str) -> Option<u32> {
    let prefix: String = token.chars().take(3).collect();
    if prefix.chars().count() != 3 {
        return None;
    }
    MONTH_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(&prefix))
        .map(|idx| idx as u32 + 1)
}

fn all_digits(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

fn parse_day(token: &str) -> Option<u32> {
    if token.len() > 2 || !all_digits(token) {
        return None;
    }
    token.parse().ok().filter(|day| (1..=31).contains(day))
}

/// Seconds of day for a strict `HH:MM:SS` token; 23:59:60 is the only leap second
fn parse_time_of_day(token: &str) -> Option<i32> {
    let bytes = token.as_bytes();
    if bytes.len() != 8 || bytes[2] != b':' || bytes[5] != b':' {
        return None;
    }
    let field = |range: std::ops::Range<usize>| -> Option<i32> {
        let part = &token[range];
        if all_digits(part) {
            part.parse().ok()
        } else {
            None
        }
    };
    let hours = field(0..2)?;
    let minutes = field(3..5)?;
    let seconds = field(6..8)?;

    let leap_second = hours == 23 && minutes == 59 && seconds == 60;
    if hours < 24 && minutes < 60 && (seconds < 60 || leap_second) {
        Some(hours * HOUR_SECONDS + minutes * MIN_SECONDS + seconds)
    } else {
        None
    }
}

fn parse_year(token: &str) -> Option<i32> {
    if token.len() != 4 || !all_digits(token) {
        return None;
    }
    token
        .parse()
        .ok()
        .filter(|year| (MIN_YEAR..MAX_YEAR).contains(year))
}

/// Format a second count as `1d02h03m04s`
///
/// Leading zero units are left out; once a unit has been written every
/// smaller unit follows, padded to two digits. Negative values come out as
/// plain seconds.
pub fn format_duration(seconds: i64) -> String {
    let units = [
        (i64::from(DAY_SECONDS), 'd'),
        (i64::from(HOUR_SECONDS), 'h'),
        (i64::from(MIN_SECONDS), 'm'),
    ];

    let mut buf = String::new();
    let mut rest = seconds;
    let mut emitted = false;
    for (unit_seconds, suffix) in units {
        if emitted || rest >= unit_seconds {
            let count = rest / unit_seconds;
            if emitted {
                buf.push_str(&format!("{:02}{}", count, suffix));
            } else {
                buf.push_str(&format!("{}{}", count, suffix));
            }
            rest -= count * unit_seconds;
            emitted = true;
        }
    }
    if emitted {
        buf.push_str(&format!("{:02}s", rest));
    } else {
        buf.push_str(&format!("{}s", rest));
    }
    buf
}

/// Divide by 1024 while the value exceeds 9999 and append k, M, G or T
///
/// The result has exactly one fractional digit, truncated rather than rounded.
pub fn format_scaled_magnitude(value: f64) -> String {
    let mut scaled = value;
    let mut suffix = 0;
    while scaled > MAGNITUDE_LIMIT && suffix < MAGNITUDE_SUFFIXES.len() - 1 {
        scaled /= 1024.0;
        suffix += 1;
    }

    let digits = scaled.to_string();
    let number = match digits.find('.') {
        Some(dot) if dot + 2 <= digits.len() => digits[..dot + 2].to_string(),
        _ => format!("{}.0", digits),
    };
    format!("{}{}", number, MAGNITUDE_SUFFIXES[suffix])
}

#[cfg(test)]
mod tests {
    use super::*;

    const JUL_8_2020: EpochSeconds = 647_548_064;

    #[test]
    fn test_parse_snapmirror_timestamp() {
        assert_eq!(
            parse_timestamp("Wed Jul  8 18:27:44 CEST 2020").unwrap(),
            JUL_8_2020
        );
    }

    #[test]
    fn test_parse_is_order_independent() {
        let orders = [
            "Wed Jul 8 18:27:44 CEST 2020",
            "2020 18:27:44 8 Jul Wed",
            "8 Jul 2020 18:27:44",
            "18:27:44 UTC Wed 2020 Jul 8",
            "Jul 2020 Wed 8 18:27:44",
        ];
        for text in orders {
            assert_eq!(parse_timestamp(text).unwrap(), JUL_8_2020, "{}", text);
        }
    }

    #[test]
    fn test_long_month_names_are_cut_short() {
        assert_eq!(
            parse_timestamp("Wed July 8 18:27:44 2020").unwrap(),
            JUL_8_2020
        );
        assert_eq!(
            parse_timestamp("wed JUL 8 18:27:44 2020").unwrap(),
            JUL_8_2020
        );
    }

    #[test]
    fn test_start_of_supported_range() {
        // 2000, 2001 and 2002 precede it
        assert_eq!(
            parse_timestamp("Jan 1 00:00:00 2003").unwrap(),
            1096 * i64::from(DAY_SECONDS)
        );
        assert_eq!(
            parse_timestamp("Jan 1 00:00:00 2004").unwrap(),
            1461 * i64::from(DAY_SECONDS)
        );
    }

    #[test]
    fn test_leap_day_is_counted_once() {
        let feb_29 = parse_timestamp("Feb 29 00:00:00 2004").unwrap();
        let mar_1 = parse_timestamp("Mar 1 00:00:00 2004").unwrap();
        assert_eq!(feb_29, 1520 * i64::from(DAY_SECONDS));
        assert_eq!(mar_1 - feb_29, i64::from(DAY_SECONDS));

        let feb_28_2005 = parse_timestamp("Feb 28 00:00:00 2005").unwrap();
        let mar_1_2005 = parse_timestamp("Mar 1 00:00:00 2005").unwrap();
        assert_eq!(mar_1_2005 - feb_28_2005, i64::from(DAY_SECONDS));
    }

    #[test]
    fn test_century_years_are_leap_years() {
        // no exception for years divisible by 100
        let feb_29 = parse_timestamp("Feb 29 00:00:00 2100").unwrap();
        assert_eq!(feb_29, 36_584 * i64::from(DAY_SECONDS));
        assert_eq!(
            parse_timestamp("Mar 1 00:00:00 2100").unwrap(),
            36_585 * i64::from(DAY_SECONDS)
        );
    }

    #[test]
    fn test_year_guard_boundary_is_continuous() {
        let dec_31_2068 = parse_timestamp("Dec 31 00:00:00 2068").unwrap();
        let jan_1_2069 = parse_timestamp("Jan 1 00:00:00 2069").unwrap();
        assert_eq!(jan_1_2069 - dec_31_2068, i64::from(DAY_SECONDS));
    }

    #[test]
    fn test_invalid_day_for_month() {
        let err = parse_timestamp("Feb 29 10:00:00 2021").unwrap_err();
        assert!(matches!(
            err,
            TimestampError::InvalidDayForMonth { month: "Feb", day: 29, .. }
        ));
        assert!(parse_timestamp("Apr 31 10:00:00 2021").is_err());
        assert!(parse_timestamp("Feb 30 10:00:00 2020").is_err());
    }

    #[test]
    fn test_missing_fields() {
        let field_of = |text: &str| match parse_timestamp(text) {
            Err(TimestampError::MissingField { field, .. }) => field,
            other => panic!("unexpected result {:?}", other),
        };
        assert_eq!(field_of("Wed Jul 8 18:27:44 CEST"), TimestampField::Year);
        assert_eq!(field_of("Wed 8 18:27:44 2020"), TimestampField::Month);
        assert_eq!(field_of("Wed Jul 18:27:44 2020"), TimestampField::Day);
        assert_eq!(field_of("Wed Jul 8 2020"), TimestampField::TimeOfDay);
    }

    #[test]
    fn test_out_of_range_tokens_are_discarded() {
        // day 32, year 2002 and year 2999 do not count
        assert!(parse_timestamp("Jul 32 18:27:44 2020").is_err());
        assert!(parse_timestamp("Jul 8 18:27:44 2002").is_err());
        assert!(parse_timestamp("Jul 8 18:27:44 2999").is_err());
        assert!(parse_timestamp("Jul 8 18:27:44 2998").is_ok());
        assert!(parse_timestamp("Jul 8 18:7:44 2020").is_err());
    }

    #[test]
    fn test_leap_second_only_at_end_of_day() {
        let before = parse_timestamp("Dec 31 23:59:59 2020").unwrap();
        let leap = parse_timestamp("Dec 31 23:59:60 2020").unwrap();
        assert_eq!(leap - before, 1);
        assert!(parse_timestamp("Dec 31 23:58:60 2020").is_err());
        assert!(parse_timestamp("Dec 31 24:00:00 2020").is_err());
    }

    #[test]
    fn test_format_duration_unit_boundaries() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(10), "10s");
        assert_eq!(format_duration(59), "59s");
        assert_eq!(format_duration(60), "1m00s");
        assert_eq!(format_duration(61), "1m01s");
        assert_eq!(format_duration(3600), "1h00m00s");
        assert_eq!(format_duration(3661), "1h01m01s");
        assert_eq!(format_duration(86_400), "1d00h00m00s");
        assert_eq!(format_duration(2 * 86_400 + 5), "2d00h00m05s");
    }

    #[test]
    fn test_format_negative_duration() {
        assert_eq!(format_duration(-5), "-5s");
    }

    #[test]
    fn test_format_scaled_magnitude() {
        assert_eq!(format_scaled_magnitude(0.0), "0.0");
        assert_eq!(format_scaled_magnitude(512.0), "512.0");
        assert_eq!(format_scaled_magnitude(9999.0), "9999.0");
        assert_eq!(format_scaled_magnitude(10_000.0), "9.7k");
        assert_eq!(format_scaled_magnitude(104_857.6), "102.4k");
        assert_eq!(format_scaled_magnitude(1_048_576.0), "1024.0k");
        assert_eq!(format_scaled_magnitude(20.0 * 1024.0 * 1024.0), "20.0M");
    }

    #[test]
    fn test_format_scaled_magnitude_caps_at_tera() {
        let value = 2f64.powi(70);
        assert_eq!(format_scaled_magnitude(value), "1073741824.0T");
    }
}
