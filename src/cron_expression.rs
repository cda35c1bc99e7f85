//! Five-field cron expressions (minute, hour, day-of-month, month, day-of-week).
//!
//! Each field is one of `*`, an integer, a range `a-b`, a list `a,b,c`, or a
//! step `*/n`. Fields are matched independently against the local time
//! components of a timestamp and the results are AND-combined.
//!
//! Next-run lookup is a forward simulation: starting at the minute after
//! "now", every minute is tested until one matches or the one-week window is
//! exhausted. That is O(window) per call, which is fine for the handful of
//! jobs a single scheduler owns. Callers only see [`next_run_time`] and
//! [`CronExpression::next_after`], so a field-arithmetic implementation can
//! replace it without touching them.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, Duration, Local, TimeZone, Timelike, Utc};
use thiserror::Error;

/// Number of minutes tested by next-run lookup (one week).
pub const MAX_LOOKAHEAD_MINUTES: u32 = 10_080;

const FIELD_NAMES: [&str; 5] = ["minute", "hour", "day of month", "month", "day of week"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronExpressionError {
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),
    #[error("unrecognized {field} field '{value}'")]
    Field { field: &'static str, value: String },
}

/// Matcher for a single cron field.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldMatcher {
    Any,
    Exact(u32),
    Range(u32, u32),
    List(Vec<u32>),
    Step(u32),
}

impl FieldMatcher {
    fn parse(field: &str) -> Option<Self> {
        if field == "*" {
            return Some(Self::Any);
        }

        if let Some(step) = field.strip_prefix("*/") {
            // `*/0` would divide by zero when matching
            return parse_number(step)
                .filter(|step| *step > 0)
                .map(Self::Step);
        }

        if let Some((start, end)) = field.split_once('-') {
            return Some(Self::Range(parse_number(start)?, parse_number(end)?));
        }

        if field.contains(',') {
            return field
                .split(',')
                .map(parse_number)
                .collect::<Option<Vec<_>>>()
                .map(Self::List);
        }

        parse_number(field).map(Self::Exact)
    }

    fn matches(&self, value: u32) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => value == *expected,
            Self::Range(start, end) => (*start..=*end).contains(&value),
            Self::List(values) => values.contains(&value),
            Self::Step(step) => value % step == 0,
        }
    }
}

fn parse_number(value: &str) -> Option<u32> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// A parsed, structurally valid cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    source: String,
    minute: FieldMatcher,
    hour: FieldMatcher,
    day_of_month: FieldMatcher,
    month: FieldMatcher,
    day_of_week: FieldMatcher,
}

impl CronExpression {
    pub fn parse(expression: &str) -> Result<Self, CronExpressionError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronExpressionError::FieldCount(fields.len()));
        }

        let matchers = fields
            .iter()
            .zip(FIELD_NAMES)
            .map(|(value, field)| {
                FieldMatcher::parse(value).ok_or_else(|| CronExpressionError::Field {
                    field,
                    value: (*value).to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let [minute, hour, day_of_month, month, day_of_week] =
            <[FieldMatcher; 5]>::try_from(matchers)
                .map_err(|matchers| CronExpressionError::FieldCount(matchers.len()))?;

        Ok(Self {
            source: expression.to_string(),
            minute,
            hour,
            day_of_month,
            month,
            day_of_week,
        })
    }

    /// The expression as originally written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `time`, read in its own time zone, satisfies every field.
    ///
    /// Day of week runs 0-6 with 0 being Sunday.
    pub fn matches<Tz: TimeZone>(&self, time: &DateTime<Tz>) -> bool {
        self.minute.matches(time.minute())
            && self.hour.matches(time.hour())
            && self.day_of_month.matches(time.day())
            && self.month.matches(time.month())
            && self.day_of_week.matches(time.weekday().num_days_from_sunday())
    }

    /// First matching minute strictly after `after`, probing at most
    /// [`MAX_LOOKAHEAD_MINUTES`] minutes.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.next_within(after, MAX_LOOKAHEAD_MINUTES)
    }

    pub fn next_within<Tz: TimeZone>(
        &self,
        after: &DateTime<Tz>,
        max_steps: u32,
    ) -> Option<DateTime<Tz>> {
        let mut candidate = next_minute_boundary(after)?;

        for _ in 0..max_steps {
            if self.matches(&candidate) {
                return Some(candidate);
            }
            candidate = candidate + Duration::minutes(1);
        }

        None
    }
}

impl FromStr for CronExpression {
    type Err = CronExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Start of the minute following `time`.
pub fn next_minute_boundary<Tz: TimeZone>(time: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let seconds = time.timestamp();
    let boundary = seconds - seconds.rem_euclid(60) + 60;
    DateTime::from_timestamp(boundary, 0).map(|utc| utc.with_timezone(&time.timezone()))
}

/// Structural check. Malformed input is simply invalid.
pub fn validate(expression: &str) -> bool {
    CronExpression::parse(expression).is_ok()
}

/// Whether `timestamp`, read in the local time zone, matches `expression`.
/// An unparseable expression never matches.
pub fn matches(expression: &str, timestamp: DateTime<Utc>) -> bool {
    CronExpression::parse(expression)
        .is_ok_and(|cron| cron.matches(&timestamp.with_timezone(&Local)))
}

/// Next local-time match after `now`, or `None` when nothing matches within
/// one week (or the expression does not parse).
pub fn next_run_time(expression: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    CronExpression::parse(expression)
        .ok()?
        .next_after(&now.with_timezone(&Local))
        .map(|next| next.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_validate_accepts_supported_field_forms() {
        for expression in [
            "* * * * *",
            "*/5 * * * *",
            "0 9 * * 1-5",
            "0,15,30,45 * * * *",
            "30 2 1 1 0",
            "  0   * * * *  ",
        ] {
            assert!(validate(expression), "{expression} should be valid");
        }
    }

    #[test]
    fn test_validate_rejects_malformed_expressions() {
        for expression in [
            "",
            "* * * *",
            "* * * * * *",
            "a * * * *",
            "1-5/2 * * * *",
            "*/0 * * * *",
            "*/ * * * *",
            "1- * * * *",
            "1,,2 * * * *",
            "-1 * * * *",
            "MON * * * *",
        ] {
            assert!(!validate(expression), "{expression:?} should be invalid");
        }
    }

    #[test]
    fn test_parse_reports_offending_field() {
        let error = CronExpression::parse("0 x * * *").unwrap_err();
        assert_eq!(
            error,
            CronExpressionError::Field {
                field: "hour",
                value: "x".to_string()
            }
        );
        assert_eq!(
            CronExpression::parse("* *").unwrap_err(),
            CronExpressionError::FieldCount(2)
        );
    }

    #[test]
    fn test_wildcard_matches_every_minute() {
        let cron = CronExpression::parse("* * * * *").unwrap();
        let mut time = at(2024, 2, 28, 23, 0);
        for _ in 0..180 {
            assert!(cron.matches(&time));
            time += Duration::minutes(1);
        }
    }

    #[test]
    fn test_step_matches_iff_divisible() {
        let cron = CronExpression::parse("*/15 * * * *").unwrap();
        for minute in 0..60 {
            assert_eq!(
                cron.matches(&at(2024, 5, 1, 10, minute)),
                minute % 15 == 0,
                "minute {minute}"
            );
        }
    }

    #[test]
    fn test_range_list_and_exact_fields() {
        // Weekdays at 09:00 and 17:00 in March
        let cron = CronExpression::parse("0 9,17 * 3 1-5").unwrap();

        // 2024-03-04 is a Monday
        assert!(cron.matches(&at(2024, 3, 4, 9, 0)));
        assert!(cron.matches(&at(2024, 3, 8, 17, 0)));
        assert!(!cron.matches(&at(2024, 3, 4, 9, 1)));
        assert!(!cron.matches(&at(2024, 3, 4, 12, 0)));
        // Saturday
        assert!(!cron.matches(&at(2024, 3, 9, 9, 0)));
        // April
        assert!(!cron.matches(&at(2024, 4, 1, 9, 0)));
    }

    #[test]
    fn test_day_of_week_zero_is_sunday() {
        let cron = CronExpression::parse("0 0 * * 0").unwrap();
        // 2024-03-10 is a Sunday
        assert!(cron.matches(&at(2024, 3, 10, 0, 0)));
        assert!(!cron.matches(&at(2024, 3, 11, 0, 0)));
    }

    #[test]
    fn test_next_after_is_strictly_later_and_aligned() {
        let cron = CronExpression::parse("*/5 * * * *").unwrap();

        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 10, 0).unwrap();
        assert_eq!(cron.next_after(&now), Some(at(2024, 6, 1, 12, 15)));

        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 14, 59).unwrap();
        assert_eq!(cron.next_after(&now), Some(at(2024, 6, 1, 12, 15)));

        let now = Utc.with_ymd_and_hms(2024, 6, 1, 23, 58, 30).unwrap();
        assert_eq!(cron.next_after(&now), Some(at(2024, 6, 2, 0, 0)));
    }

    #[test]
    fn test_next_after_top_of_hour() {
        let cron = CronExpression::parse("0 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 1).unwrap();
        assert_eq!(cron.next_after(&now), Some(at(2024, 6, 1, 13, 0)));
    }

    #[test]
    fn test_next_after_gives_up_beyond_one_week() {
        // Minute 99 never occurs
        let cron = CronExpression::parse("99 * * * *").unwrap();
        assert_eq!(cron.next_after(&at(2024, 1, 1, 0, 0)), None);

        // February 30th never occurs either
        let cron = CronExpression::parse("0 0 30 2 *").unwrap();
        assert_eq!(cron.next_after(&at(2024, 1, 1, 0, 0)), None);

        // A yearly expression is outside the window most of the time
        let cron = CronExpression::parse("0 0 1 1 *").unwrap();
        assert_eq!(cron.next_after(&at(2024, 6, 1, 0, 0)), None);
        assert_eq!(
            cron.next_after(&at(2023, 12, 29, 0, 0)),
            Some(at(2024, 1, 1, 0, 0))
        );
    }

    #[test]
    fn test_local_time_helpers_agree_with_parsed_expression() {
        let now = Utc::now();
        let next = next_run_time("*/5 * * * *", now).expect("a match within five minutes");

        assert!(next > now);
        assert_eq!(next.with_timezone(&Local).minute() % 5, 0);
        assert_eq!(next.timestamp() % 60, 0);
        assert!(matches("*/5 * * * *", next));
        assert!(!matches("not a cron", next));
        assert_eq!(next_run_time("not a cron", now), None);
    }
}
