//! Five-field cron expressions.
//!
//! `minute hour day-of-month month day-of-week`, each field a comma list of
//! `*`, `n`, `a-b`, with an optional `/step`. Months accept `JAN`..`DEC`,
//! weekdays `SUN`..`SAT`; weekday `7` is Sunday. When both day fields are
//! restricted a day matches if either does.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Timelike};

use crate::error::SchedulingError;

/// How far ahead `next_after` searches. Four years covers every leap day.
const SEARCH_DAYS: i64 = 4 * 366 + 1;

const MONTH_NAMES: &[&str] = &[
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const WEEKDAY_NAMES: &[&str] = &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

struct Field {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    /// Value of the first name.
    name_base: u32,
}

const MINUTE: Field = Field {
    name: "minute",
    min: 0,
    max: 59,
    names: &[],
    name_base: 0,
};
const HOUR: Field = Field {
    name: "hour",
    min: 0,
    max: 23,
    names: &[],
    name_base: 0,
};
const DAY_OF_MONTH: Field = Field {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: &[],
    name_base: 0,
};
const MONTH: Field = Field {
    name: "month",
    min: 1,
    max: 12,
    names: MONTH_NAMES,
    name_base: 1,
};
const DAY_OF_WEEK: Field = Field {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: WEEKDAY_NAMES,
    name_base: 0,
};

/// A parsed cron expression. Each field is a bitmask of allowed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    source: String,
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronExpression {
    /// Parse an expression or macro.
    pub fn parse(expression: &str) -> Result<Self, SchedulingError> {
        let trimmed = expression.trim();
        let expanded = match trimmed.to_ascii_lowercase().as_str() {
            "@yearly" | "@annually" => "0 0 1 1 *",
            "@monthly" => "0 0 1 * *",
            "@weekly" => "0 0 * * 0",
            "@daily" | "@midnight" => "0 0 * * *",
            "@hourly" => "0 * * * *",
            other if other.starts_with('@') => {
                return Err(SchedulingError::cron(expression, format!("unsupported macro `{trimmed}`")));
            }
            _ => trimmed,
        };

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        let [minute, hour, dom, month, dow] = fields.as_slice() else {
            return Err(SchedulingError::cron(
                expression,
                format!("expected 5 fields, found {}", fields.len()),
            ));
        };

        let mut days_of_week = parse_field(dow, &DAY_OF_WEEK, expression)?;
        if has(days_of_week, 7) {
            days_of_week = (days_of_week & !(1_u64 << 7)) | 1;
        }

        Ok(Self {
            source: trimmed.to_owned(),
            minutes: parse_field(minute, &MINUTE, expression)?,
            hours: parse_field(hour, &HOUR, expression)?,
            days_of_month: parse_field(dom, &DAY_OF_MONTH, expression)?,
            months: parse_field(month, &MONTH, expression)?,
            days_of_week,
            dom_restricted: !dom.starts_with('*'),
            dow_restricted: !dow.starts_with('*'),
        })
    }

    /// The expression as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the day fields allow `date`.
    #[must_use]
    pub fn matches_date(&self, date: NaiveDate) -> bool {
        if !has(self.months, date.month()) {
            return false;
        }
        let dom = has(self.days_of_month, date.day());
        let dow = has(self.days_of_week, date.weekday().num_days_from_sunday());
        if self.dom_restricted && self.dow_restricted {
            dom || dow
        } else {
            dom && dow
        }
    }

    /// Whether `time` matches every field.
    #[must_use]
    pub fn matches(&self, time: NaiveDateTime) -> bool {
        self.matches_date(time.date())
            && has(self.hours, time.hour())
            && has(self.minutes, time.minute())
    }

    /// First matching minute strictly after `after`, in `after`'s timezone.
    ///
    /// Local times skipped by a DST jump never fire; a repeated local time
    /// fires at its earliest occurrence later than `after`. Returns `None`
    /// when nothing matches within four years.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        let mut t = after
            .naive_local()
            .with_second(0)?
            .with_nanosecond(0)?
            + TimeDelta::minutes(1);
        let limit = t + TimeDelta::days(SEARCH_DAYS);

        while t <= limit {
            if !has(self.months, t.month()) {
                t = start_of_next_month(t.date())?;
                continue;
            }
            if !self.matches_date(t.date()) {
                t = t.date().succ_opt()?.and_time(NaiveTime::MIN);
                continue;
            }
            if !has(self.hours, t.hour()) {
                t = t.date().and_hms_opt(t.hour(), 0, 0)? + TimeDelta::hours(1);
                continue;
            }
            if !has(self.minutes, t.minute()) {
                t += TimeDelta::minutes(1);
                continue;
            }

            match tz.from_local_datetime(&t) {
                LocalResult::Single(dt) if dt > *after => return Some(dt),
                LocalResult::Ambiguous(earliest, latest) => {
                    if earliest > *after {
                        return Some(earliest);
                    }
                    if latest > *after {
                        return Some(latest);
                    }
                }
                _ => {}
            }
            t += TimeDelta::minutes(1);
        }
        None
    }
}

impl FromStr for CronExpression {
    type Err = SchedulingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn has(mask: u64, value: u32) -> bool {
    mask & (1_u64 << value) != 0
}

fn start_of_next_month(date: NaiveDate) -> Option<NaiveDateTime> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).map(|d| d.and_time(NaiveTime::MIN))
}

fn parse_field(raw: &str, field: &Field, expression: &str) -> Result<u64, SchedulingError> {
    let err = |reason: String| SchedulingError::cron(expression, format!("{}: {reason}", field.name));

    let mut mask = 0_u64;
    for part in raw.split(',') {
        if part.is_empty() {
            return Err(err("empty list element".into()));
        }
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| err(format!("invalid step `{step}`")))?;
                if step == 0 {
                    return Err(err("step must be at least 1".into()));
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (lo, hi) = if range == "*" {
            (field.min, field.max)
        } else if let Some((a, b)) = range.split_once('-') {
            (value(a, field).map_err(&err)?, value(b, field).map_err(&err)?)
        } else {
            let v = value(range, field).map_err(&err)?;
            (v, if step.is_some() { field.max } else { v })
        };
        if lo > hi {
            return Err(err(format!("range `{range}` is backwards")));
        }

        let step = usize::try_from(step.unwrap_or(1)).unwrap_or(usize::MAX);
        for v in (lo..=hi).step_by(step) {
            mask |= 1_u64 << v;
        }
    }
    Ok(mask)
}

fn value(token: &str, field: &Field) -> Result<u32, String> {
    let v = match token.parse::<u32>() {
        Ok(v) => v,
        Err(_) => {
            let upper = token.to_ascii_uppercase();
            let index = field
                .names
                .iter()
                .position(|name| *name == upper)
                .ok_or_else(|| format!("invalid value `{token}`"))?;
            u32::try_from(index).map_err(|_| format!("invalid value `{token}`"))? + field.name_base
        }
    };
    if v < field.min || v > field.max {
        return Err(format!(
            "value {v} out of range {}-{}",
            field.min, field.max
        ));
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chrono_tz::Tz;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn next(expr: &str, after: &str) -> Option<String> {
        CronExpression::parse(expr)
            .unwrap()
            .next_after(&utc(after))
            .map(|t| t.to_rfc3339())
    }

    #[rstest]
    #[case("* * * * *", "2026-03-01T12:00:30Z", "2026-03-01T12:01:00+00:00")]
    #[case("0 * * * *", "2026-03-01T12:00:00Z", "2026-03-01T13:00:00+00:00")]
    #[case("*/15 * * * *", "2026-03-01T12:07:00Z", "2026-03-01T12:15:00+00:00")]
    #[case("30 9 * * 1-5", "2026-03-06T10:00:00Z", "2026-03-09T09:30:00+00:00")]
    #[case("0 0 1 * *", "2026-03-15T00:00:00Z", "2026-04-01T00:00:00+00:00")]
    #[case("0 12 * JAN,jul *", "2026-03-01T00:00:00Z", "2026-07-01T12:00:00+00:00")]
    #[case("0 0 * * SUN", "2026-03-02T00:00:00Z", "2026-03-08T00:00:00+00:00")]
    #[case("0 0 * * 7", "2026-03-02T00:00:00Z", "2026-03-08T00:00:00+00:00")]
    #[case("0 0 29 2 *", "2026-03-01T00:00:00Z", "2028-02-29T00:00:00+00:00")]
    #[case("5-10/5 8 * * *", "2026-03-01T08:05:00Z", "2026-03-01T08:10:00+00:00")]
    #[case("@hourly", "2026-03-01T12:59:59Z", "2026-03-01T13:00:00+00:00")]
    #[case("@yearly", "2026-03-01T00:00:00Z", "2027-01-01T00:00:00+00:00")]
    #[case("@weekly", "2026-03-01T00:00:00Z", "2026-03-08T00:00:00+00:00")]
    fn next_run_in_utc(#[case] expr: &str, #[case] after: &str, #[case] expected: &str) {
        assert_eq!(next(expr, after).as_deref(), Some(expected));
    }

    #[test]
    fn next_is_strictly_after() {
        let expr = CronExpression::parse("0 12 * * *").unwrap();
        let at_noon = utc("2026-03-01T12:00:00Z");
        assert_eq!(
            expr.next_after(&at_noon).unwrap(),
            utc("2026-03-02T12:00:00Z")
        );
    }

    #[test]
    fn restricted_day_fields_are_ored() {
        // 13th of the month or any Friday.
        let expr = CronExpression::parse("0 0 13 * 5").unwrap();
        assert!(expr.matches_date(NaiveDate::from_ymd_opt(2026, 4, 13).unwrap()));
        assert!(expr.matches_date(NaiveDate::from_ymd_opt(2026, 3, 6).unwrap()));
        assert!(!expr.matches_date(NaiveDate::from_ymd_opt(2026, 3, 7).unwrap()));
    }

    #[test]
    fn star_step_day_of_month_is_anded() {
        let expr = CronExpression::parse("0 0 */2 * 1").unwrap();
        // 2026-03-02 is a Monday on an even day: the step list is 1,3,5...
        assert!(!expr.matches_date(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()));
        assert!(expr.matches_date(NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()));
    }

    #[test]
    fn impossible_date_has_no_next_run() {
        assert_eq!(next("0 0 30 2 *", "2026-01-01T00:00:00Z"), None);
    }

    #[test]
    fn evaluated_in_local_time() {
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        let expr = CronExpression::parse("0 9 * * *").unwrap();
        let after = utc("2026-01-10T12:00:00Z").with_timezone(&tz);
        let next = expr.next_after(&after).unwrap();
        assert_eq!(next.with_timezone(&Utc), utc("2026-01-11T08:00:00Z"));
    }

    #[test]
    fn spring_forward_gap_is_skipped() {
        // 02:30 does not exist in New York on 2026-03-08.
        let tz: Tz = "America/New_York".parse().unwrap();
        let expr = CronExpression::parse("30 2 * * *").unwrap();
        let after = utc("2026-03-08T05:00:00Z").with_timezone(&tz);
        let next = expr.next_after(&after).unwrap();
        assert_eq!(next.with_timezone(&Utc), utc("2026-03-09T06:30:00Z"));
    }

    #[test]
    fn fall_back_repeat_fires_once() {
        // 01:30 happens twice in New York on 2026-11-01.
        let tz: Tz = "America/New_York".parse().unwrap();
        let expr = CronExpression::parse("30 1 * * *").unwrap();
        let after = utc("2026-11-01T04:00:00Z").with_timezone(&tz);

        let first = expr.next_after(&after).unwrap();
        assert_eq!(first.with_timezone(&Utc), utc("2026-11-01T05:30:00Z"));

        let second = expr.next_after(&first).unwrap();
        assert_eq!(second.with_timezone(&Utc), utc("2026-11-02T06:30:00Z"));
    }

    #[rstest]
    #[case("")]
    #[case("* * * *")]
    #[case("* * * * * *")]
    #[case("60 * * * *")]
    #[case("* 24 * * *")]
    #[case("* * 0 * *")]
    #[case("* * * 13 *")]
    #[case("* * * * 8")]
    #[case("*/0 * * * *")]
    #[case("10-5 * * * *")]
    #[case("1,,2 * * * *")]
    #[case("* * * FOO *")]
    #[case("@reboot")]
    fn invalid_expressions(#[case] expr: &str) {
        assert!(
            matches!(
                CronExpression::parse(expr),
                Err(SchedulingError::InvalidCron { .. })
            ),
            "{expr:?} should be rejected"
        );
    }

    #[test]
    fn display_keeps_source() {
        let expr: CronExpression = " @daily ".parse().unwrap();
        assert_eq!(expr.to_string(), "@daily");
        assert_eq!(expr, CronExpression::parse("@daily").unwrap());
    }
}
