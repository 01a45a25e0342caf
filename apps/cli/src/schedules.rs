//! Schedule file format for `nimbus serve --schedules`.
//!
//! ```json
//! [
//!   {"name": "nightly", "function": "report", "cron": "0 2 * * *"},
//!   {"name": "poll", "function": "sync", "every": 5, "unit": "minutes", "input": {"full": false}},
//!   {"name": "once", "function": "migrate", "at": "2026-11-01T00:00:00Z"}
//! ]
//! ```

use std::path::Path;

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use nimbus_core::{FunctionSchedule, IntervalUnit, ScheduleDescriptor};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Entry {
    name: String,
    function: String,
    #[serde(default)]
    input: serde_json::Value,
    cron: Option<String>,
    every: Option<u32>,
    unit: Option<IntervalUnit>,
    at: Option<DateTime<Utc>>,
}

impl Entry {
    fn descriptor(&self) -> anyhow::Result<ScheduleDescriptor> {
        match (&self.cron, self.every, self.at) {
            (Some(expression), None, None) => Ok(ScheduleDescriptor::Cron {
                expression: expression.clone(),
            }),
            (None, Some(every), None) => Ok(ScheduleDescriptor::Interval {
                every,
                unit: self.unit.unwrap_or(IntervalUnit::Minutes),
            }),
            (None, None, Some(at)) => Ok(ScheduleDescriptor::Once { at }),
            _ => bail!(
                "schedule `{}` needs exactly one of `cron`, `every` or `at`",
                self.name
            ),
        }
    }
}

/// Parse a schedule file body.
pub fn parse(text: &str) -> anyhow::Result<Vec<FunctionSchedule>> {
    let entries: Vec<Entry> = serde_json::from_str(text).context("malformed schedule file")?;
    entries
        .into_iter()
        .map(|entry| {
            let descriptor = entry.descriptor()?;
            Ok(FunctionSchedule::new(entry.name, entry.function, descriptor).with_input(entry.input))
        })
        .collect()
}

/// Read and parse a schedule file.
pub async fn read(path: &Path) -> anyhow::Result<Vec<FunctionSchedule>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse(&text).with_context(|| format!("in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_every_kind() {
        let schedules = parse(
            r#"[
                {"name": "nightly", "function": "report", "cron": "0 2 * * *"},
                {"name": "poll", "function": "sync", "every": 5, "input": {"full": false}},
                {"name": "once", "function": "migrate", "at": "2026-11-01T00:00:00Z"}
            ]"#,
        )
        .unwrap();

        let kinds: Vec<_> = schedules.iter().map(|s| s.descriptor.kind()).collect();
        assert_eq!(kinds, vec!["cron", "interval", "once"]);
        assert_eq!(
            schedules[1].descriptor,
            ScheduleDescriptor::Interval {
                every: 5,
                unit: IntervalUnit::Minutes
            }
        );
        assert_eq!(schedules[1].input, serde_json::json!({"full": false}));
        assert_eq!(schedules[0].function_name, "report");
    }

    #[test]
    fn rejects_ambiguous_entry() {
        let err = parse(r#"[{"name": "x", "function": "f", "cron": "@daily", "every": 1}]"#)
            .unwrap_err();
        assert!(err.to_string().contains("exactly one"), "{err}");
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(parse(r#"[{"name": "x", "function": "f", "cron": "@daily", "tz": "UTC"}]"#).is_err());
    }
}
