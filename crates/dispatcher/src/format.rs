//! Line formats for the local, network and merged logs.

use chrono::{DateTime, Local, TimeZone, Utc};
use contracts::{SensorRecord, TimeZoneMode};
use std::fmt::Write;

/// Opens a block in the merged log
pub const WINDOW_START: &str = "START";
/// Closes a block in the merged log
pub const WINDOW_END: &str = "END";

/// `yyyy-MM-dd hh:mm:ss:SSS` (12-hour clock, no meridiem)
const DATETIME_FORMAT: &str = "%Y-%m-%d %I:%M:%S:%3f";

/// Renders records into the text lines written to each sink.
///
/// Every produced line is newline-terminated.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormatter {
    timezone: TimeZoneMode,
}

impl LineFormatter {
    pub fn new(timezone: TimeZoneMode) -> Self {
        Self { timezone }
    }

    /// Wall-clock rendering of an epoch-millisecond timestamp
    ///
    /// Timestamps chrono cannot represent fall back to the raw integer.
    pub fn datetime(&self, timestamp_ms: i64) -> String {
        match self.timezone {
            TimeZoneMode::Utc => render(Utc.timestamp_millis_opt(timestamp_ms).earliest()),
            TimeZoneMode::Local => render(Local.timestamp_millis_opt(timestamp_ms).earliest()),
        }
        .unwrap_or_else(|| timestamp_ms.to_string())
    }

    /// `<timestamp_ms:.3> <datetime> <v1:.3> <v2:.3> ...`
    pub fn local_line(&self, record: &SensorRecord) -> String {
        let mut line = format!(
            "{:.3} {}",
            record.timestamp_ms as f64,
            self.datetime(record.timestamp_ms)
        );
        push_values(&mut line, &record.values);
        line.push('\n');
        line
    }

    /// `<relative_time_s:.3> <datetime> <v1:.3> ...`
    pub fn network_line(&self, record: &SensorRecord) -> String {
        let mut line = format!(
            "{:.3} {}",
            record.relative_time_s,
            self.datetime(record.timestamp_ms)
        );
        push_values(&mut line, &record.values);
        line.push('\n');
        line
    }

    /// `<datetime> <suffix> : <v1:.3> ...`
    pub fn merged_line(&self, record: &SensorRecord) -> String {
        let mut line = format!(
            "{} {} :",
            self.datetime(record.timestamp_ms),
            record.channel.suffix()
        );
        push_values(&mut line, &record.values);
        line.push('\n');
        line
    }

    /// `START` followed by the datetime that anchors the window
    pub fn window_start(&self, timestamp_ms: i64) -> String {
        format!("{WINDOW_START}\n{}\n", self.datetime(timestamp_ms))
    }

    pub fn window_end(&self) -> String {
        format!("{WINDOW_END}\n")
    }
}

fn render<Tz: TimeZone>(dt: Option<DateTime<Tz>>) -> Option<String>
where
    Tz::Offset: std::fmt::Display,
{
    dt.map(|dt| dt.format(DATETIME_FORMAT).to_string())
}

fn push_values(line: &mut String, values: &[f64]) {
    for value in values {
        // Writing into a String cannot fail
        let _ = write!(line, " {value:.3}");
    }
}

/// Fields recovered from a local log line
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLocalLine {
    pub timestamp_ms: f64,
    pub datetime: String,
    pub values: Vec<f64>,
}

impl ParsedLocalLine {
    /// Parse a line produced by [`LineFormatter::local_line`]
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let timestamp_ms = fields.next()?.parse().ok()?;
        let date = fields.next()?;
        let time = fields.next()?;
        let values = fields
            .map(str::parse)
            .collect::<Result<Vec<f64>, _>>()
            .ok()?;
        Some(Self {
            timestamp_ms,
            datetime: format!("{date} {time}"),
            values,
        })
    }
}
