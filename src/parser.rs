use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::debug;

use crate::error::RowParseError;
use crate::series::{Sample, Series, SeriesDiagnostics};

/// One raw record as read from a source, before any parsing.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RawRow {
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub value: String,
}

impl RawRow {
    pub fn new(time: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            time: time.into(),
            value: value.into(),
        }
    }
}

const DATETIME_FORMATS: [&str; 14] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse a timestamp written in any of the common layouts.
///
/// Offset-qualified (RFC 3339) inputs are normalized to UTC wall time; all
/// other layouts are taken as-is.
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime, RowParseError> {
    let s = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_utc());
    }

    for fmt in &DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }

    for fmt in &DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            if let Some(dt) = d.and_hms_opt(0, 0, 0) {
                return Ok(dt);
            }
        }
    }

    Err(RowParseError::Timestamp(text.to_string()))
}

/// Values are integers; anything with a fractional part is rejected.
pub fn parse_value(text: &str) -> Result<i64, RowParseError> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| RowParseError::Value(text.to_string()))
}

/// Parse both fields of a row. The timestamp is checked first, so a row with
/// two bad fields reports the timestamp.
pub fn parse_row(time: &str, value: &str) -> Result<Sample, RowParseError> {
    let timestamp = parse_timestamp(time)?;
    let value = parse_value(value)?;
    Ok(Sample::new(timestamp, value))
}

/// Accumulates rows for one series. A row is appended only when both of its
/// fields parse, so timestamps and values can never drift apart.
#[derive(Debug, Default)]
pub struct TimestampValueParser {
    samples: Vec<Sample>,
    diagnostics: SeriesDiagnostics,
}

impl TimestampValueParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, time: &str, value: &str) {
        match parse_row(time, value) {
            Ok(sample) => self.samples.push(sample),
            Err(err) => self.record_failure(&err),
        }
    }

    pub fn push_row(&mut self, row: &RawRow) {
        self.push(&row.time, &row.value);
    }

    /// A record the source could not decode at all. Counted as a bad timestamp
    /// since the row never yields one.
    pub fn push_unreadable(&mut self) {
        self.diagnostics.unparsable_timestamps += 1;
    }

    fn record_failure(&mut self, err: &RowParseError) {
        debug!("dropping row: {err}");
        match err {
            RowParseError::Timestamp(_) => self.diagnostics.unparsable_timestamps += 1,
            RowParseError::Value(_) => self.diagnostics.unparsable_values += 1,
        }
    }

    pub fn finish(self, id: impl Into<String>) -> Series {
        Series::new(id, self.samples, self.diagnostics)
    }
}

/// Parse an in-memory sequence of rows into a series.
pub fn parse_rows<'a, I>(id: impl Into<String>, rows: I) -> Series
where
    I: IntoIterator<Item = &'a RawRow>,
{
    let mut parser = TimestampValueParser::new();
    for row in rows {
        parser.push_row(row);
    }
    parser.finish(id)
}
