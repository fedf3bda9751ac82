use std::fmt;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::source_type::SourceType;

/// One observation: a timestamp and the integer value recorded at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub value: i64,
}

impl Sample {
    pub fn new(timestamp: NaiveDateTime, value: i64) -> Self {
        Self { timestamp, value }
    }
}

/// Per-series parse report, surfaced once by whoever loaded the series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeriesDiagnostics {
    pub unparsable_timestamps: usize,
    pub unparsable_values: usize,
    pub source_missing: bool,
}

impl SeriesDiagnostics {
    pub fn timestamps_failed(&self) -> bool {
        self.unparsable_timestamps > 0
    }

    pub fn values_failed(&self) -> bool {
        self.unparsable_values > 0
    }

    pub fn is_clean(&self) -> bool {
        !self.timestamps_failed() && !self.values_failed() && !self.source_missing
    }
}

/// Samples from a single source, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub id: String,
    pub source_type: SourceType,
    pub diagnostics: SeriesDiagnostics,
    samples: Vec<Sample>,
}

impl Series {
    /// The source type is derived from `id`.
    pub fn new(
        id: impl Into<String>,
        samples: Vec<Sample>,
        diagnostics: SeriesDiagnostics,
    ) -> Self {
        let id = id.into();
        Self {
            source_type: SourceType::classify(&id),
            id,
            diagnostics,
            samples,
        }
    }

    /// Series for a source that could not be read at all.
    pub fn missing(id: impl Into<String>) -> Self {
        let diagnostics = SeriesDiagnostics {
            source_missing: true,
            ..Default::default()
        };
        Self::new(id, Vec::new(), diagnostics)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn times(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.samples.iter().map(|s| s.timestamp)
    }

    pub fn values(&self) -> impl Iterator<Item = i64> + '_ {
        self.samples.iter().map(|s| s.value)
    }

    pub fn label(&self) -> String {
        column_label(&self.id)
    }
}

/// Column header for a series identifier: the identifier minus its extension.
pub fn column_label(id: &str) -> String {
    Path::new(id)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| id.to_string())
}

/// An aggregated bucket value. Sums stay integral, means are real.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Int(i64),
    Real(f64),
}

impl Reading {
    pub const FILL: Reading = Reading::Int(0);

    pub fn as_f64(&self) -> f64 {
        match *self {
            Reading::Int(v) => v as f64,
            Reading::Real(v) => v,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Reading::Int(v) => Some(v),
            Reading::Real(_) => None,
        }
    }
}

impl Default for Reading {
    fn default() -> Self {
        Reading::FILL
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Int(v) => write!(f, "{v}"),
            Reading::Real(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_strips_extension() {
        assert_eq!(column_label("cgm_small.csv"), "cgm_small");
        assert_eq!(column_label("hr"), "hr");
    }

    #[test]
    fn test_missing_series_is_empty() {
        let s = Series::missing("basal_small.csv");
        assert!(s.is_empty());
        assert!(s.diagnostics.source_missing);
        assert!(!s.diagnostics.is_clean());
        assert_eq!(s.source_type, SourceType::Basal);
    }

    #[test]
    fn test_reading_display() {
        assert_eq!(Reading::Int(5).to_string(), "5");
        assert_eq!(Reading::Real(70.0).to_string(), "70");
        assert_eq!(Reading::Real(70.5).to_string(), "70.5");
        assert_eq!(Reading::default(), Reading::Int(0));
    }
}
