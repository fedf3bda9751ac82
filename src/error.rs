use chrono::NaiveDateTime;
use thiserror::Error;

/// Why a single raw row contributed nothing to its series.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowParseError {
    #[error("unparsable timestamp: {0:?}")]
    Timestamp(String),
    #[error("unparsable value: {0:?}")]
    Value(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResampleError {
    #[error("resolution must be a positive number of minutes, got {0}")]
    InvalidResolution(i64),
    #[error("series {id} has unknown source type, no aggregation policy")]
    UnknownSourceType { id: String },
    #[error("cannot round {timestamp} to {resolution} minutes: out of range")]
    TimestampOutOfRange {
        timestamp: NaiveDateTime,
        resolution: u32,
    },
    #[error("sum overflow in series {id} at bucket {bucket}")]
    SumOverflow { id: String, bucket: NaiveDateTime },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignError {
    #[error("key series {key} not found (available: {available:?})")]
    KeyNotFound { key: String, available: Vec<String> },
    #[error("key series {key} could not be aggregated: {source}")]
    KeyExcluded { key: String, source: ResampleError },
}
