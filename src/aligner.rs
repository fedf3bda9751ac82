use chrono::NaiveDateTime;
use tracing::{error, info};

use crate::error::AlignError;
use crate::resampler::AggregatedSeries;
use crate::series::{column_label, Reading};

/// One output row: a key-series timestamp and one value per column.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    pub timestamp: NaiveDateTime,
    pub values: Vec<Reading>,
}

/// Wide table keyed on the key series' buckets. Column 0 is the key series,
/// the rest follow input order.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedTable {
    columns: Vec<String>,
    rows: Vec<AlignedRow>,
}

impl AlignedTable {
    /// Series identifiers, one per value column.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Header labels: identifiers without their extension.
    pub fn labels(&self) -> Vec<String> {
        self.columns.iter().map(|c| column_label(c)).collect()
    }

    pub fn rows(&self) -> &[AlignedRow] {
        &self.rows
    }

    pub fn key(&self) -> Option<&str> {
        self.columns.first().map(String::as_str)
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = Reading> + '_ {
        self.rows.iter().filter_map(move |r| r.values.get(idx).copied())
    }
}

/// Align on `key` and fill gaps with zero.
pub fn align(series: &[AggregatedSeries], key: &str) -> Result<AlignedTable, AlignError> {
    align_with_fill(series, key, Reading::FILL)
}

/// Outer-join every series onto the key series' bucket timestamps. Timestamps
/// only present in other series are not emitted.
pub fn align_with_fill(
    series: &[AggregatedSeries],
    key: &str,
    fill: Reading,
) -> Result<AlignedTable, AlignError> {
    let Some(key_idx) = series.iter().position(|s| s.id == key) else {
        error!("Key not found: {key}");
        return Err(AlignError::KeyNotFound {
            key: key.to_string(),
            available: series.iter().map(|s| s.id.clone()).collect(),
        });
    };
    let base = &series[key_idx];
    info!("base data is: {}", base.id);

    let others: Vec<&AggregatedSeries> = series
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != key_idx)
        .map(|(_, s)| s)
        .collect();
    let lookups: Vec<_> = others.iter().map(|s| s.lookup()).collect();

    let mut columns = Vec::with_capacity(series.len());
    columns.push(base.id.clone());
    columns.extend(others.iter().map(|s| s.id.clone()));

    let rows = base
        .buckets
        .iter()
        .map(|bucket| {
            let mut values = Vec::with_capacity(columns.len());
            values.push(bucket.value);
            values.extend(
                lookups
                    .iter()
                    .map(|lookup| lookup.get(&bucket.timestamp).copied().unwrap_or(fill)),
            );
            AlignedRow {
                timestamp: bucket.timestamp,
                values,
            }
        })
        .collect();

    Ok(AlignedTable { columns, rows })
}
