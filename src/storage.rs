// Sinks for an AlignedTable: delimited text, or Parquet through a polars
// DataFrame.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use csv::WriterBuilder;
use polars::prelude::*;

use crate::aligner::AlignedTable;
use crate::series::Reading;

pub const TIME_COLUMN: &str = "time";
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Write the table as delimited text with a `time` column first.
pub fn write_csv<P: AsRef<Path>>(table: &AlignedTable, path: P, delimiter: u8) -> Result<()> {
    let path = path.as_ref();
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;

    let mut header = vec![TIME_COLUMN.to_string()];
    header.extend(table.labels());
    writer.write_record(&header)?;

    for row in table.rows() {
        let mut record = Vec::with_capacity(row.values.len() + 1);
        record.push(row.timestamp.format(TIME_FORMAT).to_string());
        record.extend(row.values.iter().map(Reading::to_string));
        writer.write_record(&record)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write CSV data: {}", path.display()))?;
    Ok(())
}

/// Convert to a DataFrame: `time` as millisecond Datetime, then one column per
/// series. A column stays Int64 when every value in it is an integer.
pub fn table_to_dataframe(table: &AlignedTable) -> Result<DataFrame> {
    let millis: Vec<i64> = table
        .rows()
        .iter()
        .map(|r| r.timestamp.and_utc().timestamp_millis())
        .collect();
    let time = Column::new(PlSmallStr::from(TIME_COLUMN), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;

    let mut columns = vec![time];
    for (idx, label) in table.labels().iter().enumerate() {
        let name = PlSmallStr::from(label.as_str());
        let ints: Option<Vec<i64>> = table.column_values(idx).map(|v| v.as_int()).collect();
        let column = match ints {
            Some(ints) => Column::new(name, ints),
            None => {
                let reals: Vec<f64> = table.column_values(idx).map(|v| v.as_f64()).collect();
                Column::new(name, reals)
            }
        };
        columns.push(column);
    }

    DataFrame::new(columns).context("Failed to build DataFrame from aligned table")
}

/// Save a DataFrame to a Parquet file
pub fn write_parquet<P: AsRef<Path>>(df: &mut DataFrame, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;

    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Zstd(None))
        .finish(df)
        .context("Failed to write Parquet data")?;

    Ok(())
}

/// Load a DataFrame from a Parquet file
pub fn read_parquet<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open Parquet file: {}", path.display()))?;

    let df = ParquetReader::new(file)
        .finish()
        .context("Failed to read Parquet data")?;

    Ok(df)
}
