use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use rayon::prelude::*;
use tracing::{error, info};

use crate::aligner::{align, AlignedTable};
use crate::error::{AlignError, ResampleError};
use crate::loader::load_all_series_from_folder;
use crate::resampler::{resample, AggregatedSeries, Resolution};
use crate::series::Series;
use crate::storage::{table_to_dataframe, write_csv, write_parquet};

/// Reference series used when none is given.
pub const DEFAULT_KEY: &str = "cgm_small.csv";

/// Tables written alongside the primary one unless overridden.
pub const DEFAULT_EXTRA_RESOLUTIONS: [Resolution; 2] =
    [Resolution::FIVE, Resolution::FIFTEEN];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Folder holding one CSV file per series.
    pub input_dir: PathBuf,
    /// Table for `resolution` is written here.
    pub output: PathBuf,
    pub resolution: Resolution,
    /// Each one also gets a table, written next to `output` as `<stem>_<R>.<ext>`.
    pub extra_resolutions: Vec<Resolution>,
    /// Identifier (file name) of the series whose buckets become the rows.
    pub key: String,
    pub format: OutputFormat,
    /// Used for both reading and writing delimited text.
    pub delimiter: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("smallData"),
            output: PathBuf::from("hw_data.csv"),
            resolution: Resolution::FIVE,
            extra_resolutions: DEFAULT_EXTRA_RESOLUTIONS.to_vec(),
            key: DEFAULT_KEY.to_string(),
            format: OutputFormat::default(),
            delimiter: b',',
        }
    }
}

impl PipelineConfig {
    /// (resolution, output path) for every table this run writes.
    pub fn targets(&self) -> Vec<(Resolution, PathBuf)> {
        let mut targets = vec![(self.resolution, self.output.clone())];
        targets.extend(
            self.extra_resolutions
                .iter()
                .map(|&r| (r, derived_path(&self.output, r))),
        );
        targets
    }
}

fn derived_path(output: &Path, resolution: Resolution) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!("{stem}_{}.{}", resolution.get(), ext.to_string_lossy()),
        None => format!("{stem}_{}", resolution.get()),
    };
    output.with_file_name(name)
}

/// One written table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    pub path: PathBuf,
    pub resolution: Resolution,
    pub rows: usize,
}

/// Round and aggregate every series in parallel, one result per input series.
pub fn resample_each(
    series: &[Series],
    resolution: Resolution,
) -> Vec<Result<AggregatedSeries, ResampleError>> {
    series.par_iter().map(|s| resample(s, resolution)).collect()
}

/// Aggregate every series and align on `key`. Series that cannot be
/// aggregated are logged and left out; if that is the key series, alignment
/// fails with [`AlignError::KeyExcluded`].
pub fn build_table(
    series: &[Series],
    resolution: Resolution,
    key: &str,
) -> Result<AlignedTable, AlignError> {
    let mut aggregated = Vec::with_capacity(series.len());
    for (s, result) in series.iter().zip(resample_each(series, resolution)) {
        match result {
            Ok(agg) => aggregated.push(agg),
            Err(err) if s.id == key => {
                error!("Key series {key} excluded from alignment: {err}");
                return Err(AlignError::KeyExcluded {
                    key: key.to_string(),
                    source: err,
                });
            }
            Err(err) => error!("File: {} excluded from alignment: {err}", s.id),
        }
    }
    align(&aggregated, key)
}

pub fn write_table(
    table: &AlignedTable,
    path: &Path,
    format: OutputFormat,
    delimiter: u8,
) -> Result<()> {
    match format {
        OutputFormat::Csv => write_csv(table, path, delimiter),
        OutputFormat::Parquet => {
            let mut df = table_to_dataframe(table)?;
            write_parquet(&mut df, path)
        }
    }
}

/// Load the input folder once, then align and write a table per resolution.
pub fn run(config: &PipelineConfig) -> Result<Vec<PipelineOutput>> {
    let series = load_all_series_from_folder(&config.input_dir, config.delimiter)?;

    let mut outputs = Vec::new();
    for (resolution, path) in config.targets() {
        let table = build_table(&series, resolution, &config.key)
            .with_context(|| format!("Failed to align data at {resolution}"))?;
        write_table(&table, &path, config.format, config.delimiter)?;
        info!(
            "Wrote {} rows at {resolution} to {}",
            table.height(),
            path.display()
        );
        outputs.push(PipelineOutput {
            path,
            resolution,
            rows: table.height(),
        });
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_rows, RawRow};

    fn res(m: i64) -> Resolution {
        Resolution::minutes(m).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.resolution, res(5));
        assert_eq!(config.extra_resolutions, vec![res(5), res(15)]);
        assert_eq!(config.key, "cgm_small.csv");
        assert_eq!(config.format, OutputFormat::Csv);
    }

    #[test]
    fn test_targets() {
        let config = PipelineConfig {
            output: PathBuf::from("out/hw_data.csv"),
            resolution: res(30),
            extra_resolutions: vec![res(5), res(15)],
            ..Default::default()
        };
        assert_eq!(
            config.targets(),
            vec![
                (res(30), PathBuf::from("out/hw_data.csv")),
                (res(5), PathBuf::from("out/hw_data_5.csv")),
                (res(15), PathBuf::from("out/hw_data_15.csv")),
            ]
        );
        assert_eq!(derived_path(Path::new("table"), res(5)), PathBuf::from("table_5"));
    }

    #[test]
    fn test_unknown_series_is_left_out() {
        let rows = vec![RawRow::new("1/1/2008 1:00", "1")];
        let series = vec![
            parse_rows("cgm.csv", &rows),
            parse_rows("weight.csv", &rows),
            parse_rows("meal.csv", &rows),
        ];
        assert_eq!(resample_each(&series, res(5)).len(), 3);
        let table = build_table(&series, res(5), "cgm.csv").unwrap();
        assert_eq!(table.columns(), ["cgm.csv", "meal.csv"]);
    }

    #[test]
    fn test_unaggregatable_key_is_excluded_not_missing() {
        let rows = vec![RawRow::new("1/1/2008 1:00", "1")];
        let series = vec![parse_rows("weight.csv", &rows), parse_rows("meal.csv", &rows)];
        let err = build_table(&series, res(5), "weight.csv").unwrap_err();
        assert_eq!(
            err,
            AlignError::KeyExcluded {
                key: "weight.csv".into(),
                source: ResampleError::UnknownSourceType { id: "weight.csv".into() },
            }
        );
        let err = build_table(&series, res(5), "cgm.csv").unwrap_err();
        assert!(matches!(err, AlignError::KeyNotFound { .. }));
    }

    #[test]
    fn test_out_of_range_row_does_not_abort_run() {
        let good = vec![RawRow::new("1/1/2008 1:00", "1")];
        let edge = vec![RawRow::new("+262142-12-31 23:58", "1")];
        let series = vec![parse_rows("cgm.csv", &good), parse_rows("meal.csv", &edge)];
        let table = build_table(&series, res(5), "cgm.csv").unwrap();
        assert_eq!(table.columns(), ["cgm.csv"]);
        assert_eq!(table.height(), 1);
    }
}
