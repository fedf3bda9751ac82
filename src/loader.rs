use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::parser::{RawRow, TimestampValueParser};
use crate::series::Series;
use crate::source_type::SourceType;

/// Identifier of a series read from `path`: its file name.
pub fn series_id(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Load one series from a headered CSV with `time` and `value` columns.
///
/// Never fails: an unreadable file becomes an empty series flagged as missing.
pub fn load_series_from_file<P: AsRef<Path>>(path: P, delimiter: u8) -> Series {
    let path = path.as_ref();
    let id = series_id(path);
    let series = match read_series(path, &id, delimiter) {
        Ok(series) => series,
        Err(err) => {
            warn!("File: {} does not exist or is unreadable: {err:#}", path.display());
            Series::missing(id)
        }
    };
    report(&series);
    series
}

fn read_series(path: &Path, id: &str, delimiter: u8) -> Result<Series> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;

    let mut parser = TimestampValueParser::new();
    for (idx, record) in reader.deserialize::<RawRow>().enumerate() {
        match record {
            Ok(row) => parser.push_row(&row),
            Err(err) => {
                debug!("{id}: skipping undecodable record {}: {err}", idx + 1);
                parser.push_unreadable();
            }
        }
    }
    Ok(parser.finish(id))
}

/// Surface the per-series diagnostics, once each.
fn report(series: &Series) {
    let diag = &series.diagnostics;
    if diag.timestamps_failed() {
        warn!(
            "File: {} One or more times couldn't be parsed ({} rows). Results may be incomplete",
            series.id, diag.unparsable_timestamps
        );
    }
    if diag.values_failed() {
        warn!(
            "File: {} One or more values couldn't be parsed ({} rows). Results may be incomplete",
            series.id, diag.unparsable_values
        );
    }
    if series.source_type == SourceType::Unknown {
        warn!("Unknown type for file: {}", series.id);
    }
    debug!(
        "Loaded {} samples from {} as {}",
        series.len(),
        series.id,
        series.source_type
    );
}

/// Every regular file in `folder`, sorted by file name.
pub fn list_series_files<P: AsRef<Path>>(folder: P) -> Result<Vec<PathBuf>> {
    let folder = folder.as_ref();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder)
        .with_context(|| format!("Failed to read folder: {}", folder.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Load every file in `folder`, one series per file, in file-name order.
pub fn load_all_series_from_folder<P: AsRef<Path>>(
    folder: P,
    delimiter: u8,
) -> Result<Vec<Series>> {
    let files = list_series_files(&folder)?;
    info!("Found {} files in {}", files.len(), folder.as_ref().display());
    Ok(files
        .par_iter()
        .map(|path| load_series_from_file(path, delimiter))
        .collect())
}
