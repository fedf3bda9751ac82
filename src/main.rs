use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tsmerge::pipeline::{
    self, OutputFormat, PipelineConfig, DEFAULT_EXTRA_RESOLUTIONS, DEFAULT_KEY,
};
use tsmerge::resampler::Resolution;

/// Import and combine time-series data.
#[derive(Parser, Debug)]
#[command(name = "tsmerge", version, about = "Import and combine data")]
struct Cli {
    /// Folder holding one CSV file per series
    folder_name: PathBuf,

    /// Output file for the primary resolution
    output_file: PathBuf,

    /// The time resolution to round to (min)
    resolution: i64,

    /// File name of the series to align the others on
    #[arg(long, default_value = DEFAULT_KEY)]
    key: String,

    /// Additional resolutions, each written to <output stem>_<R>.<ext>
    /// [default: 5 and 15]
    #[arg(long = "also", value_name = "MINUTES", conflicts_with = "no_extra")]
    also: Vec<i64>,

    /// Write only the primary resolution
    #[arg(long)]
    no_extra: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Field delimiter for input and CSV output
    #[arg(long, default_value_t = ',')]
    delimiter: char,
}

impl Cli {
    fn into_config(self) -> Result<PipelineConfig> {
        if !self.delimiter.is_ascii() {
            bail!("delimiter must be a single ASCII character, got {:?}", self.delimiter);
        }
        let extra_resolutions = if self.no_extra {
            Vec::new()
        } else if self.also.is_empty() {
            DEFAULT_EXTRA_RESOLUTIONS.to_vec()
        } else {
            self.also
                .into_iter()
                .map(Resolution::minutes)
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(PipelineConfig {
            input_dir: self.folder_name,
            output: self.output_file,
            resolution: Resolution::minutes(self.resolution)?,
            extra_resolutions,
            key: self.key,
            format: self.format,
            delimiter: self.delimiter as u8,
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Cli::parse().into_config()?;
    let outputs = pipeline::run(&config)?;
    println!("Wrote {} tables", outputs.len());
    Ok(())
}
