pub mod analyze_cmd;
pub mod analyzer;
pub mod audit;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod data;
pub mod dataset;
pub mod diff_cmd;
pub mod drift;
pub mod history_cmd;
pub mod io_utils;
pub mod migration;
pub mod schema;
pub mod store;
pub mod table;

use std::{env, io::Write, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};
use serde::Serialize;

use crate::{
    cli::{Cli, Commands, OutputFormat, SourceArgs},
    config::AnalyzerConfig,
    dataset::{Dataset, SourceOptions},
};

pub use crate::{
    analyzer::{AnalysisReport, DataQuality, SchemaAnalyzer},
    audit::{AuditStore, JsonlAuditStore},
    dataset::{DatasetColumn, DatasetError},
    drift::{ChangeType, DriftReport, SchemaChange},
    schema::{ColumnSchema, ColumnType, TableSchema},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_drift", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze(args) => analyze_cmd::execute(&args),
        Commands::Infer(args) => analyze_cmd::execute_infer(&args),
        Commands::History(args) => history_cmd::execute(&args),
        Commands::Latest(args) => history_cmd::execute_latest(&args),
        Commands::Diff(args) => diff_cmd::execute(&args),
    }
}

pub(crate) fn load_config(path: Option<&Path>) -> Result<AnalyzerConfig> {
    match path {
        Some(path) => {
            let config = AnalyzerConfig::load(path)?;
            debug!("Loaded analyzer config from {path:?}: {config:?}");
            Ok(config)
        }
        None => Ok(AnalyzerConfig::default()),
    }
}

pub(crate) fn load_dataset(args: &SourceArgs) -> Result<Dataset> {
    let options = SourceOptions {
        delimiter: args.delimiter,
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
        format: args.source_format,
    };
    if let Some(delimiter) = args.delimiter {
        info!(
            "Reading '{}' with delimiter '{}'",
            args.input.display(),
            printable_delimiter(delimiter)
        );
    } else {
        info!("Reading '{}'", args.input.display());
    }
    let dataset = Dataset::from_path(&args.input, &options)?;
    info!(
        "Loaded {} row(s) x {} column(s)",
        dataset.row_count(),
        dataset.column_count()
    );
    Ok(dataset)
}

/// Writes `value` as JSON, YAML or a rendered text table.
pub(crate) fn emit<T, F>(
    value: &T,
    format: OutputFormat,
    output: Option<&Path>,
    render: F,
) -> Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    let mut writer = io_utils::open_output(output)?;
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, value).context("Writing JSON output")?;
            writeln!(writer)?;
        }
        OutputFormat::Yaml => {
            serde_yaml::to_writer(&mut writer, value).context("Writing YAML output")?;
        }
        OutputFormat::Table => {
            write!(writer, "{}", render(value))?;
        }
    }
    writer.flush().context("Flushing output")
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
