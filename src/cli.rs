use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::dataset::SourceFormat;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Infer, version and diff the schema of tabular extracts",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Infer a dataset's schema, register it as a new version and report drift
    Analyze(AnalyzeArgs),
    /// Infer a dataset's schema without registering it
    Infer(InferArgs),
    /// List the recorded versions of a table
    History(HistoryArgs),
    /// Print the latest recorded schema of a table
    Latest(LatestArgs),
    /// Compare two saved schema snapshots and suggest migrations
    Diff(DiffArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Input dataset (csv, tsv, txt, json, jsonl/ndjson; '-' reads CSV from stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Override format detection from the file extension
    #[arg(long = "source-format", value_parser = parse_source_format)]
    pub source_format: Option<SourceFormat>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Logical table name the dataset belongs to
    #[arg(short = 't', long = "table")]
    pub table: String,
    /// Version label for the new snapshot (defaults to v<N+1>)
    #[arg(long = "version-label")]
    pub version_label: Option<String>,
    /// Directory holding the persisted version history
    #[arg(long)]
    pub store: Option<PathBuf>,
    /// YAML file overriding analyzer settings
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,
    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    /// Write the report to a file instead of stdout
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct InferArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Table name recorded in the snapshot (defaults to the file stem)
    #[arg(short = 't', long = "table")]
    pub table: Option<String>,
    /// Version label recorded in the snapshot
    #[arg(long = "version-label", default_value = "v1")]
    pub version_label: String,
    /// YAML file overriding analyzer settings
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,
    /// Output format when printing to stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    /// Save the snapshot (.json, .yml or .yaml) for later use with `diff`
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Table whose versions should be listed
    #[arg(short = 't', long = "table")]
    pub table: String,
    /// Directory holding the persisted version history
    #[arg(long)]
    pub store: PathBuf,
    /// Also list the changes recorded between versions
    #[arg(long)]
    pub changes: bool,
}

#[derive(Debug, Args)]
pub struct LatestArgs {
    /// Table whose latest schema should be printed
    #[arg(short = 't', long = "table")]
    pub table: String,
    /// Directory holding the persisted version history
    #[arg(long)]
    pub store: PathBuf,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Earlier schema snapshot (.json, .yml or .yaml)
    #[arg(long)]
    pub from: PathBuf,
    /// Later schema snapshot (.json, .yml or .yaml)
    #[arg(long)]
    pub to: PathBuf,
    /// YAML file overriding analyzer settings
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

pub fn parse_source_format(value: &str) -> Result<SourceFormat, String> {
    value.parse().map_err(|err: anyhow::Error| err.to_string())
}
