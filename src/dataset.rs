//! In-memory tabular input: an ordered set of named columns of raw cells.
//!
//! Parsing of source files happens here so the inference pipeline only ever
//! sees materialised columns. Cells are normalised on the way in: blanks and
//! placeholder tokens become `None`.

use std::{
    collections::HashSet,
    io::{BufRead, BufReader, Read},
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::{data::normalize_cell, io_utils};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DatasetError {
    #[error("Unsupported dataset format '{extension}' for {path:?} (expected csv, tsv, txt, json, jsonl or ndjson)")]
    UnsupportedFormat { path: PathBuf, extension: String },
    #[error("Dataset does not contain any columns")]
    NoColumns,
    #[error("Column name at position {0} is empty")]
    EmptyColumnName(usize),
    #[error("Duplicate column name '{0}'")]
    DuplicateColumn(String),
    #[error("Column '{column}' holds {actual} value(s) but the dataset has {expected} row(s)")]
    RaggedColumn {
        column: String,
        expected: usize,
        actual: usize,
    },
    #[error("Malformed {format} input: {message}")]
    Malformed {
        format: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Json,
    JsonLines,
}

impl SourceFormat {
    /// Picks a format from the file extension. Paths without an extension and
    /// stdin (`-`) are read as delimited text.
    pub fn detect(path: &Path) -> Result<Self, DatasetError> {
        if io_utils::is_dash(path) {
            return Ok(SourceFormat::Csv);
        }
        match io_utils::extension_of(path).as_deref() {
            None | Some("csv") | Some("tsv") | Some("txt") => Ok(SourceFormat::Csv),
            Some("json") => Ok(SourceFormat::Json),
            Some("jsonl") | Some("ndjson") => Ok(SourceFormat::JsonLines),
            Some(other) => Err(DatasetError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: other.to_string(),
            }),
        }
    }
}

impl FromStr for SourceFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" | "tsv" | "txt" => Ok(SourceFormat::Csv),
            "json" => Ok(SourceFormat::Json),
            "jsonl" | "ndjson" => Ok(SourceFormat::JsonLines),
            other => Err(anyhow!(
                "Unknown source format '{other}'. Supported formats: csv, json, jsonl"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SourceOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub format: Option<SourceFormat>,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
            format: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetColumn {
    pub name: String,
    pub values: Vec<Option<String>>,
}

impl DatasetColumn {
    pub fn new(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Builds a column from raw cell text, normalising blanks and placeholders.
    pub fn from_raw<S: AsRef<str>>(name: impl Into<String>, raw: &[S]) -> Self {
        Self::new(
            name,
            raw.iter().map(|cell| normalize_cell(cell.as_ref())).collect(),
        )
    }

    pub fn non_null(&self) -> impl Iterator<Item = &str> {
        self.values.iter().filter_map(|value| value.as_deref())
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|value| value.is_none()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    columns: Vec<DatasetColumn>,
}

impl Dataset {
    pub fn new(columns: Vec<DatasetColumn>) -> Result<Self, DatasetError> {
        let dataset = Self { columns };
        dataset.validate()?;
        Ok(dataset)
    }

    /// Row-oriented constructor; every row must match the header width.
    pub fn from_rows<H, S>(headers: &[H], rows: &[Vec<S>]) -> Result<Self, DatasetError>
    where
        H: AsRef<str>,
        S: AsRef<str>,
    {
        let mut columns: Vec<DatasetColumn> = headers
            .iter()
            .map(|name| DatasetColumn::new(name.as_ref(), Vec::with_capacity(rows.len())))
            .collect();
        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(DatasetError::Malformed {
                    format: "row",
                    message: format!(
                        "row {} has {} field(s) but {} header(s) were provided",
                        row_idx + 1,
                        row.len(),
                        headers.len()
                    ),
                });
            }
            for (column, cell) in columns.iter_mut().zip(row) {
                column.values.push(normalize_cell(cell.as_ref()));
            }
        }
        Self::new(columns)
    }

    pub fn validate(&self) -> Result<(), DatasetError> {
        if self.columns.is_empty() {
            return Err(DatasetError::NoColumns);
        }
        let mut seen = HashSet::new();
        for (idx, column) in self.columns.iter().enumerate() {
            if column.name.trim().is_empty() {
                return Err(DatasetError::EmptyColumnName(idx + 1));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(DatasetError::DuplicateColumn(column.name.clone()));
            }
        }
        let expected = self.columns[0].values.len();
        if let Some(ragged) = self
            .columns
            .iter()
            .find(|column| column.values.len() != expected)
        {
            return Err(DatasetError::RaggedColumn {
                column: ragged.name.clone(),
                expected,
                actual: ragged.values.len(),
            });
        }
        Ok(())
    }

    pub fn columns(&self) -> &[DatasetColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&DatasetColumn> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |column| column.values.len())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn null_count(&self) -> usize {
        self.columns.iter().map(DatasetColumn::null_count).sum()
    }

    pub fn from_path(path: &Path, options: &SourceOptions) -> Result<Self> {
        let format = match options.format {
            Some(format) => format,
            None => SourceFormat::detect(path)?,
        };
        let reader = io_utils::open_input(path)?;
        match format {
            SourceFormat::Csv => {
                let delimiter = io_utils::resolve_input_delimiter(path, options.delimiter);
                Self::from_csv_reader(reader, delimiter, options.encoding)
            }
            SourceFormat::Json => Self::from_json_reader(reader),
            SourceFormat::JsonLines => Self::from_json_lines_reader(reader),
        }
        .with_context(|| format!("Loading dataset from {path:?}"))
    }

    pub fn from_csv_reader<R: Read>(
        reader: R,
        delimiter: u8,
        encoding: &'static Encoding,
    ) -> Result<Self> {
        let mut reader = io_utils::open_csv_reader(reader, delimiter);
        let header_record = reader.byte_headers()?.clone();
        let headers = io_utils::decode_record(&header_record, encoding)
            .context("Decoding header row")?
            .into_iter()
            .map(|header| header.trim().to_string())
            .collect::<Vec<_>>();
        if headers.is_empty() || headers.iter().all(|header| header.is_empty()) {
            return Err(DatasetError::NoColumns.into());
        }

        let mut columns: Vec<DatasetColumn> = headers
            .iter()
            .map(|name| DatasetColumn::new(name.clone(), Vec::new()))
            .collect();
        let mut record = csv::ByteRecord::new();
        let mut row_idx = 0usize;
        loop {
            let more = reader
                .read_byte_record(&mut record)
                .with_context(|| format!("Reading row {}", row_idx + 2))?;
            if !more {
                break;
            }
            let decoded = io_utils::decode_record(&record, encoding)
                .with_context(|| format!("Decoding row {}", row_idx + 2))?;
            for (column, cell) in columns.iter_mut().zip(decoded.iter()) {
                column.values.push(normalize_cell(cell));
            }
            row_idx += 1;
        }
        Ok(Self::new(columns)?)
    }

    /// Reads a JSON array of flat objects. Nested objects and arrays are kept
    /// as their compact JSON text.
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let parsed: JsonValue = serde_json::from_reader(reader).map_err(|err| {
            DatasetError::Malformed {
                format: "JSON",
                message: err.to_string(),
            }
        })?;
        let JsonValue::Array(items) = parsed else {
            return Err(DatasetError::Malformed {
                format: "JSON",
                message: "expected a top-level array of objects".to_string(),
            }
            .into());
        };
        let records = items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                JsonValue::Object(map) => Ok(map),
                other => Err(DatasetError::Malformed {
                    format: "JSON",
                    message: format!("record {} is {} rather than an object", idx + 1, json_kind(&other)),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_json_records(records)?)
    }

    pub fn from_json_lines_reader<R: Read>(reader: R) -> Result<Self> {
        let mut records = Vec::new();
        for (line_idx, line) in BufReader::new(reader).lines().enumerate() {
            let line = line.with_context(|| format!("Reading line {}", line_idx + 1))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JsonValue>(&line) {
                Ok(JsonValue::Object(map)) => records.push(map),
                Ok(other) => {
                    return Err(DatasetError::Malformed {
                        format: "JSON lines",
                        message: format!(
                            "line {} is {} rather than an object",
                            line_idx + 1,
                            json_kind(&other)
                        ),
                    }
                    .into());
                }
                Err(err) => {
                    return Err(DatasetError::Malformed {
                        format: "JSON lines",
                        message: format!("line {}: {err}", line_idx + 1),
                    }
                    .into());
                }
            }
        }
        Ok(Self::from_json_records(records)?)
    }

    fn from_json_records(
        records: Vec<serde_json::Map<String, JsonValue>>,
    ) -> Result<Self, DatasetError> {
        let mut names: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for record in &records {
            for key in record.keys() {
                if seen.insert(key.clone()) {
                    names.push(key.clone());
                }
            }
        }
        let columns = names
            .into_iter()
            .map(|name| {
                let values = records
                    .iter()
                    .map(|record| record.get(&name).and_then(json_cell))
                    .collect();
                DatasetColumn::new(name, values)
            })
            .collect();
        Self::new(columns)
    }
}

fn json_cell(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(text) => normalize_cell(text),
        JsonValue::Bool(flag) => Some(flag.to_string()),
        JsonValue::Number(number) => Some(number.to_string()),
        JsonValue::Array(_) | JsonValue::Object(_) => Some(value.to_string()),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_reader_normalises_blank_and_placeholder_cells() {
        let input = "id,name,score\n1,Alice,10\n2,,NA\n3,Carol,12\n";
        let dataset = Dataset::from_csv_reader(input.as_bytes(), b',', UTF_8).expect("dataset");
        assert_eq!(dataset.row_count(), 3);
        assert_eq!(dataset.column_count(), 3);
        let name = dataset.column("name").expect("name column");
        assert_eq!(name.values[1], None);
        let score = dataset.column("score").expect("score column");
        assert_eq!(score.null_count(), 1);
        assert_eq!(dataset.null_count(), 2);
    }

    #[test]
    fn csv_reader_rejects_duplicate_headers() {
        let input = "id,id\n1,2\n";
        let err = Dataset::from_csv_reader(input.as_bytes(), b',', UTF_8).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DatasetError>(),
            Some(&DatasetError::DuplicateColumn("id".to_string()))
        );
    }

    #[test]
    fn csv_reader_rejects_ragged_rows() {
        let input = "id,name\n1,Alice\n2\n";
        let err = Dataset::from_csv_reader(input.as_bytes(), b',', UTF_8).unwrap_err();
        assert!(format!("{err:#}").contains("Reading row 3"));
    }

    #[test]
    fn json_records_union_keys_and_keep_nested_values_as_text() {
        let input = r#"[{"id": 1, "meta": {"a": 1}}, {"id": 2, "extra": null, "flag": true}]"#;
        let dataset = Dataset::from_json_reader(input.as_bytes()).expect("dataset");
        assert_eq!(dataset.row_count(), 2);
        let meta = dataset.column("meta").expect("meta column");
        assert_eq!(meta.values[0].as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(meta.values[1], None);
        let flag = dataset.column("flag").expect("flag column");
        assert_eq!(flag.values[1].as_deref(), Some("true"));
    }

    #[test]
    fn json_lines_reject_non_object_lines() {
        let input = "{\"id\": 1}\n[1, 2]\n";
        let err = Dataset::from_json_lines_reader(input.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2 is an array"));
    }

    #[test]
    fn detect_rejects_spreadsheet_extensions() {
        let err = SourceFormat::detect(Path::new("extract.xlsx")).unwrap_err();
        assert!(matches!(err, DatasetError::UnsupportedFormat { .. }));
        assert_eq!(
            SourceFormat::detect(Path::new("extract.ndjson")).unwrap(),
            SourceFormat::JsonLines
        );
        assert_eq!(SourceFormat::detect(Path::new("-")).unwrap(), SourceFormat::Csv);
    }

    #[test]
    fn new_rejects_columns_of_different_lengths() {
        let err = Dataset::new(vec![
            DatasetColumn::from_raw("a", &["1", "2"]),
            DatasetColumn::from_raw("b", &["1"]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            DatasetError::RaggedColumn {
                column: "b".to_string(),
                expected: 2,
                actual: 1
            }
        );
        assert_eq!(Dataset::new(Vec::new()).unwrap_err(), DatasetError::NoColumns);
    }
}
