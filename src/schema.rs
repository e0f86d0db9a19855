//! Schema model and inference.
//!
//! [`ColumnSchema`] describes one column of an ingested dataset and
//! [`TableSchema`] is the immutable, checksummed snapshot registered per
//! ingestion. Both are built by pure functions: the same dataset and label
//! always produce the same columns and the same checksum.
//!
//! ## Checksum
//!
//! The checksum is the lowercase hex SHA-256 digest of the JSON serialization
//! of `{"version": <label>, "columns": [...]}` with columns sorted by name.
//! Input column order, `row_count`, `table_name` and `created_at` do not
//! influence it.

use std::{
    collections::BTreeSet,
    fmt,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
    str::FromStr,
};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use sha2::{Digest, Sha256};

use crate::{
    classifier,
    config::InferenceConfig,
    data::parse_numeric,
    dataset::{Dataset, DatasetColumn},
    io_utils,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnType {
    Integer,
    Float,
    String,
    Boolean,
    DateTime,
    Date,
    Time,
    Email,
    Phone,
    Url,
    Uuid,
    JsonObject,
    Categorical,
    Text,
    Binary,
    Unknown,
}

impl Serialize for ColumnType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        ColumnType::from_str(&token).map_err(|err| de::Error::custom(err.to_string()))
    }
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::String => "string",
            ColumnType::Boolean => "boolean",
            ColumnType::DateTime => "datetime",
            ColumnType::Date => "date",
            ColumnType::Time => "time",
            ColumnType::Email => "email",
            ColumnType::Phone => "phone",
            ColumnType::Url => "url",
            ColumnType::Uuid => "uuid",
            ColumnType::JsonObject => "json_object",
            ColumnType::Categorical => "categorical",
            ColumnType::Text => "text",
            ColumnType::Binary => "binary",
            ColumnType::Unknown => "unknown",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &[
            "integer",
            "float",
            "string",
            "boolean",
            "datetime",
            "date",
            "time",
            "email",
            "phone",
            "url",
            "uuid",
            "json_object",
            "categorical",
            "text",
            "binary",
            "unknown",
        ]
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    /// Types whose values carry a meaningful character length.
    pub fn has_length(&self) -> bool {
        matches!(
            self,
            ColumnType::String
                | ColumnType::Text
                | ColumnType::Email
                | ColumnType::Phone
                | ColumnType::Url
                | ColumnType::Uuid
                | ColumnType::Categorical
                | ColumnType::JsonObject
                | ColumnType::Binary
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "integer" | "int" => Ok(ColumnType::Integer),
            "float" | "double" => Ok(ColumnType::Float),
            "string" => Ok(ColumnType::String),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "datetime" | "date-time" | "timestamp" => Ok(ColumnType::DateTime),
            "date" => Ok(ColumnType::Date),
            "time" => Ok(ColumnType::Time),
            "email" => Ok(ColumnType::Email),
            "phone" => Ok(ColumnType::Phone),
            "url" => Ok(ColumnType::Url),
            "uuid" | "guid" => Ok(ColumnType::Uuid),
            "json_object" | "json" => Ok(ColumnType::JsonObject),
            "categorical" => Ok(ColumnType::Categorical),
            "text" => Ok(ColumnType::Text),
            "binary" => Ok(ColumnType::Binary),
            "unknown" => Ok(ColumnType::Unknown),
            _ => Err(anyhow!(
                "Unknown column type '{value}'. Supported types: {}",
                ColumnType::variants().join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: ColumnType,
    pub nullable: bool,
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
    pub cardinality: usize,
    pub null_percentage: f64,
    #[serde(default)]
    pub sample_values: Vec<String>,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    pub version: String,
    pub columns: Vec<ColumnSchema>,
    pub row_count: usize,
    pub created_at: DateTime<Utc>,
    pub checksum: String,
}

#[derive(Serialize)]
struct CanonicalSchema<'a> {
    version: &'a str,
    columns: Vec<&'a ColumnSchema>,
}

impl TableSchema {
    /// Assembles a snapshot stamped with the current time. The checksum is
    /// computed last, over the finished column list.
    pub fn new(
        table_name: impl Into<String>,
        version: impl Into<String>,
        columns: Vec<ColumnSchema>,
        row_count: usize,
    ) -> Result<Self> {
        let version = version.into();
        let checksum = Self::compute_checksum(&version, &columns)?;
        Ok(Self {
            table_name: table_name.into(),
            version,
            columns,
            row_count,
            created_at: Utc::now(),
            checksum,
        })
    }

    pub fn compute_checksum(version: &str, columns: &[ColumnSchema]) -> Result<String> {
        let mut sorted: Vec<&ColumnSchema> = columns.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        let canonical = CanonicalSchema {
            version,
            columns: sorted,
        };
        let json = serde_json::to_string(&canonical).context("Serializing canonical schema")?;
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// True when the stored checksum still matches the columns and label.
    pub fn verify_checksum(&self) -> Result<bool> {
        Ok(Self::compute_checksum(&self.version, &self.columns)? == self.checksum)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Loads a saved snapshot. `.yml`/`.yaml` files are YAML, anything else JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let reader = BufReader::new(file);
        let schema: TableSchema = if is_yaml_path(path) {
            serde_yaml::from_reader(reader)
                .with_context(|| format!("Parsing schema YAML from {path:?}"))?
        } else {
            serde_json::from_reader(reader)
                .with_context(|| format!("Parsing schema JSON from {path:?}"))?
        };
        Ok(schema)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating schema file {path:?}"))?;
        let writer = BufWriter::new(file);
        if is_yaml_path(path) {
            serde_yaml::to_writer(writer, self).context("Writing schema YAML")?;
        } else {
            serde_json::to_writer_pretty(writer, self).context("Writing schema JSON")?;
        }
        Ok(())
    }
}

fn is_yaml_path(path: &Path) -> bool {
    matches!(
        io_utils::extension_of(path).as_deref(),
        Some("yml" | "yaml")
    )
}

/// Picks up to `limit` values by even striding, always starting at the first.
pub fn sample_values<'a>(values: &[&'a str], limit: usize) -> Vec<&'a str> {
    if values.len() <= limit {
        return values.to_vec();
    }
    (0..limit)
        .map(|idx| values[idx * values.len() / limit])
        .collect()
}

pub fn build_column_schema(
    name: &str,
    values: &[Option<String>],
    config: &InferenceConfig,
) -> ColumnSchema {
    let total = values.len();
    let non_null: Vec<&str> = values.iter().filter_map(|value| value.as_deref()).collect();
    let null_count = total - non_null.len();
    let null_percentage = if total == 0 {
        0.0
    } else {
        null_count as f64 / total as f64
    };

    let classification = classifier::classify(&sample_values(&non_null, config.sample_size));
    let data_type = classification.data_type;
    debug!(
        "Column '{name}': {data_type} (confidence {:.2}, {} non-null of {total})",
        classification.confidence,
        non_null.len()
    );

    let mut distinct: BTreeSet<&str> = BTreeSet::new();
    let mut examples: Vec<String> = Vec::new();
    for value in non_null.iter().copied() {
        if distinct.insert(value) && examples.len() < config.sample_values {
            examples.push(value.to_string());
        }
    }
    let cardinality = distinct.len();

    let (min_value, max_value) = if data_type.is_numeric() {
        numeric_bounds(&non_null)
    } else {
        (None, None)
    };
    let (min_length, max_length) = if data_type.has_length() {
        length_bounds(&non_null)
    } else {
        (None, None)
    };
    let allowed_values = (data_type == ColumnType::Categorical
        && cardinality <= config.max_categories)
        .then(|| distinct.iter().map(|value| (*value).to_string()).collect());

    ColumnSchema {
        name: name.to_string(),
        data_type,
        nullable: null_count > 0,
        unique: total > 0 && cardinality == total,
        min_value,
        max_value,
        min_length,
        max_length,
        allowed_values,
        cardinality,
        null_percentage,
        sample_values: examples,
        confidence_score: classification.confidence,
    }
}

fn numeric_bounds(values: &[&str]) -> (Option<f64>, Option<f64>) {
    values
        .iter()
        .filter_map(|value| parse_numeric(value))
        .fold((None, None), |(min, max): (Option<f64>, Option<f64>), n| {
            (
                Some(min.map_or(n, |m| m.min(n))),
                Some(max.map_or(n, |m| m.max(n))),
            )
        })
}

fn length_bounds(values: &[&str]) -> (Option<usize>, Option<usize>) {
    let lengths = values.iter().map(|value| value.chars().count());
    (lengths.clone().min(), lengths.max())
}

/// Infers every column of `dataset` in parallel, preserving input order.
pub fn infer_columns(dataset: &Dataset, config: &InferenceConfig) -> Vec<ColumnSchema> {
    dataset
        .columns()
        .par_iter()
        .map(|column: &DatasetColumn| build_column_schema(&column.name, &column.values, config))
        .collect()
}

pub fn build_table_schema(
    table_name: &str,
    dataset: &Dataset,
    version: &str,
    config: &InferenceConfig,
) -> Result<TableSchema> {
    let columns = infer_columns(dataset, config);
    TableSchema::new(table_name, version, columns, dataset.row_count())
}
