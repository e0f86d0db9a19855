//! Durable audit trail of registered versions and detected changes.
//!
//! [`JsonlAuditStore`] keeps two append-only JSON-lines files in a directory:
//! `schema_versions.jsonl`, unique on `(table_name, version)`, and
//! `schema_changes.jsonl`.

use std::{
    collections::HashSet,
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;

use crate::{
    drift::{ChangeType, SchemaChange},
    schema::TableSchema,
};

pub const VERSIONS_FILE: &str = "schema_versions.jsonl";
pub const CHANGES_FILE: &str = "schema_changes.jsonl";

pub trait AuditStore: Send + Sync {
    fn record_version(&self, schema: &TableSchema) -> Result<()>;

    fn record_changes(
        &self,
        version_from: &str,
        version_to: &str,
        changes: &[SchemaChange],
    ) -> Result<()>;

    /// Every recorded version, in the order it was recorded.
    fn load_versions(&self) -> Result<Vec<TableSchema>>;

    fn load_changes(&self, table_name: &str) -> Result<Vec<SchemaChangeRecord>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaVersionRecord {
    pub table_name: String,
    pub version: String,
    pub schema_definition: TableSchema,
    pub checksum: String,
    pub row_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaChangeRecord {
    pub table_name: String,
    pub version_from: String,
    pub version_to: String,
    pub change_type: ChangeType,
    pub column_name: Option<String>,
    pub old_value: JsonValue,
    pub new_value: JsonValue,
    pub impact_score: f64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Key fields of a version line; the schema definition is not parsed.
#[derive(Deserialize)]
struct VersionKey {
    table_name: String,
    version: String,
}

#[derive(Debug)]
pub struct JsonlAuditStore {
    dir: PathBuf,
    /// `(table_name, version)` pairs already on disk. Also serializes writes.
    recorded: Mutex<HashSet<(String, String)>>,
}

impl JsonlAuditStore {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("Creating audit directory {dir:?}"))?;
        let keys: Vec<VersionKey> = read_lines(&dir.join(VERSIONS_FILE))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            recorded: Mutex::new(
                keys.into_iter()
                    .map(|key| (key.table_name, key.version))
                    .collect(),
            ),
        })
    }

    fn versions_path(&self) -> PathBuf {
        self.dir.join(VERSIONS_FILE)
    }

    fn changes_path(&self) -> PathBuf {
        self.dir.join(CHANGES_FILE)
    }

    fn version_records(&self) -> Result<Vec<SchemaVersionRecord>> {
        read_lines(&self.versions_path())
    }
}

fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path).with_context(|| format!("Opening audit file {path:?}"))?;
    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Reading line {} of {path:?}", idx + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .with_context(|| format!("Parsing line {} of {path:?}", idx + 1))?;
        records.push(record);
    }
    Ok(records)
}

fn append_lines<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Opening audit file {path:?} for append"))?;
    let mut writer = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut writer, record).context("Serializing audit record")?;
        writer.write_all(b"\n")?;
    }
    writer
        .flush()
        .with_context(|| format!("Flushing audit file {path:?}"))
}

impl AuditStore for JsonlAuditStore {
    fn record_version(&self, schema: &TableSchema) -> Result<()> {
        let mut recorded = self.recorded.lock();
        let key = (schema.table_name.clone(), schema.version.clone());
        if recorded.contains(&key) {
            bail!(
                "Version '{}' of table '{}' is already recorded",
                schema.version,
                schema.table_name
            );
        }
        let record = SchemaVersionRecord {
            table_name: schema.table_name.clone(),
            version: schema.version.clone(),
            schema_definition: schema.clone(),
            checksum: schema.checksum.clone(),
            row_count: schema.row_count,
            created_at: schema.created_at,
        };
        append_lines(&self.versions_path(), &[record])?;
        recorded.insert(key);
        debug!(
            "Recorded version '{}' of '{}' in {:?}",
            schema.version, schema.table_name, self.dir
        );
        Ok(())
    }

    fn record_changes(
        &self,
        version_from: &str,
        version_to: &str,
        changes: &[SchemaChange],
    ) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let records: Vec<SchemaChangeRecord> = changes
            .iter()
            .map(|change| SchemaChangeRecord {
                table_name: change.table_name.clone(),
                version_from: version_from.to_string(),
                version_to: version_to.to_string(),
                change_type: change.change_type,
                column_name: change.column_name.clone(),
                old_value: change.old_value.clone(),
                new_value: change.new_value.clone(),
                impact_score: change.impact_score,
                description: change.description.clone(),
                created_at: change.timestamp,
            })
            .collect();
        let _guard = self.recorded.lock();
        append_lines(&self.changes_path(), &records)
    }

    fn load_versions(&self) -> Result<Vec<TableSchema>> {
        Ok(self
            .version_records()?
            .into_iter()
            .map(|record| record.schema_definition)
            .collect())
    }

    fn load_changes(&self, table_name: &str) -> Result<Vec<SchemaChangeRecord>> {
        let records: Vec<SchemaChangeRecord> = read_lines(&self.changes_path())?;
        Ok(records
            .into_iter()
            .filter(|record| record.table_name == table_name)
            .collect())
    }
}
