#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv_drift::dataset::{Dataset, DatasetColumn};
use csv_drift::schema::{ColumnSchema, ColumnType, TableSchema};
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }
}

/// Single-column dataset built from raw cell text.
pub fn single_column(name: &str, raw: &[String]) -> Dataset {
    Dataset::new(vec![DatasetColumn::from_raw(name, raw)]).expect("dataset")
}

/// Column definition with neutral defaults for hand-built snapshots.
pub fn column(name: &str, data_type: ColumnType) -> ColumnSchema {
    ColumnSchema {
        name: name.to_string(),
        data_type,
        nullable: false,
        unique: false,
        min_value: None,
        max_value: None,
        min_length: None,
        max_length: None,
        allowed_values: None,
        cardinality: 100,
        null_percentage: 0.0,
        sample_values: Vec::new(),
        confidence_score: 1.0,
    }
}

pub fn snapshot(table: &str, version: &str, columns: Vec<ColumnSchema>) -> TableSchema {
    TableSchema::new(table, version, columns, 100).expect("snapshot")
}
