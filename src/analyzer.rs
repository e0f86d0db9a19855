//! Ingestion orchestrator.
//!
//! One [`SchemaAnalyzer::analyze`] call builds the snapshot, registers it,
//! diffs it against the previous version of the same table, derives
//! migration suggestions and summarises data quality. Persistence to an
//! optional [`AuditStore`] is best effort: failures become report warnings.

use std::{collections::BTreeMap, sync::Arc};

use anyhow::{Context, Result, ensure};
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    audit::AuditStore,
    config::AnalyzerConfig,
    dataset::Dataset,
    drift::{DriftReport, detect_drift},
    migration::{MigrationSuggestions, generate_suggestions},
    schema::{TableSchema, infer_columns},
    store::{Registration, SchemaVersionStore},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    pub completeness: f64,
    pub per_column_confidence: BTreeMap<String, f64>,
    pub row_count: usize,
    pub column_count: usize,
}

impl DataQuality {
    pub fn measure(dataset: &Dataset, schema: &TableSchema) -> Self {
        let cells = dataset.row_count() * dataset.column_count();
        let completeness = if cells == 0 {
            1.0
        } else {
            1.0 - dataset.null_count() as f64 / cells as f64
        };
        Self {
            completeness,
            per_column_confidence: schema
                .columns
                .iter()
                .map(|column| (column.name.clone(), column.confidence_score))
                .collect(),
            row_count: dataset.row_count(),
            column_count: dataset.column_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub table_name: String,
    pub schema: TableSchema,
    pub drift: DriftReport,
    pub migration_suggestions: MigrationSuggestions,
    pub data_quality: DataQuality,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// `(table_name, dataset, version_label)` for [`SchemaAnalyzer::analyze_batch`].
pub type BatchItem = (String, Dataset, Option<String>);

pub struct SchemaAnalyzer {
    config: AnalyzerConfig,
    store: SchemaVersionStore,
    audit: Option<Box<dyn AuditStore>>,
}

impl SchemaAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            store: SchemaVersionStore::new(),
            audit: None,
        }
    }

    pub fn with_audit_store(mut self, audit: Box<dyn AuditStore>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn analyze(
        &self,
        table_name: &str,
        dataset: &Dataset,
        version_label: Option<&str>,
    ) -> Result<AnalysisReport> {
        ensure!(!table_name.trim().is_empty(), "Table name cannot be empty");
        if let Some(label) = version_label {
            ensure!(!label.trim().is_empty(), "Version label cannot be empty");
        }
        dataset
            .validate()
            .with_context(|| format!("Validating dataset for table '{table_name}'"))?;

        let columns = infer_columns(dataset, &self.config.inference);
        // Persisting under the table lock keeps audit order equal to
        // registration order.
        let (current, drift, warnings) =
            self.store.with_history(table_name, |history| -> Result<_> {
                let version = version_label
                    .map(str::to_string)
                    .unwrap_or_else(|| history.next_version_label());
                let schema = TableSchema::new(table_name, version, columns, dataset.row_count())?;
                let Registration { previous, current } = history.register(schema);
                let drift = match previous.as_deref() {
                    None => DriftReport::first_version(&current.version),
                    Some(previous) => {
                        let changes = detect_drift(previous, &current, &self.config.drift);
                        DriftReport::between(previous, &current, changes)
                    }
                };
                let warnings = self.persist(&current, &drift);
                Ok((current, drift, warnings))
            })?;
        info!(
            "Registered version '{}' of '{table_name}' ({} column(s), {} row(s))",
            current.version,
            current.columns.len(),
            current.row_count
        );
        info!(
            "{table_name}: {} (max impact {:.2})",
            drift.summary,
            drift.max_impact()
        );

        let migration_suggestions = generate_suggestions(&drift.changes, &self.config.migration);
        let data_quality = DataQuality::measure(dataset, &current);
        let recommendations = self.recommendations(&current, &drift);

        Ok(AnalysisReport {
            table_name: table_name.to_string(),
            schema: TableSchema::clone(&current),
            drift,
            migration_suggestions,
            data_quality,
            recommendations,
            warnings,
        })
    }

    /// Analyzes independent ingestions in parallel. Items for the same table
    /// are serialized by that table's lock in unspecified order.
    pub fn analyze_batch(&self, items: Vec<BatchItem>) -> Vec<Result<AnalysisReport>> {
        items
            .into_par_iter()
            .map(|(table_name, dataset, version_label)| {
                self.analyze(&table_name, &dataset, version_label.as_deref())
            })
            .collect()
    }

    pub fn get_schema_history(&self, table_name: &str) -> Vec<Arc<TableSchema>> {
        self.store.history(table_name)
    }

    pub fn get_latest_schema(&self, table_name: &str) -> Option<Arc<TableSchema>> {
        self.store.latest(table_name)
    }

    /// Replays every persisted version into the in-memory store. Returns the
    /// number of versions restored; zero when no audit store is configured.
    pub fn restore_from_audit(&self) -> Result<usize> {
        let Some(audit) = &self.audit else {
            return Ok(0);
        };
        ensure!(
            self.store.table_names().is_empty(),
            "Audit history can only be restored into an empty analyzer"
        );
        let versions = audit.load_versions().context("Loading persisted versions")?;
        let restored = versions.len();
        for schema in versions {
            self.store.restore(schema);
        }
        info!("Restored {restored} persisted schema version(s)");
        Ok(restored)
    }

    fn recommendations(&self, schema: &TableSchema, drift: &DriftReport) -> Vec<String> {
        let quality = &self.config.quality;
        let mut recommendations = Vec::new();

        for column in &schema.columns {
            if column.confidence_score < quality.review_confidence_below {
                recommendations.push(format!(
                    "Review the inferred type of column '{}' ({}, confidence {:.2})",
                    column.name, column.data_type, column.confidence_score
                ));
            }
        }

        let high_impact = drift
            .changes
            .iter()
            .filter(|change| change.impact_score > quality.migration_impact_above)
            .count();
        if high_impact > 0 {
            recommendations.push(format!(
                "Plan a migration for table '{}': {high_impact} change(s) exceed impact {:.2}",
                schema.table_name, quality.migration_impact_above
            ));
        }

        for column in &schema.columns {
            if column.null_percentage > quality.null_fraction_above {
                recommendations.push(format!(
                    "Address data quality in column '{}': {:.1}% of values are null",
                    column.name,
                    column.null_percentage * 100.0
                ));
            }
        }

        recommendations
    }

    fn persist(&self, schema: &TableSchema, drift: &DriftReport) -> Vec<String> {
        let Some(audit) = &self.audit else {
            return Vec::new();
        };
        let mut warnings = Vec::new();
        if let Err(err) = audit.record_version(schema) {
            let message = format!(
                "Failed to persist version '{}' of '{}': {err:#}",
                schema.version, schema.table_name
            );
            warn!("{message}");
            warnings.push(message);
        }
        if let Some(previous_version) = &drift.previous_version
            && let Err(err) = audit.record_changes(previous_version, &schema.version, &drift.changes)
        {
            let message = format!(
                "Failed to persist changes {previous_version} -> {} of '{}': {err:#}",
                schema.version, schema.table_name
            );
            warn!("{message}");
            warnings.push(message);
        }
        warnings
    }
}
