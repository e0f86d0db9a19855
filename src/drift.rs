//! Structural diff between two snapshots of one table.
//!
//! Changes come out in discovery order: additions (current column order),
//! removals (previous column order), then per shared column in current order
//! type, nullability, value range and cardinality. A renamed column is one
//! removal plus one addition.

use std::{collections::HashMap, fmt};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

use crate::{
    config::DriftConfig,
    schema::{ColumnSchema, ColumnType, TableSchema},
};

pub const COLUMN_ADDED_IMPACT: f64 = 0.3;
pub const COLUMN_REMOVED_IMPACT: f64 = 0.8;
pub const TYPE_CHANGED_IMPACT: f64 = 0.7;
pub const NULLABILITY_CHANGED_IMPACT: f64 = 0.5;
pub const VALUE_RANGE_CHANGED_IMPACT: f64 = 0.3;
pub const CONSTRAINT_CHANGED_IMPACT: f64 = 0.4;
pub const PATTERN_CHANGED_IMPACT: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    ColumnAdded,
    ColumnRemoved,
    TypeChanged,
    NullabilityChanged,
    ValueRangeChanged,
    CardinalityChanged,
    PatternChanged,
    ConstraintChanged,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::ColumnAdded => "column_added",
            ChangeType::ColumnRemoved => "column_removed",
            ChangeType::TypeChanged => "type_changed",
            ChangeType::NullabilityChanged => "nullability_changed",
            ChangeType::ValueRangeChanged => "value_range_changed",
            ChangeType::CardinalityChanged => "cardinality_changed",
            ChangeType::PatternChanged => "pattern_changed",
            ChangeType::ConstraintChanged => "constraint_changed",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaChange {
    pub change_type: ChangeType,
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    pub old_value: JsonValue,
    pub new_value: JsonValue,
    pub impact_score: f64,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub has_drift: bool,
    pub changes: Vec<SchemaChange>,
    pub previous_version: Option<String>,
    pub new_version: String,
    pub summary: String,
}

impl DriftReport {
    pub fn first_version(new_version: &str) -> Self {
        Self {
            has_drift: false,
            changes: Vec::new(),
            previous_version: None,
            new_version: new_version.to_string(),
            summary: "First version registered".to_string(),
        }
    }

    pub fn between(previous: &TableSchema, current: &TableSchema, changes: Vec<SchemaChange>) -> Self {
        let summary = summarize(&changes);
        Self {
            has_drift: !changes.is_empty(),
            changes,
            previous_version: Some(previous.version.clone()),
            new_version: current.version.clone(),
            summary,
        }
    }

    pub fn max_impact(&self) -> f64 {
        self.changes
            .iter()
            .map(|change| change.impact_score)
            .fold(0.0, f64::max)
    }
}

fn summarize(changes: &[SchemaChange]) -> String {
    let Some(worst) = changes
        .iter()
        .reduce(|best, change| if change.impact_score > best.impact_score { change } else { best })
    else {
        return "No schema drift detected".to_string();
    };
    let subject = worst
        .column_name
        .as_deref()
        .map(|name| format!(" on '{name}'"))
        .unwrap_or_default();
    format!(
        "Detected {} schema change(s); highest impact {:.2} ({}{subject})",
        changes.len(),
        worst.impact_score,
        worst.change_type
    )
}

struct ChangeBuilder<'a> {
    table_name: &'a str,
    timestamp: DateTime<Utc>,
    changes: Vec<SchemaChange>,
}

impl ChangeBuilder<'_> {
    fn push(
        &mut self,
        change_type: ChangeType,
        column: &str,
        old_value: JsonValue,
        new_value: JsonValue,
        impact_score: f64,
        description: String,
    ) {
        debug!("{change_type} on '{}.{column}' (impact {impact_score:.2})", self.table_name);
        self.changes.push(SchemaChange {
            change_type,
            table_name: self.table_name.to_string(),
            column_name: Some(column.to_string()),
            old_value,
            new_value,
            impact_score,
            description,
            timestamp: self.timestamp,
        });
    }
}

fn shape_payload(column: &ColumnSchema) -> JsonValue {
    json!({ "data_type": column.data_type, "nullable": column.nullable })
}

/// Diffs `previous` against `current`. The comparison is skipped only when
/// both checksums are equal and still match their columns.
pub fn detect_drift(
    previous: &TableSchema,
    current: &TableSchema,
    config: &DriftConfig,
) -> Vec<SchemaChange> {
    if previous.checksum == current.checksum
        && matches!(previous.verify_checksum(), Ok(true))
        && matches!(current.verify_checksum(), Ok(true))
    {
        return Vec::new();
    }

    let old_columns: HashMap<&str, &ColumnSchema> = previous
        .columns
        .iter()
        .map(|column| (column.name.as_str(), column))
        .collect();
    let new_columns: HashMap<&str, &ColumnSchema> = current
        .columns
        .iter()
        .map(|column| (column.name.as_str(), column))
        .collect();

    let mut builder = ChangeBuilder {
        table_name: &current.table_name,
        timestamp: Utc::now(),
        changes: Vec::new(),
    };

    for column in &current.columns {
        if !old_columns.contains_key(column.name.as_str()) {
            builder.push(
                ChangeType::ColumnAdded,
                &column.name,
                JsonValue::Null,
                shape_payload(column),
                COLUMN_ADDED_IMPACT,
                format!(
                    "Column '{}' was added ({}, {})",
                    column.name,
                    column.data_type,
                    if column.nullable { "nullable" } else { "not null" }
                ),
            );
        }
    }

    for column in &previous.columns {
        if !new_columns.contains_key(column.name.as_str()) {
            builder.push(
                ChangeType::ColumnRemoved,
                &column.name,
                shape_payload(column),
                JsonValue::Null,
                COLUMN_REMOVED_IMPACT,
                format!("Column '{}' was removed", column.name),
            );
        }
    }

    for new in &current.columns {
        let Some(old) = old_columns.get(new.name.as_str()) else {
            continue;
        };
        compare_column(&mut builder, old, new, config);
    }

    builder.changes
}

fn compare_column(
    builder: &mut ChangeBuilder<'_>,
    old: &ColumnSchema,
    new: &ColumnSchema,
    config: &DriftConfig,
) {
    let name = new.name.as_str();

    if old.data_type != new.data_type {
        builder.push(
            ChangeType::TypeChanged,
            name,
            json!(old.data_type),
            json!(new.data_type),
            TYPE_CHANGED_IMPACT,
            format!(
                "Column '{name}' changed type from {} to {}",
                old.data_type, new.data_type
            ),
        );
    }

    if old.nullable != new.nullable {
        builder.push(
            ChangeType::NullabilityChanged,
            name,
            json!(old.nullable),
            json!(new.nullable),
            NULLABILITY_CHANGED_IMPACT,
            if new.nullable {
                format!("Column '{name}' became nullable")
            } else {
                format!("Column '{name}' is no longer nullable")
            },
        );
    }

    if let (Some((old_min, old_max)), Some((new_min, new_max))) =
        (numeric_range(old), numeric_range(new))
        && (old_min != new_min || old_max != new_max)
    {
        builder.push(
            ChangeType::ValueRangeChanged,
            name,
            json!({ "min": old_min, "max": old_max }),
            json!({ "min": new_min, "max": new_max }),
            VALUE_RANGE_CHANGED_IMPACT,
            format!(
                "Column '{name}' value range changed from [{old_min}, {old_max}] to [{new_min}, {new_max}]"
            ),
        );
    }

    if old.cardinality > 0 {
        let relative = new.cardinality.abs_diff(old.cardinality) as f64 / old.cardinality as f64;
        if relative > config.cardinality_change_threshold {
            builder.push(
                ChangeType::CardinalityChanged,
                name,
                json!(old.cardinality),
                json!(new.cardinality),
                relative.min(1.0),
                format!(
                    "Column '{name}' cardinality changed from {} to {} ({:.1}%)",
                    old.cardinality,
                    new.cardinality,
                    relative * 100.0
                ),
            );
        }
    }

    if config.extended_checks {
        if old.unique != new.unique {
            builder.push(
                ChangeType::ConstraintChanged,
                name,
                json!(old.unique),
                json!(new.unique),
                CONSTRAINT_CHANGED_IMPACT,
                if new.unique {
                    format!("Column '{name}' became unique")
                } else {
                    format!("Column '{name}' is no longer unique")
                },
            );
        }

        if old.data_type == ColumnType::Categorical
            && new.data_type == ColumnType::Categorical
            && let (Some(old_values), Some(new_values)) = (&old.allowed_values, &new.allowed_values)
            && old_values != new_values
        {
            builder.push(
                ChangeType::PatternChanged,
                name,
                json!(old_values),
                json!(new_values),
                PATTERN_CHANGED_IMPACT,
                format!("Column '{name}' allowed values changed"),
            );
        }
    }
}

// A numeric column that changes to a non-numeric type reports only the type change.
fn numeric_range(column: &ColumnSchema) -> Option<(f64, f64)> {
    if !column.data_type.is_numeric() {
        return None;
    }
    Some((column.min_value?, column.max_value?))
}
