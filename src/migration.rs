//! Remediation suggestions for detected drift.
//!
//! Suggestions are PostgreSQL-flavoured SQL text meant for human review;
//! nothing here touches a database. Within a table, changes are processed
//! in descending impact so destructive steps surface first.

use std::collections::{BTreeMap, BTreeSet};

use heck::ToSnakeCase;
use itertools::Itertools;
use serde_json::Value as JsonValue;

use crate::{
    config::MigrationConfig,
    drift::{ChangeType, SchemaChange},
    schema::ColumnType,
};

/// Table name to ordered instructions.
pub type MigrationSuggestions = BTreeMap<String, Vec<String>>;

pub fn storage_type(data_type: ColumnType) -> &'static str {
    match data_type {
        ColumnType::Integer => "BIGINT",
        ColumnType::Float => "DOUBLE PRECISION",
        ColumnType::String | ColumnType::Email => "VARCHAR(255)",
        ColumnType::Text | ColumnType::Url | ColumnType::Unknown => "TEXT",
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::DateTime => "TIMESTAMP",
        ColumnType::Date => "DATE",
        ColumnType::Time => "TIME",
        ColumnType::Phone => "VARCHAR(32)",
        ColumnType::Uuid => "UUID",
        ColumnType::JsonObject => "JSONB",
        ColumnType::Categorical => "VARCHAR(64)",
        ColumnType::Binary => "BYTEA",
    }
}

/// Leaves plain lowercase identifiers bare and double-quotes everything else.
pub fn quote_identifier(name: &str) -> String {
    let mut chars = name.chars();
    let plain = chars
        .next()
        .is_some_and(|first| first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

fn object_name(prefix: &str, table: &str, column: &str) -> String {
    format!("{prefix}_{}_{}", table.to_snake_case(), column.to_snake_case())
}

pub fn generate_suggestions(
    changes: &[SchemaChange],
    config: &MigrationConfig,
) -> MigrationSuggestions {
    changes
        .iter()
        .into_group_map_by(|change| change.table_name.clone())
        .into_iter()
        .filter_map(|(table, mut group)| {
            // sort_by is stable, so equal impacts keep discovery order.
            group.sort_by(|a, b| b.impact_score.total_cmp(&a.impact_score));
            let instructions: Vec<String> = group
                .into_iter()
                .flat_map(|change| instructions_for(change, config))
                .collect();
            (!instructions.is_empty()).then_some((table, instructions))
        })
        .collect()
}

fn payload_type(value: &JsonValue) -> Option<ColumnType> {
    value.as_str().and_then(|token| token.parse().ok())
}

fn instructions_for(change: &SchemaChange, config: &MigrationConfig) -> Vec<String> {
    let Some(column_name) = change.column_name.as_deref() else {
        return Vec::new();
    };
    let table = quote_identifier(&change.table_name);
    let column = quote_identifier(column_name);

    match change.change_type {
        ChangeType::ColumnAdded => {
            let data_type = payload_type(&change.new_value["data_type"]).unwrap_or(ColumnType::Unknown);
            let nullable = change.new_value["nullable"].as_bool().unwrap_or(true);
            let constraint = if nullable { "" } else { " NOT NULL" };
            vec![format!(
                "ALTER TABLE {table} ADD COLUMN {column} {}{constraint};",
                storage_type(data_type)
            )]
        }
        ChangeType::ColumnRemoved => {
            let backup = quote_identifier(&format!(
                "{}_{}_backup",
                change.table_name.to_snake_case(),
                column_name.to_snake_case()
            ));
            vec![
                format!(
                    "-- WARNING: dropping {column} from {table} is destructive and cannot be undone"
                ),
                format!("CREATE TABLE {backup} AS SELECT * FROM {table};"),
                format!("ALTER TABLE {table} DROP COLUMN {column};"),
            ]
        }
        ChangeType::TypeChanged => {
            let Some(target) = payload_type(&change.new_value) else {
                return Vec::new();
            };
            let source = payload_type(&change.old_value).unwrap_or(ColumnType::Unknown);
            let sql_type = storage_type(target);
            vec![
                format!(
                    "-- Review compatibility: existing {column} values must convert from {source} to {target}"
                ),
                format!(
                    "ALTER TABLE {table} ALTER COLUMN {column} TYPE {sql_type} USING {column}::{sql_type};"
                ),
            ]
        }
        ChangeType::NullabilityChanged => match change.new_value.as_bool() {
            Some(true) => vec![format!(
                "ALTER TABLE {table} ALTER COLUMN {column} DROP NOT NULL;"
            )],
            Some(false) => vec![
                format!("-- Backfill NULL values in {column} before tightening the constraint"),
                format!("UPDATE {table} SET {column} = <default> WHERE {column} IS NULL;"),
                format!("ALTER TABLE {table} ALTER COLUMN {column} SET NOT NULL;"),
            ],
            None => Vec::new(),
        },
        ChangeType::ValueRangeChanged => {
            let (Some(min), Some(max)) = (
                change.new_value["min"].as_f64(),
                change.new_value["max"].as_f64(),
            ) else {
                return Vec::new();
            };
            let constraint = quote_identifier(&object_name("chk", &change.table_name, column_name));
            vec![format!(
                "-- Optional: ALTER TABLE {table} ADD CONSTRAINT {constraint} CHECK ({column} BETWEEN {min} AND {max});"
            )]
        }
        ChangeType::CardinalityChanged => {
            let (Some(old), Some(new)) = (change.old_value.as_u64(), change.new_value.as_u64()) else {
                return Vec::new();
            };
            if old == 0 || new <= old {
                return Vec::new();
            }
            let relative = (new - old) as f64 / old as f64;
            if relative < config.index_suggestion_threshold {
                return Vec::new();
            }
            let index = quote_identifier(&object_name("idx", &change.table_name, column_name));
            vec![format!("CREATE INDEX {index} ON {table} ({column});")]
        }
        ChangeType::ConstraintChanged => {
            let constraint = quote_identifier(&object_name("uq", &change.table_name, column_name));
            match change.new_value.as_bool() {
                Some(true) => vec![format!(
                    "ALTER TABLE {table} ADD CONSTRAINT {constraint} UNIQUE ({column});"
                )],
                Some(false) => vec![format!(
                    "ALTER TABLE {table} DROP CONSTRAINT IF EXISTS {constraint};"
                )],
                None => Vec::new(),
            }
        }
        ChangeType::PatternChanged => {
            let old = string_set(&change.old_value);
            let new = string_set(&change.new_value);
            let added = new.difference(&old).join(", ");
            let removed = old.difference(&new).join(", ");
            vec![format!(
                "-- Review allowed values for {column}: added [{added}], removed [{removed}]"
            )]
        }
    }
}

fn string_set(value: &JsonValue) -> BTreeSet<&str> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(JsonValue::as_str).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn change(
        table: &str,
        change_type: ChangeType,
        column: &str,
        old_value: JsonValue,
        new_value: JsonValue,
        impact_score: f64,
    ) -> SchemaChange {
        SchemaChange {
            change_type,
            table_name: table.to_string(),
            column_name: Some(column.to_string()),
            old_value,
            new_value,
            impact_score,
            description: String::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn identifiers_are_quoted_only_when_needed() {
        assert_eq!(quote_identifier("order_id"), "order_id");
        assert_eq!(quote_identifier("OrderId"), "\"OrderId\"");
        assert_eq!(quote_identifier("first name"), "\"first name\"");
        assert_eq!(quote_identifier("1st"), "\"1st\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn higher_impact_changes_come_first() {
        let changes = vec![
            change(
                "users",
                ChangeType::ColumnAdded,
                "age",
                JsonValue::Null,
                json!({"data_type": "integer", "nullable": false}),
                0.3,
            ),
            change(
                "users",
                ChangeType::ColumnRemoved,
                "legacy",
                json!({"data_type": "string", "nullable": true}),
                JsonValue::Null,
                0.8,
            ),
        ];
        let suggestions = generate_suggestions(&changes, &MigrationConfig::default());
        let steps = &suggestions["users"];
        assert!(steps[0].starts_with("-- WARNING"));
        assert_eq!(steps[1], "CREATE TABLE users_legacy_backup AS SELECT * FROM users;");
        assert_eq!(steps[2], "ALTER TABLE users DROP COLUMN legacy;");
        assert_eq!(steps[3], "ALTER TABLE users ADD COLUMN age BIGINT NOT NULL;");
    }

    #[test]
    fn tightening_nullability_backfills_first() {
        let changes = vec![change(
            "users",
            ChangeType::NullabilityChanged,
            "email",
            json!(true),
            json!(false),
            0.5,
        )];
        let steps = &generate_suggestions(&changes, &MigrationConfig::default())["users"];
        assert_eq!(steps.len(), 3);
        assert!(steps[1].starts_with("UPDATE users SET email"));
        assert_eq!(steps[2], "ALTER TABLE users ALTER COLUMN email SET NOT NULL;");
    }

    #[test]
    fn type_change_uses_storage_type_of_target() {
        let changes = vec![change(
            "Orders",
            ChangeType::TypeChanged,
            "Total",
            json!("integer"),
            json!("float"),
            0.7,
        )];
        let steps = &generate_suggestions(&changes, &MigrationConfig::default())["Orders"];
        assert!(steps[0].contains("Review compatibility"));
        assert_eq!(
            steps[1],
            "ALTER TABLE \"Orders\" ALTER COLUMN \"Total\" TYPE DOUBLE PRECISION USING \"Total\"::DOUBLE PRECISION;"
        );
    }

    #[test]
    fn small_cardinality_increase_is_skipped() {
        let changes = vec![
            change("t", ChangeType::CardinalityChanged, "code", json!(100), json!(131), 0.31),
            change("t", ChangeType::CardinalityChanged, "code", json!(100), json!(40), 0.6),
        ];
        assert!(generate_suggestions(&changes, &MigrationConfig::default()).is_empty());

        let big = vec![change("t", ChangeType::CardinalityChanged, "code", json!(100), json!(250), 1.0)];
        let steps = &generate_suggestions(&big, &MigrationConfig::default())["t"];
        assert_eq!(steps, &vec!["CREATE INDEX idx_t_code ON t (code);".to_string()]);
    }

    #[test]
    fn range_suggestion_is_optional_check() {
        let changes = vec![change(
            "people",
            ChangeType::ValueRangeChanged,
            "age",
            json!({"min": 18.0, "max": 65.0}),
            json!({"min": 16.0, "max": 70.0}),
            0.3,
        )];
        let steps = &generate_suggestions(&changes, &MigrationConfig::default())["people"];
        assert_eq!(
            steps[0],
            "-- Optional: ALTER TABLE people ADD CONSTRAINT chk_people_age CHECK (age BETWEEN 16 AND 70);"
        );
    }

    #[test]
    fn tables_are_grouped_separately() {
        let changes = vec![
            change("b", ChangeType::NullabilityChanged, "x", json!(false), json!(true), 0.5),
            change("a", ChangeType::NullabilityChanged, "y", json!(false), json!(true), 0.5),
        ];
        let suggestions = generate_suggestions(&changes, &MigrationConfig::default());
        assert_eq!(suggestions.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn pattern_change_lists_added_and_removed_values() {
        let changes = vec![change(
            "t",
            ChangeType::PatternChanged,
            "status",
            json!(["open", "paid"]),
            json!(["open", "void"]),
            0.2,
        )];
        let steps = &generate_suggestions(&changes, &MigrationConfig::default())["t"];
        assert_eq!(
            steps[0],
            "-- Review allowed values for status: added [void], removed [paid]"
        );
    }
}
