mod common;

use common::{TestWorkspace, column};
use csv_drift::config::InferenceConfig;
use csv_drift::dataset::{Dataset, DatasetError, SourceOptions};
use csv_drift::schema::{ColumnType, TableSchema, build_table_schema};
use proptest::prelude::*;

#[test]
fn json_and_csv_sources_infer_the_same_columns() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write(
        "orders.csv",
        "id,total,shipped\n1,10.5,yes\n2,20.25,no\n3,,yes\n",
    );
    let json = workspace.write(
        "orders.json",
        r#"[{"id": 1, "total": 10.5, "shipped": "yes"},
            {"id": 2, "total": 20.25, "shipped": "no"},
            {"id": 3, "total": null, "shipped": "yes"}]"#,
    );
    let jsonl = workspace.write(
        "orders.jsonl",
        "{\"id\": 1, \"total\": 10.5, \"shipped\": \"yes\"}\n{\"id\": 2, \"total\": 20.25, \"shipped\": \"no\"}\n{\"id\": 3, \"shipped\": \"yes\"}\n",
    );

    let config = InferenceConfig::default();
    let schemas: Vec<TableSchema> = [csv, json, jsonl]
        .iter()
        .map(|path| {
            let dataset = Dataset::from_path(path, &SourceOptions::default()).expect("load");
            build_table_schema("orders", &dataset, "v1", &config).expect("schema")
        })
        .collect();

    for schema in &schemas {
        let total = schema.column("total").expect("total column");
        assert_eq!(total.data_type, ColumnType::Float);
        assert!(total.nullable);
        assert_eq!(total.min_value, Some(10.5));
        assert_eq!(schema.column("shipped").unwrap().data_type, ColumnType::Boolean);
    }
    assert_eq!(schemas[0].checksum, schemas[1].checksum);
    assert_eq!(schemas[1].checksum, schemas[2].checksum);
}

#[test]
fn unsupported_extensions_are_rejected() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("report.xlsx", "not really a spreadsheet");
    let err = Dataset::from_path(&path, &SourceOptions::default()).unwrap_err();
    let dataset_err = err
        .downcast_ref::<DatasetError>()
        .expect("dataset error");
    assert!(matches!(dataset_err, DatasetError::UnsupportedFormat { .. }));
}

#[test]
fn tab_separated_files_use_tab_delimiter() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("people.tsv", "name\tage\nAda\t36\nAlan\t41\n");
    let dataset = Dataset::from_path(&path, &SourceOptions::default()).unwrap();
    assert_eq!(dataset.column_count(), 2);
    let schema = build_table_schema("people", &dataset, "v1", &InferenceConfig::default()).unwrap();
    assert_eq!(schema.columns[1].data_type, ColumnType::Integer);
    assert_eq!(schema.columns[1].max_value, Some(41.0));
}

#[test]
fn header_only_file_yields_unknown_columns() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("empty.csv", "a,b\n");
    let dataset = Dataset::from_path(&path, &SourceOptions::default()).unwrap();
    assert_eq!(dataset.row_count(), 0);
    let schema = build_table_schema("empty", &dataset, "v1", &InferenceConfig::default()).unwrap();
    for column in &schema.columns {
        assert_eq!(column.data_type, ColumnType::Unknown);
        assert_eq!(column.confidence_score, 0.0);
        assert!(!column.nullable);
        assert!(!column.unique);
    }
}

fn arb_column_type() -> impl Strategy<Value = ColumnType> {
    prop_oneof![
        Just(ColumnType::Integer),
        Just(ColumnType::Float),
        Just(ColumnType::String),
        Just(ColumnType::Boolean),
        Just(ColumnType::Date),
        Just(ColumnType::Email),
        Just(ColumnType::Categorical),
    ]
}

proptest! {
    #[test]
    fn checksum_ignores_column_order(
        specs in prop::collection::btree_map("[a-z]{1,8}", (arb_column_type(), any::<bool>(), 0usize..500), 1..8),
        rotate in 0usize..8,
    ) {
        let columns: Vec<_> = specs
            .iter()
            .map(|(name, (data_type, nullable, cardinality))| {
                let mut col = column(name, *data_type);
                col.nullable = *nullable;
                col.cardinality = *cardinality;
                col
            })
            .collect();
        let mut reordered = columns.clone();
        let len = reordered.len();
        reordered.rotate_left(rotate % len);
        reordered.reverse();

        let original = TableSchema::compute_checksum("v1", &columns).unwrap();
        let shuffled = TableSchema::compute_checksum("v1", &reordered).unwrap();
        prop_assert_eq!(&original, &shuffled);
        prop_assert_ne!(original, TableSchema::compute_checksum("v2", &columns).unwrap());
    }

    #[test]
    fn inference_is_deterministic(values in prop::collection::vec("[a-z0-9@.]{0,12}", 0..150)) {
        let dataset = Dataset::from_rows(&["value"], &values.iter().map(|v| vec![v.clone()]).collect::<Vec<_>>())
            .unwrap();
        let config = InferenceConfig::default();
        let a = build_table_schema("t", &dataset, "v1", &config).unwrap();
        let b = build_table_schema("t", &dataset, "v1", &config).unwrap();
        prop_assert_eq!(&a.columns, &b.columns);
        prop_assert_eq!(a.checksum, b.checksum);
        let column = &a.columns[0];
        prop_assert_eq!(column.confidence_score == 0.0, column.data_type == ColumnType::Unknown);
        prop_assert_eq!(column.data_type == ColumnType::Unknown, column.cardinality == 0);
    }
}
