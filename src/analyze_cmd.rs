use std::path::Path;

use anyhow::{Context, Result, ensure};
use log::info;

use crate::{
    analyzer::SchemaAnalyzer,
    audit::JsonlAuditStore,
    cli::{AnalyzeArgs, InferArgs},
    emit, io_utils, load_config, load_dataset,
    schema::build_table_schema,
    table,
};

pub fn execute(args: &AnalyzeArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let dataset = load_dataset(&args.source)?;

    let mut analyzer = SchemaAnalyzer::new(config);
    if let Some(dir) = &args.store {
        let audit = JsonlAuditStore::open(dir)?;
        analyzer = analyzer.with_audit_store(Box::new(audit));
        let restored = analyzer
            .restore_from_audit()
            .with_context(|| format!("Restoring version history from {dir:?}"))?;
        info!("Loaded {restored} recorded version(s) from {dir:?}");
    }

    let report = analyzer
        .analyze(&args.table, &dataset, args.version_label.as_deref())
        .with_context(|| format!("Analyzing table '{}'", args.table))?;
    info!(
        "Version '{}' of '{}' analyzed: {} change(s)",
        report.schema.version,
        report.table_name,
        report.drift.changes.len()
    );
    emit(&report, args.format, args.output.as_deref(), table::render_report)
}

pub fn execute_infer(args: &InferArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let dataset = load_dataset(&args.source)?;
    let table_name = match &args.table {
        Some(name) => name.clone(),
        None => default_table_name(&args.source.input),
    };
    ensure!(
        !table_name.trim().is_empty(),
        "Table name cannot be empty; pass --table"
    );

    let schema = build_table_schema(&table_name, &dataset, &args.version_label, &config.inference)
        .with_context(|| format!("Inferring schema for '{table_name}'"))?;

    match &args.output {
        Some(path) if !io_utils::is_dash(path) => {
            schema.save(path)?;
            info!(
                "Schema for {} column(s) written to {path:?}",
                schema.columns.len()
            );
            Ok(())
        }
        _ => emit(&schema, args.format, None, table::render_schema),
    }
}

fn default_table_name(input: &Path) -> String {
    if io_utils::is_dash(input) {
        return "stdin".to_string();
    }
    input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn default_table_name_uses_file_stem() {
        assert_eq!(default_table_name(&PathBuf::from("/data/orders.csv")), "orders");
        assert_eq!(default_table_name(&PathBuf::from("-")), "stdin");
    }
}
