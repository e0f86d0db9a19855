use std::path::Path;

use anyhow::{Result, anyhow, ensure};
use log::info;

use crate::{
    analyzer::SchemaAnalyzer,
    audit::{AuditStore, JsonlAuditStore},
    cli::{HistoryArgs, LatestArgs},
    config::AnalyzerConfig,
    emit, table,
};

fn open_store(dir: &Path) -> Result<JsonlAuditStore> {
    ensure!(dir.is_dir(), "Store directory {dir:?} does not exist");
    JsonlAuditStore::open(dir)
}

fn restored_analyzer(dir: &Path) -> Result<SchemaAnalyzer> {
    let analyzer = SchemaAnalyzer::new(AnalyzerConfig::default())
        .with_audit_store(Box::new(open_store(dir)?));
    analyzer.restore_from_audit()?;
    Ok(analyzer)
}

pub fn execute(args: &HistoryArgs) -> Result<()> {
    let analyzer = restored_analyzer(&args.store)?;
    let versions = analyzer.get_schema_history(&args.table);
    ensure!(
        !versions.is_empty(),
        "No versions recorded for table '{}' in {:?}",
        args.table,
        args.store
    );
    info!(
        "Table '{}' has {} recorded version(s)",
        args.table,
        versions.len()
    );
    let refs = versions.iter().map(|schema| schema.as_ref()).collect::<Vec<_>>();
    print!("{}", table::render_history(&refs));

    if args.changes {
        let records = open_store(&args.store)?.load_changes(&args.table)?;
        if records.is_empty() {
            println!("\nNo changes recorded.");
        } else {
            println!();
            print!("{}", table::render_change_records(&records));
        }
    }
    Ok(())
}

pub fn execute_latest(args: &LatestArgs) -> Result<()> {
    let analyzer = restored_analyzer(&args.store)?;
    let latest = analyzer.get_latest_schema(&args.table).ok_or_else(|| {
        anyhow!(
            "No versions recorded for table '{}' in {:?}",
            args.table,
            args.store
        )
    })?;
    emit(latest.as_ref(), args.format, None, table::render_schema)
}
