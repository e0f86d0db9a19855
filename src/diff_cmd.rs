use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;

use crate::{
    cli::DiffArgs,
    drift::{DriftReport, detect_drift},
    emit, load_config,
    migration::{MigrationSuggestions, generate_suggestions},
    schema::TableSchema,
    table,
};

#[derive(Debug, Serialize)]
struct DiffOutput {
    drift: DriftReport,
    migration_suggestions: MigrationSuggestions,
}

pub fn execute(args: &DiffArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let from = TableSchema::load(&args.from)?;
    let to = TableSchema::load(&args.to)?;

    for (path, schema) in [(&args.from, &from), (&args.to, &to)] {
        if !schema
            .verify_checksum()
            .with_context(|| format!("Verifying checksum of {path:?}"))?
        {
            warn!("Checksum of {path:?} does not match its columns; the file may have been edited");
        }
    }
    if from.table_name != to.table_name {
        warn!(
            "Comparing snapshots of different tables ('{}' and '{}')",
            from.table_name, to.table_name
        );
    }

    let changes = detect_drift(&from, &to, &config.drift);
    info!(
        "{} change(s) between '{}' and '{}'",
        changes.len(),
        from.version,
        to.version
    );
    let output = DiffOutput {
        migration_suggestions: generate_suggestions(&changes, &config.migration),
        drift: DriftReport::between(&from, &to, changes),
    };
    emit(&output, args.format, None, |output| {
        table::render_drift(&output.drift, &output.migration_suggestions)
    })
}
