//! In-memory, append-only schema version history.
//!
//! Each table owns its own lock. Labelling, registration and reading the
//! prior latest version all happen inside [`SchemaVersionStore::with_history`]
//! so concurrent ingestions of one table are serialized while different
//! tables proceed independently.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::schema::TableSchema;

#[derive(Debug, Default)]
pub struct TableHistory {
    versions: Vec<Arc<TableSchema>>,
}

/// Outcome of appending a version: the version it superseded, if any.
#[derive(Debug, Clone)]
pub struct Registration {
    pub previous: Option<Arc<TableSchema>>,
    pub current: Arc<TableSchema>,
}

impl TableHistory {
    pub fn latest(&self) -> Option<&Arc<TableSchema>> {
        self.versions.last()
    }

    pub fn versions(&self) -> &[Arc<TableSchema>] {
        &self.versions
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Label used when a caller does not supply one.
    pub fn next_version_label(&self) -> String {
        format!("v{}", self.versions.len() + 1)
    }

    /// Appends unconditionally; identical consecutive snapshots are kept.
    pub fn register(&mut self, schema: TableSchema) -> Registration {
        let previous = self.versions.last().cloned();
        let current = Arc::new(schema);
        self.versions.push(Arc::clone(&current));
        Registration { previous, current }
    }
}

#[derive(Debug, Default)]
pub struct SchemaVersionStore {
    tables: DashMap<String, Arc<Mutex<TableHistory>>>,
}

impl SchemaVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, table_name: &str) -> Arc<Mutex<TableHistory>> {
        if let Some(existing) = self.tables.get(table_name) {
            return Arc::clone(existing.value());
        }
        Arc::clone(
            self.tables
                .entry(table_name.to_string())
                .or_default()
                .value(),
        )
    }

    /// Runs `f` with the table's history locked. The DashMap shard guard is
    /// released before the table lock is taken.
    pub fn with_history<T, F>(&self, table_name: &str, f: F) -> T
    where
        F: FnOnce(&mut TableHistory) -> T,
    {
        let history = self.entry(table_name);
        let mut guard = history.lock();
        f(&mut guard)
    }

    pub fn register(&self, schema: TableSchema) -> Registration {
        let table_name = schema.table_name.clone();
        self.with_history(&table_name, |history| history.register(schema))
    }

    /// Re-appends a persisted version. Versions must arrive in their
    /// original order.
    pub fn restore(&self, schema: TableSchema) {
        self.register(schema);
    }

    pub fn latest(&self, table_name: &str) -> Option<Arc<TableSchema>> {
        let history = self.tables.get(table_name).map(|entry| Arc::clone(entry.value()))?;
        let guard = history.lock();
        guard.latest().cloned()
    }

    /// Oldest first. Unknown tables yield an empty history.
    pub fn history(&self, table_name: &str) -> Vec<Arc<TableSchema>> {
        match self.tables.get(table_name).map(|entry| Arc::clone(entry.value())) {
            Some(history) => history.lock().versions().to_vec(),
            None => Vec::new(),
        }
    }

    pub fn len(&self, table_name: &str) -> usize {
        match self.tables.get(table_name).map(|entry| Arc::clone(entry.value())) {
            Some(history) => history.lock().len(),
            None => 0,
        }
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    fn schema(table: &str, version: &str) -> TableSchema {
        TableSchema::new(table, version, Vec::new(), 0).expect("schema")
    }

    #[test]
    fn register_returns_previous_latest() {
        let store = SchemaVersionStore::new();
        let first = store.register(schema("orders", "v1"));
        assert!(first.previous.is_none());
        assert_eq!(first.current.version, "v1");

        let second = store.register(schema("orders", "v2"));
        assert_eq!(second.previous.as_ref().map(|s| s.version.as_str()), Some("v1"));
        assert_eq!(store.latest("orders").unwrap().version, "v2");
        assert_eq!(store.len("orders"), 2);
    }

    #[test]
    fn unknown_table_has_empty_history() {
        let store = SchemaVersionStore::new();
        assert!(store.latest("missing").is_none());
        assert!(store.history("missing").is_empty());
        assert_eq!(store.len("missing"), 0);
        assert!(store.table_names().is_empty());
    }

    #[test]
    fn identical_snapshots_are_both_kept() {
        let store = SchemaVersionStore::new();
        store.register(schema("t", "v1"));
        store.register(schema("t", "v1"));
        assert_eq!(store.history("t").len(), 2);
    }

    #[test]
    fn next_label_counts_existing_versions() {
        let store = SchemaVersionStore::new();
        let label = store.with_history("t", |history| history.next_version_label());
        assert_eq!(label, "v1");
        store.register(schema("t", "v1"));
        let label = store.with_history("t", |history| history.next_version_label());
        assert_eq!(label, "v2");
    }

    #[test]
    fn concurrent_labelled_registrations_never_collide() {
        let store = SchemaVersionStore::new();
        (0..64).into_par_iter().for_each(|idx| {
            let table = if idx % 2 == 0 { "even" } else { "odd" };
            store.with_history(table, |history| {
                let label = history.next_version_label();
                history.register(schema(table, &label));
            });
        });

        for table in ["even", "odd"] {
            let labels: Vec<String> = store
                .history(table)
                .iter()
                .map(|schema| schema.version.clone())
                .collect();
            let expected: Vec<String> = (1..=32).map(|n| format!("v{n}")).collect();
            assert_eq!(labels, expected);
        }
        assert_eq!(store.table_names(), vec!["even".to_string(), "odd".to_string()]);
    }
}
