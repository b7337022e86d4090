//! In-memory store with optional column schemas and JSON file persistence

use log::debug;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::{Filter, Order, Row, Store};
use crate::error::StoreError;

/// Row store kept in memory
///
/// A table with a declared schema rejects unknown columns on insert, update
/// and filter, the way a SQL backend would. Tables without a schema accept
/// anything.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    #[serde(default)]
    tables: BTreeMap<String, Vec<Row>>,

    #[serde(default)]
    schemas: BTreeMap<String, Vec<String>>,

    /// Hide schemas from `columns()` while still enforcing them
    #[serde(skip)]
    opaque: bool,

    /// Transient failures to report before serving calls again
    #[serde(skip)]
    pending_outages: Cell<u32>,

    #[serde(skip)]
    update_calls: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the columns of a table
    pub fn with_schema(mut self, table: &str, columns: &[&str]) -> Self {
        self.schemas.insert(
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self.tables.entry(table.to_string()).or_default();
        self
    }

    /// Enforce schemas but answer `columns()` with None
    pub fn opaque(mut self) -> Self {
        self.opaque = true;
        self
    }

    /// Make the next `count` calls fail with `Unavailable`
    pub fn fail_next(&self, count: u32) {
        self.pending_outages.set(count);
    }

    /// Number of `update` calls received, including rejected ones
    pub fn update_calls(&self) -> usize {
        self.update_calls
    }

    /// Load from a JSON file; a missing file gives an empty store
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("store file {} not found, starting empty", path.display());
            return Ok(Self::new());
        }
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn check_available(&self) -> Result<(), StoreError> {
        let remaining = self.pending_outages.get();
        if remaining > 0 {
            self.pending_outages.set(remaining - 1);
            return Err(StoreError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }

    fn check_columns<'a>(
        &self,
        table: &str,
        columns: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), StoreError> {
        let Some(schema) = self.schemas.get(table) else {
            return Ok(());
        };
        for column in columns {
            if !schema.iter().any(|c| c == column) {
                return Err(StoreError::UnknownColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    fn select(&self, table: &str, filter: &Filter, order: Option<&Order>) -> Result<Vec<Row>, StoreError> {
        self.check_available()?;
        self.check_columns(table, filter.columns())?;

        let mut rows: Vec<Row> = self
            .tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = order {
            self.check_columns(table, [order.column.as_str()])?;
            rows.sort_by(|a, b| order.compare(a, b));
        }

        Ok(rows)
    }

    fn insert(&mut self, table: &str, row: Row) -> Result<(), StoreError> {
        self.check_available()?;
        self.check_columns(table, row.keys().map(String::as_str))?;
        self.tables.entry(table.to_string()).or_default().push(row);
        Ok(())
    }

    fn update(&mut self, table: &str, patch: &Row, filter: &Filter) -> Result<usize, StoreError> {
        self.update_calls += 1;
        self.check_available()?;
        self.check_columns(table, patch.keys().map(String::as_str))?;
        self.check_columns(table, filter.columns())?;

        let mut changed = 0;
        if let Some(rows) = self.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| filter.matches(r)) {
                for (column, value) in patch {
                    row.insert(column.clone(), value.clone());
                }
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn delete(&mut self, table: &str, filter: &Filter) -> Result<usize, StoreError> {
        self.check_available()?;
        self.check_columns(table, filter.columns())?;

        let Some(rows) = self.tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !filter.matches(r));
        Ok(before - rows.len())
    }

    fn columns(&self, table: &str) -> Result<Option<Vec<String>>, StoreError> {
        self.check_available()?;
        if self.opaque {
            return Ok(None);
        }
        Ok(self.schemas.get(table).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_insert_select_update_delete() {
        let mut store = MemoryStore::new();
        store.insert("t", row(json!({"id": 2, "v": "b"}))).unwrap();
        store.insert("t", row(json!({"id": 1, "v": "a"}))).unwrap();

        let rows = store.select("t", &Filter::new(), Some(&Order::asc("id"))).unwrap();
        assert_eq!(rows[0]["id"], json!(1));

        let changed = store
            .update("t", &row(json!({"v": "z"})), &Filter::new().eq("id", 2))
            .unwrap();
        assert_eq!(changed, 1);
        let rows = store.select("t", &Filter::new().eq("id", 2), None).unwrap();
        assert_eq!(rows[0]["v"], json!("z"));

        assert_eq!(store.delete("t", &Filter::new().eq("id", 1)).unwrap(), 1);
        assert_eq!(store.select("t", &Filter::new(), None).unwrap().len(), 1);
        assert!(store.select("missing", &Filter::new(), None).unwrap().is_empty());
    }

    #[test]
    fn test_schema_enforced() {
        let mut store = MemoryStore::new().with_schema("t", &["id", "v"]);
        let err = store.insert("t", row(json!({"id": 1, "extra": true}))).unwrap_err();
        assert!(err.is_schema());

        store.insert("t", row(json!({"id": 1}))).unwrap();
        let err = store
            .update("t", &row(json!({"other": 1})), &Filter::new().eq("id", 1))
            .unwrap_err();
        assert!(err.is_schema());
        assert_eq!(store.update_calls(), 1);

        assert_eq!(store.columns("t").unwrap().unwrap(), vec!["id", "v"]);
        assert_eq!(store.columns("free").unwrap(), None);

        let store = store.opaque();
        assert_eq!(store.columns("t").unwrap(), None);
    }

    #[test]
    fn test_simulated_outage() {
        let store = MemoryStore::new();
        store.fail_next(1);
        assert!(store.select("t", &Filter::new(), None).unwrap_err().is_transient());
        assert!(store.select("t", &Filter::new(), None).is_ok());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let mut store = MemoryStore::new().with_schema("t", &["id"]);
        store.insert("t", row(json!({"id": 7}))).unwrap();
        store.save(&path).unwrap();

        let reopened = MemoryStore::open(&path).unwrap();
        assert_eq!(reopened.select("t", &Filter::new(), None).unwrap().len(), 1);
        assert!(reopened.columns("t").unwrap().is_some());

        let empty = MemoryStore::open(dir.path().join("absent.json")).unwrap();
        assert!(empty.select("t", &Filter::new(), None).unwrap().is_empty());
    }
}
