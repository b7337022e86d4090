//! Persistence collaborator: untyped row store with equality filters
//!
//! Rows are JSON objects. Callers validate their shape before trusting them.

mod memory;
mod retry;

pub use memory::MemoryStore;
pub use retry::RetryPolicy;

use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::error::StoreError;

/// An untyped record
pub type Row = Map<String, Value>;

/// Conjunction of column equality conditions; empty matches every row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.conditions
            .iter()
            .all(|(column, value)| row.get(column) == Some(value))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.conditions.iter().map(|(c, _)| c.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Sort order on a single column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Descending,
        }
    }

    /// Compare two rows on this order's column; missing values sort first
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        let ordering = compare_values(a.get(&self.column), b.get(&self.column));
        match self.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            match (x.as_u64(), y.as_u64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => {
                    let x = x.as_f64().unwrap_or(f64::NAN);
                    let y = y.as_f64().unwrap_or(f64::NAN);
                    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
                }
            }
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Operations the domain needs from a persistence backend
///
/// Each call is atomic on its own; nothing spans calls.
pub trait Store {
    /// Rows of `table` matching `filter`, optionally ordered
    fn select(&self, table: &str, filter: &Filter, order: Option<&Order>) -> Result<Vec<Row>, StoreError>;

    fn insert(&mut self, table: &str, row: Row) -> Result<(), StoreError>;

    /// Merge `patch` into every matching row; returns how many rows changed
    fn update(&mut self, table: &str, patch: &Row, filter: &Filter) -> Result<usize, StoreError>;

    /// Returns how many rows were removed
    fn delete(&mut self, table: &str, filter: &Filter) -> Result<usize, StoreError>;

    /// Declared columns of `table`, or None if the backend cannot tell
    fn columns(&self, table: &str) -> Result<Option<Vec<String>>, StoreError>;
}

/// Serialize a typed record into a row
pub fn to_row<T: serde::Serialize>(table: &str, record: &T) -> Result<Row, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Malformed {
            table: table.to_string(),
            reason: format!("expected an object, got {}", other),
        }),
    }
}

/// Deserialize a row, reporting shape problems against its table
pub fn from_row<T: serde::de::DeserializeOwned>(table: &str, row: Row) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| StoreError::Malformed {
        table: table.to_string(),
        reason: e.to_string(),
    })
}
