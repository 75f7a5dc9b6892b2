//! Row data model
//!
//! A row is a sparse mapping from column name to [`Value`]. A row with no
//! columns is indistinguishable from a row that does not exist.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single column value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Integer(i64),
    Boolean(bool),
    Binary(Vec<u8>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Value::Binary(_))
    }

    /// Text form used by string-only stores. `None` for binary.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Boolean(b) => Some(b.to_string()),
            Value::Binary(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Binary(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Binary(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Binary(b.to_vec())
    }
}

/// A sparse row: column name to value
pub type Row = BTreeMap<String, Value>;

/// Pending change to one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnChange {
    /// Overwrite (or create) the column
    Put(Value),
    /// Delete the column; a no-op if it is absent
    Remove,
}

impl ColumnChange {
    pub fn value(&self) -> Option<&Value> {
        match self {
            ColumnChange::Put(v) => Some(v),
            ColumnChange::Remove => None,
        }
    }
}

impl<V: Into<Value>> From<Option<V>> for ColumnChange {
    fn from(v: Option<V>) -> Self {
        match v {
            Some(v) => ColumnChange::Put(v.into()),
            None => ColumnChange::Remove,
        }
    }
}

/// A column-level change set passed to `StorageClient::insert`.
///
/// Columns not named here are left untouched by the insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changes {
    columns: BTreeMap<String, ColumnChange>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Changes::set`]
    pub fn put(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Builder form of [`Changes::delete`]
    pub fn remove(mut self, column: impl Into<String>) -> Self {
        self.delete(column);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.insert(column.into(), ColumnChange::Put(value.into()));
    }

    pub fn delete(&mut self, column: impl Into<String>) {
        self.columns.insert(column.into(), ColumnChange::Remove);
    }

    pub fn insert(&mut self, column: impl Into<String>, change: ColumnChange) {
        self.columns.insert(column.into(), change);
    }

    pub fn get(&self, column: &str) -> Option<&ColumnChange> {
        self.columns.get(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ColumnChange> {
        self.columns.iter()
    }

    /// Apply to an in-memory row. Binary values are copied into fresh buffers.
    pub fn apply_to(&self, row: &mut Row) {
        for (column, change) in &self.columns {
            match change {
                ColumnChange::Put(Value::Binary(bytes)) => {
                    row.insert(column.clone(), Value::Binary(bytes.as_slice().to_vec()));
                }
                ColumnChange::Put(value) => {
                    row.insert(column.clone(), value.clone());
                }
                ColumnChange::Remove => {
                    row.remove(column);
                }
            }
        }
    }
}

impl<'a> IntoIterator for &'a Changes {
    type Item = (&'a String, &'a ColumnChange);
    type IntoIter = btree_map::Iter<'a, String, ColumnChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

impl From<Row> for Changes {
    fn from(row: Row) -> Self {
        Self {
            columns: row.into_iter().map(|(k, v)| (k, ColumnChange::Put(v))).collect(),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, ColumnChange)> for Changes {
    fn from_iter<I: IntoIterator<Item = (K, ColumnChange)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, c)| (k.into(), c)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_is_column_merge() {
        let mut row = Row::new();
        row.insert("title".into(), "Hello".into());
        row.insert("kept".into(), Value::Integer(7));

        Changes::new().put("title", "Bye").remove("missing").put("flag", true).apply_to(&mut row);

        assert_eq!(row.get("title"), Some(&Value::from("Bye")));
        assert_eq!(row.get("kept"), Some(&Value::Integer(7)));
        assert_eq!(row.get("flag"), Some(&Value::Boolean(true)));
        assert!(!row.contains_key("missing"));
    }

    #[test]
    fn test_option_converts_to_change() {
        assert_eq!(ColumnChange::from(None::<&str>), ColumnChange::Remove);
        assert_eq!(ColumnChange::from(Some("x")), ColumnChange::Put("x".into()));
    }

    #[test]
    fn test_text_form() {
        assert_eq!(Value::Integer(42).to_text().as_deref(), Some("42"));
        assert_eq!(Value::Boolean(false).to_text().as_deref(), Some("false"));
        assert_eq!(Value::Binary(vec![1]).to_text(), None);
        assert_eq!(Value::from("12").as_i64(), Some(12));
    }

    #[test]
    fn test_text_form_reads_back_typed() {
        assert_eq!(Value::from("true").as_bool(), Some(true));
        assert_eq!(Value::from("false").as_bool(), Some(false));
        assert_eq!(Value::from("Y").as_bool(), None);
        assert_eq!(Value::Integer(1).as_bool(), None);
    }
}
