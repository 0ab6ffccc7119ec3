//! Materialized query results
//!
//! A [`ResultSet`] is an ordered sequence of [`Row`]s sharing one
//! [`ColumnDescriptor`]. Rows keep server order across pages and iterate
//! their columns in declaration order.

mod materializer;
mod value;

pub use materializer::{Materializer, ResultSetBuilder, DEFAULT_MAX_PAGES};
pub use value::{Cell, Value};

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::sync::Arc;

use crate::statement::WireColumn;

/// One result column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Unique column name within the result
    pub name: String,
    /// Zero-based position
    pub index: usize,
    /// Engine type name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

impl Column {
    /// Whether text cells of this column hold exact decimals
    pub fn is_decimal(&self) -> bool {
        self.type_name
            .as_deref()
            .map(|t| {
                let t = t.trim().to_ascii_lowercase();
                t.starts_with("numeric") || t.starts_with("decimal")
            })
            .unwrap_or(false)
    }
}

/// Ordered column list shared by every row of a result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDescriptor {
    columns: Vec<Column>,
}

impl ColumnDescriptor {
    /// Build from the service's column metadata
    ///
    /// Repeated names get a `_2`, `_3`, ... suffix so every row can be
    /// addressed by name; unnamed columns fall back to their label.
    pub fn from_wire(columns: &[WireColumn]) -> Self {
        let mut seen: HashSet<String> = HashSet::with_capacity(columns.len());
        let mut out = Vec::with_capacity(columns.len());

        for (index, wire) in columns.iter().enumerate() {
            let base = if wire.name.is_empty() {
                wire.label
                    .clone()
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| format!("column_{}", index + 1))
            } else {
                wire.name.clone()
            };

            let mut name = base.clone();
            let mut n = 2;
            while seen.contains(&name) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            seen.insert(name.clone());

            out.push(Column {
                name,
                index,
                type_name: wire.type_name.clone(),
            });
        }

        Self { columns: out }
    }

    /// Untyped descriptor from plain names
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let wire: Vec<WireColumn> = names
            .into_iter()
            .map(|n| WireColumn {
                name: n.into(),
                ..Default::default()
            })
            .collect();
        Self::from_wire(&wire)
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether there are no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns in declaration order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Position of the column called `name`
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// One materialized row
///
/// Serializes as a JSON object whose keys follow column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<ColumnDescriptor>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(columns: Arc<ColumnDescriptor>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Value of the column called `name`
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.position(name).and_then(|i| self.values.get(i))
    }

    /// Value at `index`
    pub fn value_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Values in column order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// `(column, value)` pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.names().zip(self.values.iter())
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no cells
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// All rows of one statement in server order
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    columns: Arc<ColumnDescriptor>,
    rows: Vec<Row>,
    reported_total: Option<i64>,
}

impl ResultSet {
    /// A result with no columns and no rows (DDL, DML)
    pub fn empty() -> Self {
        Self {
            columns: Arc::new(ColumnDescriptor::default()),
            rows: Vec::new(),
            reported_total: None,
        }
    }

    /// Column layout
    pub fn columns(&self) -> &ColumnDescriptor {
        &self.columns
    }

    /// Rows in server order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Consume into rows
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First row, for single-row statements
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Total row count reported by the service, when it sent one
    pub fn reported_total(&self) -> Option<i64> {
        self.reported_total
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ResultSet", 3)?;
        state.serialize_field("columns", &self.columns.columns)?;
        state.serialize_field("rows", &self.rows)?;
        state.serialize_field("row_count", &self.rows.len())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_names_are_suffixed() {
        let descriptor = ColumnDescriptor::from_names(["?column?", "?column?", "id", "?column?"]);
        let names: Vec<&str> = descriptor.names().collect();
        assert_eq!(names, vec!["?column?", "?column?_2", "id", "?column?_3"]);
    }

    #[test]
    fn test_unnamed_column_uses_label() {
        let descriptor = ColumnDescriptor::from_wire(&[
            WireColumn {
                name: String::new(),
                label: Some("total".into()),
                type_name: Some("int8".into()),
            },
            WireColumn::default(),
        ]);
        let names: Vec<&str> = descriptor.names().collect();
        assert_eq!(names, vec!["total", "column_2"]);
    }

    #[test]
    fn test_decimal_detection() {
        let descriptor = ColumnDescriptor::from_wire(&[
            WireColumn::new("a", "numeric"),
            WireColumn::new("b", "NUMERIC(18,2)"),
            WireColumn::new("c", "float8"),
        ]);
        let cols = descriptor.columns();
        assert!(cols[0].is_decimal());
        assert!(cols[1].is_decimal());
        assert!(!cols[2].is_decimal());
    }

    #[test]
    fn test_row_serializes_in_column_order() {
        let columns = Arc::new(ColumnDescriptor::from_names(["z", "a", "m"]));
        let row = Row::new(
            columns,
            vec![Value::Integer(1), Value::String("x".into()), Value::Null],
        );
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"z":1,"a":"x","m":null}"#);
        assert_eq!(row.get("a").and_then(Value::as_str), Some("x"));
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn test_empty_result_set() {
        let empty = ResultSet::empty();
        assert!(empty.is_empty());
        assert!(empty.columns().is_empty());
        let json = serde_json::to_value(&empty).unwrap();
        assert_eq!(json["row_count"], 0);
    }
}
