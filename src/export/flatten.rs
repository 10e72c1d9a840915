use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Separator used when an array is collapsed into a single column.
/// Elements are not escaped, so an element containing it cannot be
/// told apart on re-parse.
pub const ARRAY_SEPARATOR: &str = "; ";

/// One flattened record: dotted key path to scalar value, sorted by key
pub type FlatRow = BTreeMap<String, Value>;

/// Rows sharing one header, every row exactly `headers.len()` cells wide
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Data transformation utilities for tabular export
pub struct DataTransformer;

impl DataTransformer {
    /// Flatten one value into dotted-path scalar columns
    pub fn flatten(value: &Value, prefix: &str) -> FlatRow {
        let mut row = FlatRow::new();
        Self::flatten_object(value, prefix, &mut row);
        row
    }

    /// Flatten every record of a batch
    pub fn flatten_json(data: &[Value]) -> Vec<FlatRow> {
        data.iter().map(|item| Self::flatten(item, "")).collect()
    }

    /// Recursively flatten a JSON value
    fn flatten_object(value: &Value, prefix: &str, result: &mut FlatRow) {
        match value {
            Value::Object(obj) => {
                for (key, val) in obj {
                    let new_key = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    Self::flatten_object(val, &new_key, result);
                }
            }
            Value::Array(arr) => {
                let joined = arr
                    .iter()
                    .map(Self::element_to_string)
                    .collect::<Vec<_>>()
                    .join(ARRAY_SEPARATOR);
                result.insert(prefix.to_string(), Value::String(joined));
            }
            Value::Null => {
                result.insert(prefix.to_string(), Value::String(String::new()));
            }
            _ => {
                result.insert(prefix.to_string(), value.clone());
            }
        }
    }

    /// Array elements: containers and null as compact JSON, scalars as text
    fn element_to_string(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => value.to_string(),
        }
    }

    /// Convert a flattened cell to its text form
    pub fn value_to_string(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => String::new(),
            _ => value.to_string(),
        }
    }

    /// Sorted union of column names over all rows
    pub fn get_column_names(rows: &[FlatRow]) -> Vec<String> {
        let columns: BTreeSet<&String> = rows.iter().flat_map(|row| row.keys()).collect();
        columns.into_iter().cloned().collect()
    }

    /// Flatten a batch into a rectangular table; absent cells become `""`
    pub fn to_table(data: &[Value]) -> Table {
        let flattened = Self::flatten_json(data);
        let headers = Self::get_column_names(&flattened);

        let rows = flattened
            .iter()
            .map(|row| {
                headers
                    .iter()
                    .map(|col| row.get(col).cloned().unwrap_or_else(|| Value::String(String::new())))
                    .collect()
            })
            .collect();

        Table { headers, rows }
    }
}
