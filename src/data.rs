// Loosely typed input tables

use crate::error::DataError;
use serde_json::Value;

/// A loosely typed table: every cell is kept as the string it was read as.
/// Interpretation happens later, in the normalizer.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Create a RawTable from parsed CSV
    pub fn from_csv(csv: crate::csv_reader::CsvData) -> Self {
        Self {
            headers: csv.headers,
            rows: csv.rows,
        }
    }

    /// Create a RawTable from a JSON Array of Objects.
    /// Headers are the union of all object keys, in the order objects are
    /// visited; absent keys and nulls become empty cells.
    pub fn from_json(value: &Value) -> Result<Self, DataError> {
        let array = value.as_array().ok_or(DataError::NotAnArray)?;

        let mut headers: Vec<String> = Vec::new();
        for (index, item) in array.iter().enumerate() {
            let obj = item.as_object().ok_or(DataError::NotAnObject { index })?;
            for key in obj.keys() {
                if !headers.iter().any(|h| h == key) {
                    headers.push(key.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(array.len());
        for (index, item) in array.iter().enumerate() {
            let obj = item.as_object().ok_or(DataError::NotAnObject { index })?;

            let mut row = Vec::with_capacity(headers.len());
            for header in &headers {
                let val_str = match obj.get(header) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    Some(Value::Bool(b)) => b.to_string(),
                    Some(Value::Null) | None => String::new(),
                    _ => {
                        return Err(DataError::UnsupportedValue {
                            field: header.clone(),
                        })
                    }
                };
                row.push(val_str);
            }
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    /// Index of the header whose trimmed text equals `name` exactly.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
