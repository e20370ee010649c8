//! Row access and value conversion

use crate::error::{DbError, DbResult};
use crate::value::Value;

/// A decoded result row: ordered `(column, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row from parallel column/value lists.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Column names in result order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the first column named `column`.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Value at a column index.
    pub fn get_index(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Convert the named column into `T`.
    pub fn try_get<T: FromValue>(&self, column: &str) -> DbResult<T> {
        let value = self
            .get(column)
            .ok_or_else(|| DbError::query(format!("Column '{column}' not found")))?;
        T::from_value(value).map_err(|e| match e {
            DbError::Query { message, debug } => {
                DbError::Query {
                    message: format!("Decode error on column '{column}': {message}"),
                    debug,
                }
            }
            other => other,
        })
    }

    /// Consume the row, returning `(column, value)` pairs.
    pub fn into_pairs(self) -> Vec<(String, Value)> {
        self.columns.into_iter().zip(self.values).collect()
    }

    /// Consume the row, returning only the values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Conversion from a decoded [`Value`] into a Rust type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> DbResult<Self>;
}

fn mismatch(expected: &str, value: &Value) -> DbError {
    DbError::query(format!("expected {expected}, got {}", value.type_name()))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> DbResult<Self> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> DbResult<Self> {
        value.as_i64().ok_or_else(|| mismatch("int", value))
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> DbResult<Self> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide).map_err(|_| DbError::query(format!("{wide} out of range for i32")))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> DbResult<Self> {
        value.as_f64().ok_or_else(|| mismatch("float", value))
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            other => Err(mismatch("text", other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            other => Err(mismatch("bytes", other)),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::Json(j) => Ok(j.clone()),
            Value::Text(s) => serde_json::from_str(s)
                .map_err(|e| DbError::query("invalid JSON text").with_debug(e.to_string())),
            other => Err(mismatch("json", other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        Row::new(
            vec!["id".into(), "name".into(), "deleted".into()],
            vec![Value::Int(7), Value::Text("alice".into()), Value::Null],
        )
    }

    #[test]
    fn get_by_name() {
        let row = sample();
        assert_eq!(row.get("name"), Some(&Value::Text("alice".into())));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn try_get_converts() {
        let row = sample();
        assert_eq!(row.try_get::<i64>("id").unwrap(), 7);
        assert_eq!(row.try_get::<String>("name").unwrap(), "alice");
        assert_eq!(row.try_get::<Option<i64>>("deleted").unwrap(), None);
    }

    #[test]
    fn try_get_reports_column() {
        let row = sample();
        let err = row.try_get::<i64>("name").unwrap_err();
        assert!(err.message().contains("'name'"));
        assert!(row.try_get::<i64>("nope").is_err());
    }
}
