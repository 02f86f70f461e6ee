//! Conversion between column values and SQLite cells.
//!
//! Values are written with their natural storage class. Cells are read back
//! by the declared column type, so a stored value that does not fit (an
//! out-of-range SHORT, a blob, a non-0/1 boolean) is a conversion error rather
//! than a silently different value.

use rusqlite::types::{Value as SqlValue, ValueRef};
use table_schema_core::{Column, ColumnType, Value};

use crate::error::{Result, StoreError};

/// Converts a value into an SQLite parameter.
pub(crate) fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Short(v) => SqlValue::Integer(i64::from(*v)),
        Value::Integer(v) => SqlValue::Integer(i64::from(*v)),
        Value::Long(v) => SqlValue::Integer(*v),
        Value::Float(v) => SqlValue::Real(f64::from(*v)),
        Value::Double(v) => SqlValue::Real(*v),
        Value::Text(v) => SqlValue::Text(v.clone()),
        Value::Boolean(v) => SqlValue::Integer(i64::from(*v)),
    }
}

pub(crate) fn to_sql_all(values: &[Value]) -> Vec<SqlValue> {
    values.iter().map(to_sql).collect()
}

/// Reads a cell as a value of `column`'s type. Storage NULL reads as `None`.
pub(crate) fn from_sql(column: &Column, cell: ValueRef<'_>) -> Result<Option<Value>> {
    let ty = column.column_type();
    let value = match (ty, cell) {
        (_, ValueRef::Null) => return Ok(None),
        (ColumnType::Short, ValueRef::Integer(v)) => {
            Value::Short(i16::try_from(v).map_err(|_| out_of_range(column, v))?)
        }
        (ColumnType::Integer, ValueRef::Integer(v)) => {
            Value::Integer(i32::try_from(v).map_err(|_| out_of_range(column, v))?)
        }
        (ColumnType::Long, ValueRef::Integer(v)) => Value::Long(v),
        (ColumnType::Float, ValueRef::Real(v)) => Value::Float(v as f32),
        (ColumnType::Float, ValueRef::Integer(v)) => Value::Float(v as f32),
        (ColumnType::Double, ValueRef::Real(v)) => Value::Double(v),
        (ColumnType::Double, ValueRef::Integer(v)) => Value::Double(v as f64),
        (ColumnType::String, ValueRef::Text(bytes)) => {
            let text = std::str::from_utf8(bytes).map_err(|e| {
                StoreError::Conversion(format!("column '{}': {e}", column.name()))
            })?;
            Value::Text(text.to_string())
        }
        (ColumnType::String, ValueRef::Integer(v)) => Value::Text(v.to_string()),
        (ColumnType::String, ValueRef::Real(v)) => Value::Text(v.to_string()),
        (ColumnType::Boolean, ValueRef::Integer(0)) => Value::Boolean(false),
        (ColumnType::Boolean, ValueRef::Integer(1)) => Value::Boolean(true),
        (_, other) => {
            return Err(StoreError::Conversion(format!(
                "column '{}' expects {ty}, found {:?} cell",
                column.name(),
                other.data_type()
            )));
        }
    };
    Ok(Some(value))
}

fn out_of_range(column: &Column, v: i64) -> StoreError {
    StoreError::Conversion(format!(
        "value {v} out of range for {} column '{}'",
        column.column_type(),
        column.name()
    ))
}
