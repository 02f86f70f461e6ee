//! Table declarations.
//!
//! A [`Table`] is an ordered list of columns plus optional foreign-key
//! references. Its primary-key shape is derived from the columns flagged as
//! primary keys and is never stored separately.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::column::{Column, ColumnBuilder};
use crate::error::{ArgumentError, Result, SchemaError};
use crate::types::ColumnType;
use crate::validate::{validate_columns, validate_foreign_keys, validate_identifier};
use crate::value::{KeyShape, PrimaryKey, Value};

/// A foreign-key reference from a child column to a parent table's column.
///
/// Generated constraints always cascade deletes from parent to child.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ForeignKeyReference {
    /// Column of the declaring table.
    pub child_column: String,
    /// Referenced table.
    pub parent_table: String,
    /// Referenced column of the parent table.
    pub parent_column: String,
}

impl ForeignKeyReference {
    pub fn new(
        child_column: impl Into<String>,
        parent_table: impl Into<String>,
        parent_column: impl Into<String>,
    ) -> Self {
        Self {
            child_column: child_column.into(),
            parent_table: parent_table.into(),
            parent_column: parent_column.into(),
        }
    }
}

impl fmt::Display for ForeignKeyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}({})",
            self.child_column, self.parent_table, self.parent_column
        )
    }
}

/// A finished, immutable table declaration.
///
/// # Examples
///
/// ```
/// use table_schema_core::*;
///
/// let players = Table::builder()
///     .name("players")
///     .column_builder(
///         Column::builder()
///             .name("uuid")
///             .column_type(ColumnType::String)
///             .properties([ColumnProperty::PrimaryKey, ColumnProperty::NotNull]),
///     )
///     .column_builder(
///         Column::builder()
///             .name("gold")
///             .column_type(ColumnType::Long)
///             .default_value(10_i64),
///     )
///     .build()
///     .unwrap();
///
/// assert_eq!(players.key_shape(), KeyShape::Scalar(ColumnType::String));
/// assert_eq!(players.value_columns().len(), 1);
/// assert!(players.column("GOLD").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    foreign_keys: BTreeSet<ForeignKeyReference>,
}

impl Table {
    /// Returns a new, empty [`TableBuilder`].
    pub fn builder() -> TableBuilder {
        TableBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn foreign_keys(&self) -> &BTreeSet<ForeignKeyReference> {
        &self.foreign_keys
    }

    /// Looks up a column by name, case-insensitively.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_named(name))
    }

    /// Returns `true` if names match case-insensitively.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Primary-key columns in declaration order.
    pub fn primary_key_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.is_primary_key()).collect()
    }

    /// Non-key columns in declaration order.
    pub fn value_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| !c.is_primary_key()).collect()
    }

    pub fn has_primary_key(&self) -> bool {
        self.columns.iter().any(Column::is_primary_key)
    }

    /// Derives the primary-key shape from the key columns.
    pub fn key_shape(&self) -> KeyShape {
        let types: Vec<ColumnType> = self
            .primary_key_columns()
            .iter()
            .map(|c| c.column_type())
            .collect();
        match types.len() {
            0 => KeyShape::None,
            1 => KeyShape::Scalar(types[0]),
            _ => KeyShape::Composite(types),
        }
    }

    /// Splits a key into parts and checks them against the key columns.
    ///
    /// The key must have exactly one part per key column, in key order, and
    /// every part must match its column's type.
    pub fn key_parts<K: PrimaryKey>(&self, key: &K) -> std::result::Result<Vec<Value>, ArgumentError> {
        let key_columns = self.primary_key_columns();
        let parts = key.to_parts();
        if parts.len() != key_columns.len() {
            return Err(ArgumentError::KeyArity {
                table: self.name.clone(),
                expected: key_columns.len(),
                found: parts.len(),
            });
        }
        for (column, part) in key_columns.iter().zip(&parts) {
            if part.column_type() != column.column_type() {
                return Err(ArgumentError::KeyType {
                    column: column.name().to_string(),
                    expected: column.column_type(),
                    found: part.column_type(),
                });
            }
        }
        Ok(parts)
    }

    /// Resolves a non-key column for writing and checks the value's type.
    pub fn value_column(
        &self,
        column: &str,
        value: &Value,
    ) -> std::result::Result<&Column, ArgumentError> {
        let resolved = self.writable_column(column)?;
        if resolved.column_type() != value.column_type() {
            return Err(ArgumentError::ValueType {
                column: resolved.name().to_string(),
                expected: resolved.column_type(),
                found: value.column_type(),
            });
        }
        Ok(resolved)
    }

    /// Resolves a non-key column by name.
    pub fn writable_column(&self, column: &str) -> std::result::Result<&Column, ArgumentError> {
        let resolved = self.column(column).ok_or_else(|| ArgumentError::UnknownColumn {
            table: self.name.clone(),
            column: column.to_string(),
        })?;
        if resolved.is_primary_key() {
            return Err(ArgumentError::KeyColumn(resolved.name().to_string()));
        }
        Ok(resolved)
    }

    /// Returns a builder pre-filled with this table's name, columns and
    /// foreign keys.
    pub fn to_builder(&self) -> TableBuilder {
        TableBuilder {
            name: Some(self.name.clone()),
            columns: self.columns.iter().map(Column::to_builder).collect(),
            foreign_keys: self.foreign_keys.clone(),
        }
    }
}

/// Accumulates the fields of a [`Table`].
#[derive(Debug, Clone, Default)]
pub struct TableBuilder {
    name: Option<String>,
    columns: Vec<ColumnBuilder>,
    foreign_keys: BTreeSet<ForeignKeyReference>,
}

impl TableBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Replaces the column list with finished columns.
    pub fn columns(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.columns = columns.into_iter().map(|c| c.to_builder()).collect();
        self
    }

    /// Replaces the column list with column builders, built on [`build`](Self::build).
    pub fn column_builders(mut self, builders: impl IntoIterator<Item = ColumnBuilder>) -> Self {
        self.columns = builders.into_iter().collect();
        self
    }

    /// Appends one finished column.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column.to_builder());
        self
    }

    /// Appends one column builder.
    pub fn column_builder(mut self, builder: ColumnBuilder) -> Self {
        self.columns.push(builder);
        self
    }

    /// Replaces the foreign-key set.
    pub fn foreign_keys(mut self, foreign_keys: impl IntoIterator<Item = ForeignKeyReference>) -> Self {
        self.foreign_keys = foreign_keys.into_iter().collect();
        self
    }

    pub fn foreign_key(mut self, foreign_key: ForeignKeyReference) -> Self {
        self.foreign_keys.insert(foreign_key);
        self
    }

    /// Name set so far, if any.
    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Builds the columns, validates the declaration and produces a [`Table`].
    pub fn build(self) -> Result<Table> {
        let name = self.name.ok_or(SchemaError::MissingName("table"))?;
        validate_identifier(&name)?;

        let columns = self
            .columns
            .into_iter()
            .map(ColumnBuilder::build)
            .collect::<Result<Vec<_>>>()?;

        validate_columns(&name, &columns)?;
        validate_foreign_keys(&name, &columns, &self.foreign_keys)?;

        Ok(Table {
            name,
            columns,
            foreign_keys: self.foreign_keys,
        })
    }
}
