//! Error types for declaration and argument checking.
//!
//! [`SchemaError`] is raised while building columns and tables and never
//! involves storage. [`ArgumentError`] is raised when a caller hands a row
//! accessor a key or value that does not fit the table, before any statement
//! is issued.

use thiserror::Error;

use crate::types::ColumnType;

/// A column or table declaration is incomplete or illegal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Builder was finished without a name.
    #[error("{0} name must be set")]
    MissingName(&'static str),

    /// Column builder was finished without a type.
    #[error("type must be set for column '{0}'")]
    MissingType(String),

    /// Name contains characters that cannot be used as an SQL identifier.
    #[error("invalid identifier '{0}': must be alphanumeric or underscore and not start with a digit")]
    InvalidIdentifier(String),

    /// Two columns of one table share a name (case-insensitive).
    #[error("duplicate column '{column}' in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    /// More than one column carries the auto-increment flag.
    #[error("table '{0}' declares more than one auto-increment primary key")]
    MultipleAutoIncrement(String),

    /// An auto-increment column shares the primary key with other columns.
    #[error("table '{table}' mixes auto-increment column '{column}' into a composite primary key")]
    AutoIncrementInCompositeKey { table: String, column: String },

    /// Auto-increment requested on a column that is not an INTEGER.
    #[error("auto-increment column '{column}' must be integer, found {found}")]
    AutoIncrementType { column: String, found: ColumnType },

    /// Declared default does not match the column type.
    #[error("default for column '{column}' must be {expected}, found {found}")]
    DefaultTypeMismatch {
        column: String,
        expected: ColumnType,
        found: ColumnType,
    },

    /// Foreign key references a child column the table does not declare.
    #[error("foreign key column '{column}' is not declared in table '{table}'")]
    UnknownForeignKeyColumn { table: String, column: String },
}

/// A key or value handed to a row accessor does not fit the table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    /// Key has a different number of parts than the table has key columns.
    #[error("primary key of table '{table}' has {expected} part(s), got {found}")]
    KeyArity {
        table: String,
        expected: usize,
        found: usize,
    },

    /// A key part has the wrong type for its key column.
    #[error("primary key column '{column}' expects {expected}, got {found}")]
    KeyType {
        column: String,
        expected: ColumnType,
        found: ColumnType,
    },

    /// A value has the wrong type for its column.
    #[error("column '{column}' expects {expected}, got {found}")]
    ValueType {
        column: String,
        expected: ColumnType,
        found: ColumnType,
    },

    /// Positional column and value lists differ in length.
    #[error("{columns} column(s) but {values} value(s)")]
    ValueCount { columns: usize, values: usize },

    /// Column name is not part of the table.
    #[error("table '{table}' has no column '{column}'")]
    UnknownColumn { table: String, column: String },

    /// A primary-key column was targeted by a value write.
    #[error("column '{0}' is part of the primary key and cannot be written as a value")]
    KeyColumn(String),
}

/// Convenience alias for results with [`SchemaError`].
pub type Result<T> = std::result::Result<T, SchemaError>;
