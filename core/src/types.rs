//! Semantic column types and constraint flags.
//!
//! [`ColumnType`] is the closed set of value types a column can hold, each
//! mapped to exactly one SQLite storage type name. [`ColumnProperty`] is the
//! set of independent constraint flags a column may carry.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic type of a column.
///
/// The mapping to a storage type name is total but not injective: both
/// [`Float`](ColumnType::Float) and [`Double`](ColumnType::Double) are stored
/// as `REAL`, so reading a storage type back with
/// [`from_storage_name`](ColumnType::from_storage_name) cannot recover that
/// distinction.
///
/// # Examples
///
/// ```
/// use table_schema_core::ColumnType;
///
/// assert_eq!(ColumnType::Long.storage_name(), "BIGINT");
/// assert_eq!(ColumnType::from_storage_name("bigint"), ColumnType::Long);
///
/// // Lossy: FLOAT comes back as DOUBLE.
/// assert_eq!(ColumnType::Float.storage_name(), "REAL");
/// assert_eq!(ColumnType::from_storage_name("REAL"), ColumnType::Double);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// 16-bit integer, stored as `SMALLINT`.
    Short,
    /// 32-bit integer, stored as `INTEGER`.
    Integer,
    /// 64-bit integer, stored as `BIGINT`.
    Long,
    /// Single precision float, stored as `REAL`.
    Float,
    /// Double precision float, stored as `REAL`.
    Double,
    /// UTF-8 text, stored as `TEXT`.
    String,
    /// Boolean, stored as `BOOLEAN` (0/1).
    Boolean,
}

impl ColumnType {
    /// All column types, in declaration order.
    pub const ALL: [ColumnType; 7] = [
        ColumnType::Short,
        ColumnType::Integer,
        ColumnType::Long,
        ColumnType::Float,
        ColumnType::Double,
        ColumnType::String,
        ColumnType::Boolean,
    ];

    /// Returns the storage type name used in generated `CREATE TABLE` statements.
    pub fn storage_name(self) -> &'static str {
        match self {
            ColumnType::Short => "SMALLINT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Long => "BIGINT",
            ColumnType::Float | ColumnType::Double => "REAL",
            ColumnType::String => "TEXT",
            ColumnType::Boolean => "BOOLEAN",
        }
    }

    /// Maps a storage type name back to a column type.
    ///
    /// Matching is case-insensitive. `REAL` (and the `FLOAT`/`DOUBLE`
    /// spellings) resolve to [`Double`](ColumnType::Double); any unknown
    /// storage type resolves to [`String`](ColumnType::String).
    pub fn from_storage_name(name: &str) -> ColumnType {
        match name.trim().to_ascii_uppercase().as_str() {
            "SMALLINT" => ColumnType::Short,
            "INTEGER" | "INT" => ColumnType::Integer,
            "BIGINT" => ColumnType::Long,
            "REAL" | "FLOAT" | "DOUBLE" => ColumnType::Double,
            "TEXT" => ColumnType::String,
            "BOOLEAN" => ColumnType::Boolean,
            _ => ColumnType::String,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Short => "short",
            ColumnType::Integer => "integer",
            ColumnType::Long => "long",
            ColumnType::Float => "float",
            ColumnType::Double => "double",
            ColumnType::String => "string",
            ColumnType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// A constraint flag attached to a column.
///
/// Flags are independent; a column carries a set of them. At most one column
/// of a table may be [`AutoIncrementPrimaryKey`](ColumnProperty::AutoIncrementPrimaryKey),
/// and if one is present it must be the table's only primary-key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnProperty {
    /// Values must be unique across rows.
    Unique,
    /// Storage NULL is rejected.
    NotNull,
    /// Column participates in the primary key.
    PrimaryKey,
    /// Column is the table's single auto-incrementing integer key.
    AutoIncrementPrimaryKey,
}

impl ColumnProperty {
    /// Returns `true` for both primary-key flavours.
    pub fn is_primary_key(self) -> bool {
        matches!(
            self,
            ColumnProperty::PrimaryKey | ColumnProperty::AutoIncrementPrimaryKey
        )
    }
}

impl fmt::Display for ColumnProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnProperty::Unique => "UNIQUE",
            ColumnProperty::NotNull => "NOT NULL",
            ColumnProperty::PrimaryKey => "PRIMARY KEY",
            ColumnProperty::AutoIncrementPrimaryKey => "AUTOINCREMENT",
        };
        f.write_str(name)
    }
}
