//! Error types for SQLite schema operations.
//!
//! [`StoreError`] wraps the declaration and argument errors of the core crate
//! and adds the failures that involve the store itself: opening the file,
//! reading metadata, migrating, and converting cells.

use std::fmt;
use std::path::PathBuf;

use table_schema_config::ConfigError;
use table_schema_core::{ArgumentError, KeyShape, SchemaError};
use thiserror::Error;

/// One statement of a create or rebuild sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStep {
    Begin,
    Create,
    CreateShadow,
    CopyRows,
    DropOriginal,
    RenameShadow,
    ForeignKeyCheck,
    Commit,
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            MigrationStep::Begin => "begin",
            MigrationStep::Create => "create",
            MigrationStep::CreateShadow => "create shadow table",
            MigrationStep::CopyRows => "copy rows",
            MigrationStep::DropOriginal => "drop original table",
            MigrationStep::RenameShadow => "rename shadow table",
            MigrationStep::ForeignKeyCheck => "foreign key check",
            MigrationStep::Commit => "commit",
        };
        f.write_str(step)
    }
}

/// Errors that can occur while working against a SQLite store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Declaration is incomplete or illegal.
    #[error("invalid declaration: {0}")]
    Schema(#[from] SchemaError),

    /// Key or value does not fit the table.
    #[error("invalid argument: {0}")]
    Argument(#[from] ArgumentError),

    /// Configuration could not be applied.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Builder finished without a path or in-memory location.
    #[error("database location must be set")]
    MissingLocation,

    /// Database file could not be opened or configured.
    #[error("cannot open database '{}': {source}", path.display())]
    Connection {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// A metadata query failed.
    #[error("cannot introspect table '{table}': {source}")]
    Introspection {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Table is not present in the store or registry.
    #[error("no such table: {0}")]
    UnknownTable(String),

    /// Table has no primary key and cannot be addressed by row accessors.
    #[error("table '{0}' has no primary key")]
    NoPrimaryKey(String),

    /// Requested key type does not fit the table's primary key.
    #[error("table '{table}' cannot be keyed by {requested}: primary key shape is {shape:?}")]
    KeyType {
        table: String,
        requested: &'static str,
        shape: KeyShape,
    },

    /// A statement of a create or rebuild sequence failed; the sequence was
    /// rolled back.
    #[error("migration of table '{table}' failed at {step}: {source}")]
    Migration {
        table: String,
        step: MigrationStep,
        #[source]
        source: rusqlite::Error,
    },

    /// The rebuilt table violates foreign-key constraints; the rebuild was
    /// rolled back.
    #[error("migration of table '{table}' left {violations} foreign key violation(s)")]
    ForeignKeyViolation { table: String, violations: usize },

    /// Stored cell cannot be represented in its column's type.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Row-level statement failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Convenience alias for results with [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;
