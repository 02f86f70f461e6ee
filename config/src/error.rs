//! Error types for loading and saving declarations.

use std::path::PathBuf;

use table_schema_core::{ColumnType, SchemaError};
use thiserror::Error;

/// Errors that can occur while reading, writing or applying a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File system I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML serialization or deserialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// JSON serialization or deserialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// File extension is neither YAML nor JSON.
    #[error("unsupported config format for '{}': expected .yml, .yaml or .json", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Default literal cannot be represented in the column's type.
    #[error("default for column '{column}' is not a valid {expected} literal")]
    InvalidDefault { column: String, expected: ColumnType },

    /// A declared table or column is illegal.
    #[error("invalid declaration: {0}")]
    Schema(#[from] SchemaError),
}

/// Convenience alias for results with [`ConfigError`].
pub type Result<T> = std::result::Result<T, ConfigError>;
