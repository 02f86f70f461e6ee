//! Declarative database configuration for table-schema.
//!
//! Table declarations can be kept in a YAML or JSON file instead of being
//! assembled with builders in code. Each [`TableConfig`] converts into a core
//! [`TableBuilder`](table_schema_core::TableBuilder); the SQLite crate applies
//! a whole [`DatabaseConfig`] when building a database.
//!
//! # Quick start
//!
//! ```no_run
//! use table_schema_config::DatabaseConfig;
//!
//! let config = DatabaseConfig::load("game.yml").unwrap();
//! for table in &config.tables {
//!     let table = table.to_table().unwrap();
//!     println!("{} has {} columns", table.name(), table.columns().len());
//! }
//! ```

mod config;
mod error;

pub use config::{ColumnConfig, ConfigFormat, DatabaseConfig, DefaultLiteral, TableConfig, TableMode};
pub use error::{ConfigError, Result};
