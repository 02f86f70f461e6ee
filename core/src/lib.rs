//! Declarative table model for the table-schema workspace.
//!
//! This crate defines the storage-independent half of the system:
//!
//! - [`ColumnType`] and [`ColumnProperty`]: the closed type set and the
//!   constraint flags a column may carry.
//! - [`Value`], [`CompositeKey`], [`KeyShape`] and [`PrimaryKey`]: typed cell
//!   values and the key types row accessors are addressed by.
//! - [`Column`] / [`ColumnBuilder`] and [`Table`] / [`TableBuilder`]:
//!   immutable declarations and the builders that validate them.
//! - [`diff_tables`] / [`changed`]: semantic comparison of a declared table
//!   against a live one.
//!
//! Storage (introspection, migration, row access) lives in
//! `table-schema-sqlite`.
//!
//! # Example
//!
//! ```
//! use table_schema_core::*;
//!
//! let players = Table::builder()
//!     .name("players")
//!     .column_builder(
//!         Column::builder()
//!             .name("uuid")
//!             .column_type(ColumnType::String)
//!             .properties([
//!                 ColumnProperty::PrimaryKey,
//!                 ColumnProperty::Unique,
//!                 ColumnProperty::NotNull,
//!             ]),
//!     )
//!     .column_builder(
//!         Column::builder()
//!             .name("gold")
//!             .column_type(ColumnType::Long)
//!             .property(ColumnProperty::NotNull)
//!             .default_value(10_i64),
//!     )
//!     .build()
//!     .unwrap();
//!
//! assert!(String::accepts(&players.key_shape()));
//! assert!(!changed(&players, &players.to_builder().build().unwrap()));
//! ```

mod column;
mod diff;
mod error;
mod table;
mod types;
mod validate;
mod value;

pub use column::{Column, ColumnBuilder};
pub use diff::{ColumnChange, ForeignKeyChange, SchemaDiff, changed, diff_tables};
pub use error::{ArgumentError, Result, SchemaError};
pub use table::{ForeignKeyReference, Table, TableBuilder};
pub use types::{ColumnProperty, ColumnType};
pub use validate::{validate_columns, validate_foreign_keys, validate_identifier};
pub use value::{CompositeKey, KeyShape, PrimaryKey, Value};
