//! SQLite backend for declarative table schemas.
//!
//! This crate applies [`Table`](table_schema_core::Table) declarations to a
//! SQLite store and gives typed, key-addressed access to their rows.
//!
//! # Architecture
//!
//! - **`introspect`**: rebuilds a declaration from the live catalog
//! - **`migration`**: creates absent tables and rebuilds changed ones through a
//!   shadow table, all-or-nothing
//! - **`database`**: the registry owning the connection and the finished tables
//! - **`accessor`**: [`Loader`], [`Saver`] and [`Deleter`] keyed by primary key
//!
//! # Quick start
//!
//! ```no_run
//! use table_schema_config::DatabaseConfig;
//! use table_schema_sqlite::DatabaseBuilder;
//!
//! let config = DatabaseConfig::load("game.yml").unwrap();
//! let db = DatabaseBuilder::from_config(&config).unwrap().build().unwrap();
//!
//! for step in db.reconciliations() {
//!     println!("{}: {}", step.table, step.outcome);
//! }
//!
//! let uuid = "p1".to_string();
//! let gold = db.loader::<String>("players").unwrap().load_value("gold", &uuid).unwrap();
//! println!("gold = {gold:?}");
//! ```
//!
//! # Concurrency
//!
//! A [`Database`] and its accessors share one connection and assume
//! sequential, single-threaded use. Concurrent structural migration from
//! several processes against one file is not coordinated.

mod accessor;
mod convert;
mod database;
mod error;
mod introspect;
mod migration;
mod sql;

pub use accessor::{Deleter, Loader, Saver, TableIo};
pub use database::{
    DATABASE_EXTENSION, Database, DatabaseBuilder, Reconciliation, with_database_extension,
};
pub use error::{MigrationStep, Result, StoreError};
pub use introspect::{LiveTableExt, list_tables, read_table, table_exists};
pub use migration::{MigrationOutcome, Migrator};
