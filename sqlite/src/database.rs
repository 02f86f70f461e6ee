//! The table registry.
//!
//! A [`Database`] owns one lazily opened connection and the finished tables
//! registered against it, indexed by case-insensitive name. Registering a
//! table reconciles the live store with it first, so every registered table
//! matches storage.
//!
//! # Example
//!
//! ```
//! use table_schema_core::*;
//! use table_schema_sqlite::Database;
//!
//! let players = Table::builder()
//!     .name("players")
//!     .column_builder(Column::builder().name("uuid").column_type(ColumnType::String)
//!         .properties([ColumnProperty::PrimaryKey, ColumnProperty::NotNull]))
//!     .column_builder(Column::builder().name("gold").column_type(ColumnType::Long)
//!         .property(ColumnProperty::NotNull).default_value(10_i64));
//!
//! let db = Database::builder()
//!     .in_memory()
//!     .add_and_override([players])
//!     .build()
//!     .unwrap();
//!
//! let uuid = "p1".to_string();
//! db.saver::<String>("players").unwrap().save_entry(&uuid).unwrap();
//! assert_eq!(
//!     db.loader::<String>("players").unwrap().load_value("gold", &uuid).unwrap(),
//!     Some(Value::Long(10))
//! );
//! ```

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use once_cell::unsync::OnceCell;
use rusqlite::Connection;
use table_schema_config::{DatabaseConfig, TableMode};
use table_schema_core::{PrimaryKey, Table, TableBuilder, validate_identifier};
use tracing::{Span, debug, info, info_span, warn};

use crate::accessor::{Deleter, Loader, Saver};
use crate::error::{Result, StoreError};
use crate::introspect::{list_tables, read_table, table_exists};
use crate::migration::{MigrationOutcome, Migrator};
use crate::sql;

/// Extension appended to database paths that lack it.
pub const DATABASE_EXTENSION: &str = "db";

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    File(PathBuf),
    Memory,
}

/// One reconciliation performed by a [`Database`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub table: String,
    pub outcome: MigrationOutcome,
}

/// Registry of finished tables over one SQLite connection.
///
/// Use is single-threaded: the connection is shared by every accessor and no
/// locking is done.
#[derive(Debug)]
pub struct Database {
    location: Location,
    foreign_keys: bool,
    migrator: Migrator,
    conn: OnceCell<Connection>,
    tables: BTreeMap<String, Table>,
    reconciliations: Vec<Reconciliation>,
}

impl Database {
    /// Returns a new, empty [`DatabaseBuilder`].
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::default()
    }

    /// Database file, or `None` for an in-memory database.
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    /// Returns the connection, opening it on first use.
    ///
    /// The connection stays open for the lifetime of the database.
    pub fn connection(&self) -> Result<&Connection> {
        self.conn.get_or_try_init(|| {
            let _entered = self.migrator.span().enter();
            open(&self.location, self.foreign_keys)
        })
    }

    /// Reconciles the store with `table`, then registers it, replacing any
    /// table of the same name.
    pub fn add_or_replace(&mut self, table: Table) -> Result<&Table> {
        self.update_table(&table)?;
        let key = registry_key(table.name());
        match self.tables.entry(key) {
            Entry::Occupied(mut entry) => {
                entry.insert(table);
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => Ok(entry.insert(table)),
        }
    }

    /// Reconciles the store with `table` without registering it.
    pub fn update_table(&mut self, table: &Table) -> Result<MigrationOutcome> {
        let outcome = self.migrator.reconcile(self.connection()?, table)?;
        self.reconciliations.push(Reconciliation {
            table: table.name().to_string(),
            outcome: outcome.clone(),
        });
        Ok(outcome)
    }

    /// Looks up a table that can be addressed by keys of type `K`.
    ///
    /// Returns `None` if no table has that name or if its primary key does
    /// not fit `K`.
    pub fn get<K: PrimaryKey>(&self, name: &str) -> Option<&Table> {
        self.table(name).filter(|t| K::accepts(&t.key_shape()))
    }

    /// Looks up a table by name, case-insensitively.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(&registry_key(name))
    }

    /// Registered tables, ordered by lowercased name.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// Reconciliations performed so far, oldest first.
    pub fn reconciliations(&self) -> &[Reconciliation] {
        &self.reconciliations
    }

    /// Drops the table `name` from the store and the registry.
    ///
    /// The `DROP TABLE` is issued even if the table is not registered, so a
    /// missing table surfaces as a store error.
    pub fn drop(&mut self, name: &str) -> Result<()> {
        validate_identifier(name)?;
        let conn = self.connection()?;
        conn.execute_batch(&sql::drop_table(name))?;
        self.tables.remove(&registry_key(name));
        info!(parent: self.migrator.span(), table = name, "dropped table");
        Ok(())
    }

    /// Drops every registered table in one transaction.
    pub fn drop_all(&mut self) -> Result<()> {
        let conn = self.connection()?;
        let tx = conn.unchecked_transaction()?;
        for table in self.tables.values() {
            tx.execute_batch(&sql::drop_table(table.name()))?;
        }
        tx.commit()?;
        info!(parent: self.migrator.span(), tables = self.tables.len(), "dropped all tables");
        self.tables.clear();
        Ok(())
    }

    /// Returns a [`Loader`] for the registered table `name`.
    pub fn loader<K: PrimaryKey>(&self, name: &str) -> Result<Loader<'_, K>> {
        let table = self.registered(name)?;
        Loader::new(table, Some(self.connection()?))
    }

    /// Returns a [`Saver`] for the registered table `name`.
    pub fn saver<K: PrimaryKey>(&self, name: &str) -> Result<Saver<'_, K>> {
        let table = self.registered(name)?;
        Saver::new(table, Some(self.connection()?))
    }

    /// Returns a [`Deleter`] for the registered table `name`.
    pub fn deleter<K: PrimaryKey>(&self, name: &str) -> Result<Deleter<'_, K>> {
        let table = self.registered(name)?;
        Deleter::new(table, Some(self.connection()?))
    }

    fn registered(&self, name: &str) -> Result<&Table> {
        self.table(name)
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
    }
}

fn registry_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

fn open(location: &Location, foreign_keys: bool) -> Result<Connection> {
    let (conn, path) = match location {
        Location::File(path) => (Connection::open(path), path.clone()),
        Location::Memory => (Connection::open_in_memory(), PathBuf::from(":memory:")),
    };
    let conn = conn.map_err(|source| StoreError::Connection {
        path: path.clone(),
        source,
    })?;
    conn.pragma_update(None, "foreign_keys", foreign_keys)
        .map_err(|source| StoreError::Connection {
            path: path.clone(),
            source,
        })?;
    info!(path = %path.display(), foreign_keys, "opened database");
    Ok(conn)
}

/// Appends `.db` to `path` unless it already ends with it.
///
/// This is the file a [`DatabaseBuilder::path`] of `path` opens.
pub fn with_database_extension(path: impl Into<PathBuf>) -> PathBuf {
    let path = path.into();
    if path
        .extension()
        .is_some_and(|ext| ext == DATABASE_EXTENSION)
    {
        return path;
    }
    let mut raw: OsString = path.into_os_string();
    raw.push(".");
    raw.push(DATABASE_EXTENSION);
    PathBuf::from(raw)
}

/// Accumulates the settings and table declarations of a [`Database`].
///
/// [`build`](Self::build) applies them in a fixed order:
///
/// 1. every table already in the store is adopted by introspection, unless
///    [`clear_existing_tables`](Self::clear_existing_tables) was called.
///    A table whose live shape is not a legal declaration (a column name
///    with a space, say) is skipped with a warning;
/// 2. "if not exists" declarations are added when no table of that name is
///    present;
/// 3. "override" declarations replace any table of the same name.
///
/// Declared tables are then reconciled with the store in declaration order;
/// adopted tables are registered as read.
#[derive(Debug)]
pub struct DatabaseBuilder {
    location: Option<Location>,
    foreign_keys: bool,
    span: Option<Span>,
    adopt_existing: bool,
    if_not_exists: Vec<TableBuilder>,
    overrides: Vec<TableBuilder>,
}

impl Default for DatabaseBuilder {
    fn default() -> Self {
        Self {
            location: None,
            foreign_keys: true,
            span: None,
            adopt_existing: true,
            if_not_exists: Vec::new(),
            overrides: Vec::new(),
        }
    }
}

impl DatabaseBuilder {
    /// Stores the database in `path`, appending `.db` when missing.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(Location::File(with_database_extension(path)));
        self
    }

    /// Keeps the database in memory.
    pub fn in_memory(mut self) -> Self {
        self.location = Some(Location::Memory);
        self
    }

    /// Enables or disables foreign-key enforcement (default on).
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Span that connection and migration events are recorded in.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Whether tables already in the store are registered (default on).
    pub fn adopt_existing(mut self, adopt: bool) -> Self {
        self.adopt_existing = adopt;
        self
    }

    /// Skips adopting the tables already in the store.
    pub fn clear_existing_tables(self) -> Self {
        self.adopt_existing(false)
    }

    /// Adds declarations that apply only when no table of that name exists.
    pub fn add_tables_if_not_exists(mut self, tables: impl IntoIterator<Item = TableBuilder>) -> Self {
        self.if_not_exists.extend(tables);
        self
    }

    /// Adds declarations that replace any table of the same name.
    pub fn add_and_override(mut self, tables: impl IntoIterator<Item = TableBuilder>) -> Self {
        self.overrides.extend(tables);
        self
    }

    /// Starts a builder from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if a table declaration cannot be turned
    /// into a builder.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        let mut builder = Self::default()
            .path(&config.path)
            .foreign_keys(config.foreign_keys)
            .adopt_existing(config.adopt_existing);
        for table in &config.tables {
            let declared = table.to_builder()?;
            match table.mode {
                TableMode::Override => builder.overrides.push(declared),
                TableMode::IfNotExists => builder.if_not_exists.push(declared),
            }
        }
        Ok(builder)
    }

    /// Opens the store and registers the resulting tables.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingLocation`] if neither a path nor
    /// in-memory storage was chosen, [`StoreError::Schema`] if a declaration
    /// is illegal (checked before the store is touched), and any connection,
    /// introspection or migration error.
    pub fn build(self) -> Result<Database> {
        let location = self.location.ok_or(StoreError::MissingLocation)?;

        let if_not_exists = self
            .if_not_exists
            .into_iter()
            .map(TableBuilder::build)
            .collect::<table_schema_core::Result<Vec<_>>>()?;
        let overrides = self
            .overrides
            .into_iter()
            .map(TableBuilder::build)
            .collect::<table_schema_core::Result<Vec<_>>>()?;

        let span = self.span.unwrap_or_else(|| {
            let target = match &location {
                Location::File(path) => path.display().to_string(),
                Location::Memory => ":memory:".to_string(),
            };
            info_span!("table_schema.database", path = %target)
        });

        let mut db = Database {
            location,
            foreign_keys: self.foreign_keys,
            migrator: Migrator::new(span),
            conn: OnceCell::new(),
            tables: BTreeMap::new(),
            reconciliations: Vec::new(),
        };

        // (table, declared) in application order.
        let mut staged: Vec<(Table, bool)> = Vec::new();
        if self.adopt_existing {
            let conn = db.connection()?;
            for name in list_tables(conn)? {
                match read_table(conn, &name) {
                    Ok(table) => staged.push((table, false)),
                    Err(StoreError::Schema(err)) => warn!(
                        parent: db.migrator.span(),
                        table = %name,
                        error = %err,
                        "skipping existing table that cannot be adopted"
                    ),
                    Err(err) => return Err(err),
                }
            }
        }
        for table in if_not_exists {
            if staged.iter().any(|(t, _)| t.is_named(table.name())) {
                continue;
            }
            let conn = db.connection()?;
            if table_exists(conn, table.name())? {
                staged.push((read_table(conn, table.name())?, false));
            } else {
                staged.push((table, true));
            }
        }
        for table in overrides {
            match staged.iter_mut().find(|(t, _)| t.is_named(table.name())) {
                Some(slot) => *slot = (table, true),
                None => staged.push((table, true)),
            }
        }

        for (table, declared) in staged {
            if declared {
                db.add_or_replace(table)?;
            } else {
                debug!(parent: db.migrator.span(), table = %table.name(), "adopted existing table");
                db.tables.insert(registry_key(table.name()), table);
            }
        }
        Ok(db)
    }
}
