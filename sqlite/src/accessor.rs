//! Typed row access keyed by primary key.
//!
//! [`Loader`], [`Saver`] and [`Deleter`] operate on one finished [`Table`] and
//! an optional connection. They are typed by the key `K` callers address rows
//! with: a scalar key type such as `String` or `i64`, the dynamic
//! [`Value`], or a [`CompositeKey`](table_schema_core::CompositeKey) for
//! multi-column keys.
//!
//! Keys, column names and values are checked against the table before any
//! statement is issued. Without a connection every operation is a quiet
//! no-op: reads return `None` or an empty map, writes do nothing.
//!
//! # Example
//!
//! ```
//! use rusqlite::Connection;
//! use table_schema_core::*;
//! use table_schema_sqlite::{Loader, Migrator, Saver};
//!
//! let conn = Connection::open_in_memory().unwrap();
//! let players = Table::builder()
//!     .name("players")
//!     .column_builder(Column::builder().name("uuid").column_type(ColumnType::String)
//!         .property(ColumnProperty::PrimaryKey))
//!     .column_builder(Column::builder().name("gold").column_type(ColumnType::Long)
//!         .default_value(10_i64))
//!     .build()
//!     .unwrap();
//! Migrator::new(tracing::Span::none()).reconcile(&conn, &players).unwrap();
//!
//! let saver = Saver::<String>::new(&players, Some(&conn)).unwrap();
//! saver.save_value("gold", &"p1".to_string(), 25_i64).unwrap();
//!
//! let loader = Loader::<String>::new(&players, Some(&conn)).unwrap();
//! assert_eq!(
//!     loader.load_value("gold", &"p1".to_string()).unwrap(),
//!     Some(Value::Long(25))
//! );
//! ```

use std::collections::HashMap;
use std::marker::PhantomData;
use std::ops::Deref;

use rusqlite::{Connection, OptionalExtension, params_from_iter};
use table_schema_core::{ArgumentError, Column, PrimaryKey, Table, Value};
use tracing::debug;

use crate::convert::{from_sql, to_sql, to_sql_all};
use crate::error::{Result, StoreError};
use crate::sql;

/// Shared core of the row accessors: the table, the connection and the key
/// condition.
#[derive(Debug)]
pub struct TableIo<'a, K> {
    table: &'a Table,
    conn: Option<&'a Connection>,
    _key: PhantomData<fn(K)>,
}

impl<K> Clone for TableIo<'_, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for TableIo<'_, K> {}

impl<'a, K: PrimaryKey> TableIo<'a, K> {
    /// Binds `table` to an optional connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoPrimaryKey`] if the table has no primary key,
    /// and [`StoreError::KeyType`] if `K` cannot address its key.
    pub fn new(table: &'a Table, conn: Option<&'a Connection>) -> Result<Self> {
        if !table.has_primary_key() {
            return Err(StoreError::NoPrimaryKey(table.name().to_string()));
        }
        let shape = table.key_shape();
        if !K::accepts(&shape) {
            return Err(StoreError::KeyType {
                table: table.name().to_string(),
                requested: std::any::type_name::<K>(),
                shape,
            });
        }
        Ok(Self {
            table,
            conn,
            _key: PhantomData,
        })
    }

    pub fn table(&self) -> &'a Table {
        self.table
    }

    /// Returns `true` if statements will be issued.
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Returns `true` if a row with `key` exists. Always `false` without a
    /// connection.
    pub fn entry_exists(&self, key: &K) -> Result<bool> {
        let parts = self.table.key_parts(key)?;
        match self.conn {
            Some(conn) => exists(conn, self.table, &parts),
            None => Ok(false),
        }
    }

    fn column(&self, name: &str) -> Result<&'a Column> {
        self.table.column(name).ok_or_else(|| {
            StoreError::Argument(ArgumentError::UnknownColumn {
                table: self.table.name().to_string(),
                column: name.to_string(),
            })
        })
    }
}

fn exists(conn: &Connection, table: &Table, parts: &[Value]) -> Result<bool> {
    let found = conn.query_row(
        &sql::entry_exists(table),
        params_from_iter(to_sql_all(parts)),
        |row| row.get(0),
    )?;
    Ok(found)
}

fn insert_if_absent(conn: &Connection, table: &Table, parts: &[Value]) -> Result<()> {
    if !exists(conn, table, parts)? {
        conn.execute(&sql::insert_entry(table), params_from_iter(to_sql_all(parts)))?;
    }
    Ok(())
}

fn update(conn: &Connection, table: &Table, column: &Column, parts: &[Value], value: &Value) -> Result<()> {
    insert_if_absent(conn, table, parts)?;
    let params = std::iter::once(to_sql(value)).chain(parts.iter().map(to_sql));
    conn.execute(&sql::update_value(table, column), params_from_iter(params))?;
    Ok(())
}

/// Reads cells by primary key.
#[derive(Debug)]
pub struct Loader<'a, K> {
    io: TableIo<'a, K>,
}

impl<'a, K: PrimaryKey> Loader<'a, K> {
    /// See [`TableIo::new`].
    pub fn new(table: &'a Table, conn: Option<&'a Connection>) -> Result<Self> {
        Ok(Self {
            io: TableIo::new(table, conn)?,
        })
    }

    /// Loads one cell.
    ///
    /// A missing row and a storage NULL both read as `None`.
    pub fn load_value(&self, column: &str, key: &K) -> Result<Option<Value>> {
        let column = self.io.column(column)?;
        let parts = self.io.table.key_parts(key)?;
        let Some(conn) = self.io.conn else {
            return Ok(None);
        };
        let cell = conn
            .query_row(
                &sql::select_columns(self.io.table, &[column]),
                params_from_iter(to_sql_all(&parts)),
                |row| row.get::<_, rusqlite::types::Value>(0),
            )
            .optional()?;
        match cell {
            Some(cell) => from_sql(column, (&cell).into()),
            None => Ok(None),
        }
    }

    /// Loads every non-key cell of a row, in declaration order.
    ///
    /// Returns `None` if the row is absent.
    pub fn load_row(&self, key: &K) -> Result<Option<Vec<Option<Value>>>> {
        let parts = self.io.table.key_parts(key)?;
        let Some(conn) = self.io.conn else {
            return Ok(None);
        };
        let columns = self.io.table.value_columns();
        if columns.is_empty() {
            let found = exists(conn, self.io.table, &parts)?;
            return Ok(found.then(Vec::new));
        }

        let mut stmt = conn.prepare(&sql::select_columns(self.io.table, &columns))?;
        let mut rows = stmt.query(params_from_iter(to_sql_all(&parts)))?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            values.push(from_sql(column, row.get_ref(i)?)?);
        }
        Ok(Some(values))
    }

    /// Loads one column for every row, keyed by primary key.
    pub fn load_column(&self, column: &str) -> Result<HashMap<K, Option<Value>>> {
        let column = self.io.column(column)?;
        let Some(conn) = self.io.conn else {
            return Ok(HashMap::new());
        };
        let keys = self.io.table.primary_key_columns();

        let mut stmt = conn.prepare(&sql::select_column(self.io.table, column))?;
        let mut rows = stmt.query([])?;
        let mut loaded = HashMap::new();
        while let Some(row) = rows.next()? {
            let mut parts = Vec::with_capacity(keys.len());
            for (i, key_column) in keys.iter().enumerate() {
                let part = from_sql(key_column, row.get_ref(i)?)?.ok_or_else(|| {
                    StoreError::Conversion(format!(
                        "NULL in primary key column '{}' of table '{}'",
                        key_column.name(),
                        self.io.table.name()
                    ))
                })?;
                parts.push(part);
            }
            let key = K::from_parts(parts).ok_or_else(|| {
                StoreError::Conversion(format!(
                    "stored key of table '{}' does not fit {}",
                    self.io.table.name(),
                    std::any::type_name::<K>()
                ))
            })?;
            let value = from_sql(column, row.get_ref(keys.len())?)?;
            loaded.insert(key, value);
        }
        debug!(table = %self.io.table.name(), column = %column.name(), rows = loaded.len(), "loaded column");
        Ok(loaded)
    }
}

impl<'a, K> Deref for Loader<'a, K> {
    type Target = TableIo<'a, K>;

    fn deref(&self) -> &Self::Target {
        &self.io
    }
}

/// Writes cells by primary key, creating rows as needed.
#[derive(Debug)]
pub struct Saver<'a, K> {
    io: TableIo<'a, K>,
}

impl<'a, K: PrimaryKey> Saver<'a, K> {
    /// See [`TableIo::new`].
    pub fn new(table: &'a Table, conn: Option<&'a Connection>) -> Result<Self> {
        Ok(Self {
            io: TableIo::new(table, conn)?,
        })
    }

    /// Inserts a row holding only `key`, unless one already exists.
    pub fn save_entry(&self, key: &K) -> Result<()> {
        let parts = self.io.table.key_parts(key)?;
        match self.io.conn {
            Some(conn) => insert_if_absent(conn, self.io.table, &parts),
            None => Ok(()),
        }
    }

    /// Sets one non-key cell, creating the row first if needed.
    ///
    /// The row insert and the update commit together; if the update fails no
    /// bare row is left behind.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Argument`] if the column is unknown or part of
    /// the key, or if `value` does not match the column type.
    pub fn save_value(&self, column: &str, key: &K, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let column = self.io.table.value_column(column, &value)?;
        let parts = self.io.table.key_parts(key)?;
        let Some(conn) = self.io.conn else {
            return Ok(());
        };
        let tx = conn.unchecked_transaction()?;
        update(&tx, self.io.table, column, &parts, &value)?;
        tx.commit()?;
        Ok(())
    }

    /// Sets several cells of one row in one transaction.
    ///
    /// `columns` and `values` are positional and must have equal length.
    pub fn save_row(&self, key: &K, columns: &[&str], values: &[Value]) -> Result<()> {
        if columns.len() != values.len() {
            return Err(ArgumentError::ValueCount {
                columns: columns.len(),
                values: values.len(),
            }
            .into());
        }
        let parts = self.io.table.key_parts(key)?;
        let resolved = columns
            .iter()
            .zip(values)
            .map(|(column, value)| self.io.table.value_column(column, value))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let Some(conn) = self.io.conn else {
            return Ok(());
        };
        let tx = conn.unchecked_transaction()?;
        for (column, value) in resolved.into_iter().zip(values) {
            update(&tx, self.io.table, column, &parts, value)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Sets every non-key cell of one row, in declaration order.
    pub fn save_row_values(&self, key: &K, values: &[Value]) -> Result<()> {
        let columns: Vec<&str> = self
            .io
            .table
            .value_columns()
            .iter()
            .map(|c| c.name())
            .collect();
        self.save_row(key, &columns, values)
    }

    /// Sets one column for many rows in one transaction.
    pub fn save_column<I>(&self, column: &str, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, Value)>,
    {
        let table = self.io.table;
        let mut resolved = Vec::new();
        for (key, value) in entries {
            let target = table.value_column(column, &value)?;
            let parts = table.key_parts(&key)?;
            resolved.push((target, parts, value));
        }

        let Some(conn) = self.io.conn else {
            return Ok(());
        };
        let tx = conn.unchecked_transaction()?;
        for (target, parts, value) in &resolved {
            update(&tx, table, target, parts, value)?;
        }
        tx.commit()?;
        debug!(table = %table.name(), column, rows = resolved.len(), "saved column");
        Ok(())
    }
}

impl<'a, K> Deref for Saver<'a, K> {
    type Target = TableIo<'a, K>;

    fn deref(&self) -> &Self::Target {
        &self.io
    }
}

/// Deletes rows by primary key.
#[derive(Debug)]
pub struct Deleter<'a, K> {
    io: TableIo<'a, K>,
}

impl<'a, K: PrimaryKey> Deleter<'a, K> {
    /// See [`TableIo::new`].
    pub fn new(table: &'a Table, conn: Option<&'a Connection>) -> Result<Self> {
        Ok(Self {
            io: TableIo::new(table, conn)?,
        })
    }

    /// Deletes the row matching `key`. Deleting an absent row is not an error.
    pub fn delete_entry(&self, key: &K) -> Result<()> {
        let parts = self.io.table.key_parts(key)?;
        if let Some(conn) = self.io.conn {
            conn.execute(
                &sql::delete_entry(self.io.table),
                params_from_iter(to_sql_all(&parts)),
            )?;
        }
        Ok(())
    }
}

impl<'a, K> Deref for Deleter<'a, K> {
    type Target = TableIo<'a, K>;

    fn deref(&self) -> &Self::Target {
        &self.io
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use table_schema_core::{ColumnProperty, ColumnType, CompositeKey};
    use tracing::Span;

    use crate::migration::Migrator;

    fn players() -> Table {
        Table::builder()
            .name("players")
            .column_builder(
                Column::builder()
                    .name("uuid")
                    .column_type(ColumnType::String)
                    .properties([ColumnProperty::PrimaryKey, ColumnProperty::NotNull]),
            )
            .column_builder(
                Column::builder()
                    .name("gold")
                    .column_type(ColumnType::Long)
                    .property(ColumnProperty::NotNull)
                    .default_value(10_i64),
            )
            .column_builder(Column::builder().name("title").column_type(ColumnType::String))
            .build()
            .unwrap()
    }

    fn setup(table: &Table) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        Migrator::new(Span::none()).reconcile(&conn, table).unwrap();
        conn
    }

    fn key(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn test_keyless_table_rejected() {
        let log = Table::builder()
            .name("log")
            .column_builder(Column::builder().name("line").column_type(ColumnType::String))
            .build()
            .unwrap();
        assert!(matches!(
            Loader::<String>::new(&log, None),
            Err(StoreError::NoPrimaryKey(_))
        ));
    }

    #[test]
    fn test_wrong_key_type_rejected() {
        let table = players();
        assert!(matches!(
            Saver::<i64>::new(&table, None),
            Err(StoreError::KeyType { .. })
        ));
        assert!(Saver::<Value>::new(&table, None).is_ok());
        assert!(Saver::<CompositeKey>::new(&table, None).is_err());
    }

    #[test]
    fn test_save_entry_applies_defaults_and_is_idempotent() {
        let table = players();
        let conn = setup(&table);
        let saver = Saver::<String>::new(&table, Some(&conn)).unwrap();
        let loader = Loader::<String>::new(&table, Some(&conn)).unwrap();

        saver.save_entry(&key("p1")).unwrap();
        saver.save_entry(&key("p1")).unwrap();
        assert!(loader.entry_exists(&key("p1")).unwrap());
        assert_eq!(
            loader.load_row(&key("p1")).unwrap(),
            Some(vec![Some(Value::Long(10)), None])
        );
    }

    #[test]
    fn test_null_and_absent_read_alike() {
        let table = players();
        let conn = setup(&table);
        let saver = Saver::<String>::new(&table, Some(&conn)).unwrap();
        let loader = Loader::<String>::new(&table, Some(&conn)).unwrap();

        saver.save_entry(&key("p1")).unwrap();
        let null_cell = loader.load_value("title", &key("p1")).unwrap();
        let missing_row = loader.load_value("title", &key("nobody")).unwrap();
        assert_eq!(null_cell, None);
        assert_eq!(null_cell, missing_row);
        assert_eq!(loader.load_row(&key("nobody")).unwrap(), None);
    }

    #[test]
    fn test_save_value_type_checked_before_write() {
        let table = players();
        let conn = setup(&table);
        let saver = Saver::<String>::new(&table, Some(&conn)).unwrap();

        let err = saver.save_value("gold", &key("p1"), 5_i32).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Argument(ArgumentError::ValueType { .. })
        ));
        assert!(!saver.entry_exists(&key("p1")).unwrap());

        let err = saver.save_value("uuid", &key("p1"), "x").unwrap_err();
        assert!(matches!(err, StoreError::Argument(ArgumentError::KeyColumn(_))));
    }

    #[test]
    fn test_failed_save_value_leaves_no_row() {
        let table = players()
            .to_builder()
            .column_builder(
                Column::builder()
                    .name("nick")
                    .column_type(ColumnType::String)
                    .property(ColumnProperty::Unique),
            )
            .build()
            .unwrap();
        let conn = setup(&table);
        let saver = Saver::<String>::new(&table, Some(&conn)).unwrap();

        saver.save_value("nick", &key("p1"), "ace").unwrap();
        let err = saver.save_value("nick", &key("p2"), "ace").unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
        assert!(!saver.entry_exists(&key("p2")).unwrap());
        assert!(saver.entry_exists(&key("p1")).unwrap());
    }

    #[test]
    fn test_save_row_and_column() {
        let table = players();
        let conn = setup(&table);
        let saver = Saver::<String>::new(&table, Some(&conn)).unwrap();
        let loader = Loader::<String>::new(&table, Some(&conn)).unwrap();

        saver
            .save_row(&key("p1"), &["GOLD", "title"], &[Value::Long(3), Value::from("knight")])
            .unwrap();
        saver
            .save_row_values(&key("p2"), &[Value::Long(4), Value::from("squire")])
            .unwrap();
        saver
            .save_column("gold", [(key("p1"), Value::Long(30)), (key("p3"), Value::Long(1))])
            .unwrap();

        let gold = loader.load_column("gold").unwrap();
        assert_eq!(gold.len(), 3);
        assert_eq!(gold[&key("p1")], Some(Value::Long(30)));
        assert_eq!(gold[&key("p2")], Some(Value::Long(4)));
        assert_eq!(
            loader.load_value("title", &key("p1")).unwrap(),
            Some(Value::from("knight"))
        );

        let err = saver
            .save_row(&key("p1"), &["gold"], &[Value::Long(1), Value::Long(2)])
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Argument(ArgumentError::ValueCount { columns: 1, values: 2 })
        ));
    }

    #[test]
    fn test_batch_rejects_whole_column_on_bad_value() {
        let table = players();
        let conn = setup(&table);
        let saver = Saver::<String>::new(&table, Some(&conn)).unwrap();

        let err = saver
            .save_column(
                "gold",
                [(key("p1"), Value::Long(1)), (key("p2"), Value::from("lots"))],
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Argument(_)));
        assert!(!saver.entry_exists(&key("p1")).unwrap());
    }

    #[test]
    fn test_delete_entry() {
        let table = players();
        let conn = setup(&table);
        let saver = Saver::<String>::new(&table, Some(&conn)).unwrap();
        let deleter = Deleter::<String>::new(&table, Some(&conn)).unwrap();

        saver.save_entry(&key("p1")).unwrap();
        deleter.delete_entry(&key("p1")).unwrap();
        deleter.delete_entry(&key("p1")).unwrap();
        assert!(!saver.entry_exists(&key("p1")).unwrap());
    }

    #[test]
    fn test_accessors_inert_without_connection() {
        let table = players();
        let saver = Saver::<String>::new(&table, None).unwrap();
        let loader = Loader::<String>::new(&table, None).unwrap();
        let deleter = Deleter::<String>::new(&table, None).unwrap();

        assert!(!saver.is_connected());
        saver.save_value("gold", &key("p1"), 5_i64).unwrap();
        deleter.delete_entry(&key("p1")).unwrap();
        assert_eq!(loader.load_value("gold", &key("p1")).unwrap(), None);
        assert_eq!(loader.load_row(&key("p1")).unwrap(), None);
        assert!(loader.load_column("gold").unwrap().is_empty());

        // Arguments are still checked.
        assert!(saver.save_value("nope", &key("p1"), 5_i64).is_err());
    }
}
