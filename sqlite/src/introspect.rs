//! Live schema introspection.
//!
//! Reads SQLite's catalog and `pragma_*` table-valued functions and rebuilds
//! an equivalent [`Table`]. Any failing metadata query aborts the whole
//! read; no partial table is returned.

use std::collections::HashSet;

use rusqlite::{Connection, OptionalExtension};
use table_schema_core::{
    Column, ColumnProperty, ColumnType, ForeignKeyReference, Table, TableBuilder, Value,
};
use tracing::{debug, warn};

use crate::error::{Result, StoreError};

/// Returns `true` if a table named `name` exists (case-insensitive).
pub fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            [name],
            |row| row.get(0),
        )
        .map_err(|source| introspection(name, source))?;
    Ok(count > 0)
}

/// Lists user tables, excluding SQLite's internal `sqlite_*` tables.
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

/// Reconstructs the live declaration of `name`.
///
/// # Errors
///
/// Returns [`StoreError::UnknownTable`] if the table does not exist,
/// [`StoreError::Introspection`] if a metadata query fails, and
/// [`StoreError::Schema`] if the live structure cannot be expressed as a
/// declaration (for example a column name that is not a plain identifier).
pub fn read_table(conn: &Connection, name: &str) -> Result<Table> {
    Ok(live_builder(conn, name)?.build()?)
}

/// Builds a [`TableBuilder`] from a live table.
pub trait LiveTableExt: Sized {
    /// Pre-fills a builder with the columns and foreign keys of the live
    /// table `name`, so that an existing table can be adopted or extended.
    ///
    /// # Examples
    ///
    /// ```
    /// use rusqlite::Connection;
    /// use table_schema_core::TableBuilder;
    /// use table_schema_sqlite::LiveTableExt;
    ///
    /// let conn = Connection::open_in_memory().unwrap();
    /// conn.execute_batch("CREATE TABLE scores (player TEXT PRIMARY KEY, points BIGINT)")
    ///     .unwrap();
    ///
    /// let table = TableBuilder::from_live(&conn, "scores").unwrap().build().unwrap();
    /// assert_eq!(table.columns().len(), 2);
    /// assert!(table.column("player").unwrap().is_primary_key());
    /// ```
    fn from_live(conn: &Connection, name: &str) -> Result<Self>;
}

impl LiveTableExt for TableBuilder {
    fn from_live(conn: &Connection, name: &str) -> Result<Self> {
        live_builder(conn, name)
    }
}

struct ColumnInfo {
    name: String,
    declared_type: String,
    not_null: bool,
    default: Option<String>,
    primary_key: bool,
}

fn live_builder(conn: &Connection, name: &str) -> Result<TableBuilder> {
    let (stored_name, create_sql) = conn
        .query_row(
            "SELECT name, sql FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            [name],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
        )
        .optional()
        .map_err(|source| introspection(name, source))?
        .ok_or_else(|| StoreError::UnknownTable(name.to_string()))?;

    let infos = column_infos(conn, &stored_name)?;
    let unique = unique_columns(conn, &stored_name)?;

    let key_count = infos.iter().filter(|c| c.primary_key).count();
    let auto_increment = create_sql.as_deref().is_some_and(declares_autoincrement);

    let mut columns = Vec::with_capacity(infos.len());
    for info in infos {
        let column_type = ColumnType::from_storage_name(&info.declared_type);
        let mut builder = Column::builder().name(&info.name).column_type(column_type);

        if info.primary_key {
            if auto_increment && key_count == 1 && column_type == ColumnType::Integer {
                builder = builder.property(ColumnProperty::AutoIncrementPrimaryKey);
            } else {
                builder = builder.property(ColumnProperty::PrimaryKey);
            }
        }
        if info.not_null {
            builder = builder.property(ColumnProperty::NotNull);
        }
        if unique.contains(&info.name.to_ascii_lowercase()) {
            builder = builder.property(ColumnProperty::Unique);
        }
        if let Some(raw) = info.default.as_deref() {
            if !raw.eq_ignore_ascii_case("NULL") {
                match Value::parse_sql_literal(column_type, raw) {
                    Some(value) => builder = builder.default_value(value),
                    None => warn!(
                        table = %stored_name,
                        column = %info.name,
                        default = raw,
                        "ignoring default that is not a {column_type} literal"
                    ),
                }
            }
        }
        columns.push(builder);
    }

    let foreign_keys = foreign_keys(conn, &stored_name)?;
    debug!(
        table = %stored_name,
        columns = columns.len(),
        foreign_keys = foreign_keys.len(),
        "introspected live table"
    );

    Ok(Table::builder()
        .name(stored_name)
        .column_builders(columns)
        .foreign_keys(foreign_keys))
}

fn column_infos(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
    let query = || -> rusqlite::Result<Vec<ColumnInfo>> {
        let mut stmt = conn.prepare(
            "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let rows = stmt.query_map([table], |row| {
            Ok(ColumnInfo {
                name: row.get(0)?,
                declared_type: row.get(1)?,
                not_null: row.get::<_, i64>(2)? != 0,
                default: row.get(3)?,
                primary_key: row.get::<_, i64>(4)? > 0,
            })
        })?;
        rows.collect()
    };
    query().map_err(|source| introspection(table, source))
}

/// Lowercased names of columns covered alone by a non-key unique index.
fn unique_columns(conn: &Connection, table: &str) -> Result<HashSet<String>> {
    let query = || -> rusqlite::Result<HashSet<String>> {
        let mut indexes = conn.prepare(
            "SELECT name FROM pragma_index_list(?1) WHERE \"unique\" = 1 AND origin != 'pk'",
        )?;
        let index_names = indexes
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut info = conn.prepare("SELECT name FROM pragma_index_info(?1)")?;
        let mut unique = HashSet::new();
        for index in index_names {
            let covered = info
                .query_map([&index], |row| row.get::<_, Option<String>>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            if let [Some(column)] = covered.as_slice() {
                unique.insert(column.to_ascii_lowercase());
            }
        }
        Ok(unique)
    };
    query().map_err(|source| introspection(table, source))
}

fn foreign_keys(conn: &Connection, table: &str) -> Result<Vec<ForeignKeyReference>> {
    let query = || -> rusqlite::Result<Vec<(String, String, Option<String>)>> {
        let mut stmt = conn.prepare(
            "SELECT \"from\", \"table\", \"to\" FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
        )?;
        let rows = stmt.query_map([table], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
        rows.collect()
    };
    let rows = query().map_err(|source| introspection(table, source))?;

    let mut references = Vec::with_capacity(rows.len());
    for (child, parent, parent_column) in rows {
        let parent_column = match parent_column {
            Some(column) => Some(column),
            None => sole_key_column(conn, &parent)?,
        };
        match parent_column {
            Some(column) => references.push(ForeignKeyReference::new(child, parent, column)),
            None => warn!(
                table,
                column = %child,
                parent = %parent,
                "skipping foreign key whose parent has no single key column"
            ),
        }
    }
    Ok(references)
}

/// Key column of `table` when it has exactly one.
fn sole_key_column(conn: &Connection, table: &str) -> Result<Option<String>> {
    let query = || -> rusqlite::Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) WHERE pk > 0")?;
        let rows = stmt.query_map([table], |row| row.get::<_, String>(0))?;
        rows.collect()
    };
    let mut keys = query().map_err(|source| introspection(table, source))?;
    if keys.len() == 1 { Ok(keys.pop()) } else { Ok(None) }
}

/// Returns `true` if `create_sql` holds the clause `PRIMARY KEY [ASC|DESC]
/// [ON CONFLICT ..] AUTOINCREMENT`.
///
/// Words inside string literals and quoted identifiers are not keywords, so a
/// text default or a column named `autoincrement` does not count.
fn declares_autoincrement(create_sql: &str) -> bool {
    let words = bare_words(create_sql);
    words
        .iter()
        .enumerate()
        .any(|(i, w)| word(w) == "AUTOINCREMENT" && follows_primary_key(&words[..i]))
}

fn follows_primary_key(before: &[Option<String>]) -> bool {
    let mut rest = before;
    if let [head @ .., on, conflict, _] = rest {
        if word(on) == "ON" && word(conflict) == "CONFLICT" {
            rest = head;
        }
    }
    if let [head @ .., order] = rest {
        if matches!(word(order), "ASC" | "DESC") {
            rest = head;
        }
    }
    matches!(rest, [.., primary, key] if word(primary) == "PRIMARY" && word(key) == "KEY")
}

fn word(token: &Option<String>) -> &str {
    token.as_deref().unwrap_or("")
}

/// Splits SQL into tokens: uppercased bare words, and `None` for quoted text
/// and punctuation.
fn bare_words(sql: &str) -> Vec<Option<String>> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' | '[' => {
                let close = if c == '[' { ']' } else { c };
                while let Some(next) = chars.next() {
                    if next != close {
                        continue;
                    }
                    // A doubled quote is an escaped quote.
                    if close != ']' && chars.peek() == Some(&close) {
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(None);
            }
            c if c.is_ascii_alphanumeric() || c == '_' => {
                let mut bare = String::from(c.to_ascii_uppercase());
                while let Some(&next) = chars.peek() {
                    if !(next.is_ascii_alphanumeric() || next == '_' || next == '$') {
                        break;
                    }
                    bare.push(next.to_ascii_uppercase());
                    chars.next();
                }
                tokens.push(Some(bare));
            }
            c if c.is_whitespace() => {}
            _ => tokens.push(None),
        }
    }
    tokens
}

fn introspection(table: &str, source: rusqlite::Error) -> StoreError {
    StoreError::Introspection {
        table: table.to_string(),
        source,
    }
}
