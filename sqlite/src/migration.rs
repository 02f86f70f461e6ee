//! Reconciling declared tables with live storage.
//!
//! [`Migrator::reconcile`] brings one live table in line with its declaration:
//!
//! - **absent**: the table is created;
//! - **present and equivalent**: nothing is issued;
//! - **present and different**: the table is rebuilt through a shadow table.
//!
//! A rebuild creates `<name>_new` with the declared schema, copies the rows
//! over by column name, drops the original and renames the shadow into place.
//! The whole sequence runs in one transaction, so a failure at any step leaves
//! the original table untouched. Before commit, the rebuilt table and the
//! tables referencing it must pass a foreign-key check.
//!
//! # Example
//!
//! ```
//! use rusqlite::Connection;
//! use table_schema_core::*;
//! use table_schema_sqlite::{MigrationOutcome, Migrator};
//!
//! let conn = Connection::open_in_memory().unwrap();
//! let migrator = Migrator::new(tracing::Span::none());
//!
//! let players = Table::builder()
//!     .name("players")
//!     .column_builder(Column::builder().name("uuid").column_type(ColumnType::String)
//!         .property(ColumnProperty::PrimaryKey))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(migrator.reconcile(&conn, &players).unwrap(), MigrationOutcome::Created);
//! assert_eq!(migrator.reconcile(&conn, &players).unwrap(), MigrationOutcome::Unchanged);
//!
//! let extended = players
//!     .to_builder()
//!     .column_builder(Column::builder().name("gold").column_type(ColumnType::Long)
//!         .default_value(10_i64))
//!     .build()
//!     .unwrap();
//! assert!(matches!(
//!     migrator.reconcile(&conn, &extended).unwrap(),
//!     MigrationOutcome::Rebuilt(_)
//! ));
//! ```

use std::fmt;

use rusqlite::Connection;
use table_schema_core::{SchemaDiff, Table, diff_tables};
use tracing::{Span, debug, info};

use crate::error::{MigrationStep, Result, StoreError};
use crate::introspect::{read_table, table_exists};
use crate::sql;

/// What [`Migrator::reconcile`] did to the live table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The table did not exist and was created.
    Created,
    /// The live table already matched the declaration.
    Unchanged,
    /// The live table was rebuilt; the diff lists what changed.
    Rebuilt(SchemaDiff),
}

impl fmt::Display for MigrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationOutcome::Created => f.write_str("created"),
            MigrationOutcome::Unchanged => f.write_str("unchanged"),
            MigrationOutcome::Rebuilt(diff) => {
                write!(f, "rebuilt ({} change(s))", diff.change_count())
            }
        }
    }
}

/// Applies table declarations to a connection.
///
/// Diagnostics are emitted inside the span given at construction.
#[derive(Debug, Clone)]
pub struct Migrator {
    span: Span,
}

impl Migrator {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// Span that reconciliation events are recorded in.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Brings the live table named by `declared` in line with it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Migration`] if a create or rebuild statement
    /// fails (the sequence is rolled back), [`StoreError::ForeignKeyViolation`]
    /// if a rebuilt table breaks a foreign-key constraint, and
    /// [`StoreError::Introspection`] if the live table cannot be read.
    pub fn reconcile(&self, conn: &Connection, declared: &Table) -> Result<MigrationOutcome> {
        let _entered = self.span.enter();

        if !table_exists(conn, declared.name())? {
            self.create(conn, declared)?;
            return Ok(MigrationOutcome::Created);
        }

        let live = read_table(conn, declared.name())?;
        let diff = diff_tables(declared, &live);
        if diff.is_empty() {
            debug!(table = %declared.name(), "live table matches declaration");
            return Ok(MigrationOutcome::Unchanged);
        }

        info!(
            table = %declared.name(),
            changes = diff.change_count(),
            "rebuilding table"
        );
        for change in &diff.columns {
            debug!(table = %declared.name(), %change, "column change");
        }
        self.rebuild(conn, declared, &live)?;
        Ok(MigrationOutcome::Rebuilt(diff))
    }

    fn create(&self, conn: &Connection, declared: &Table) -> Result<()> {
        let name = declared.name();
        let tx = conn
            .unchecked_transaction()
            .map_err(|source| step_error(name, MigrationStep::Begin, source))?;
        let sql = sql::create_table(declared, name, true);
        debug!(table = %name, %sql, "creating table");
        tx.execute_batch(&sql)
            .map_err(|source| step_error(name, MigrationStep::Create, source))?;
        tx.commit()
            .map_err(|source| step_error(name, MigrationStep::Commit, source))?;
        info!(table = %name, "created table");
        Ok(())
    }

    /// Runs the shadow-table rebuild with foreign-key enforcement suspended.
    ///
    /// `PRAGMA foreign_keys` cannot change inside a transaction, so it is
    /// switched off before the transaction starts and restored afterwards.
    /// Without this, dropping the original would cascade into child tables.
    fn rebuild(&self, conn: &Connection, declared: &Table, live: &Table) -> Result<()> {
        let enforced: bool = conn.pragma_query_value(None, "foreign_keys", |row| row.get(0))?;
        if enforced {
            conn.pragma_update(None, "foreign_keys", false)?;
        }

        let rebuilt = rebuild_in_transaction(conn, declared, live);

        if enforced {
            let restored = conn.pragma_update(None, "foreign_keys", true);
            rebuilt?;
            restored?;
            return Ok(());
        }
        rebuilt
    }
}

fn rebuild_in_transaction(conn: &Connection, declared: &Table, live: &Table) -> Result<()> {
    let name = declared.name();
    let shadow = sql::shadow_name(name);

    let tx = conn
        .unchecked_transaction()
        .map_err(|source| step_error(name, MigrationStep::Begin, source))?;
    let run = |step: MigrationStep, sql: &str| -> Result<()> {
        debug!(table = %name, %step, %sql, "migration step");
        tx.execute_batch(sql)
            .map_err(|source| step_error(name, step, source))
    };

    run(
        MigrationStep::CreateShadow,
        &sql::create_table(declared, &shadow, false),
    )?;
    if let Some(copy) = sql::copy_rows(declared, live, &shadow) {
        run(MigrationStep::CopyRows, &copy)?;
    }
    run(MigrationStep::DropOriginal, &sql::drop_table(live.name()))?;
    run(MigrationStep::RenameShadow, &sql::rename_table(&shadow, name))?;

    let violations = count_foreign_key_violations(&tx, name)
        .map_err(|source| step_error(name, MigrationStep::ForeignKeyCheck, source))?;
    if violations > 0 {
        return Err(StoreError::ForeignKeyViolation {
            table: name.to_string(),
            violations,
        });
    }

    tx.commit()
        .map_err(|source| step_error(name, MigrationStep::Commit, source))?;
    Ok(())
}

/// Counts violations in `table` and in the tables referencing it.
///
/// Violations elsewhere in the store predate the rebuild and are ignored.
fn count_foreign_key_violations(conn: &Connection, table: &str) -> rusqlite::Result<usize> {
    let mut children = conn.prepare(
        "SELECT DISTINCT m.name FROM sqlite_master AS m, pragma_foreign_key_list(m.name) AS f \
         WHERE m.type = 'table' AND f.\"table\" = ?1 COLLATE NOCASE",
    )?;
    let mut checked = vec![table.to_string()];
    for child in children.query_map([table], |row| row.get::<_, String>(0))? {
        let child = child?;
        if !checked.iter().any(|t| t.eq_ignore_ascii_case(&child)) {
            checked.push(child);
        }
    }

    let mut check = conn.prepare("SELECT COUNT(*) FROM pragma_foreign_key_check(?1)")?;
    let mut count = 0;
    for name in &checked {
        count += check.query_row([name], |row| row.get::<_, i64>(0))? as usize;
    }
    Ok(count)
}

fn step_error(table: &str, step: MigrationStep, source: rusqlite::Error) -> StoreError {
    StoreError::Migration {
        table: table.to_string(),
        step,
        source,
    }
}
