//! Schema diffing - compare a declared table against a live one.
//!
//! The comparison is keyed by column name and ignores column order. For every
//! column it compares the storage type name, the normalised constraint set and
//! the default literal; the foreign-key sets are compared as a whole.
//!
//! ## Normalisation
//!
//! Some differences are textual only and never trigger a migration:
//!
//! - `FLOAT` and `DOUBLE` share the `REAL` storage type, so types are compared
//!   by storage name.
//! - An auto-increment column is a primary key; the plain primary-key flag is
//!   folded into it.
//! - A column that is the table's sole primary key is unique whether or not
//!   `UNIQUE` was declared.
//! - Defaults are compared by rendered literal, with a `NO_DEFAULT` sentinel
//!   standing in for an absent default.

use std::collections::BTreeSet;
use std::fmt;

use crate::column::Column;
use crate::table::{ForeignKeyReference, Table};
use crate::types::ColumnProperty;

/// Sentinel compared in place of an absent default.
const NO_DEFAULT: &str = "NO_DEFAULT";

/// Differences between a declared table and a live table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    /// Column-level changes, in declared-then-live column order.
    pub columns: Vec<ColumnChange>,
    /// Set when the foreign-key references differ.
    pub foreign_keys: Option<ForeignKeyChange>,
}

impl SchemaDiff {
    /// Returns `true` if the tables are structurally equivalent.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.foreign_keys.is_none()
    }

    /// Total number of changes.
    pub fn change_count(&self) -> usize {
        self.columns.len() + usize::from(self.foreign_keys.is_some())
    }
}

impl fmt::Display for SchemaDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for change in &self.columns {
            writeln!(f, "{change}")?;
        }
        if let Some(fk) = &self.foreign_keys {
            writeln!(f, "{fk}")?;
        }
        Ok(())
    }
}

/// A single column-level change, described from live to declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnChange {
    /// Column is declared but not live.
    Added(String),
    /// Column is live but no longer declared.
    Removed(String),
    /// Storage type differs.
    Retyped {
        column: String,
        from: &'static str,
        to: &'static str,
    },
    /// Normalised constraint sets differ.
    ConstraintsChanged {
        column: String,
        from: BTreeSet<ColumnProperty>,
        to: BTreeSet<ColumnProperty>,
    },
    /// Default literal differs.
    DefaultChanged {
        column: String,
        from: String,
        to: String,
    },
}

impl fmt::Display for ColumnChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnChange::Added(name) => write!(f, "+ column {name}"),
            ColumnChange::Removed(name) => write!(f, "- column {name}"),
            ColumnChange::Retyped { column, from, to } => {
                write!(f, "~ column {column}: type {from} -> {to}")
            }
            ColumnChange::ConstraintsChanged { column, from, to } => {
                write!(
                    f,
                    "~ column {column}: constraints [{}] -> [{}]",
                    join(from),
                    join(to)
                )
            }
            ColumnChange::DefaultChanged { column, from, to } => {
                write!(f, "~ column {column}: default {from} -> {to}")
            }
        }
    }
}

fn join(properties: &BTreeSet<ColumnProperty>) -> String {
    properties
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Foreign-key references differ between declared and live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyChange {
    pub added: Vec<ForeignKeyReference>,
    pub removed: Vec<ForeignKeyReference>,
}

impl fmt::Display for ForeignKeyChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fk in &self.added {
            writeln!(f, "+ foreign key {fk}")?;
        }
        for fk in &self.removed {
            writeln!(f, "- foreign key {fk}")?;
        }
        Ok(())
    }
}

/// Compares a declared table with a live (introspected) one.
///
/// # Examples
///
/// ```
/// use table_schema_core::*;
///
/// let declared = Table::builder()
///     .name("players")
///     .column_builder(Column::builder().name("uuid").column_type(ColumnType::String)
///         .property(ColumnProperty::PrimaryKey))
///     .column_builder(Column::builder().name("xp").column_type(ColumnType::Long))
///     .build()
///     .unwrap();
/// let live = Table::builder()
///     .name("players")
///     .column_builder(Column::builder().name("uuid").column_type(ColumnType::String)
///         .properties([ColumnProperty::PrimaryKey, ColumnProperty::Unique]))
///     .build()
///     .unwrap();
///
/// let diff = diff_tables(&declared, &live);
/// assert_eq!(diff.columns, vec![ColumnChange::Added("xp".into())]);
/// assert!(changed(&declared, &live));
/// assert!(!changed(&live, &live));
/// ```
pub fn diff_tables(declared: &Table, live: &Table) -> SchemaDiff {
    let mut diff = SchemaDiff::default();
    let declared_sole_key = sole_key_column(declared);
    let live_sole_key = sole_key_column(live);

    for column in declared.columns() {
        let Some(live_column) = live.column(column.name()) else {
            diff.columns.push(ColumnChange::Added(column.name().to_string()));
            continue;
        };

        let to = column.column_type().storage_name();
        let from = live_column.column_type().storage_name();
        if from != to {
            diff.columns.push(ColumnChange::Retyped {
                column: column.name().to_string(),
                from,
                to,
            });
        }

        let to = normalized_properties(column, declared_sole_key == Some(column.name()));
        let from = normalized_properties(live_column, live_sole_key == Some(live_column.name()));
        if from != to {
            diff.columns.push(ColumnChange::ConstraintsChanged {
                column: column.name().to_string(),
                from,
                to,
            });
        }

        let to = default_literal(column);
        let from = default_literal(live_column);
        if from != to {
            diff.columns.push(ColumnChange::DefaultChanged {
                column: column.name().to_string(),
                from,
                to,
            });
        }
    }

    for live_column in live.columns() {
        if declared.column(live_column.name()).is_none() {
            diff.columns
                .push(ColumnChange::Removed(live_column.name().to_string()));
        }
    }

    let declared_fks = normalized_foreign_keys(declared);
    let live_fks = normalized_foreign_keys(live);
    if declared_fks != live_fks {
        diff.foreign_keys = Some(ForeignKeyChange {
            added: declared_fks.difference(&live_fks).cloned().collect(),
            removed: live_fks.difference(&declared_fks).cloned().collect(),
        });
    }

    diff
}

/// Returns `true` if the live table must be migrated to match the declaration.
pub fn changed(declared: &Table, live: &Table) -> bool {
    !diff_tables(declared, live).is_empty()
}

fn sole_key_column(table: &Table) -> Option<&str> {
    match table.primary_key_columns().as_slice() {
        [only] => Some(only.name()),
        _ => None,
    }
}

fn normalized_properties(column: &Column, sole_key: bool) -> BTreeSet<ColumnProperty> {
    let mut properties = column.properties().clone();
    if properties.contains(&ColumnProperty::AutoIncrementPrimaryKey) {
        properties.remove(&ColumnProperty::PrimaryKey);
    }
    if sole_key {
        properties.insert(ColumnProperty::Unique);
    }
    properties
}

fn default_literal(column: &Column) -> String {
    column
        .default_value()
        .map(|v| v.to_sql_literal())
        .unwrap_or_else(|| NO_DEFAULT.to_string())
}

/// Identifiers are case-insensitive in storage, so foreign keys compare lowercased.
fn normalized_foreign_keys(table: &Table) -> BTreeSet<ForeignKeyReference> {
    table
        .foreign_keys()
        .iter()
        .map(|fk| {
            ForeignKeyReference::new(
                fk.child_column.to_ascii_lowercase(),
                fk.parent_table.to_ascii_lowercase(),
                fk.parent_column.to_ascii_lowercase(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnBuilder;
    use crate::types::ColumnType;

    fn col(name: &str, ty: ColumnType) -> ColumnBuilder {
        Column::builder().name(name).column_type(ty)
    }

    fn table(columns: Vec<ColumnBuilder>) -> Table {
        Table::builder()
            .name("players")
            .column_builders(columns)
            .build()
            .unwrap()
    }

    fn players() -> Vec<ColumnBuilder> {
        vec![
            col("uuid", ColumnType::String).properties([
                ColumnProperty::PrimaryKey,
                ColumnProperty::Unique,
                ColumnProperty::NotNull,
            ]),
            col("gold", ColumnType::Long)
                .property(ColumnProperty::NotNull)
                .default_value(10_i64),
        ]
    }

    #[test]
    fn test_identical_tables_unchanged() {
        assert!(!changed(&table(players()), &table(players())));
    }

    #[test]
    fn test_reordering_is_not_a_change() {
        let mut reordered = players();
        reordered.reverse();
        assert!(diff_tables(&table(players()), &table(reordered)).is_empty());
    }

    #[test]
    fn test_added_and_removed_columns() {
        let mut declared = players();
        declared.push(col("xp", ColumnType::Long));
        let mut live = players();
        live.push(col("legacy", ColumnType::String));

        let diff = diff_tables(&table(declared), &table(live));
        assert_eq!(
            diff.columns,
            vec![
                ColumnChange::Added("xp".into()),
                ColumnChange::Removed("legacy".into()),
            ]
        );
        assert_eq!(diff.change_count(), 2);
    }

    #[test]
    fn test_retyped_column() {
        let declared = table(vec![col("gold", ColumnType::Long)]);
        let live = table(vec![col("gold", ColumnType::Integer)]);
        let diff = diff_tables(&declared, &live);
        assert_eq!(
            diff.columns,
            vec![ColumnChange::Retyped {
                column: "gold".into(),
                from: "INTEGER",
                to: "BIGINT",
            }]
        );
    }

    #[test]
    fn test_float_and_double_are_equivalent() {
        let declared = table(vec![col("ratio", ColumnType::Float).default_value(0.5_f32)]);
        let live = table(vec![col("ratio", ColumnType::Double).default_value(0.5_f64)]);
        assert!(!changed(&declared, &live));
    }

    #[test]
    fn test_constraint_change() {
        let declared = table(vec![col("gold", ColumnType::Long)]);
        let live = table(vec![col("gold", ColumnType::Long).property(ColumnProperty::NotNull)]);
        assert!(matches!(
            diff_tables(&declared, &live).columns.as_slice(),
            [ColumnChange::ConstraintsChanged { .. }]
        ));
    }

    #[test]
    fn test_sole_key_implies_unique() {
        let declared = table(vec![
            col("uuid", ColumnType::String).property(ColumnProperty::PrimaryKey),
        ]);
        let live = table(vec![col("uuid", ColumnType::String)
            .properties([ColumnProperty::PrimaryKey, ColumnProperty::Unique])]);
        assert!(!changed(&declared, &live));
    }

    #[test]
    fn test_composite_key_does_not_imply_unique() {
        let declared = table(vec![
            col("a", ColumnType::String).property(ColumnProperty::PrimaryKey),
            col("b", ColumnType::String).property(ColumnProperty::PrimaryKey),
        ]);
        let live = table(vec![
            col("a", ColumnType::String)
                .properties([ColumnProperty::PrimaryKey, ColumnProperty::Unique]),
            col("b", ColumnType::String).property(ColumnProperty::PrimaryKey),
        ]);
        assert!(changed(&declared, &live));
    }

    #[test]
    fn test_auto_increment_folds_primary_key() {
        let declared = table(vec![col("id", ColumnType::Integer).properties([
            ColumnProperty::PrimaryKey,
            ColumnProperty::AutoIncrementPrimaryKey,
        ])]);
        let live = table(vec![
            col("id", ColumnType::Integer).property(ColumnProperty::AutoIncrementPrimaryKey),
        ]);
        assert!(!changed(&declared, &live));
    }

    #[test]
    fn test_default_changes() {
        let declared = table(vec![col("gold", ColumnType::Long).default_value(10_i64)]);
        let live = table(vec![col("gold", ColumnType::Long)]);
        let diff = diff_tables(&declared, &live);
        assert_eq!(
            diff.columns,
            vec![ColumnChange::DefaultChanged {
                column: "gold".into(),
                from: NO_DEFAULT.into(),
                to: "10".into(),
            }]
        );

        let live = table(vec![col("gold", ColumnType::Long).default_value(20_i64)]);
        assert!(changed(&declared, &live));
    }

    #[test]
    fn test_foreign_key_changes() {
        let base = || {
            Table::builder()
                .name("items")
                .column_builder(col("owner", ColumnType::String))
        };
        let declared = base()
            .foreign_key(ForeignKeyReference::new("owner", "players", "uuid"))
            .build()
            .unwrap();
        let live = base().build().unwrap();

        let diff = diff_tables(&declared, &live);
        let fk = diff.foreign_keys.expect("foreign key change");
        assert_eq!(fk.added.len(), 1);
        assert!(fk.removed.is_empty());

        let live_upper = base()
            .foreign_key(ForeignKeyReference::new("OWNER", "Players", "uuid"))
            .build()
            .unwrap();
        assert!(!changed(&declared, &live_upper));
    }

    #[test]
    fn test_display_lists_changes() {
        let declared = table(vec![col("xp", ColumnType::Long)]);
        let live = table(vec![col("gold", ColumnType::Long)]);
        let text = diff_tables(&declared, &live).to_string();
        assert!(text.contains("+ column xp"));
        assert!(text.contains("- column gold"));
    }
}
