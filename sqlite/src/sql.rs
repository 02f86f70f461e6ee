//! SQL statement rendering.
//!
//! Identifiers are double-quoted, so names that are SQL keywords (`order`,
//! `group`) are legal; they were validated as plain identifiers when the
//! [`Table`] was built. Every row value is bound as a `?N` parameter.

use table_schema_core::{Column, Table};

/// Suffix of the shadow table built during a rebuild.
pub(crate) const SHADOW_SUFFIX: &str = "_new";

pub(crate) fn shadow_name(table: &str) -> String {
    format!("{table}{SHADOW_SUFFIX}")
}

/// Quotes an identifier. Validated names never contain `"`.
pub(crate) fn quote(name: &str) -> String {
    format!("\"{name}\"")
}

fn quote_all<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names.into_iter().map(quote).collect::<Vec<_>>().join(", ")
}

/// Renders one column definition.
///
/// An auto-increment column carries its key inline; SQLite only accepts
/// `AUTOINCREMENT` on a column-level `INTEGER PRIMARY KEY`.
pub(crate) fn column_definition(column: &Column) -> String {
    let mut def = format!(
        "{} {}",
        quote(column.name()),
        column.column_type().storage_name()
    );
    if column.is_auto_increment() {
        def.push_str(" PRIMARY KEY AUTOINCREMENT");
    }
    if column.is_not_null() {
        def.push_str(" NOT NULL");
    }
    if column.is_unique() {
        def.push_str(" UNIQUE");
    }
    if let Some(default) = column.default_value() {
        def.push_str(" DEFAULT ");
        def.push_str(&default.to_sql_literal());
    }
    def
}

/// Renders `CREATE TABLE` for `table` under the name `name`.
pub(crate) fn create_table(table: &Table, name: &str, if_not_exists: bool) -> String {
    let mut parts: Vec<String> = table.columns().iter().map(column_definition).collect();

    if !table.columns().iter().any(Column::is_auto_increment) {
        let keys = table.primary_key_columns();
        if !keys.is_empty() {
            parts.push(format!(
                "PRIMARY KEY ({})",
                quote_all(keys.iter().map(|c| c.name()))
            ));
        }
    }

    for fk in table.foreign_keys() {
        parts.push(format!(
            "FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE CASCADE",
            quote(&fk.child_column),
            quote(&fk.parent_table),
            quote(&fk.parent_column)
        ));
    }

    let guard = if if_not_exists { "IF NOT EXISTS " } else { "" };
    format!("CREATE TABLE {guard}{} ({})", quote(name), parts.join(", "))
}

/// Renders the copy from the live table into the shadow table.
///
/// Columns present in both tables are copied by name. Declared-only columns
/// with a default are filled with that default literal. Returns `None` when
/// nothing can be copied.
pub(crate) fn copy_rows(declared: &Table, live: &Table, shadow: &str) -> Option<String> {
    let mut targets = Vec::new();
    let mut sources = Vec::new();
    for column in declared.columns() {
        match live.column(column.name()) {
            Some(existing) => {
                targets.push(quote(column.name()));
                sources.push(quote(existing.name()));
            }
            None => {
                if let Some(default) = column.default_value() {
                    targets.push(quote(column.name()));
                    sources.push(default.to_sql_literal());
                }
            }
        }
    }

    // Only literal defaults means no live column overlaps; nothing to carry.
    let carried = declared
        .columns()
        .iter()
        .any(|c| live.column(c.name()).is_some());
    if !carried {
        return None;
    }

    Some(format!(
        "INSERT INTO {} ({}) SELECT {} FROM {}",
        quote(shadow),
        targets.join(", "),
        sources.join(", "),
        quote(live.name())
    ))
}

pub(crate) fn drop_table(name: &str) -> String {
    format!("DROP TABLE {}", quote(name))
}

pub(crate) fn rename_table(from: &str, to: &str) -> String {
    format!("ALTER TABLE {} RENAME TO {}", quote(from), quote(to))
}

/// Renders `pk1 = ?n AND pk2 = ?n+1 ...` starting at parameter `first`.
pub(crate) fn key_condition(table: &Table, first: usize) -> String {
    table
        .primary_key_columns()
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ?{}", quote(c.name()), first + i))
        .collect::<Vec<_>>()
        .join(" AND ")
}

pub(crate) fn entry_exists(table: &Table) -> String {
    format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} LIMIT 1)",
        quote(table.name()),
        key_condition(table, 1)
    )
}

pub(crate) fn insert_entry(table: &Table) -> String {
    let keys = table.primary_key_columns();
    let params: Vec<String> = (1..=keys.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(table.name()),
        quote_all(keys.iter().map(|c| c.name())),
        params.join(", ")
    )
}

/// `UPDATE` of one column; the value is `?1`, the key starts at `?2`.
pub(crate) fn update_value(table: &Table, column: &Column) -> String {
    format!(
        "UPDATE {} SET {} = ?1 WHERE {}",
        quote(table.name()),
        quote(column.name()),
        key_condition(table, 2)
    )
}

pub(crate) fn select_columns(table: &Table, columns: &[&Column]) -> String {
    format!(
        "SELECT {} FROM {} WHERE {}",
        quote_all(columns.iter().map(|c| c.name())),
        quote(table.name()),
        key_condition(table, 1)
    )
}

/// Selects every key column followed by `column`, for all rows.
pub(crate) fn select_column(table: &Table, column: &Column) -> String {
    let mut names: Vec<&str> = table
        .primary_key_columns()
        .iter()
        .map(|c| c.name())
        .collect();
    names.push(column.name());
    format!("SELECT {} FROM {}", quote_all(names), quote(table.name()))
}

pub(crate) fn delete_entry(table: &Table) -> String {
    format!(
        "DELETE FROM {} WHERE {}",
        quote(table.name()),
        key_condition(table, 1)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use table_schema_core::{ColumnProperty, ColumnType, ForeignKeyReference};

    fn players() -> Table {
        Table::builder()
            .name("players")
            .column_builder(
                Column::builder()
                    .name("uuid")
                    .column_type(ColumnType::String)
                    .properties([
                        ColumnProperty::PrimaryKey,
                        ColumnProperty::Unique,
                        ColumnProperty::NotNull,
                    ]),
            )
            .column_builder(
                Column::builder()
                    .name("gold")
                    .column_type(ColumnType::Long)
                    .property(ColumnProperty::NotNull)
                    .default_value(10_i64),
            )
            .build()
            .unwrap()
    }

    fn memberships() -> Table {
        Table::builder()
            .name("memberships")
            .column_builder(
                Column::builder()
                    .name("guild")
                    .column_type(ColumnType::String)
                    .property(ColumnProperty::PrimaryKey),
            )
            .column_builder(
                Column::builder()
                    .name("member")
                    .column_type(ColumnType::String)
                    .property(ColumnProperty::PrimaryKey),
            )
            .column_builder(Column::builder().name("rank").column_type(ColumnType::Short))
            .foreign_key(ForeignKeyReference::new("member", "players", "uuid"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_create_players() {
        assert_eq!(
            create_table(&players(), "players", true),
            concat!(
                r#"CREATE TABLE IF NOT EXISTS "players" ("uuid" TEXT NOT NULL UNIQUE, "#,
                r#""gold" BIGINT NOT NULL DEFAULT 10, PRIMARY KEY ("uuid"))"#
            )
        );
    }

    #[test]
    fn test_create_composite_with_foreign_key() {
        assert_eq!(
            create_table(&memberships(), "memberships_new", false),
            concat!(
                r#"CREATE TABLE "memberships_new" ("guild" TEXT, "member" TEXT, "rank" SMALLINT, "#,
                r#"PRIMARY KEY ("guild", "member"), "#,
                r#"FOREIGN KEY ("member") REFERENCES "players"("uuid") ON DELETE CASCADE)"#
            )
        );
    }

    #[test]
    fn test_auto_increment_inline() {
        let table = Table::builder()
            .name("events")
            .column_builder(
                Column::builder()
                    .name("id")
                    .column_type(ColumnType::Integer)
                    .property(ColumnProperty::AutoIncrementPrimaryKey),
            )
            .column_builder(
                Column::builder()
                    .name("label")
                    .column_type(ColumnType::String)
                    .default_value("it's"),
            )
            .build()
            .unwrap();
        assert_eq!(
            create_table(&table, "events", true),
            concat!(
                r#"CREATE TABLE IF NOT EXISTS "events" ("id" INTEGER PRIMARY KEY AUTOINCREMENT, "#,
                r#""label" TEXT DEFAULT 'it''s')"#
            )
        );
    }

    #[test]
    fn test_copy_rows_fills_new_defaults() {
        let live = players();
        let declared = live
            .to_builder()
            .column_builder(
                Column::builder()
                    .name("xp")
                    .column_type(ColumnType::Long)
                    .property(ColumnProperty::NotNull)
                    .default_value(500_i64),
            )
            .column_builder(Column::builder().name("note").column_type(ColumnType::String))
            .build()
            .unwrap();
        assert_eq!(
            copy_rows(&declared, &live, "players_new").unwrap(),
            r#"INSERT INTO "players_new" ("uuid", "gold", "xp") SELECT "uuid", "gold", 500 FROM "players""#
        );
    }

    #[test]
    fn test_copy_rows_without_overlap() {
        let live = players();
        let declared = Table::builder()
            .name("players")
            .column_builder(
                Column::builder()
                    .name("id")
                    .column_type(ColumnType::Long)
                    .property(ColumnProperty::PrimaryKey)
                    .default_value(0_i64),
            )
            .build()
            .unwrap();
        assert_eq!(copy_rows(&declared, &live, "players_new"), None);
    }

    #[test]
    fn test_row_statements() {
        let table = memberships();
        let rank = table.column("rank").unwrap();
        assert_eq!(key_condition(&table, 1), r#""guild" = ?1 AND "member" = ?2"#);
        assert_eq!(
            entry_exists(&table),
            r#"SELECT EXISTS(SELECT 1 FROM "memberships" WHERE "guild" = ?1 AND "member" = ?2 LIMIT 1)"#
        );
        assert_eq!(
            insert_entry(&table),
            r#"INSERT INTO "memberships" ("guild", "member") VALUES (?1, ?2)"#
        );
        assert_eq!(
            update_value(&table, rank),
            r#"UPDATE "memberships" SET "rank" = ?1 WHERE "guild" = ?2 AND "member" = ?3"#
        );
        assert_eq!(
            select_column(&table, rank),
            r#"SELECT "guild", "member", "rank" FROM "memberships""#
        );
        assert_eq!(
            delete_entry(&table),
            r#"DELETE FROM "memberships" WHERE "guild" = ?1 AND "member" = ?2"#
        );
        assert_eq!(
            select_columns(&table, &[rank]),
            r#"SELECT "rank" FROM "memberships" WHERE "guild" = ?1 AND "member" = ?2"#
        );
    }

    #[test]
    fn test_shadow_name() {
        assert_eq!(shadow_name("players"), "players_new");
    }

    #[test]
    fn test_keyword_names_are_quoted() {
        let orders = Table::builder()
            .name("order")
            .column_builder(
                Column::builder()
                    .name("group")
                    .column_type(ColumnType::Long)
                    .property(ColumnProperty::PrimaryKey),
            )
            .build()
            .unwrap();
        assert_eq!(
            create_table(&orders, "order", false),
            r#"CREATE TABLE "order" ("group" BIGINT, PRIMARY KEY ("group"))"#
        );
        assert_eq!(drop_table("order"), r#"DROP TABLE "order""#);
        assert_eq!(
            rename_table("order_new", "order"),
            r#"ALTER TABLE "order_new" RENAME TO "order""#
        );
    }
}
