//! Declaration validation.
//!
//! Checks run while building columns and tables, before any statement is
//! generated. A failure aborts construction with no side effects.
//!
//! # Examples
//!
//! ```
//! use table_schema_core::*;
//!
//! let id = Column::builder()
//!     .name("id")
//!     .column_type(ColumnType::Integer)
//!     .property(ColumnProperty::AutoIncrementPrimaryKey)
//!     .build()
//!     .unwrap();
//! let owner = Column::builder()
//!     .name("owner")
//!     .column_type(ColumnType::String)
//!     .property(ColumnProperty::PrimaryKey)
//!     .build()
//!     .unwrap();
//!
//! assert!(validate_columns("items", &[id.clone()]).is_ok());
//!
//! // An auto-increment column cannot share the key with another column.
//! assert!(matches!(
//!     validate_columns("items", &[id, owner]),
//!     Err(SchemaError::AutoIncrementInCompositeKey { .. })
//! ));
//! ```

use std::collections::HashSet;

use crate::column::Column;
use crate::error::{Result, SchemaError};
use crate::table::ForeignKeyReference;

/// Validates that a name can be used as an unquoted SQL identifier.
///
/// Names must be non-empty, contain only ASCII alphanumerics and underscores,
/// and must not start with a digit.
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier(name.to_string()))
    }
}

/// Validates the column list of a table.
///
/// Rejects duplicate column names (case-insensitive), more than one
/// auto-increment column, and an auto-increment column that is not the
/// table's only primary-key column.
pub fn validate_columns(table: &str, columns: &[Column]) -> Result<()> {
    let mut seen: HashSet<String> = HashSet::new();
    for column in columns {
        if !seen.insert(column.name().to_ascii_lowercase()) {
            return Err(SchemaError::DuplicateColumn {
                table: table.to_string(),
                column: column.name().to_string(),
            });
        }
    }

    let auto_increment: Vec<&Column> = columns.iter().filter(|c| c.is_auto_increment()).collect();
    if auto_increment.len() > 1 {
        return Err(SchemaError::MultipleAutoIncrement(table.to_string()));
    }

    if let Some(column) = auto_increment.first() {
        let key_columns = columns.iter().filter(|c| c.is_primary_key()).count();
        if key_columns != 1 {
            return Err(SchemaError::AutoIncrementInCompositeKey {
                table: table.to_string(),
                column: column.name().to_string(),
            });
        }
    }

    Ok(())
}

/// Validates that every foreign key's child column is declared by the table.
pub fn validate_foreign_keys<'a>(
    table: &str,
    columns: &[Column],
    foreign_keys: impl IntoIterator<Item = &'a ForeignKeyReference>,
) -> Result<()> {
    for fk in foreign_keys {
        validate_identifier(&fk.parent_table)?;
        validate_identifier(&fk.parent_column)?;
        if !columns.iter().any(|c| c.is_named(&fk.child_column)) {
            return Err(SchemaError::UnknownForeignKeyColumn {
                table: table.to_string(),
                column: fk.child_column.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnProperty, ColumnType};

    fn column(name: &str, properties: &[ColumnProperty]) -> Column {
        Column::builder()
            .name(name)
            .column_type(ColumnType::Integer)
            .properties(properties.iter().copied())
            .build()
            .unwrap()
    }

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_identifier("players").is_ok());
        assert!(validate_identifier("_x1").is_ok());
        assert!(validate_identifier("player_data_2").is_ok());
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1st").is_err());
        assert!(validate_identifier("hello world").is_err());
        assert!(validate_identifier("drop;--").is_err());
        assert!(validate_identifier("naïve").is_err());
    }

    #[test]
    fn test_two_auto_increment_columns_rejected() {
        let cols = [
            column("a", &[ColumnProperty::AutoIncrementPrimaryKey]),
            column("b", &[ColumnProperty::AutoIncrementPrimaryKey]),
        ];
        assert_eq!(
            validate_columns("t", &cols),
            Err(SchemaError::MultipleAutoIncrement("t".into()))
        );
    }

    #[test]
    fn test_auto_increment_with_second_key_rejected() {
        let cols = [
            column("a", &[ColumnProperty::AutoIncrementPrimaryKey]),
            column("b", &[ColumnProperty::PrimaryKey]),
        ];
        assert!(matches!(
            validate_columns("t", &cols),
            Err(SchemaError::AutoIncrementInCompositeKey { .. })
        ));
    }

    #[test]
    fn test_auto_increment_alone_accepted() {
        let cols = [
            column("a", &[ColumnProperty::AutoIncrementPrimaryKey]),
            column("b", &[ColumnProperty::NotNull]),
        ];
        assert!(validate_columns("t", &cols).is_ok());
    }

    #[test]
    fn test_duplicate_column_rejected_case_insensitive() {
        let cols = [column("gold", &[]), column("GOLD", &[])];
        assert!(matches!(
            validate_columns("t", &cols),
            Err(SchemaError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn test_foreign_key_requires_declared_child() {
        let cols = [column("owner", &[])];
        let good = ForeignKeyReference::new("owner", "players", "id");
        let bad = ForeignKeyReference::new("missing", "players", "id");
        assert!(validate_foreign_keys("t", &cols, [&good]).is_ok());
        assert!(matches!(
            validate_foreign_keys("t", &cols, [&bad]),
            Err(SchemaError::UnknownForeignKeyColumn { .. })
        ));
    }
}
