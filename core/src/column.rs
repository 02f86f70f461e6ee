//! Column declarations.
//!
//! A [`Column`] is immutable once built. To change one, derive a builder with
//! [`Column::to_builder`], adjust it, and build a new value.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::{Result, SchemaError};
use crate::types::{ColumnProperty, ColumnType};
use crate::validate::validate_identifier;
use crate::value::Value;

/// One typed, named, constrained attribute of a table.
///
/// # Examples
///
/// ```
/// use table_schema_core::{Column, ColumnProperty, ColumnType};
///
/// let gold = Column::builder()
///     .name("gold")
///     .column_type(ColumnType::Long)
///     .property(ColumnProperty::NotNull)
///     .default_value(10_i64)
///     .build()
///     .unwrap();
///
/// assert_eq!(gold.name(), "gold");
/// assert!(gold.is_not_null());
/// assert!(!gold.is_primary_key());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Column {
    name: String,
    #[serde(rename = "type")]
    column_type: ColumnType,
    properties: BTreeSet<ColumnProperty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
}

impl Column {
    /// Returns a new, empty [`ColumnBuilder`].
    pub fn builder() -> ColumnBuilder {
        ColumnBuilder::default()
    }

    /// Column name, as declared.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Semantic type.
    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Constraint flags.
    pub fn properties(&self) -> &BTreeSet<ColumnProperty> {
        &self.properties
    }

    /// Declared default, if any.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn has_property(&self, property: ColumnProperty) -> bool {
        self.properties.contains(&property)
    }

    /// Returns `true` if the column participates in the primary key.
    pub fn is_primary_key(&self) -> bool {
        self.properties.iter().any(|p| p.is_primary_key())
    }

    pub fn is_auto_increment(&self) -> bool {
        self.has_property(ColumnProperty::AutoIncrementPrimaryKey)
    }

    pub fn is_not_null(&self) -> bool {
        self.has_property(ColumnProperty::NotNull)
    }

    pub fn is_unique(&self) -> bool {
        self.has_property(ColumnProperty::Unique)
    }

    /// Returns `true` if names match case-insensitively.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Returns a builder pre-filled with this column's fields.
    pub fn to_builder(&self) -> ColumnBuilder {
        ColumnBuilder {
            name: Some(self.name.clone()),
            column_type: Some(self.column_type),
            properties: self.properties.clone(),
            default: self.default.clone(),
        }
    }
}

/// Accumulates the fields of a [`Column`].
///
/// [`build`](ColumnBuilder::build) fails if the name or type is unset, if the
/// name is not a valid identifier, if a default of another type was given, or
/// if auto-increment is requested on a non-INTEGER column.
#[derive(Debug, Clone, Default)]
pub struct ColumnBuilder {
    name: Option<String>,
    column_type: Option<ColumnType>,
    properties: BTreeSet<ColumnProperty>,
    default: Option<Value>,
}

impl ColumnBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn column_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = Some(column_type);
        self
    }

    /// Replaces the constraint set.
    pub fn properties(mut self, properties: impl IntoIterator<Item = ColumnProperty>) -> Self {
        self.properties = properties.into_iter().collect();
        self
    }

    /// Adds one constraint flag.
    pub fn property(mut self, property: ColumnProperty) -> Self {
        self.properties.insert(property);
        self
    }

    /// Removes one constraint flag.
    pub fn without_property(mut self, property: ColumnProperty) -> Self {
        self.properties.remove(&property);
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn no_default(mut self) -> Self {
        self.default = None;
        self
    }

    /// Name set so far, if any.
    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Validates the accumulated fields and produces an immutable [`Column`].
    pub fn build(self) -> Result<Column> {
        let name = self.name.ok_or(SchemaError::MissingName("column"))?;
        validate_identifier(&name)?;
        let column_type = self
            .column_type
            .ok_or_else(|| SchemaError::MissingType(name.clone()))?;

        if let Some(default) = &self.default {
            if default.column_type() != column_type {
                return Err(SchemaError::DefaultTypeMismatch {
                    column: name,
                    expected: column_type,
                    found: default.column_type(),
                });
            }
        }

        if self
            .properties
            .contains(&ColumnProperty::AutoIncrementPrimaryKey)
            && column_type != ColumnType::Integer
        {
            return Err(SchemaError::AutoIncrementType {
                column: name,
                found: column_type,
            });
        }

        Ok(Column {
            name,
            column_type,
            properties: self.properties,
            default: self.default,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid_column() -> Column {
        Column::builder()
            .name("uuid")
            .column_type(ColumnType::String)
            .properties([
                ColumnProperty::PrimaryKey,
                ColumnProperty::Unique,
                ColumnProperty::NotNull,
            ])
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_requires_name_and_type() {
        let err = Column::builder()
            .column_type(ColumnType::Long)
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::MissingName("column"));

        let err = Column::builder().name("gold").build().unwrap_err();
        assert_eq!(err, SchemaError::MissingType("gold".into()));
    }

    #[test]
    fn test_build_rejects_bad_identifier() {
        let err = Column::builder()
            .name("gold; DROP TABLE x")
            .column_type(ColumnType::Long)
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidIdentifier(_)));
    }

    #[test]
    fn test_build_rejects_mistyped_default() {
        let err = Column::builder()
            .name("gold")
            .column_type(ColumnType::Long)
            .default_value(10_i32)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DefaultTypeMismatch {
                column: "gold".into(),
                expected: ColumnType::Long,
                found: ColumnType::Integer,
            }
        );
    }

    #[test]
    fn test_auto_increment_requires_integer() {
        let err = Column::builder()
            .name("id")
            .column_type(ColumnType::Long)
            .property(ColumnProperty::AutoIncrementPrimaryKey)
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::AutoIncrementType { .. }));

        let id = Column::builder()
            .name("id")
            .column_type(ColumnType::Integer)
            .property(ColumnProperty::AutoIncrementPrimaryKey)
            .build()
            .unwrap();
        assert!(id.is_primary_key());
        assert!(id.is_auto_increment());
    }

    #[test]
    fn test_flags() {
        let uuid = uuid_column();
        assert!(uuid.is_primary_key());
        assert!(uuid.is_unique());
        assert!(uuid.is_not_null());
        assert!(uuid.is_named("UUID"));
        assert_eq!(uuid.default_value(), None);
    }

    #[test]
    fn test_to_builder_produces_new_value() {
        let uuid = uuid_column();
        let relaxed = uuid
            .to_builder()
            .without_property(ColumnProperty::NotNull)
            .build()
            .unwrap();
        assert!(uuid.is_not_null());
        assert!(!relaxed.is_not_null());
        assert_eq!(uuid.to_builder().build().unwrap(), uuid);
    }
}
