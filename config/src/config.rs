//! Declarative database configuration.
//!
//! A [`DatabaseConfig`] names the database file and lists the tables that
//! should exist in it. Files are YAML or JSON, chosen by extension.
//!
//! # Example YAML
//!
//! ```yaml
//! path: game.db
//! foreign_keys: true
//! adopt_existing: true
//! tables:
//!   - name: players
//!     columns:
//!       - name: uuid
//!         type: string
//!         properties: [primary_key, unique, not_null]
//!       - name: gold
//!         type: long
//!         properties: [not_null]
//!         default: 10
//!   - name: inventory
//!     mode: if_not_exists
//!     columns:
//!       - name: owner
//!         type: string
//!         properties: [primary_key]
//!       - name: slot
//!         type: short
//!         properties: [primary_key]
//!       - name: item
//!         type: string
//!     foreign_keys:
//!       - child_column: owner
//!         parent_table: players
//!         parent_column: uuid
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use table_schema_core::{
    Column, ColumnBuilder, ColumnProperty, ColumnType, ForeignKeyReference, Table, TableBuilder,
    Value,
};

use crate::error::{ConfigError, Result};

/// On-disk encoding of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Picks the format from the file extension (`.yml`, `.yaml`, `.json`).
    ///
    /// # Examples
    ///
    /// ```
    /// use table_schema_config::ConfigFormat;
    ///
    /// assert_eq!(ConfigFormat::from_path("db.yml").unwrap(), ConfigFormat::Yaml);
    /// assert_eq!(ConfigFormat::from_path("db.JSON").unwrap(), ConfigFormat::Json);
    /// assert!(ConfigFormat::from_path("db.toml").is_err());
    /// ```
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("yml") | Some("yaml") => Ok(ConfigFormat::Yaml),
            Some("json") => Ok(ConfigFormat::Json),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// How a declared table is applied when the database is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableMode {
    /// Replace any existing table of the same name, migrating it if needed.
    #[default]
    Override,
    /// Only add the table when no table of that name exists yet.
    IfNotExists,
}

/// A default literal as written in a config file.
///
/// The literal is untyped until it meets its column; see
/// [`ColumnConfig::to_builder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultLiteral {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl DefaultLiteral {
    /// Converts the literal to a value of `ty`, if it fits.
    pub fn coerce(&self, ty: ColumnType) -> Option<Value> {
        match (ty, self) {
            (ColumnType::Short, DefaultLiteral::Int(v)) => i16::try_from(*v).ok().map(Value::Short),
            (ColumnType::Integer, DefaultLiteral::Int(v)) => {
                i32::try_from(*v).ok().map(Value::Integer)
            }
            (ColumnType::Long, DefaultLiteral::Int(v)) => Some(Value::Long(*v)),
            (ColumnType::Float, DefaultLiteral::Float(v)) => Some(Value::Float(*v as f32)),
            (ColumnType::Float, DefaultLiteral::Int(v)) => Some(Value::Float(*v as f32)),
            (ColumnType::Double, DefaultLiteral::Float(v)) => Some(Value::Double(*v)),
            (ColumnType::Double, DefaultLiteral::Int(v)) => Some(Value::Double(*v as f64)),
            (ColumnType::String, DefaultLiteral::Text(v)) => Some(Value::Text(v.clone())),
            (ColumnType::Boolean, DefaultLiteral::Bool(v)) => Some(Value::Boolean(*v)),
            (ColumnType::Boolean, DefaultLiteral::Int(0)) => Some(Value::Boolean(false)),
            (ColumnType::Boolean, DefaultLiteral::Int(1)) => Some(Value::Boolean(true)),
            _ => None,
        }
    }
}

impl From<&Value> for DefaultLiteral {
    fn from(value: &Value) -> Self {
        match value {
            Value::Short(v) => DefaultLiteral::Int(i64::from(*v)),
            Value::Integer(v) => DefaultLiteral::Int(i64::from(*v)),
            Value::Long(v) => DefaultLiteral::Int(*v),
            Value::Float(v) => DefaultLiteral::Float(f64::from(*v)),
            Value::Double(v) => DefaultLiteral::Float(*v),
            Value::Text(v) => DefaultLiteral::Text(v.clone()),
            Value::Boolean(v) => DefaultLiteral::Bool(*v),
        }
    }
}

/// One declared column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<ColumnProperty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultLiteral>,
}

impl ColumnConfig {
    /// Converts the declaration into a column builder.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDefault`](ConfigError::InvalidDefault) if the default
    /// literal does not fit the column type.
    pub fn to_builder(&self) -> Result<ColumnBuilder> {
        let mut builder = Column::builder()
            .name(&self.name)
            .column_type(self.column_type)
            .properties(self.properties.iter().copied());
        if let Some(literal) = &self.default {
            let value = literal
                .coerce(self.column_type)
                .ok_or_else(|| ConfigError::InvalidDefault {
                    column: self.name.clone(),
                    expected: self.column_type,
                })?;
            builder = builder.default_value(value);
        }
        Ok(builder)
    }

    /// Describes a finished column.
    pub fn from_column(column: &Column) -> Self {
        Self {
            name: column.name().to_string(),
            column_type: column.column_type(),
            properties: column.properties().iter().copied().collect(),
            default: column.default_value().map(DefaultLiteral::from),
        }
    }
}

/// One declared table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,
    #[serde(default)]
    pub mode: TableMode,
    pub columns: Vec<ColumnConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKeyReference>,
}

impl TableConfig {
    /// Converts the declaration into a table builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use table_schema_config::TableConfig;
    ///
    /// let yaml = r#"
    /// name: players
    /// columns:
    ///   - { name: uuid, type: string, properties: [primary_key] }
    ///   - { name: gold, type: long, default: 10 }
    /// "#;
    /// let config: TableConfig = serde_yaml::from_str(yaml).unwrap();
    /// let table = config.to_builder().unwrap().build().unwrap();
    /// assert_eq!(table.columns().len(), 2);
    /// ```
    pub fn to_builder(&self) -> Result<TableBuilder> {
        let columns = self
            .columns
            .iter()
            .map(ColumnConfig::to_builder)
            .collect::<Result<Vec<_>>>()?;
        Ok(Table::builder()
            .name(&self.name)
            .column_builders(columns)
            .foreign_keys(self.foreign_keys.iter().cloned()))
    }

    /// Builds and validates the declared table.
    pub fn to_table(&self) -> Result<Table> {
        Ok(self.to_builder()?.build()?)
    }

    /// Describes a finished table, with the default [`TableMode`].
    pub fn from_table(table: &Table) -> Self {
        Self {
            name: table.name().to_string(),
            mode: TableMode::default(),
            columns: table.columns().iter().map(ColumnConfig::from_column).collect(),
            foreign_keys: table.foreign_keys().iter().cloned().collect(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Top-level database configuration.
///
/// # Examples
///
/// ```no_run
/// use table_schema_config::DatabaseConfig;
///
/// let config = DatabaseConfig::load("game.yml").unwrap();
/// for table in &config.tables {
///     println!("{} ({} columns)", table.name, table.columns.len());
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file. A `.db` extension is appended when missing.
    pub path: PathBuf,
    /// Enforce foreign-key constraints on the connection.
    #[serde(default = "default_true")]
    pub foreign_keys: bool,
    /// Register tables already present in the file.
    #[serde(default = "default_true")]
    pub adopt_existing: bool,
    /// Declared tables, applied in order.
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

impl DatabaseConfig {
    /// Creates an empty configuration for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            foreign_keys: true,
            adopt_existing: true,
            tables: Vec::new(),
        }
    }

    /// Loads a configuration file, YAML or JSON by extension.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedFormat`](ConfigError::UnsupportedFormat) for an
    /// unknown extension, [`IoError`](ConfigError::IoError) if the file cannot
    /// be read, and a YAML or JSON error if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let reader = BufReader::new(std::fs::File::open(path)?);
        let config = match format {
            ConfigFormat::Yaml => serde_yaml::from_reader(reader)?,
            ConfigFormat::Json => serde_json::from_reader(reader)?,
        };
        Ok(config)
    }

    /// Saves the configuration, YAML or JSON by extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let writer = BufWriter::new(std::fs::File::create(path)?);
        match format {
            ConfigFormat::Yaml => serde_yaml::to_writer(writer, self)?,
            ConfigFormat::Json => serde_json::to_writer_pretty(writer, self)?,
        }
        Ok(())
    }

    /// Returns the declaration for `name`, matched case-insensitively.
    pub fn table(&self, name: &str) -> Option<&TableConfig> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
path: game.db
tables:
  - name: players
    columns:
      - name: uuid
        type: string
        properties: [primary_key, unique, not_null]
      - name: gold
        type: long
        properties: [not_null]
        default: 10
      - name: title
        type: string
        default: "it's me"
  - name: inventory
    mode: if_not_exists
    columns:
      - { name: owner, type: string, properties: [primary_key] }
      - { name: slot, type: short, properties: [primary_key] }
      - { name: weight, type: float, default: 2 }
    foreign_keys:
      - { child_column: owner, parent_table: players, parent_column: uuid }
"#
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: DatabaseConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.path, PathBuf::from("game.db"));
        assert!(config.foreign_keys);
        assert!(config.adopt_existing);
        assert_eq!(config.tables.len(), 2);
        assert_eq!(config.tables[0].mode, TableMode::Override);
        assert_eq!(config.tables[1].mode, TableMode::IfNotExists);
        assert_eq!(config.tables[1].foreign_keys.len(), 1);
    }

    #[test]
    fn test_to_table() {
        let config: DatabaseConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        let players = config.table("PLAYERS").unwrap().to_table().unwrap();
        let gold = players.column("gold").unwrap();
        assert_eq!(gold.default_value(), Some(&Value::Long(10)));
        assert!(gold.is_not_null());
        assert_eq!(
            players.column("title").unwrap().default_value(),
            Some(&Value::Text("it's me".into()))
        );

        let inventory = config.table("inventory").unwrap().to_table().unwrap();
        assert_eq!(inventory.primary_key_columns().len(), 2);
        assert_eq!(
            inventory.column("weight").unwrap().default_value(),
            Some(&Value::Float(2.0))
        );
    }

    #[test]
    fn test_default_coercion() {
        assert_eq!(
            DefaultLiteral::Int(7).coerce(ColumnType::Short),
            Some(Value::Short(7))
        );
        assert_eq!(DefaultLiteral::Int(70_000).coerce(ColumnType::Short), None);
        assert_eq!(
            DefaultLiteral::Int(1).coerce(ColumnType::Boolean),
            Some(Value::Boolean(true))
        );
        assert_eq!(DefaultLiteral::Text("x".into()).coerce(ColumnType::Long), None);
        assert_eq!(DefaultLiteral::Float(1.5).coerce(ColumnType::Integer), None);
    }

    #[test]
    fn test_invalid_default_reported() {
        let yaml = r#"
name: t
columns:
  - { name: flag, type: boolean, default: "yes" }
"#;
        let config: TableConfig = serde_yaml::from_str(yaml).unwrap();
        let err = config.to_builder().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidDefault { expected: ColumnType::Boolean, .. }
        ));
    }

    #[test]
    fn test_schema_errors_surface_on_build() {
        let yaml = r#"
name: t
columns:
  - { name: a, type: integer, properties: [auto_increment_primary_key] }
  - { name: b, type: integer, properties: [auto_increment_primary_key] }
"#;
        let config: TableConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(config.to_table(), Err(ConfigError::Schema(_))));
    }

    #[test]
    fn test_from_table_round_trip() {
        let config: DatabaseConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        let players = config.tables[0].to_table().unwrap();
        let described = TableConfig::from_table(&players);
        assert_eq!(described.to_table().unwrap(), players);
    }
}
