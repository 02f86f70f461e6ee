//! Typed cell values and primary-key shapes.
//!
//! A column value is one of a closed set of primitive types, chosen at runtime
//! by the table's declaration. [`Value`] is that tagged variant; storage NULL
//! is represented as `Option<Value>::None` by the callers that read cells.
//!
//! Keys come in three shapes ([`KeyShape`]): none, a single scalar column, or
//! several columns forming a [`CompositeKey`]. The [`PrimaryKey`] trait lets
//! row accessors be typed by the key a caller expects to use.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::types::ColumnType;

/// A single non-NULL cell value.
///
/// Equality, ordering and hashing are structural. Floats compare with
/// [`f64::total_cmp`] and hash by bit pattern, so `Value` can be used as a map
/// key (including inside a [`CompositeKey`]).
///
/// # Examples
///
/// ```
/// use table_schema_core::{ColumnType, Value};
///
/// let gold = Value::from(10_i64);
/// assert_eq!(gold.column_type(), ColumnType::Long);
/// assert_eq!(gold.to_sql_literal(), "10");
/// assert_eq!(Value::from("it's").to_sql_literal(), "'it''s'");
/// assert_eq!(Value::from(true).to_sql_literal(), "1");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Short(i16),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Boolean(bool),
}

impl Value {
    /// Returns the column type this value belongs to.
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Short(_) => ColumnType::Short,
            Value::Integer(_) => ColumnType::Integer,
            Value::Long(_) => ColumnType::Long,
            Value::Float(_) => ColumnType::Float,
            Value::Double(_) => ColumnType::Double,
            Value::Text(_) => ColumnType::String,
            Value::Boolean(_) => ColumnType::Boolean,
        }
    }

    /// Renders the value as an SQL literal for `DEFAULT` clauses.
    ///
    /// Text is single-quoted with embedded quotes doubled, booleans render as
    /// `1`/`0`, numbers are unquoted.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Short(v) => v.to_string(),
            Value::Integer(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Text(v) => format!("'{}'", v.replace('\'', "''")),
            Value::Boolean(v) => if *v { "1" } else { "0" }.to_string(),
        }
    }

    /// Parses an SQL literal (as reported by the store for a column default)
    /// into a value of the given type.
    ///
    /// Returns `None` when the literal does not fit the type.
    pub fn parse_sql_literal(ty: ColumnType, raw: &str) -> Option<Value> {
        let raw = raw.trim();
        let unquoted = unquote(raw);
        match ty {
            ColumnType::Short => unquoted.parse().ok().map(Value::Short),
            ColumnType::Integer => unquoted.parse().ok().map(Value::Integer),
            ColumnType::Long => unquoted.parse().ok().map(Value::Long),
            ColumnType::Float => unquoted.parse().ok().map(Value::Float),
            ColumnType::Double => unquoted.parse().ok().map(Value::Double),
            ColumnType::String => Some(Value::Text(unquoted)),
            ColumnType::Boolean => match unquoted.to_ascii_uppercase().as_str() {
                "1" | "TRUE" => Some(Value::Boolean(true)),
                "0" | "FALSE" => Some(Value::Boolean(false)),
                _ => None,
            },
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Short(_) => 0,
            Value::Integer(_) => 1,
            Value::Long(_) => 2,
            Value::Float(_) => 3,
            Value::Double(_) => 4,
            Value::Text(_) => 5,
            Value::Boolean(_) => 6,
        }
    }
}

/// Strips one level of single or double quotes, undoubling embedded quotes.
fn unquote(raw: &str) -> String {
    for quote in ['\'', '"'] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            let inner = &raw[1..raw.len() - 1];
            let doubled = format!("{quote}{quote}");
            return inner.replace(&doubled, &quote.to_string());
        }
    }
    raw.to_string()
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Short(a), Value::Short(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Long(a), Value::Long(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Short(v) => v.hash(state),
            Value::Integer(v) => v.hash(state),
            Value::Long(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::Text(v) => v.hash(state),
            Value::Boolean(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Short(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Boolean(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    i16 => Short,
    i32 => Integer,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => Text,
    bool => Boolean,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

/// An ordered tuple of key parts standing in for a multi-column primary key.
///
/// Parts are listed in primary-key-column order. Equality and ordering are
/// element-wise.
///
/// # Examples
///
/// ```
/// use table_schema_core::{CompositeKey, Value};
///
/// let key = CompositeKey::from(("guild", 7_i64));
/// assert_eq!(key.parts(), &[Value::from("guild"), Value::from(7_i64)]);
/// assert_eq!(key, CompositeKey::new(vec!["guild".into(), 7_i64.into()]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompositeKey(Vec<Value>);

impl CompositeKey {
    /// Creates a key from its parts, in primary-key-column order.
    pub fn new(parts: Vec<Value>) -> Self {
        Self(parts)
    }

    /// Returns the key parts.
    pub fn parts(&self) -> &[Value] {
        &self.0
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the key has no parts.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the key and returns its parts.
    pub fn into_parts(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for CompositeKey {
    fn from(parts: Vec<Value>) -> Self {
        Self(parts)
    }
}

impl FromIterator<Value> for CompositeKey {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for CompositeKey {
    fn from((a, b): (A, B)) -> Self {
        Self(vec![a.into(), b.into()])
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for CompositeKey {
    fn from((a, b, c): (A, B, C)) -> Self {
        Self(vec![a.into(), b.into(), c.into()])
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{part}")?;
        }
        f.write_str("]")
    }
}

/// Shape of a table's primary key, derived from its key columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyShape {
    /// No primary-key column: rows are not addressable.
    None,
    /// One key column of the given type.
    Scalar(ColumnType),
    /// Several key columns, in key order.
    Composite(Vec<ColumnType>),
}

/// A Rust type usable as the primary key of a table.
///
/// Implemented for the scalar types `i16`, `i32`, `i64`, `bool`, `String`,
/// for the dynamically typed [`Value`] (accepting any scalar key), and for
/// [`CompositeKey`].
pub trait PrimaryKey: Clone + Eq + Hash + fmt::Debug {
    /// Returns `true` if a table with this key shape can be addressed by `Self`.
    fn accepts(shape: &KeyShape) -> bool;

    /// Returns the key parts, in primary-key-column order.
    fn to_parts(&self) -> Vec<Value>;

    /// Rebuilds a key from parts read back from storage.
    fn from_parts(parts: Vec<Value>) -> Option<Self>;
}

macro_rules! scalar_key {
    ($($ty:ty => $variant:ident / $column:ident),* $(,)?) => {
        $(
            impl PrimaryKey for $ty {
                fn accepts(shape: &KeyShape) -> bool {
                    *shape == KeyShape::Scalar(ColumnType::$column)
                }

                fn to_parts(&self) -> Vec<Value> {
                    vec![Value::$variant(self.clone())]
                }

                fn from_parts(parts: Vec<Value>) -> Option<Self> {
                    let mut parts = parts.into_iter();
                    match (parts.next(), parts.next()) {
                        (Some(Value::$variant(v)), None) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

scalar_key! {
    i16 => Short / Short,
    i32 => Integer / Integer,
    i64 => Long / Long,
    bool => Boolean / Boolean,
    String => Text / String,
}

impl PrimaryKey for Value {
    fn accepts(shape: &KeyShape) -> bool {
        matches!(shape, KeyShape::Scalar(_))
    }

    fn to_parts(&self) -> Vec<Value> {
        vec![self.clone()]
    }

    fn from_parts(parts: Vec<Value>) -> Option<Self> {
        let mut parts = parts.into_iter();
        match (parts.next(), parts.next()) {
            (Some(v), None) => Some(v),
            _ => None,
        }
    }
}

impl PrimaryKey for CompositeKey {
    fn accepts(shape: &KeyShape) -> bool {
        matches!(shape, KeyShape::Composite(_))
    }

    fn to_parts(&self) -> Vec<Value> {
        self.0.clone()
    }

    fn from_parts(parts: Vec<Value>) -> Option<Self> {
        Some(CompositeKey(parts))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_float_values_are_hashable_keys() {
        let mut map = HashMap::new();
        map.insert(Value::Double(1.5), "a");
        map.insert(Value::Double(f64::NAN), "nan");
        assert_eq!(map.get(&Value::Double(1.5)), Some(&"a"));
        assert_eq!(map.get(&Value::Double(f64::NAN)), Some(&"nan"));
    }

    #[test]
    fn test_different_variants_are_not_equal() {
        assert_ne!(Value::Integer(1), Value::Long(1));
        assert_ne!(Value::Float(1.0), Value::Double(1.0));
        assert!(Value::Short(100) < Value::Integer(0));
    }

    #[test]
    fn test_literal_rendering() {
        assert_eq!(Value::Short(-3).to_sql_literal(), "-3");
        assert_eq!(Value::Double(2.5).to_sql_literal(), "2.5");
        assert_eq!(Value::Float(10.0).to_sql_literal(), "10");
        assert_eq!(Value::Text("gold".into()).to_sql_literal(), "'gold'");
        assert_eq!(Value::Boolean(false).to_sql_literal(), "0");
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(
            Value::parse_sql_literal(ColumnType::Long, "500"),
            Some(Value::Long(500))
        );
        assert_eq!(
            Value::parse_sql_literal(ColumnType::String, "'it''s'"),
            Some(Value::Text("it's".into()))
        );
        assert_eq!(
            Value::parse_sql_literal(ColumnType::Boolean, "TRUE"),
            Some(Value::Boolean(true))
        );
        assert_eq!(
            Value::parse_sql_literal(ColumnType::Double, "0.1"),
            Some(Value::Double(0.1))
        );
        assert_eq!(Value::parse_sql_literal(ColumnType::Integer, "abc"), None);
        assert_eq!(Value::parse_sql_literal(ColumnType::Boolean, "2"), None);
    }

    #[test]
    fn test_float_literal_matches_double_literal() {
        // FLOAT defaults come back from storage as DOUBLE; their literals agree.
        let declared = Value::Float(0.1);
        let live = Value::parse_sql_literal(ColumnType::Double, &declared.to_sql_literal()).unwrap();
        assert_eq!(declared.to_sql_literal(), live.to_sql_literal());
    }

    #[test]
    fn test_scalar_keys_accept_matching_shape_only() {
        let long = KeyShape::Scalar(ColumnType::Long);
        assert!(i64::accepts(&long));
        assert!(!i32::accepts(&long));
        assert!(!String::accepts(&long));
        assert!(Value::accepts(&long));
        assert!(!CompositeKey::accepts(&long));
        assert!(!Value::accepts(&KeyShape::None));

        let composite = KeyShape::Composite(vec![ColumnType::String, ColumnType::Long]);
        assert!(CompositeKey::accepts(&composite));
        assert!(!String::accepts(&composite));
    }

    #[test]
    fn test_key_parts_round_trip() {
        assert_eq!(String::from_parts("p1".to_string().to_parts()), Some("p1".to_string()));
        assert_eq!(i64::from_parts(vec![Value::Integer(1)]), None);
        assert_eq!(i64::from_parts(vec![Value::Long(1), Value::Long(2)]), None);

        let key = CompositeKey::from(("a", 1_i32, true));
        assert_eq!(key.len(), 3);
        assert_eq!(CompositeKey::from_parts(key.to_parts()), Some(key.clone()));
        assert_eq!(key.to_string(), "[a, 1, true]");
    }
}
