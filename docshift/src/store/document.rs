use crate::errors::{DocshiftError, DocshiftResult, ErrorKind};
use chrono::{DateTime, Utc};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};

/// Represents a [`Document`] field value.
///
/// The value model is intentionally narrow: a migration runner persists
/// history and lock records, not arbitrary user data, so only the types those
/// records need are representable. All variants are totally ordered and
/// hashable, which is what unique-index enforcement relies on.
///
/// # Variants
/// - `Null`: Absence of a value
/// - `Bool(bool)`: Boolean true/false
/// - `U32(u32)`: Unsigned 32-bit integer (version components)
/// - `I64(i64)`: Signed 64-bit integer
/// - `Text(String)`: Text value
/// - `Timestamp(DateTime<Utc>)`: UTC instant
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// Represents a null value.
    #[default]
    Null,
    /// Represents a boolean value.
    Bool(bool),
    /// Represents an unsigned 32-bit integer value.
    U32(u32),
    /// Represents a signed 64-bit integer value.
    I64(i64),
    /// Represents a text value.
    Text(String),
    /// Represents a UTC timestamp.
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::U32(n) => write!(f, "{}", n),
            Value::I64(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::U32(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::I64(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::I64(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Timestamp(t)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

/// A flat, ordered field map - the unit of storage in a document collection.
///
/// Field names are arbitrary non-empty strings; dotted names such as
/// `version.major` are plain keys, not paths. Documents are plain values:
/// cloning copies the map, and two documents are equal when their fields are.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Document {
    fields: BTreeMap<String, Value>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Document {
            fields: BTreeMap::new(),
        }
    }

    /// Sets a field value, replacing any previous value.
    ///
    /// # Arguments
    /// * `field` - Non-empty field name
    /// * `value` - The value to store
    ///
    /// # Returns
    /// * `Err` with kind `ValidationError` if the field name is empty
    pub fn put(&mut self, field: &str, value: impl Into<Value>) -> DocshiftResult<()> {
        if field.is_empty() {
            return Err(DocshiftError::new(
                "Field name must not be empty",
                ErrorKind::ValidationError,
            ));
        }
        self.fields.insert(field.to_string(), value.into());
        Ok(())
    }

    /// Gets a field value, or `None` if the field is absent.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Gets a required text field.
    pub fn get_text(&self, field: &str) -> DocshiftResult<&str> {
        self.require(field)?.as_text().ok_or_else(|| {
            DocshiftError::new(
                &format!("Field '{}' is not a text value", field),
                ErrorKind::ValidationError,
            )
        })
    }

    /// Gets a required u32 field.
    pub fn get_u32(&self, field: &str) -> DocshiftResult<u32> {
        self.require(field)?.as_u32().ok_or_else(|| {
            DocshiftError::new(
                &format!("Field '{}' is not a u32 value", field),
                ErrorKind::ValidationError,
            )
        })
    }

    /// Gets a required timestamp field.
    pub fn get_timestamp(&self, field: &str) -> DocshiftResult<DateTime<Utc>> {
        self.require(field)?.as_timestamp().ok_or_else(|| {
            DocshiftError::new(
                &format!("Field '{}' is not a timestamp value", field),
                ErrorKind::ValidationError,
            )
        })
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over `(field, value)` pairs in field-name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.fields.iter()
    }

    fn require(&self, field: &str) -> DocshiftResult<&Value> {
        self.fields.get(field).ok_or_else(|| {
            DocshiftError::new(
                &format!("Field '{}' is missing", field),
                ErrorKind::NotFound,
            )
        })
    }
}

/// A conjunction of field-equality conditions.
///
/// This is the only query shape the migration runner needs: history records
/// are addressed by their exact version triple and lock records by their
/// marker id. An empty filter matches every document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// A filter that matches every document.
    pub fn all() -> Self {
        Filter {
            conditions: Vec::new(),
        }
    }

    /// A filter with a single field-equality condition.
    pub fn by(field: &str, value: impl Into<Value>) -> Self {
        Filter {
            conditions: vec![(field.to_string(), value.into())],
        }
    }

    /// Adds another field-equality condition; all conditions must hold.
    pub fn and(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((field.to_string(), value.into()));
        self
    }

    /// Checks whether a document satisfies every condition.
    pub fn matches(&self, document: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| document.get(field) == Some(value))
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Normalizes a `doc!` macro key: identifier keys arrive stringified, quoted
/// keys keep their inner text.
#[doc(hidden)]
pub fn normalize_field(raw: &str) -> String {
    raw.trim_matches('"').to_string()
}

/// Creates a [`Document`] from `field: value` pairs.
///
/// Keys may be bare identifiers or string literals; values are anything
/// convertible into [`Value`].
///
/// ```ignore
/// let doc = doc! { name: "Alice", retries: 3 };
/// let dotted = doc! { "version.major": 1u32 };
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::store::Document::new()
    };

    ($($key:tt : $value:expr),* $(,)?) => {
        {
            let mut doc = $crate::store::Document::new();
            $(
                doc.put(
                    &$crate::store::normalize_field(stringify!($key)),
                    $crate::store::Value::from($value),
                )
                .expect("Failed to put value in document");
            )*
            doc
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    // ==================== Value Tests ====================

    #[test]
    fn test_value_from_conversions() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(7u32), Value::U32(7));
        assert_eq!(Value::from(7i64), Value::I64(7));
        assert_eq!(Value::from(7i32), Value::I64(7));
        assert_eq!(Value::from("hi"), Value::Text("hi".to_string()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(1i64)), Value::I64(1));
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::U32(3).as_u32(), Some(3));
        assert_eq!(Value::U32(3).as_i64(), None);
        assert_eq!(Value::Text("a".into()).as_text(), Some("a"));
        assert!(Value::Null.is_null());

        let now = Utc::now();
        assert_eq!(Value::Timestamp(now).as_timestamp(), Some(now));
    }

    #[test]
    fn test_value_ordering_is_numeric_not_textual() {
        assert!(Value::U32(10) > Value::U32(9));
    }

    // ==================== Document Tests ====================

    #[test]
    fn test_document_put_and_get() {
        let mut doc = Document::new();
        doc.put("name", "widget").unwrap();
        doc.put("count", 4u32).unwrap();

        assert_eq!(doc.get_text("name").unwrap(), "widget");
        assert_eq!(doc.get_u32("count").unwrap(), 4);
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn test_document_put_replaces() {
        let mut doc = Document::new();
        doc.put("name", "a").unwrap();
        doc.put("name", "b").unwrap();
        assert_eq!(doc.get_text("name").unwrap(), "b");
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_document_put_empty_field_fails() {
        let mut doc = Document::new();
        let err = doc.put("", 1u32).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_document_missing_field_is_not_found() {
        let doc = Document::new();
        let err = doc.get_text("absent").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NotFound);
        assert!(doc.get("absent").is_none());
    }

    #[test]
    fn test_document_type_mismatch_is_validation_error() {
        let mut doc = Document::new();
        doc.put("count", "not a number").unwrap();
        let err = doc.get_u32("count").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_document_dotted_field_names_are_plain_keys() {
        let mut doc = Document::new();
        doc.put("version.major", 1u32).unwrap();
        assert_eq!(doc.get_u32("version.major").unwrap(), 1);
        assert!(!doc.contains("version"));
    }

    // ==================== Filter Tests ====================

    #[test]
    fn test_filter_single_condition() {
        let mut doc = Document::new();
        doc.put("name", "a").unwrap();

        assert!(Filter::by("name", "a").matches(&doc));
        assert!(!Filter::by("name", "b").matches(&doc));
        assert!(!Filter::by("other", "a").matches(&doc));
    }

    #[test]
    fn test_filter_conjunction() {
        let mut doc = Document::new();
        doc.put("major", 1u32).unwrap();
        doc.put("minor", 2u32).unwrap();

        let filter = Filter::by("major", 1u32).and("minor", 2u32);
        assert!(filter.matches(&doc));

        let wrong = Filter::by("major", 1u32).and("minor", 3u32);
        assert!(!wrong.matches(&doc));
    }

    #[test]
    fn test_filter_all_matches_everything() {
        assert!(Filter::all().matches(&Document::new()));
        assert!(Filter::all().is_empty());
    }

    // ==================== Macro Tests ====================

    #[test]
    fn test_doc_macro_identifiers_and_literals() {
        let doc = crate::doc! { name: "Alice", "version.major": 2u32, age: 30 };
        assert_eq!(doc.get_text("name").unwrap(), "Alice");
        assert_eq!(doc.get_u32("version.major").unwrap(), 2);
        assert_eq!(doc.get("age"), Some(&Value::I64(30)));
    }

    #[test]
    fn test_doc_macro_empty() {
        let doc = crate::doc! {};
        assert!(doc.is_empty());
    }
}
