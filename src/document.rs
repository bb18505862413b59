//! Documents as returned by the list operation.
//!
//! A [`Document`] starts as the raw field map produced by the store. Before
//! it is handed to the caller, the list operation replaces every
//! reference-typed field's raw identifier with a [`ReferenceResolver`], so a
//! field value is either a plain JSON value or a deferred lookup.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::query::ID_FIELD;
use crate::resolver::ReferenceResolver;

/// Raw document shape as produced by the store: field name to JSON value.
pub type RawDocument = serde_json::Map<String, Value>;

/// A document identifier, unique within its collection.
///
/// Stores commonly use string or integer identifiers; anything else is not
/// treated as an identifier (such documents are skipped by the request
/// cache).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DocumentId {
    String(String),
    Integer(i64),
}

impl DocumentId {
    /// Extract an identifier from a JSON value, if it has identifier shape.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Number(n) => n.as_i64().map(Self::Integer),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
        }
    }
}

/// One field of a document: either a raw value or a deferred reference.
#[derive(Clone, Debug)]
pub enum FieldValue {
    /// A plain stored value.
    Value(Value),
    /// A deferred lookup of the referenced document(s); evaluated on demand
    /// via [`ReferenceResolver::resolve`].
    Reference(ReferenceResolver),
}

impl FieldValue {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Reference(_) => None,
        }
    }

    pub fn as_reference(&self) -> Option<&ReferenceResolver> {
        match self {
            Self::Reference(r) => Some(r),
            Self::Value(_) => None,
        }
    }
}

/// A single document, possibly carrying deferred reference fields.
#[derive(Clone, Debug, Default)]
pub struct Document {
    fields: BTreeMap<String, FieldValue>,
}

impl Document {
    /// Build a document from the raw store output; every field starts as a
    /// plain value.
    pub(crate) fn from_raw(raw: RawDocument) -> Self {
        Self {
            fields: raw
                .into_iter()
                .map(|(name, value)| (name, FieldValue::Value(value)))
                .collect(),
        }
    }

    /// The document's identifier, taken from the `_id` field.
    pub fn id(&self) -> Option<DocumentId> {
        self.fields
            .get(ID_FIELD)
            .and_then(FieldValue::as_value)
            .and_then(DocumentId::from_value)
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Raw value of a field, or `None` if absent or wrapped as a reference.
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).and_then(FieldValue::as_value)
    }

    /// The deferred resolver attached to a reference field.
    pub fn reference(&self, field: &str) -> Option<&ReferenceResolver> {
        self.fields.get(field).and_then(FieldValue::as_reference)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn set(&mut self, field: impl Into<String>, value: FieldValue) {
        self.fields.insert(field.into(), value);
    }
}
