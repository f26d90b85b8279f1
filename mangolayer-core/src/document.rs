//! Document representation and structural helpers.
//!
//! A [`Document`] is an ordered JSON object. Documents persisted in the store always
//! carry the store's native identity key ([`ID_FIELD`]) and a revision token
//! ([`REV_FIELD`]); a tombstone write additionally carries [`DELETED_FIELD`].
//!
//! The helpers in [`DocumentExt`] perform the explicit merge steps the service relies
//! on: overlaying caller data, forcing identity and revision from a stored document,
//! and projecting a document down to a field list.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, to_value};

use crate::error::{ServiceError, ServiceResult};

/// A JSON document: an ordered mapping from field name to value.
pub type Document = Map<String, Value>;

/// The store's native identity key.
pub const ID_FIELD: &str = "_id";

/// The store's revision (version token) key.
pub const REV_FIELD: &str = "_rev";

/// The key marking a write as a logical deletion.
pub const DELETED_FIELD: &str = "_deleted";

/// Converts any serializable value into a [`Document`].
///
/// # Errors
///
/// Returns [`ServiceError::Serialization`] if serialization fails, or
/// [`ServiceError::BadRequest`] if the value is not a JSON object.
///
/// # Example
///
/// ```ignore
/// use mangolayer::document::to_document;
/// use serde_json::json;
///
/// let doc = to_document(&json!({ "text": "hi" }))?;
/// assert_eq!(doc["text"], "hi");
/// ```
pub fn to_document<T: Serialize + ?Sized>(value: &T) -> ServiceResult<Document> {
    match to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(ServiceError::BadRequest(format!(
            "Expected a JSON object, got {other}"
        ))),
    }
}

/// Structural helpers on [`Document`].
pub trait DocumentExt {
    /// Returns the store-assigned `_id`, if present and a string.
    fn native_id(&self) -> Option<&str>;

    /// Returns the `_rev` token, if present and a string.
    fn revision(&self) -> Option<&str>;

    /// Returns `true` if `field` is absent or null.
    fn is_unset(&self, field: &str) -> bool;

    /// Shallow-overlays every field of `other` onto this document.
    fn overlay(&mut self, other: &Document);

    /// Copies `_id`, `_rev` and `id_field` from `source` onto this document,
    /// replacing whatever this document held for them. Keys absent on `source`
    /// are removed.
    fn force_identity(&mut self, source: &Document, id_field: &str);

    /// Returns a copy holding only `fields`, plus `id_field` which is always kept.
    fn select(&self, fields: &[String], id_field: &str) -> Document;
}

impl DocumentExt for Document {
    fn native_id(&self) -> Option<&str> {
        self.get(ID_FIELD).and_then(Value::as_str)
    }

    fn revision(&self) -> Option<&str> {
        self.get(REV_FIELD).and_then(Value::as_str)
    }

    fn is_unset(&self, field: &str) -> bool {
        matches!(self.get(field), None | Some(Value::Null))
    }

    fn overlay(&mut self, other: &Document) {
        for (key, value) in other {
            self.insert(key.clone(), value.clone());
        }
    }

    fn force_identity(&mut self, source: &Document, id_field: &str) {
        for key in [ID_FIELD, REV_FIELD, id_field] {
            match source.get(key) {
                Some(value) => {
                    self.insert(key.to_string(), value.clone());
                }
                None => {
                    self.remove(key);
                }
            }
        }
    }

    fn select(&self, fields: &[String], id_field: &str) -> Document {
        self.iter()
            .filter(|(key, _)| key.as_str() == id_field || fields.iter().any(|f| f == *key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// Either a single item or an ordered sequence of items.
///
/// Resource operations accept and return this shape: `create` takes one document
/// or many, and mutations return a single document when exactly one was affected.
/// Serialized untagged, so a JSON object and a JSON array both deserialize directly.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// A single item.
    One(T),
    /// An ordered sequence of items.
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Collapses a vector into [`OneOrMany::One`] if it holds exactly one item.
    pub fn collapse(mut items: Vec<T>) -> Self {
        match items.len() {
            1 => OneOrMany::One(items.remove(0)),
            _ => OneOrMany::Many(items),
        }
    }

    /// Converts into a vector, preserving order.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }

    /// Number of items held.
    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(items) => items.len(),
        }
    }

    /// Returns `true` if this holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the item if this is [`OneOrMany::One`].
    pub fn into_one(self) -> Option<T> {
        match self {
            OneOrMany::One(item) => Some(item),
            OneOrMany::Many(_) => None,
        }
    }

    /// Returns the items if this is [`OneOrMany::Many`].
    pub fn into_many(self) -> Option<Vec<T>> {
        match self {
            OneOrMany::One(_) => None,
            OneOrMany::Many(items) => Some(items),
        }
    }

    /// Applies `f` to every item, keeping the shape.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> OneOrMany<U> {
        match self {
            OneOrMany::One(item) => OneOrMany::One(f(item)),
            OneOrMany::Many(items) => OneOrMany::Many(items.into_iter().map(f).collect()),
        }
    }

    /// Mutable iterator over the items.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        match self {
            OneOrMany::One(item) => std::slice::from_mut(item).iter_mut(),
            OneOrMany::Many(items) => items.iter_mut(),
        }
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(item: T) -> Self {
        OneOrMany::One(item)
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(items: Vec<T>) -> Self {
        OneOrMany::Many(items)
    }
}
