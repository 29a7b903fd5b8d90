//! Identifiers and identifying keys for stored documents.

use std::fmt;

use bson::oid::ObjectId;
use bson::{Bson, Document};

/// Store-assigned document identifier.
///
/// Wraps the store's object id so domain code never confuses a document
/// identifier with an arbitrary field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(ObjectId);

impl DocumentId {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(ObjectId::new())
    }

    /// Wrap an existing object id.
    #[must_use]
    pub const fn from_object_id(id: ObjectId) -> Self {
        Self(id)
    }

    /// Borrow the underlying object id.
    #[must_use]
    pub const fn as_object_id(&self) -> &ObjectId {
        &self.0
    }

    /// Read the `_id` field of a document, if it is an object id.
    #[must_use]
    pub fn of(document: &Document) -> Option<Self> {
        document.get_object_id("_id").ok().map(Self)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

impl From<DocumentId> for Bson {
    fn from(value: DocumentId) -> Self {
        Self::ObjectId(value.0)
    }
}

/// A field/value pair that identifies exactly one logical fixture document.
///
/// Either a natural unique key such as `email`, or a seed marker.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentKey {
    field: &'static str,
    value: Bson,
}

impl DocumentKey {
    /// Build a key from a field name and value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bson::doc;
    /// use delivery_store::domain::DocumentKey;
    ///
    /// let key = DocumentKey::new("seedMarker", "seed_delivery_1");
    /// assert_eq!(key.to_filter(), doc! { "seedMarker": "seed_delivery_1" });
    /// ```
    pub fn new(field: &'static str, value: impl Into<Bson>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }

    /// Identifying field name.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        self.field
    }

    /// Identifying value.
    #[must_use]
    pub const fn value(&self) -> &Bson {
        &self.value
    }

    /// Equality filter selecting documents with this key.
    #[must_use]
    pub fn to_filter(&self) -> Document {
        let mut filter = Document::new();
        filter.insert(self.field, self.value.clone());
        filter
    }

    /// True when `document` carries this key.
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        document.get(self.field) == Some(&self.value)
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.field, self.value)
    }
}
