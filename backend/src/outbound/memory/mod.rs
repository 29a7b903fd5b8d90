//! Process-local `DocumentStore` adapter.
//!
//! Keeps every collection in memory behind one mutex. Each port operation
//! runs entirely under the lock, which makes `upsert_if_absent` atomic in
//! the same sense as the server's find-and-modify. Unique indexes are
//! enforced on insert, treating a missing field as `null` the way MongoDB
//! does.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bson::{Bson, Document};
use tracing::debug;

use crate::domain::ports::{DocumentStore, DocumentStoreError, UpsertDisposition};
use crate::domain::{
    CollectionStatus, DocumentId, DocumentKey, IndexDefinition, IndexKey, KeyDirection,
};

/// Name of the index every collection carries on `_id`.
const ID_INDEX: &str = "_id_";

#[derive(Debug)]
struct StoredCollection {
    documents: Vec<Document>,
    indexes: Vec<IndexDefinition>,
}

impl StoredCollection {
    fn new() -> Self {
        Self {
            documents: Vec::new(),
            indexes: vec![IndexDefinition::named(ID_INDEX).key(IndexKey::ascending("_id"))],
        }
    }

    fn position(&self, key: &DocumentKey) -> Option<usize> {
        self.documents.iter().position(|document| key.matches(document))
    }

    /// First unique index that `candidate` would violate.
    fn unique_violation(&self, candidate: &Document) -> Option<&IndexDefinition> {
        self.indexes
            .iter()
            .filter(|index| index.unique && covers(index, candidate))
            .find(|index| {
                let wanted = key_values(index, candidate);
                self.documents
                    .iter()
                    .filter(|existing| covers(index, existing))
                    .any(|existing| key_values(index, existing) == wanted)
            })
    }

    fn insert(&mut self, collection: &str, mut document: Document) -> Result<DocumentId, DocumentStoreError> {
        let id = DocumentId::of(&document).unwrap_or_else(DocumentId::generate);
        document.insert("_id", id);
        if let Some(index) = self.unique_violation(&document) {
            return Err(DocumentStoreError::duplicate_key(
                collection,
                format!("E11000 duplicate key error collection: {collection} index: {}", index.name),
            ));
        }
        self.documents.push(document);
        Ok(id)
    }
}

/// Whether `index` holds an entry for `document`.
fn covers(index: &IndexDefinition, document: &Document) -> bool {
    if index.sparse && !index.keys.iter().any(|key| document.contains_key(&key.field)) {
        return false;
    }
    match &index.partial_filter {
        Some(filter) => matches_filter(filter, document),
        None => true,
    }
}

/// Equality match of every filter field.
fn matches_filter(filter: &Document, document: &Document) -> bool {
    filter
        .iter()
        .all(|(field, value)| document.get(field) == Some(value))
}

fn key_values(index: &IndexDefinition, document: &Document) -> Vec<Bson> {
    index
        .keys
        .iter()
        .map(|key| document.get(&key.field).cloned().unwrap_or(Bson::Null))
        .collect()
}

/// In-memory `DocumentStore` with unique index enforcement.
///
/// # Example
///
/// ```rust
/// use bson::doc;
/// use delivery_store::outbound::memory::InMemoryDocumentStore;
///
/// let store = InMemoryDocumentStore::new();
/// store.insert_one("users", doc! { "email": "a@example.com" }).expect("insert");
/// assert_eq!(store.count("users").expect("count"), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: Mutex<BTreeMap<String, StoredCollection>>,
}

impl InMemoryDocumentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, StoredCollection>>, DocumentStoreError> {
        self.collections
            .lock()
            .map_err(|_| DocumentStoreError::query("in-memory store lock poisoned"))
    }

    /// Insert a document, creating the collection if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DuplicateKey`] when a unique index
    /// rejects the document; nothing is stored in that case.
    pub fn insert_one(&self, collection: &str, document: Document) -> Result<DocumentId, DocumentStoreError> {
        let mut collections = self.lock()?;
        collections
            .entry(collection.to_owned())
            .or_insert_with(StoredCollection::new)
            .insert(collection, document)
    }

    /// Overwrite `fields` on the document matching `key`, as an external
    /// writer would.
    ///
    /// Returns whether a document matched.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Query`] if the store lock is poisoned.
    pub fn set_fields(
        &self,
        collection: &str,
        key: &DocumentKey,
        fields: Document,
    ) -> Result<bool, DocumentStoreError> {
        let mut collections = self.lock()?;
        let Some(target) = collections
            .get_mut(collection)
            .and_then(|stored| stored.position(key).and_then(|at| stored.documents.get_mut(at)))
        else {
            return Ok(false);
        };
        for (field, value) in fields {
            target.insert(field, value);
        }
        Ok(true)
    }

    /// Snapshot of every document in `collection`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Query`] if the store lock is poisoned.
    pub fn documents(&self, collection: &str) -> Result<Vec<Document>, DocumentStoreError> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .map(|stored| stored.documents.clone())
            .unwrap_or_default())
    }

    /// Number of documents in `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Query`] if the store lock is poisoned.
    pub fn count(&self, collection: &str) -> Result<usize, DocumentStoreError> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .map_or(0, |stored| stored.documents.len()))
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn collection_names(&self) -> Result<Vec<String>, DocumentStoreError> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn create_collection(&self, name: &str) -> Result<CollectionStatus, DocumentStoreError> {
        let mut collections = self.lock()?;
        if collections.contains_key(name) {
            return Ok(CollectionStatus::AlreadyPresent);
        }
        collections.insert(name.to_owned(), StoredCollection::new());
        Ok(CollectionStatus::Created)
    }

    async fn list_indexes(
        &self,
        collection: &str,
    ) -> Result<Vec<IndexDefinition>, DocumentStoreError> {
        Ok(self
            .lock()?
            .get(collection)
            .map(|stored| stored.indexes.clone())
            .unwrap_or_default())
    }

    async fn create_index(
        &self,
        collection: &str,
        index: &IndexDefinition,
    ) -> Result<(), DocumentStoreError> {
        let mut collections = self.lock()?;
        let stored = collections
            .entry(collection.to_owned())
            .or_insert_with(StoredCollection::new);

        if let Some(existing) = stored.indexes.iter().find(|i| i.name == index.name) {
            if existing.same_shape(index) {
                return Ok(());
            }
            return Err(DocumentStoreError::index_conflict(
                collection,
                format!("An existing index has the same name as the requested index: {existing}"),
            ));
        }
        if let Some(existing) = stored.indexes.iter().find(|i| i.keys == index.keys) {
            return Err(DocumentStoreError::index_conflict(
                collection,
                format!("Index already exists with a different name: {existing}"),
            ));
        }
        if index.unique {
            let mut seen: Vec<Vec<Bson>> = Vec::with_capacity(stored.documents.len());
            for document in stored.documents.iter().filter(|d| covers(index, d)) {
                let values = key_values(index, document);
                if seen.contains(&values) {
                    return Err(DocumentStoreError::duplicate_key(
                        collection,
                        format!("E11000 duplicate key error building index {}", index.name),
                    ));
                }
                seen.push(values);
            }
        }
        stored.indexes.push(index.clone());
        Ok(())
    }

    async fn upsert_if_absent(
        &self,
        collection: &str,
        key: &DocumentKey,
        defaults: Document,
    ) -> Result<UpsertDisposition, DocumentStoreError> {
        let mut collections = self.lock()?;
        let stored = collections
            .entry(collection.to_owned())
            .or_insert_with(StoredCollection::new);
        if stored.position(key).is_some() {
            return Ok(UpsertDisposition::Matched);
        }

        let mut document = key.to_filter();
        for (field, value) in defaults {
            document.insert(field, value);
        }
        let id = stored.insert(collection, document)?;
        debug!(collection, key = %key, id = %id, "in-memory upsert inserted document");
        Ok(UpsertDisposition::Inserted)
    }

    async fn find_id(
        &self,
        collection: &str,
        key: &DocumentKey,
    ) -> Result<Option<DocumentId>, DocumentStoreError> {
        let collections = self.lock()?;
        Ok(collections.get(collection).and_then(|stored| {
            stored
                .documents
                .iter()
                .find(|document| key.matches(document))
                .and_then(DocumentId::of)
        }))
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        sort: &[IndexKey],
    ) -> Result<Vec<Document>, DocumentStoreError> {
        let collections = self.lock()?;
        let Some(stored) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let mut matching: Vec<Document> = stored
            .documents
            .iter()
            .filter(|document| matches_filter(&filter, document))
            .cloned()
            .collect();
        matching.sort_by(|left, right| compare_by_keys(left, right, sort));
        Ok(matching)
    }
}

fn compare_by_keys(left: &Document, right: &Document, keys: &[IndexKey]) -> Ordering {
    for key in keys {
        let ordering = compare_values(left.get(&key.field), right.get(&key.field));
        let ordering = match key.direction {
            KeyDirection::Descending => ordering.reverse(),
            KeyDirection::Ascending | KeyDirection::Special(_) => ordering,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Rank of a BSON type in the server's cross-type sort order.
const fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        _ => 12,
    }
}

fn compare_values(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let null = Bson::Null;
    let (a, b) = (left.unwrap_or(&null), right.unwrap_or(&null));
    match (a, b) {
        (Bson::Int32(l), Bson::Int32(r)) => l.cmp(r),
        (Bson::Int64(l), Bson::Int64(r)) => l.cmp(r),
        (Bson::Int32(l), Bson::Int64(r)) => i64::from(*l).cmp(r),
        (Bson::Int64(l), Bson::Int32(r)) => l.cmp(&i64::from(*r)),
        (Bson::Double(l), Bson::Double(r)) => l.total_cmp(r),
        (Bson::Int32(l), Bson::Double(r)) => f64::from(*l).total_cmp(r),
        (Bson::Double(l), Bson::Int32(r)) => l.total_cmp(&f64::from(*r)),
        (Bson::String(l), Bson::String(r)) => l.cmp(r),
        (Bson::ObjectId(l), Bson::ObjectId(r)) => l.cmp(r),
        (Bson::Boolean(l), Bson::Boolean(r)) => l.cmp(r),
        (Bson::DateTime(l), Bson::DateTime(r)) => l.cmp(r),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
