//! Store wrapper that injects upsert failures for one collection.

use std::sync::Arc;

use async_trait::async_trait;
use bson::Document;
use delivery_store::domain::ports::{DocumentStore, DocumentStoreError, UpsertDisposition};
use delivery_store::domain::{
    Collection, CollectionStatus, DocumentId, DocumentKey, IndexDefinition, IndexKey,
};
use delivery_store::outbound::memory::InMemoryDocumentStore;

/// Store that delegates to an in-memory store but fails every upsert into
/// one collection with a connection error.
pub struct FailingUpserts {
    /// Backing store.
    pub inner: Arc<InMemoryDocumentStore>,
    /// Collection whose upserts fail.
    pub failing: Collection,
}

#[async_trait]
impl DocumentStore for FailingUpserts {
    async fn collection_names(&self) -> Result<Vec<String>, DocumentStoreError> {
        self.inner.collection_names().await
    }

    async fn create_collection(&self, name: &str) -> Result<CollectionStatus, DocumentStoreError> {
        self.inner.create_collection(name).await
    }

    async fn list_indexes(
        &self,
        collection: &str,
    ) -> Result<Vec<IndexDefinition>, DocumentStoreError> {
        self.inner.list_indexes(collection).await
    }

    async fn create_index(
        &self,
        collection: &str,
        index: &IndexDefinition,
    ) -> Result<(), DocumentStoreError> {
        self.inner.create_index(collection, index).await
    }

    async fn upsert_if_absent(
        &self,
        collection: &str,
        key: &DocumentKey,
        defaults: Document,
    ) -> Result<UpsertDisposition, DocumentStoreError> {
        if collection == self.failing.name() {
            return Err(DocumentStoreError::connection("connection reset by peer"));
        }
        self.inner.upsert_if_absent(collection, key, defaults).await
    }

    async fn find_id(
        &self,
        collection: &str,
        key: &DocumentKey,
    ) -> Result<Option<DocumentId>, DocumentStoreError> {
        self.inner.find_id(collection, key).await
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        sort: &[IndexKey],
    ) -> Result<Vec<Document>, DocumentStoreError> {
        self.inner.find(collection, filter, sort).await
    }
}
