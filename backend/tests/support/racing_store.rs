//! Store wrapper that forces two find-or-create calls to race.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bson::Document;
use delivery_store::domain::ports::{DocumentStore, DocumentStoreError, UpsertDisposition};
use delivery_store::domain::{
    CollectionStatus, DocumentId, DocumentKey, IndexDefinition, IndexKey,
};
use delivery_store::outbound::memory::InMemoryDocumentStore;
use tokio::sync::Barrier;

/// Store whose upsert is a non-atomic read then insert.
///
/// Both racers read the key before either inserts, so both see it absent.
/// The loser's insert is rejected by the unique index on the key and the
/// rejection is passed through as [`DocumentStoreError::DuplicateKey`].
pub struct RacingUpserts {
    inner: Arc<InMemoryDocumentStore>,
    gate: Barrier,
    duplicate_keys: AtomicUsize,
}

impl RacingUpserts {
    /// Wrap `inner`, pairing up two concurrent upserts.
    #[must_use]
    pub fn new(inner: Arc<InMemoryDocumentStore>) -> Self {
        Self {
            inner,
            gate: Barrier::new(2),
            duplicate_keys: AtomicUsize::new(0),
        }
    }

    /// Number of inserts rejected with a duplicate key.
    #[must_use]
    pub fn duplicate_keys(&self) -> usize {
        self.duplicate_keys.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for RacingUpserts {
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
        let seen = self.inner.find_id(collection, key).await?;
        self.gate.wait().await;
        if seen.is_some() {
            return Ok(UpsertDisposition::Matched);
        }

        let mut document = key.to_filter();
        document.extend(defaults);
        match self.inner.insert_one(collection, document) {
            Ok(_) => Ok(UpsertDisposition::Inserted),
            Err(error @ DocumentStoreError::DuplicateKey { .. }) => {
                self.duplicate_keys.fetch_add(1, Ordering::SeqCst);
                Err(error)
            }
            Err(other) => Err(other),
        }
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
