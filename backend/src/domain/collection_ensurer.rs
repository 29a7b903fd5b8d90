//! Guarantees that each named collection exists.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::domain::Collection;
use crate::domain::ports::{DocumentStore, DocumentStoreError};

/// Whether a provisioning step created something or found it in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    /// This run created the collection.
    Created,
    /// The collection already existed.
    AlreadyPresent,
}

/// Handle to an ensured collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionHandle {
    /// The ensured collection.
    pub collection: Collection,
    /// What ensuring it did.
    pub status: CollectionStatus,
}

/// Failure to ensure a collection. Fatal for the run.
#[derive(Debug, Error)]
#[error("failed to ensure collection {collection}: {source}")]
pub struct CollectionError {
    /// Collection being ensured.
    pub collection: Collection,
    /// Underlying store failure.
    #[source]
    pub source: DocumentStoreError,
}

/// Creates missing collections and leaves existing ones alone.
#[derive(Clone)]
pub struct CollectionEnsurer<S> {
    store: Arc<S>,
}

impl<S> CollectionEnsurer<S> {
    /// Create an ensurer over the given store.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> CollectionEnsurer<S>
where
    S: DocumentStore,
{
    /// Ensure `collection` exists, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError`] when the store cannot be queried or the
    /// collection cannot be created.
    pub async fn ensure(&self, collection: Collection) -> Result<CollectionHandle, CollectionError> {
        let to_error = |source| CollectionError { collection, source };
        let existing = self.store.collection_names().await.map_err(to_error)?;

        let status = if existing.iter().any(|name| name == collection.name()) {
            CollectionStatus::AlreadyPresent
        } else {
            self.store
                .create_collection(collection.name())
                .await
                .map_err(to_error)?
        };

        match status {
            CollectionStatus::Created => info!(collection = %collection, "collection created"),
            CollectionStatus::AlreadyPresent => {
                info!(collection = %collection, "collection already present");
            }
        }

        Ok(CollectionHandle { collection, status })
    }

    /// Ensure every collection in [`Collection::ALL`], stopping at the first
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`CollectionError`] encountered.
    pub async fn ensure_all(&self) -> Result<Vec<CollectionHandle>, CollectionError> {
        let mut handles = Vec::with_capacity(Collection::ALL.len());
        for collection in Collection::ALL {
            handles.push(self.ensure(collection).await?);
        }
        Ok(handles)
    }
}
