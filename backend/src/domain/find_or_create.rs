//! Atomic find-or-create keyed by a stable identifying field.
//!
//! The operation has two branches. The store either inserts the key merged
//! with the defaults, or matches an existing document and writes nothing.
//! A duplicate-key rejection means a concurrent caller won the insert and is
//! folded into the matched branch. Both branches then resolve the identifier
//! by looking the key up again, so callers always receive the id of the
//! document that actually holds the key.

use std::fmt;
use std::sync::Arc;

use bson::Document;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::ports::{DocumentStore, DocumentStoreError, UpsertDisposition};
use crate::domain::{Collection, DocumentId, DocumentKey};

/// Whether find-or-create inserted the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// This call inserted the document.
    Created,
    /// The document already existed; no field was written.
    AlreadyPresent,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::AlreadyPresent => "already present",
        })
    }
}

/// Identifier resolved by find-or-create together with what happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoundOrCreated {
    /// Identifier of the document holding the key.
    pub id: DocumentId,
    /// Whether this call inserted it.
    pub disposition: Disposition,
}

/// Errors raised by [`FindOrCreate`].
#[derive(Debug, Error)]
pub enum FindOrCreateError {
    /// The store failed for a reason other than a lost insert race.
    #[error("find-or-create on {collection} failed: {source}")]
    Store {
        /// Target collection.
        collection: Collection,
        /// Underlying store failure.
        #[source]
        source: DocumentStoreError,
    },
    /// No document holds the key even after the upsert reported success.
    #[error("no document in {collection} matches {key} after upsert")]
    UnresolvedKey {
        /// Target collection.
        collection: Collection,
        /// Key that could not be resolved, as `field = value`.
        key: String,
    },
}

/// Find-or-create over a [`DocumentStore`].
#[derive(Clone)]
pub struct FindOrCreate<S> {
    store: Arc<S>,
}

impl<S> FindOrCreate<S> {
    /// Wrap the given store.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> FindOrCreate<S>
where
    S: DocumentStore,
{
    /// Return the id of the document in `collection` matching `key`,
    /// inserting `key` merged with `defaults` if none exists.
    ///
    /// `defaults` never touch an existing document. A `defaults` entry for
    /// the key field is discarded so the stored key always equals `key`.
    ///
    /// # Errors
    ///
    /// Returns [`FindOrCreateError::Store`] for store failures other than a
    /// duplicate key, and [`FindOrCreateError::UnresolvedKey`] when the key
    /// lookup after the upsert finds nothing.
    pub async fn find_or_create(
        &self,
        collection: Collection,
        key: &DocumentKey,
        mut defaults: Document,
    ) -> Result<FoundOrCreated, FindOrCreateError> {
        let to_error = |source| FindOrCreateError::Store { collection, source };
        defaults.remove(key.field());

        let disposition = match self
            .store
            .upsert_if_absent(collection.name(), key, defaults)
            .await
        {
            Ok(UpsertDisposition::Inserted) => Disposition::Created,
            Ok(UpsertDisposition::Matched) => Disposition::AlreadyPresent,
            Err(DocumentStoreError::DuplicateKey { message, .. }) => {
                debug!(
                    collection = %collection,
                    key = %key,
                    %message,
                    "lost insert race; resolving existing document"
                );
                Disposition::AlreadyPresent
            }
            Err(other) => return Err(to_error(other)),
        };

        let id = self
            .store
            .find_id(collection.name(), key)
            .await
            .map_err(to_error)?
            .ok_or_else(|| FindOrCreateError::UnresolvedKey {
                collection,
                key: key.to_string(),
            })?;

        info!(
            collection = %collection,
            key = %key,
            id = %id,
            disposition = %disposition,
            "fixture resolved"
        );
        Ok(FoundOrCreated { id, disposition })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::MockDocumentStore;
    use bson::doc;
    use rstest::{fixture, rstest};

    #[fixture]
    fn marker() -> DocumentKey {
        DocumentKey::new("seedMarker", "seed_delivery_1")
    }

    fn store_resolving_to(
        id: DocumentId,
        upsert: Result<UpsertDisposition, DocumentStoreError>,
    ) -> MockDocumentStore {
        let mut store = MockDocumentStore::new();
        store
            .expect_upsert_if_absent()
            .times(1)
            .return_once(move |_, _, _| upsert);
        store
            .expect_find_id()
            .times(1)
            .return_once(move |_, _| Ok(Some(id)));
        store
    }

    #[rstest]
    #[case(Ok(UpsertDisposition::Inserted), Disposition::Created)]
    #[case(Ok(UpsertDisposition::Matched), Disposition::AlreadyPresent)]
    #[case(
        Err(DocumentStoreError::duplicate_key("deliveries", "E11000")),
        Disposition::AlreadyPresent
    )]
    #[tokio::test]
    async fn every_branch_resolves_id_by_key(
        marker: DocumentKey,
        #[case] upsert: Result<UpsertDisposition, DocumentStoreError>,
        #[case] expected: Disposition,
    ) {
        let id = DocumentId::generate();
        let service = FindOrCreate::new(Arc::new(store_resolving_to(id, upsert)));

        let outcome = service
            .find_or_create(Collection::Deliveries, &marker, doc! { "price": 12.5 })
            .await
            .expect("find-or-create succeeds");

        assert_eq!(outcome, FoundOrCreated { id, disposition: expected });
    }

    #[rstest]
    #[tokio::test]
    async fn key_field_is_stripped_from_defaults(marker: DocumentKey) {
        let mut store = MockDocumentStore::new();
        store
            .expect_upsert_if_absent()
            .withf(|_, _, defaults| !defaults.contains_key("seedMarker"))
            .times(1)
            .return_once(|_, _, _| Ok(UpsertDisposition::Inserted));
        let id = DocumentId::generate();
        store
            .expect_find_id()
            .return_once(move |_, _| Ok(Some(id)));

        let service = FindOrCreate::new(Arc::new(store));
        service
            .find_or_create(
                Collection::Deliveries,
                &marker,
                doc! { "seedMarker": "something_else", "price": 12.5 },
            )
            .await
            .expect("find-or-create succeeds");
    }

    #[rstest]
    #[tokio::test]
    async fn missing_document_after_upsert_is_unresolved(marker: DocumentKey) {
        let mut store = MockDocumentStore::new();
        store
            .expect_upsert_if_absent()
            .return_once(|_, _, _| Ok(UpsertDisposition::Matched));
        store.expect_find_id().return_once(|_, _| Ok(None));

        let service = FindOrCreate::new(Arc::new(store));
        let error = service
            .find_or_create(Collection::Deliveries, &marker, Document::new())
            .await
            .expect_err("key cannot be resolved");

        assert!(matches!(error, FindOrCreateError::UnresolvedKey { .. }));
    }

    #[rstest]
    #[tokio::test]
    async fn connection_failure_skips_lookup(marker: DocumentKey) {
        let mut store = MockDocumentStore::new();
        store
            .expect_upsert_if_absent()
            .return_once(|_, _, _| Err(DocumentStoreError::connection("reset by peer")));
        store.expect_find_id().times(0);

        let service = FindOrCreate::new(Arc::new(store));
        let error = service
            .find_or_create(Collection::Deliveries, &marker, Document::new())
            .await
            .expect_err("store is down");

        assert!(matches!(
            error,
            FindOrCreateError::Store {
                source: DocumentStoreError::Connection { .. },
                ..
            }
        ));
    }
}
