//! Port abstraction over the document store.
//!
//! Provisioning and seeding only ever reach the store through this trait.
//! Adapters must make `upsert_if_absent` a single atomic operation: the store
//! either inserts the key plus defaults or matches an existing document and
//! leaves it untouched. A separate read-then-write is not acceptable.

use async_trait::async_trait;
use bson::Document;

use crate::domain::{CollectionStatus, DocumentId, DocumentKey, IndexDefinition, IndexKey};

use super::define_port_error;

define_port_error! {
    /// Errors raised by document store adapters.
    pub enum DocumentStoreError {
        /// The store could not be reached or refused the session.
        Connection { message: String } => "document store connection failed: {message}",
        /// A unique index rejected the write.
        DuplicateKey { collection: String, message: String } =>
            "duplicate key in {collection}: {message}",
        /// An index with the same name or key pattern already exists with a
        /// different definition.
        IndexConflict { collection: String, message: String } =>
            "index conflict on {collection}: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "document store query failed: {message}",
    }
}

/// What an atomic find-or-insert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertDisposition {
    /// No document matched; one was inserted from the key and defaults.
    Inserted,
    /// A document matched; nothing was written.
    Matched,
}

/// Port for the document store backing the delivery domain.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// List the names of existing collections.
    async fn collection_names(&self) -> Result<Vec<String>, DocumentStoreError>;

    /// Create a collection.
    ///
    /// Returns `AlreadyPresent` when another actor created it first.
    async fn create_collection(&self, name: &str)
    -> Result<CollectionStatus, DocumentStoreError>;

    /// List the indexes defined on a collection.
    ///
    /// A collection that does not exist has no indexes.
    async fn list_indexes(
        &self,
        collection: &str,
    ) -> Result<Vec<IndexDefinition>, DocumentStoreError>;

    /// Create a named index.
    ///
    /// Creating an index whose name and shape already exist is a no-op.
    /// Adapters report a same-name or same-keys mismatch as
    /// [`DocumentStoreError::IndexConflict`] and never replace the existing
    /// index.
    async fn create_index(
        &self,
        collection: &str,
        index: &IndexDefinition,
    ) -> Result<(), DocumentStoreError>;

    /// Insert `key` merged with `defaults` unless a document matching `key`
    /// exists, in one atomic operation.
    ///
    /// `defaults` are applied only on insert; an existing document is never
    /// modified. Losing a concurrent insert on a uniquely indexed key surfaces
    /// as [`DocumentStoreError::DuplicateKey`].
    async fn upsert_if_absent(
        &self,
        collection: &str,
        key: &DocumentKey,
        defaults: Document,
    ) -> Result<UpsertDisposition, DocumentStoreError>;

    /// Look up the identifier of the document matching `key`.
    async fn find_id(
        &self,
        collection: &str,
        key: &DocumentKey,
    ) -> Result<Option<DocumentId>, DocumentStoreError>;

    /// Return documents whose top-level fields equal those in `filter`,
    /// ordered by `sort` (store order when empty).
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        sort: &[IndexKey],
    ) -> Result<Vec<Document>, DocumentStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn duplicate_key_error_names_collection() {
        let err = DocumentStoreError::duplicate_key("users", "E11000 email");
        assert_eq!(err.to_string(), "duplicate key in users: E11000 email");
    }

    #[rstest]
    fn connection_error_preserves_message() {
        let err = DocumentStoreError::connection("server selection timed out");
        assert!(matches!(err, DocumentStoreError::Connection { .. }));
        assert!(err.to_string().contains("server selection timed out"));
    }
}
