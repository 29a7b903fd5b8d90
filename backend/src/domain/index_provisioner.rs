//! Applies the named index catalogue to each collection.
//!
//! An index whose name and shape already match is left alone. A name or key
//! pattern that is already taken by a different definition aborts the run:
//! indexes are never dropped and recreated behind an operator's back.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::domain::ports::{DocumentStore, DocumentStoreError};
use crate::domain::{Collection, IndexDefinition, required_indexes};

/// Whether an index was created or already in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    /// This run created the index.
    Created,
    /// An identical index already existed.
    AlreadyPresent,
}

/// Result of ensuring one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOutcome {
    /// Collection carrying the index.
    pub collection: Collection,
    /// Index name.
    pub index: String,
    /// What ensuring it did.
    pub status: IndexStatus,
}

/// Errors raised while provisioning indexes.
#[derive(Debug, Error)]
pub enum IndexProvisioningError {
    /// The name or key pattern is taken by an index with a different
    /// definition.
    #[error("index {index} on {collection} conflicts with existing index: {existing}")]
    Conflict {
        /// Collection carrying the index.
        collection: Collection,
        /// Name of the index being provisioned.
        index: String,
        /// Description of the definition already in place.
        existing: String,
    },
    /// The store failed while listing or creating indexes.
    #[error("failed to provision indexes on {collection}: {source}")]
    Store {
        /// Collection carrying the index.
        collection: Collection,
        /// Underlying store failure.
        #[source]
        source: DocumentStoreError,
    },
}

/// Ensures named indexes exist with the expected shape.
#[derive(Clone)]
pub struct IndexProvisioner<S> {
    store: Arc<S>,
}

impl<S> IndexProvisioner<S> {
    /// Create a provisioner over the given store.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> IndexProvisioner<S>
where
    S: DocumentStore,
{
    /// Ensure each of `specs` exists on `collection`.
    ///
    /// Existing indexes not named in `specs` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`IndexProvisioningError::Conflict`] when an index name or key
    /// pattern is already used by a different definition, and
    /// [`IndexProvisioningError::Store`] when the store fails.
    pub async fn ensure_indexes(
        &self,
        collection: Collection,
        specs: &[IndexDefinition],
    ) -> Result<Vec<IndexOutcome>, IndexProvisioningError> {
        let to_error = |source| IndexProvisioningError::Store { collection, source };
        let existing = self
            .store
            .list_indexes(collection.name())
            .await
            .map_err(to_error)?;

        let mut outcomes = Vec::with_capacity(specs.len());
        for spec in specs {
            let status = if let Some(current) = existing.iter().find(|i| i.name == spec.name) {
                if !current.same_shape(spec) {
                    return Err(conflict(collection, spec, current));
                }
                IndexStatus::AlreadyPresent
            } else if let Some(current) = existing.iter().find(|i| i.same_shape(spec)) {
                return Err(conflict(collection, spec, current));
            } else {
                match self.store.create_index(collection.name(), spec).await {
                    Ok(()) => IndexStatus::Created,
                    Err(DocumentStoreError::IndexConflict { message, .. }) => {
                        return Err(IndexProvisioningError::Conflict {
                            collection,
                            index: spec.name.clone(),
                            existing: message,
                        });
                    }
                    Err(other) => return Err(to_error(other)),
                }
            };

            match status {
                IndexStatus::Created => {
                    info!(collection = %collection, index = %spec.name, "index created");
                }
                IndexStatus::AlreadyPresent => {
                    info!(collection = %collection, index = %spec.name, "index already present");
                }
            }
            outcomes.push(IndexOutcome {
                collection,
                index: spec.name.clone(),
                status,
            });
        }
        Ok(outcomes)
    }

    /// Ensure the required catalogue on every collection, in provisioning
    /// order.
    ///
    /// # Errors
    ///
    /// Returns the first [`IndexProvisioningError`] encountered.
    pub async fn ensure_required(&self) -> Result<Vec<IndexOutcome>, IndexProvisioningError> {
        let mut outcomes = Vec::new();
        for collection in Collection::ALL {
            let specs = required_indexes(collection);
            outcomes.extend(self.ensure_indexes(collection, &specs).await?);
        }
        Ok(outcomes)
    }
}

fn conflict(
    collection: Collection,
    spec: &IndexDefinition,
    current: &IndexDefinition,
) -> IndexProvisioningError {
    warn!(
        collection = %collection,
        index = %spec.name,
        wanted = %spec,
        existing = %current,
        "index definition conflict"
    );
    IndexProvisioningError::Conflict {
        collection,
        index: spec.name.clone(),
        existing: current.to_string(),
    }
}
