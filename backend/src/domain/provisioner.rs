//! Provisioning service: collections, then indexes, then fixtures.
//!
//! Each phase runs to completion before the next starts and the first
//! failure aborts the run. Rerunning is the recovery path; every phase is
//! idempotent.

use std::sync::Arc;

use mockable::Clock;
use thiserror::Error;
use tracing::info;

use crate::domain::ports::DocumentStore;
use crate::domain::{
    AuditError, AuditReport, CollectionEnsurer, CollectionError, CollectionHandle, FixtureAudit,
    IndexOutcome, IndexProvisioner, IndexProvisioningError, SeedEngine, SeedError, SeedReport,
};

/// Everything a successful run did.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisioningReport {
    /// Ensured collections.
    pub collections: Vec<CollectionHandle>,
    /// Ensured indexes.
    pub indexes: Vec<IndexOutcome>,
    /// Resolved fixtures.
    pub seed: SeedReport,
    /// Post-seed audit findings.
    pub audit: AuditReport,
}

/// Fatal provisioning failures.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// A collection could not be ensured.
    #[error(transparent)]
    Collection(#[from] CollectionError),
    /// An index could not be ensured.
    #[error(transparent)]
    Index(#[from] IndexProvisioningError),
    /// Seeding aborted.
    #[error(transparent)]
    Seed(#[from] SeedError),
    /// The seeded graph failed its audit.
    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// Runs every provisioning phase against one store.
pub struct Provisioner<S> {
    collections: CollectionEnsurer<S>,
    indexes: IndexProvisioner<S>,
    seed: SeedEngine<S>,
    audit: FixtureAudit<S>,
}

impl<S> Provisioner<S> {
    /// Create a provisioner over `store`, timestamping fixtures with `clock`.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            collections: CollectionEnsurer::new(Arc::clone(&store)),
            indexes: IndexProvisioner::new(Arc::clone(&store)),
            seed: SeedEngine::new(Arc::clone(&store), clock),
            audit: FixtureAudit::new(store),
        }
    }
}

impl<S> Provisioner<S>
where
    S: DocumentStore,
{
    /// Ensure collections and indexes, seed fixtures, and audit the result.
    ///
    /// # Errors
    ///
    /// Returns the first [`ProvisioningError`]; an inconsistent audit is
    /// reported as [`ProvisioningError::Audit`].
    pub async fn run(&self) -> Result<ProvisioningReport, ProvisioningError> {
        let collections = self.collections.ensure_all().await?;
        let indexes = self.indexes.ensure_required().await?;
        let seed = self.seed.run().await?;
        let audit = self.audit.run().await?;
        if !audit.is_consistent() {
            return Err(AuditError::Inconsistent { report: audit }.into());
        }

        info!(
            collections = collections.len(),
            indexes = indexes.len(),
            fixtures = seed.fixtures.len(),
            created = seed.created(),
            "provisioning complete"
        );
        Ok(ProvisioningReport {
            collections,
            indexes,
            seed,
            audit,
        })
    }
}
