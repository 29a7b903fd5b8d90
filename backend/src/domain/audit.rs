//! Read-back audit of the seeded fixture graph.
//!
//! Counts the documents holding each fixture key and checks that every
//! reference field of those fixture documents resolves to a stored
//! document. Documents outside the fixture keys are never inspected.

use std::fmt;
use std::sync::Arc;

use bson::oid::ObjectId;
use bson::{Bson, Document, doc};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::ports::{DocumentStore, DocumentStoreError};
use crate::domain::{Collection, DocumentId, SeedStep};

/// A reference field and the collection it points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceRule {
    /// Collection holding the reference.
    pub source: Collection,
    /// Reference field.
    pub field: &'static str,
    /// Collection the reference must resolve in.
    pub target: Collection,
    /// Whether `null` is an acceptable value.
    pub nullable: bool,
}

/// Reference fields checked by the audit.
pub const REFERENCE_RULES: [ReferenceRule; 4] = [
    ReferenceRule {
        source: Collection::Deliveries,
        field: "customerId",
        target: Collection::Users,
        nullable: false,
    },
    ReferenceRule {
        source: Collection::Deliveries,
        field: "courierId",
        target: Collection::Users,
        nullable: true,
    },
    ReferenceRule {
        source: Collection::TrackingEvents,
        field: "deliveryId",
        target: Collection::Deliveries,
        nullable: false,
    },
    ReferenceRule {
        source: Collection::Notifications,
        field: "userId",
        target: Collection::Users,
        nullable: false,
    },
];

/// How many documents hold a fixture's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixtureCount {
    /// Fixture step.
    pub step: SeedStep,
    /// Documents holding its key; exactly one after a successful seed.
    pub count: usize,
}

/// A reference that does not resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct DanglingReference {
    /// Rule that was violated.
    pub rule: ReferenceRule,
    /// Referencing document, when it has an object id.
    pub document: Option<DocumentId>,
    /// Offending value.
    pub value: Bson,
}

impl fmt::Display for DanglingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let document = self
            .document
            .map_or_else(|| "<no id>".to_owned(), |id| id.to_string());
        write!(
            f,
            "{}.{} of {document} = {} does not resolve in {}",
            self.rule.source, self.rule.field, self.value, self.rule.target
        )
    }
}

/// Outcome of an audit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditReport {
    /// Per-fixture document counts, in plan order.
    pub counts: Vec<FixtureCount>,
    /// References that do not resolve.
    pub dangling: Vec<DanglingReference>,
}

impl AuditReport {
    /// True when every fixture exists exactly once and no reference dangles.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.dangling.is_empty() && self.counts.iter().all(|c| c.count == 1)
    }

    /// Count recorded for `step`.
    #[must_use]
    pub fn count_of(&self, step: SeedStep) -> Option<usize> {
        self.counts.iter().find(|c| c.step == step).map(|c| c.count)
    }
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let miscounted = self.counts.iter().filter(|c| c.count != 1).count();
        write!(
            f,
            "{miscounted} missing or duplicated fixtures, {} dangling references",
            self.dangling.len()
        )
    }
}

/// Errors raised by [`FixtureAudit`].
#[derive(Debug, Error)]
pub enum AuditError {
    /// The store could not be read.
    #[error("failed to audit {collection}: {source}")]
    Store {
        /// Collection being read.
        collection: Collection,
        /// Underlying store failure.
        #[source]
        source: DocumentStoreError,
    },
    /// The fixture graph is incomplete or has dangling references.
    #[error("fixture audit failed: {report}")]
    Inconsistent {
        /// Findings.
        report: AuditReport,
    },
}

/// Reads the fixture graph back through the store port.
#[derive(Clone)]
pub struct FixtureAudit<S> {
    store: Arc<S>,
}

impl<S> FixtureAudit<S> {
    /// Create an audit over the given store.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> FixtureAudit<S>
where
    S: DocumentStore,
{
    /// Gather fixture counts and dangling references.
    ///
    /// An inconsistent graph is reported, not raised; see
    /// [`AuditReport::is_consistent`].
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Store`] when a collection cannot be read.
    pub async fn run(&self) -> Result<AuditReport, AuditError> {
        let mut report = AuditReport::default();
        let mut fixtures = Vec::new();

        for step in SeedStep::PLAN {
            let collection = step.collection();
            let holders = self.read(collection, step.key().to_filter()).await?;
            report.counts.push(FixtureCount {
                step,
                count: holders.len(),
            });
            fixtures.extend(holders.into_iter().map(|document| (step, document)));
        }

        for (step, document) in &fixtures {
            let rules = REFERENCE_RULES
                .iter()
                .filter(|rule| rule.source == step.collection());
            for rule in rules {
                let value = match referenced_id(rule, document) {
                    Ok(None) => continue,
                    Ok(Some(id)) => {
                        if self.exists(rule.target, id).await? {
                            continue;
                        }
                        Bson::ObjectId(id)
                    }
                    Err(value) => value,
                };
                report.dangling.push(DanglingReference {
                    rule: *rule,
                    document: DocumentId::of(document),
                    value,
                });
            }
        }

        if report.is_consistent() {
            info!(fixtures = report.counts.len(), "fixture audit passed");
        } else {
            for reference in &report.dangling {
                warn!(%reference, "dangling reference");
            }
            warn!(%report, "fixture audit found problems");
        }
        Ok(report)
    }

    async fn read(
        &self,
        collection: Collection,
        filter: Document,
    ) -> Result<Vec<Document>, AuditError> {
        self.store
            .find(collection.name(), filter, &[])
            .await
            .map_err(|source| AuditError::Store { collection, source })
    }

    async fn exists(&self, collection: Collection, id: ObjectId) -> Result<bool, AuditError> {
        let found = self.read(collection, doc! { "_id": id }).await?;
        Ok(!found.is_empty())
    }
}

/// Id a reference field points at.
///
/// `Ok(None)` means there is nothing to resolve; `Err` carries a value that
/// can never resolve.
fn referenced_id(rule: &ReferenceRule, document: &Document) -> Result<Option<ObjectId>, Bson> {
    match document.get(rule.field) {
        Some(Bson::ObjectId(id)) => Ok(Some(*id)),
        Some(Bson::Null) | None if rule.nullable => Ok(None),
        Some(other) => Err(other.clone()),
        None => Err(Bson::Null),
    }
}
