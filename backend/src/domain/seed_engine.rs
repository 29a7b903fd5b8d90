//! Seeds the fixture graph in dependency order.
//!
//! Each [`SeedStep`] names the fixture it creates, the key identifying it, and
//! the earlier steps whose identifiers it embeds. The engine resolves every
//! step through find-or-create and threads the resolved identifiers into
//! dependants, so a child is never written with a missing or stale parent.
//! Failure aborts the remaining steps; completed steps stay committed.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bson::Document;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::fixtures::{
    self, COURIER_EMAIL, CUSTOMER_EMAIL, DELIVERY_MARKER, EMAIL_FIELD, NOTIFICATION_MARKER,
    SEED_MARKER_FIELD, TRACKING_MARKER_1, TRACKING_MARKER_2,
};
use crate::domain::ports::DocumentStore;
use crate::domain::{
    Collection, Disposition, DocumentId, DocumentKey, FindOrCreate, FindOrCreateError,
};

/// One fixture in the seed plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SeedStep {
    /// The customer account.
    CustomerUser,
    /// The courier account.
    CourierUser,
    /// The delivery requested by the customer.
    Delivery,
    /// The first tracking event for the delivery.
    FirstTrackingEvent,
    /// The later tracking event for the delivery.
    SecondTrackingEvent,
    /// The notification sent to the customer.
    DeliveryNotification,
}

impl SeedStep {
    /// The full plan in dependency order.
    pub const PLAN: [Self; 6] = [
        Self::CustomerUser,
        Self::CourierUser,
        Self::Delivery,
        Self::FirstTrackingEvent,
        Self::SecondTrackingEvent,
        Self::DeliveryNotification,
    ];

    /// Collection the fixture lives in.
    #[must_use]
    pub const fn collection(self) -> Collection {
        match self {
            Self::CustomerUser | Self::CourierUser => Collection::Users,
            Self::Delivery => Collection::Deliveries,
            Self::FirstTrackingEvent | Self::SecondTrackingEvent => Collection::TrackingEvents,
            Self::DeliveryNotification => Collection::Notifications,
        }
    }

    /// Key identifying the fixture across runs.
    #[must_use]
    pub fn key(self) -> DocumentKey {
        match self {
            Self::CustomerUser => DocumentKey::new(EMAIL_FIELD, CUSTOMER_EMAIL),
            Self::CourierUser => DocumentKey::new(EMAIL_FIELD, COURIER_EMAIL),
            Self::Delivery => DocumentKey::new(SEED_MARKER_FIELD, DELIVERY_MARKER),
            Self::FirstTrackingEvent => DocumentKey::new(SEED_MARKER_FIELD, TRACKING_MARKER_1),
            Self::SecondTrackingEvent => DocumentKey::new(SEED_MARKER_FIELD, TRACKING_MARKER_2),
            Self::DeliveryNotification => {
                DocumentKey::new(SEED_MARKER_FIELD, NOTIFICATION_MARKER)
            }
        }
    }

    /// Steps whose identifiers this step embeds.
    #[must_use]
    pub const fn parents(self) -> &'static [Self] {
        match self {
            Self::CustomerUser | Self::CourierUser => &[],
            Self::Delivery | Self::DeliveryNotification => &[Self::CustomerUser],
            Self::FirstTrackingEvent | Self::SecondTrackingEvent => &[Self::Delivery],
        }
    }

    /// Short human-readable name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CustomerUser => "customer user",
            Self::CourierUser => "courier user",
            Self::Delivery => "delivery",
            Self::FirstTrackingEvent => "tracking event 1",
            Self::SecondTrackingEvent => "tracking event 2",
            Self::DeliveryNotification => "notification",
        }
    }

    fn defaults(self, ids: &ResolvedIds, now: DateTime<Utc>) -> Result<Document, SeedStepError> {
        match self {
            Self::CustomerUser => encode(self, &fixtures::customer(now)),
            Self::CourierUser => encode(self, &fixtures::courier(now)),
            Self::Delivery => {
                let customer_id = ids.parent(self, Self::CustomerUser)?;
                encode(self, &fixtures::delivery(customer_id, now))
            }
            Self::FirstTrackingEvent => {
                let delivery_id = ids.parent(self, Self::Delivery)?;
                encode(self, &fixtures::first_tracking_event(delivery_id, now))
            }
            Self::SecondTrackingEvent => {
                let delivery_id = ids.parent(self, Self::Delivery)?;
                encode(self, &fixtures::second_tracking_event(delivery_id, now))
            }
            Self::DeliveryNotification => {
                let user_id = ids.parent(self, Self::CustomerUser)?;
                encode(self, &fixtures::delivery_requested_notification(user_id, now))
            }
        }
    }
}

impl fmt::Display for SeedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn encode<T: Serialize>(step: SeedStep, entity: &T) -> Result<Document, SeedStepError> {
    bson::to_document(entity).map_err(|err| SeedStepError::Encode {
        step,
        message: err.to_string(),
    })
}

/// Identifiers resolved so far in a run, keyed by step.
#[derive(Debug, Default)]
struct ResolvedIds(BTreeMap<SeedStep, DocumentId>);

impl ResolvedIds {
    fn parent(&self, step: SeedStep, parent: SeedStep) -> Result<bson::oid::ObjectId, SeedStepError> {
        self.0
            .get(&parent)
            .map(|id| *id.as_object_id())
            .ok_or(SeedStepError::MissingParent { step, parent })
    }
}

/// Why a single seed step failed.
#[derive(Debug, Error)]
pub enum SeedStepError {
    /// A parent identifier was not resolved earlier in this run.
    #[error("{step} requires {parent}, which was not resolved in this run")]
    MissingParent {
        /// Step that could not run.
        step: SeedStep,
        /// Unresolved parent.
        parent: SeedStep,
    },
    /// The fixture could not be encoded as a document.
    #[error("failed to encode {step}: {message}")]
    Encode {
        /// Step whose payload failed to encode.
        step: SeedStep,
        /// Encoder message.
        message: String,
    },
    /// Find-or-create failed.
    #[error(transparent)]
    FindOrCreate(#[from] FindOrCreateError),
}

/// Errors raised by [`SeedEngine`].
#[derive(Debug, Error)]
pub enum SeedError {
    /// A step failed; later steps were not attempted.
    #[error("seeding aborted at {step} after {} committed steps: {cause}", committed.len())]
    Aborted {
        /// Step that failed.
        step: SeedStep,
        /// Steps resolved earlier in this run, in order.
        committed: Vec<SeedStep>,
        /// Underlying failure.
        #[source]
        cause: SeedStepError,
    },
}

/// One resolved fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeededFixture {
    /// Step that resolved it.
    pub step: SeedStep,
    /// Identifier of the stored document.
    pub id: DocumentId,
    /// Whether this run inserted it.
    pub disposition: Disposition,
}

/// Fixtures resolved by a successful run, in plan order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Resolved fixtures.
    pub fixtures: Vec<SeededFixture>,
}

impl SeedReport {
    /// Identifier resolved for `step`, if it ran.
    #[must_use]
    pub fn id_of(&self, step: SeedStep) -> Option<DocumentId> {
        self.fixtures.iter().find(|f| f.step == step).map(|f| f.id)
    }

    /// Number of fixtures this run inserted.
    #[must_use]
    pub fn created(&self) -> usize {
        self.fixtures
            .iter()
            .filter(|f| f.disposition == Disposition::Created)
            .count()
    }
}

/// Runs the seed plan against a [`DocumentStore`].
#[derive(Clone)]
pub struct SeedEngine<S> {
    find_or_create: FindOrCreate<S>,
    clock: Arc<dyn Clock>,
}

impl<S> SeedEngine<S> {
    /// Create an engine over `store`, timestamping fixtures with `clock`.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            find_or_create: FindOrCreate::new(store),
            clock,
        }
    }
}

impl<S> SeedEngine<S>
where
    S: DocumentStore,
{
    /// Run [`SeedStep::PLAN`].
    ///
    /// # Errors
    ///
    /// Returns [`SeedError::Aborted`] naming the failed step and the steps
    /// committed before it.
    pub async fn run(&self) -> Result<SeedReport, SeedError> {
        self.run_steps(&SeedStep::PLAN).await
    }

    /// Run `steps` in the given order.
    ///
    /// Parents must appear before their dependants; a step whose parent has
    /// not been resolved in this call fails with
    /// [`SeedStepError::MissingParent`].
    ///
    /// # Errors
    ///
    /// Returns [`SeedError::Aborted`] on the first failing step.
    pub async fn run_steps(&self, steps: &[SeedStep]) -> Result<SeedReport, SeedError> {
        let now = self.clock.utc();
        let mut ids = ResolvedIds::default();
        let mut report = SeedReport::default();
        info!(steps = steps.len(), "seeding fixtures");

        for &step in steps {
            match self.resolve(step, &ids, now).await {
                Ok(fixture) => {
                    ids.0.insert(step, fixture.id);
                    report.fixtures.push(fixture);
                }
                Err(cause) => {
                    let committed: Vec<SeedStep> = report.fixtures.iter().map(|f| f.step).collect();
                    warn!(step = %step, committed = committed.len(), error = %cause, "seeding aborted");
                    return Err(SeedError::Aborted {
                        step,
                        committed,
                        cause,
                    });
                }
            }
        }

        info!(
            resolved = report.fixtures.len(),
            created = report.created(),
            "fixtures seeded"
        );
        Ok(report)
    }

    async fn resolve(
        &self,
        step: SeedStep,
        ids: &ResolvedIds,
        now: DateTime<Utc>,
    ) -> Result<SeededFixture, SeedStepError> {
        let defaults = step.defaults(ids, now)?;
        let outcome = self
            .find_or_create
            .find_or_create(step.collection(), &step.key(), defaults)
            .await?;
        Ok(SeededFixture {
            step,
            id: outcome.id,
            disposition: outcome.disposition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{DocumentStoreError, MockDocumentStore, UpsertDisposition};
    use bson::oid::ObjectId;
    use chrono::{Local, TimeZone};
    use rstest::{fixture, rstest};
    use std::sync::Mutex;

    struct FixtureClock(DateTime<Utc>);

    impl Clock for FixtureClock {
        fn local(&self) -> DateTime<Local> {
            self.0.with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[fixture]
    fn clock() -> Arc<dyn Clock> {
        let now = Utc
            .with_ymd_and_hms(2025, 3, 14, 9, 30, 0)
            .single()
            .expect("valid timestamp");
        Arc::new(FixtureClock(now))
    }

    /// Store mock that inserts every key and records the upserted payloads.
    fn recording_store(payloads: Arc<Mutex<Vec<(String, Document)>>>) -> MockDocumentStore {
        let mut store = MockDocumentStore::new();
        store
            .expect_upsert_if_absent()
            .returning(move |collection, _, defaults| {
                payloads
                    .lock()
                    .expect("payload lock")
                    .push((collection.to_owned(), defaults));
                Ok(UpsertDisposition::Inserted)
            });
        store
            .expect_find_id()
            .returning(|_, _| Ok(Some(DocumentId::generate())));
        store
    }

    #[rstest]
    fn plan_lists_parents_before_dependants() {
        for (position, step) in SeedStep::PLAN.iter().enumerate() {
            for parent in step.parents() {
                let parent_position = SeedStep::PLAN
                    .iter()
                    .position(|candidate| candidate == parent)
                    .expect("parent is planned");
                assert!(parent_position < position, "{parent} must precede {step}");
            }
        }
    }

    #[rstest]
    #[tokio::test]
    async fn dependants_embed_resolved_parent_ids(clock: Arc<dyn Clock>) {
        let payloads = Arc::new(Mutex::new(Vec::new()));
        let engine = SeedEngine::new(Arc::new(recording_store(Arc::clone(&payloads))), clock);

        let report = engine.run().await.expect("seeding succeeds");
        let customer = report
            .id_of(SeedStep::CustomerUser)
            .expect("customer resolved");
        let delivery = report.id_of(SeedStep::Delivery).expect("delivery resolved");

        let recorded = payloads.lock().expect("payload lock");
        let by_collection = |name: &str| -> Vec<&Document> {
            recorded
                .iter()
                .filter(|(collection, _)| collection == name)
                .map(|(_, document)| document)
                .collect()
        };
        let deliveries = by_collection("deliveries");
        let delivery_payload = deliveries.first().expect("delivery payload");
        assert_eq!(
            delivery_payload.get_object_id("customerId").expect("customer id"),
            *customer.as_object_id()
        );
        for event in by_collection("tracking_events") {
            assert_eq!(
                event.get_object_id("deliveryId").expect("delivery id"),
                *delivery.as_object_id()
            );
        }
        assert_eq!(report.fixtures.len(), SeedStep::PLAN.len());
        assert_eq!(report.created(), SeedStep::PLAN.len());
    }

    #[rstest]
    #[tokio::test]
    async fn step_without_resolved_parent_is_refused(clock: Arc<dyn Clock>) {
        let mut store = MockDocumentStore::new();
        store.expect_upsert_if_absent().times(0);
        store.expect_find_id().times(0);
        let engine = SeedEngine::new(Arc::new(store), clock);

        let error = engine
            .run_steps(&[SeedStep::FirstTrackingEvent])
            .await
            .expect_err("parent is missing");

        let SeedError::Aborted {
            step,
            committed,
            cause,
        } = error;
        assert_eq!(step, SeedStep::FirstTrackingEvent);
        assert!(committed.is_empty());
        assert!(matches!(
            cause,
            SeedStepError::MissingParent {
                parent: SeedStep::Delivery,
                ..
            }
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn failure_stops_later_steps_and_reports_committed(clock: Arc<dyn Clock>) {
        let mut store = MockDocumentStore::new();
        store
            .expect_upsert_if_absent()
            .withf(|collection, _, _| collection == "users")
            .times(2)
            .returning(|_, _, _| Ok(UpsertDisposition::Matched));
        store
            .expect_upsert_if_absent()
            .withf(|collection, _, _| collection == "deliveries")
            .times(1)
            .returning(|_, _, _| Err(DocumentStoreError::connection("connection reset")));
        store
            .expect_find_id()
            .times(2)
            .returning(|_, _| Ok(Some(DocumentId::from_object_id(ObjectId::new()))));
        let engine = SeedEngine::new(Arc::new(store), clock);

        let SeedError::Aborted {
            step,
            committed,
            cause,
        } = engine.run().await.expect_err("delivery step fails");

        assert_eq!(step, SeedStep::Delivery);
        assert_eq!(committed, vec![SeedStep::CustomerUser, SeedStep::CourierUser]);
        assert!(matches!(cause, SeedStepError::FindOrCreate(_)));
    }

    #[rstest]
    #[tokio::test]
    async fn every_fixture_is_timestamped_from_the_clock(clock: Arc<dyn Clock>) {
        let now = bson::DateTime::from_chrono(clock.utc());
        let payloads = Arc::new(Mutex::new(Vec::new()));
        let engine = SeedEngine::new(Arc::new(recording_store(Arc::clone(&payloads))), clock);

        engine.run().await.expect("seeding succeeds");

        let recorded = payloads.lock().expect("payload lock");
        let stamps: Vec<bson::DateTime> = recorded
            .iter()
            .map(|(_, document)| *document.get_datetime("createdAt").expect("createdAt"))
            .collect();
        assert_eq!(stamps.iter().filter(|stamp| **stamp == now).count(), 5);
        assert!(stamps.iter().all(|stamp| *stamp >= now));
    }
}
