//! Shared helpers for provisioning integration tests.
//!
//! Integration tests compile as separate crates, so each test binary pulls
//! this module in with `mod support;`.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use delivery_store::domain::{Collection, Provisioner};
use delivery_store::outbound::memory::InMemoryDocumentStore;
use mockable::Clock;

/// Clock pinned to one instant.
pub struct FixtureClock(pub DateTime<Utc>);

impl Clock for FixtureClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Fixed instant used for seeded timestamps.
pub fn seed_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

/// Clock pinned to [`seed_instant`] shifted by `offset_secs`.
pub fn clock_at(offset_secs: i64) -> Arc<dyn Clock> {
    Arc::new(FixtureClock(
        seed_instant() + chrono::Duration::seconds(offset_secs),
    ))
}

/// Provisioner over `store` with a clock at [`seed_instant`].
pub fn provisioner<S>(store: &Arc<S>) -> Provisioner<S> {
    Provisioner::new(Arc::clone(store), clock_at(0))
}

/// Count documents in `collection`, panicking on store failure.
pub fn count(store: &InMemoryDocumentStore, collection: Collection) -> usize {
    store.count(collection.name()).expect("count documents")
}
