//! Domain services for provisioning the delivery-tracking store.
//!
//! Purpose: own the provisioning rules (which collections and indexes must
//! exist, which fixtures are seeded and in what order) and reach the store
//! only through [`ports::DocumentStore`].
//!
//! Public surface:
//! - `Provisioner`: runs every phase and returns a `ProvisioningReport`.
//! - `CollectionEnsurer`, `IndexProvisioner`, `FindOrCreate`, `SeedEngine`,
//!   `FixtureAudit`: the individual phases.
//! - `fixtures`: stored entity shapes and seed payloads.

mod audit;
mod collection_ensurer;
mod collections;
mod documents;
mod find_or_create;
pub mod fixtures;
mod index_provisioner;
mod indexes;
pub mod ports;
mod provisioner;
mod seed_engine;

pub use self::audit::{
    AuditError, AuditReport, DanglingReference, FixtureAudit, FixtureCount, REFERENCE_RULES,
    ReferenceRule,
};
pub use self::collection_ensurer::{
    CollectionEnsurer, CollectionError, CollectionHandle, CollectionStatus,
};
pub use self::collections::Collection;
pub use self::documents::{DocumentId, DocumentKey};
pub use self::find_or_create::{Disposition, FindOrCreate, FindOrCreateError, FoundOrCreated};
pub use self::index_provisioner::{
    IndexOutcome, IndexProvisioner, IndexProvisioningError, IndexStatus,
};
pub use self::indexes::{
    DELIVERIES_COURIER_ID, DELIVERIES_CREATED_AT_DESC, DELIVERIES_CUSTOMER_ID, DELIVERIES_STATUS,
    IndexDefinition, IndexKey, KeyDirection, NOTIFICATIONS_USER_ID_READ,
    TRACKING_DELIVERY_ID_CREATED_AT_DESC, USERS_EMAIL_UNIQUE, key_pattern, required_indexes,
};
pub use self::provisioner::{Provisioner, ProvisioningError, ProvisioningReport};
pub use self::seed_engine::{
    SeedEngine, SeedError, SeedReport, SeedStep, SeedStepError, SeededFixture,
};
