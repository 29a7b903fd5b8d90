//! Idempotent provisioning and fixture seeding for the delivery-tracking
//! document store.
//!
//! `domain` owns the provisioning rules and reaches the store only through
//! the `DocumentStore` port; `outbound` provides the MongoDB and in-memory
//! adapters; `inbound` resolves the command-line connection target.

pub mod domain;
pub mod inbound;
pub mod outbound;
