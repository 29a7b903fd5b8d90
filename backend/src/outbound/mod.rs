//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **mongo**: the production `DocumentStore` over the official MongoDB
//!   driver.
//! - **memory**: a process-local `DocumentStore` with the same uniqueness
//!   and atomicity guarantees, for tests and dry runs.
//!
//! Adapters are thin translators that convert between domain types and
//! infrastructure-specific representations. They contain no business logic.

pub mod memory;
pub mod mongo;
