//! MongoDB adapter for the document store port.
//!
//! Thin translation only: domain index definitions and keys become driver
//! models and filters, and driver errors are classified by server code into
//! `DocumentStoreError` variants. Provisioning rules live in the domain.

mod connection;
mod document_store;
mod error_mapping;

pub use connection::MongoConfig;
pub use document_store::MongoDocumentStore;
