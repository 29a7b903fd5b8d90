//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod document_store;

#[cfg(test)]
pub use document_store::MockDocumentStore;
pub use document_store::{DocumentStore, DocumentStoreError, UpsertDisposition};
