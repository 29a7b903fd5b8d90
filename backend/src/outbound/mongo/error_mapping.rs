//! Classification of MongoDB driver errors into port error kinds.

use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use tracing::debug;

use crate::domain::ports::DocumentStoreError;

/// Server code for a duplicate key on insert.
const DUPLICATE_KEY: i32 = 11000;
/// Legacy server code for a duplicate key on update.
const DUPLICATE_KEY_ON_UPDATE: i32 = 11001;
/// An index with the same name exists with different options.
const INDEX_OPTIONS_CONFLICT: i32 = 85;
/// An index with the same key pattern exists with a different name.
const INDEX_KEY_SPECS_CONFLICT: i32 = 86;
/// The collection already exists.
const NAMESPACE_EXISTS: i32 = 48;
/// The collection does not exist.
const NAMESPACE_NOT_FOUND: i32 = 26;

/// Coarse failure class of a driver error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FailureClass {
    Connection,
    DuplicateKey,
    IndexConflict,
    NamespaceExists,
    NamespaceNotFound,
    Other,
}

/// Classify a server error code.
pub(super) const fn classify_code(code: i32) -> FailureClass {
    match code {
        DUPLICATE_KEY | DUPLICATE_KEY_ON_UPDATE => FailureClass::DuplicateKey,
        INDEX_OPTIONS_CONFLICT | INDEX_KEY_SPECS_CONFLICT => FailureClass::IndexConflict,
        NAMESPACE_EXISTS => FailureClass::NamespaceExists,
        NAMESPACE_NOT_FOUND => FailureClass::NamespaceNotFound,
        _ => FailureClass::Other,
    }
}

/// Classify a driver error by kind and, for server errors, by code.
pub(super) fn classify(error: &MongoError) -> FailureClass {
    match &*error.kind {
        ErrorKind::Io(_)
        | ErrorKind::ServerSelection { .. }
        | ErrorKind::Authentication { .. }
        | ErrorKind::ConnectionPoolCleared { .. }
        | ErrorKind::DnsResolve { .. } => FailureClass::Connection,
        ErrorKind::Command(command) => classify_code(command.code),
        ErrorKind::Write(WriteFailure::WriteError(write)) => classify_code(write.code),
        _ => FailureClass::Other,
    }
}

/// Map a driver error raised while operating on `collection`.
///
/// The raw driver error is logged at debug level; the returned error keeps
/// its message for operators.
pub(super) fn map_mongo_error(error: &MongoError, collection: &str) -> DocumentStoreError {
    let class = classify(error);
    debug!(collection, ?class, error = %error, "mongodb operation failed");
    let message = error.to_string();
    match class {
        FailureClass::Connection => DocumentStoreError::connection(message),
        FailureClass::DuplicateKey => DocumentStoreError::duplicate_key(collection, message),
        FailureClass::IndexConflict => DocumentStoreError::index_conflict(collection, message),
        FailureClass::NamespaceExists | FailureClass::NamespaceNotFound | FailureClass::Other => {
            DocumentStoreError::query(message)
        }
    }
}

/// Map a driver error raised while establishing the client.
///
/// Anything that goes wrong before the first command is a connection
/// failure, including an unparsable URI.
pub(super) fn map_connect_error(error: &MongoError) -> DocumentStoreError {
    debug!(error = %error, "mongodb connection failed");
    DocumentStoreError::connection(error.to_string())
}
