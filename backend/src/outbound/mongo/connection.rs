//! Client configuration and connection for the MongoDB adapter.
//!
//! The connection is established eagerly and verified with a `ping`, so an
//! unreachable server fails the run before any provisioning starts.

use std::time::Duration;

use bson::doc;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use tracing::info;

use super::error_mapping::map_connect_error;
use crate::domain::ports::DocumentStoreError;

/// Configuration for connecting to MongoDB.
///
/// # Example
///
/// ```ignore
/// let config = MongoConfig::new("mongodb://localhost:27017", "delivery")
///     .with_server_selection_timeout(Duration::from_secs(5));
/// let store = MongoDocumentStore::connect(&config).await?;
/// ```
#[derive(Debug, Clone)]
pub struct MongoConfig {
    uri: String,
    database: String,
    app_name: String,
    server_selection_timeout: Duration,
}

impl MongoConfig {
    /// Create a configuration for `database` on the server at `uri`.
    ///
    /// Uses defaults:
    /// - `app_name`: `provision-store`
    /// - `server_selection_timeout`: 10 seconds
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            app_name: "provision-store".to_owned(),
            server_selection_timeout: Duration::from_secs(10),
        }
    }

    /// Set the application name reported to the server.
    #[must_use]
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Set how long to wait for a suitable server.
    #[must_use]
    pub const fn with_server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout = timeout;
        self
    }

    /// Connection URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Target database name.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }
}

/// Build a client for `config` and verify the server answers.
pub(super) async fn connect(config: &MongoConfig) -> Result<Database, DocumentStoreError> {
    let mut options = ClientOptions::parse(config.uri())
        .await
        .map_err(|err| map_connect_error(&err))?;
    options.app_name = Some(config.app_name.clone());
    options.server_selection_timeout = Some(config.server_selection_timeout);

    let client = Client::with_options(options).map_err(|err| map_connect_error(&err))?;
    let database = client.database(config.database());
    database
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(|err| map_connect_error(&err))?;

    info!(database = config.database(), "connected to document store");
    Ok(database)
}
