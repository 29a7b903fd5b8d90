//! MongoDB-backed `DocumentStore` implementation.

use async_trait::async_trait;
use bson::{Document, doc};
use futures_util::TryStreamExt;
use mongodb::options::{Collation, IndexOptions, ReturnDocument};
use mongodb::{Collection as MongoCollection, Database, IndexModel};

use super::connection::{MongoConfig, connect};
use super::error_mapping::{FailureClass, classify, map_mongo_error};
use crate::domain::ports::{DocumentStore, DocumentStoreError, UpsertDisposition};
use crate::domain::{
    CollectionStatus, DocumentId, DocumentKey, IndexDefinition, IndexKey, KeyDirection,
    key_pattern,
};

/// `DocumentStore` adapter over one MongoDB database.
#[derive(Clone)]
pub struct MongoDocumentStore {
    database: Database,
}

impl MongoDocumentStore {
    /// Connect using `config` and verify the server is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Connection`] when the URI is invalid or
    /// the server does not answer a ping.
    pub async fn connect(config: &MongoConfig) -> Result<Self, DocumentStoreError> {
        Ok(Self {
            database: connect(config).await?,
        })
    }

    /// Wrap an existing database handle.
    #[must_use]
    pub const fn from_database(database: Database) -> Self {
        Self { database }
    }

    fn collection(&self, name: &str) -> MongoCollection<Document> {
        self.database.collection::<Document>(name)
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn collection_names(&self) -> Result<Vec<String>, DocumentStoreError> {
        self.database
            .list_collection_names()
            .await
            .map_err(|err| map_mongo_error(&err, self.database.name()))
    }

    async fn create_collection(&self, name: &str) -> Result<CollectionStatus, DocumentStoreError> {
        match self.database.create_collection(name).await {
            Ok(()) => Ok(CollectionStatus::Created),
            Err(err) if classify(&err) == FailureClass::NamespaceExists => {
                Ok(CollectionStatus::AlreadyPresent)
            }
            Err(err) => Err(map_mongo_error(&err, name)),
        }
    }

    async fn list_indexes(
        &self,
        collection: &str,
    ) -> Result<Vec<IndexDefinition>, DocumentStoreError> {
        let cursor = match self.collection(collection).list_indexes().await {
            Ok(cursor) => cursor,
            Err(err) if classify(&err) == FailureClass::NamespaceNotFound => {
                return Ok(Vec::new());
            }
            Err(err) => return Err(map_mongo_error(&err, collection)),
        };
        let models: Vec<IndexModel> = cursor
            .try_collect()
            .await
            .map_err(|err| map_mongo_error(&err, collection))?;
        Ok(models.iter().filter_map(index_definition).collect())
    }

    async fn create_index(
        &self,
        collection: &str,
        index: &IndexDefinition,
    ) -> Result<(), DocumentStoreError> {
        let model = index_model(index)
            .map_err(|err| DocumentStoreError::query(format!("index {}: {err}", index.name)))?;
        self.collection(collection)
            .create_index(model)
            .await
            .map(|_| ())
            .map_err(|err| map_mongo_error(&err, collection))
    }

    /// Upsert with `$setOnInsert` through `findOneAndUpdate`.
    ///
    /// The server only serialises two racing upserts when a unique index
    /// covers the filter field. For `email` keys the loser gets E11000, which
    /// surfaces as [`DocumentStoreError::DuplicateKey`]. `seedMarker` keys have
    /// no unique index because the index catalogue is fixed, so two writers
    /// racing on one marker can each insert a copy. Concurrent seeding is
    /// only safe for the user fixtures; the other fixtures assume a single
    /// provisioning run at a time.
    async fn upsert_if_absent(
        &self,
        collection: &str,
        key: &DocumentKey,
        defaults: Document,
    ) -> Result<UpsertDisposition, DocumentStoreError> {
        let update = doc! { "$setOnInsert": insert_only_fields(key, defaults) };
        let before = self
            .collection(collection)
            .find_one_and_update(key.to_filter(), update)
            .upsert(true)
            .return_document(ReturnDocument::Before)
            .projection(doc! { "_id": 1 })
            .await
            .map_err(|err| map_mongo_error(&err, collection))?;
        Ok(if before.is_some() {
            UpsertDisposition::Matched
        } else {
            UpsertDisposition::Inserted
        })
    }

    async fn find_id(
        &self,
        collection: &str,
        key: &DocumentKey,
    ) -> Result<Option<DocumentId>, DocumentStoreError> {
        let found = self
            .collection(collection)
            .find_one(key.to_filter())
            .projection(doc! { "_id": 1 })
            .await
            .map_err(|err| map_mongo_error(&err, collection))?;
        Ok(found.as_ref().and_then(DocumentId::of))
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        sort: &[IndexKey],
    ) -> Result<Vec<Document>, DocumentStoreError> {
        let handle = self.collection(collection);
        let mut query = handle.find(filter);
        if !sort.is_empty() {
            query = query.sort(key_pattern(sort));
        }
        let cursor = query
            .await
            .map_err(|err| map_mongo_error(&err, collection))?;
        cursor
            .try_collect()
            .await
            .map_err(|err| map_mongo_error(&err, collection))
    }
}

/// `$setOnInsert` payload for an upsert.
///
/// The server rejects an empty `$setOnInsert`, so a bare key is restated.
fn insert_only_fields(key: &DocumentKey, defaults: Document) -> Document {
    if defaults.is_empty() {
        key.to_filter()
    } else {
        defaults
    }
}

/// Driver index model for a domain index definition.
///
/// Fails only when the collation document is not one the driver accepts.
fn index_model(index: &IndexDefinition) -> Result<IndexModel, bson::de::Error> {
    let mut options = IndexOptions::default();
    options.name = Some(index.name.clone());
    if index.unique {
        options.unique = Some(true);
    }
    if index.sparse {
        options.sparse = Some(true);
    }
    options.partial_filter_expression = index.partial_filter.clone();
    options.collation = index
        .collation
        .clone()
        .map(bson::from_document::<Collation>)
        .transpose()?;
    Ok(IndexModel::builder()
        .keys(index.key_document())
        .options(options)
        .build())
}

/// Domain index definition for a driver index model, if it is named.
fn index_definition(model: &IndexModel) -> Option<IndexDefinition> {
    let options = model.options.as_ref()?;
    let name = options.name.clone()?;
    let keys = model
        .keys
        .iter()
        .map(|(field, direction)| IndexKey {
            field: field.clone(),
            direction: KeyDirection::from_bson(direction),
        })
        .collect();
    Some(IndexDefinition {
        name,
        keys,
        unique: options.unique.unwrap_or(false),
        sparse: options.sparse.unwrap_or(false),
        partial_filter: options.partial_filter_expression.clone(),
        collation: options
            .collation
            .as_ref()
            .and_then(|collation| bson::to_document(collation).ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Collection, SeedStep, USERS_EMAIL_UNIQUE, required_indexes};
    use rstest::rstest;

    #[rstest]
    fn index_model_carries_name_and_uniqueness() {
        let users = required_indexes(Collection::Users);
        let index = users.first().expect("users index");
        let model = index_model(index).expect("plain index");

        assert_eq!(model.keys, doc! { "email": 1 });
        let options = model.options.as_ref().expect("options set");
        assert_eq!(options.name.as_deref(), Some(USERS_EMAIL_UNIQUE));
        assert_eq!(options.unique, Some(true));
    }

    #[rstest]
    fn non_unique_model_leaves_uniqueness_unset() {
        let tracking = required_indexes(Collection::TrackingEvents);
        let index = tracking.first().expect("tracking index");
        let model = index_model(index).expect("plain index");

        assert_eq!(model.keys, doc! { "deliveryId": 1, "createdAt": -1 });
        assert_eq!(model.options.as_ref().and_then(|o| o.unique), None);
    }

    #[rstest]
    fn server_reported_index_round_trips_to_same_shape() {
        let mut options = IndexOptions::default();
        options.name = Some("tracking_deliveryId_createdAt_desc".to_owned());
        let reported = IndexModel::builder()
            .keys(doc! { "deliveryId": 1_i64, "createdAt": -1.0 })
            .options(options)
            .build();

        let definition = index_definition(&reported).expect("named index");
        let tracking = required_indexes(Collection::TrackingEvents);
        let expected = tracking.first().expect("tracking index");

        assert!(definition.same_shape(expected));
    }

    #[rstest]
    fn sparse_email_index_on_server_conflicts_with_required_one() {
        let mut options = IndexOptions::default();
        options.name = Some(USERS_EMAIL_UNIQUE.to_owned());
        options.unique = Some(true);
        options.sparse = Some(true);
        let reported = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(options)
            .build();

        let definition = index_definition(&reported).expect("named index");
        let users = required_indexes(Collection::Users);
        let expected = users.first().expect("users index");

        assert!(definition.sparse);
        assert!(!definition.same_shape(expected));
    }

    #[rstest]
    fn coverage_options_survive_the_driver_model() {
        let index = IndexDefinition::named("users_email_ci")
            .key(IndexKey::ascending("email"))
            .unique()
            .partial_filter(doc! { "role": "customer" })
            .collation(doc! { "locale": "en" });

        let model = index_model(&index).expect("valid collation");
        let options = model.options.as_ref().expect("options set");
        assert_eq!(
            options.partial_filter_expression,
            Some(doc! { "role": "customer" })
        );
        let collation = options.collation.as_ref().expect("collation set");
        assert_eq!(collation.locale, "en");

        let read_back = index_definition(&model).expect("named index");
        assert_eq!(read_back.partial_filter, index.partial_filter);
        assert_eq!(
            read_back
                .collation
                .as_ref()
                .and_then(|c| c.get_str("locale").ok()),
            Some("en")
        );
    }

    #[rstest]
    fn collation_without_locale_is_rejected() {
        let index = IndexDefinition::named("bad")
            .key(IndexKey::ascending("email"))
            .collation(doc! { "caseLevel": true });
        assert!(index_model(&index).is_err());
    }

    #[rstest]
    fn only_user_fixture_keys_are_backed_by_a_unique_index() {
        let backed: Vec<SeedStep> = SeedStep::PLAN
            .into_iter()
            .filter(|step| {
                let field = step.key().field();
                required_indexes(step.collection()).iter().any(|index| {
                    index.unique
                        && index.keys.len() == 1
                        && index.keys.iter().all(|key| key.field == field)
                })
            })
            .collect();

        assert_eq!(backed, vec![SeedStep::CustomerUser, SeedStep::CourierUser]);
    }

    #[rstest]
    fn unnamed_index_is_skipped() {
        let model = IndexModel::builder().keys(doc! { "email": 1 }).build();
        assert!(index_definition(&model).is_none());
    }

    #[rstest]
    fn bare_key_is_restated_on_insert() {
        let key = DocumentKey::new("seedMarker", "seed_tracking_1");
        assert_eq!(
            insert_only_fields(&key, Document::new()),
            doc! { "seedMarker": "seed_tracking_1" }
        );
        assert_eq!(
            insert_only_fields(&key, doc! { "heading": 90.0 }),
            doc! { "heading": 90.0 }
        );
    }
}
