//! MongoDB client and collection wrapper

use bson::{doc, oid::ObjectId, DateTime, Document};
use futures_util::TryStreamExt;
use mongodb::{
    options::{IndexOptions, ReturnDocument, UpdateModifications},
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

use crate::db::schemas::Metadata;
use crate::types::CallistoError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// Parse a hex id. Anything that is not a valid ObjectId cannot name a
/// stored document, so callers treat `None` as not found.
pub fn parse_object_id(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and ping
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, CallistoError> {
        info!("Connecting to MongoDB");

        // Fail fast instead of hanging on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| CallistoError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| CallistoError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection, applying its indexes
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, CallistoError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, CallistoError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    async fn apply_indexes(&self) -> Result<(), CallistoError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| CallistoError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, setting metadata timestamps. Returns the stored
    /// document with its new id.
    pub async fn insert_one(&self, mut item: T) -> Result<(ObjectId, T), CallistoError> {
        let now = DateTime::now();
        let metadata = item.mut_metadata();
        metadata.created_at = Some(now);
        metadata.updated_at = Some(now);

        let result = self
            .inner
            .insert_one(&item)
            .await
            .map_err(|e| CallistoError::Database(format!("Insert failed: {}", e)))?;

        let id = result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| CallistoError::Database("Failed to get inserted ID".into()))?;

        Ok((id, item))
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, CallistoError> {
        self.inner
            .find_one(filter)
            .await
            .map_err(|e| CallistoError::Database(format!("Find failed: {}", e)))
    }

    /// Find many documents, optionally sorted
    pub async fn find_many(
        &self,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<Vec<T>, CallistoError> {
        let mut action = self.inner.find(filter);
        if let Some(sort) = sort {
            action = action.sort(sort);
        }

        let cursor = action
            .await
            .map_err(|e| CallistoError::Database(format!("Find failed: {}", e)))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| CallistoError::Database(format!("Cursor read failed: {}", e)))
    }

    /// Apply `update` to the first match and return the document as it is
    /// after the update. `metadata.updated_at` is always refreshed.
    pub async fn update_and_fetch(
        &self,
        filter: Document,
        mut set: Document,
    ) -> Result<Option<T>, CallistoError> {
        set.insert("metadata.updated_at", DateTime::now());
        let update: UpdateModifications = doc! { "$set": set }.into();

        self.inner
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| CallistoError::Database(format!("Update failed: {}", e)))
    }

    /// Like [`update_and_fetch`](Self::update_and_fetch), also incrementing
    /// the given counters
    pub async fn update_inc_and_fetch(
        &self,
        filter: Document,
        mut set: Document,
        inc: Document,
    ) -> Result<Option<T>, CallistoError> {
        set.insert("metadata.updated_at", DateTime::now());
        let update: UpdateModifications = doc! { "$set": set, "$inc": inc }.into();

        self.inner
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| CallistoError::Database(format!("Update failed: {}", e)))
    }

    /// Hard delete. Returns whether a document matched.
    pub async fn delete_one(&self, filter: Document) -> Result<bool, CallistoError> {
        let result = self
            .inner
            .delete_one(filter)
            .await
            .map_err(|e| CallistoError::Database(format!("Delete failed: {}", e)))?;

        Ok(result.deleted_count > 0)
    }

    pub async fn count(&self, filter: Document) -> Result<u64, CallistoError> {
        self.inner
            .count_documents(filter)
            .await
            .map_err(|e| CallistoError::Database(format!("Count failed: {}", e)))
    }

    /// Get the underlying collection for operations that need the raw
    /// driver error
    pub fn inner(&self) -> &Collection<T> {
        &self.inner
    }
}
