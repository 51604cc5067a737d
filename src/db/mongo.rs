//! MongoDB client and typed collection wrapper
//!
//! Collections apply their schema-declared indexes on open, stamp metadata on
//! insert and hide soft-deleted documents from reads.

use bson::{doc, Document};
use chrono::Utc;
use futures_util::TryStreamExt;
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument, UpdateModifications},
    results::UpdateResult,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

use crate::db::schemas::Metadata;
use crate::types::PortalError;

/// MongoDB duplicate key error code
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and ping the database
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, PortalError> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast instead of hanging when MongoDB is unreachable
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| PortalError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| PortalError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Open a typed collection, applying its indexes
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, PortalError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
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
    async fn new(client: &Client, db_name: &str, collection_name: &str) -> Result<Self, PortalError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    async fn apply_indexes(&self) -> Result<(), PortalError> {
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
            .map_err(|e| PortalError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, setting metadata timestamps
    ///
    /// A unique index violation comes back as `Conflict`.
    pub async fn insert_one(&self, mut item: T) -> Result<(), PortalError> {
        let now = Utc::now();
        let metadata = item.mut_metadata();
        metadata.is_deleted = false;
        metadata.created_at = Some(now);
        metadata.updated_at = Some(now);

        self.inner.insert_one(item).await.map_err(|e| {
            if is_duplicate_key(&e) {
                PortalError::Conflict("A record with this key already exists".into())
            } else {
                PortalError::Database(format!("Insert failed: {}", e))
            }
        })?;

        Ok(())
    }

    /// Find one live document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, PortalError> {
        self.inner
            .find_one(live(filter))
            .await
            .map_err(|e| PortalError::Database(format!("Find failed: {}", e)))
    }

    /// Find live documents by filter, optionally sorted
    pub async fn find_many(
        &self,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<Vec<T>, PortalError> {
        let mut find = self.inner.find(live(filter));
        if let Some(sort) = sort {
            find = find.sort(sort);
        }

        let cursor = find
            .await
            .map_err(|e| PortalError::Database(format!("Find failed: {}", e)))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| PortalError::Database(format!("Error reading documents: {}", e)))
    }

    /// Update one document
    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, PortalError> {
        self.inner
            .update_one(filter, update.into())
            .await
            .map_err(|e| PortalError::Database(format!("Update failed: {}", e)))
    }

    /// Apply an update to one live document and return it as written
    pub async fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
    ) -> Result<Option<T>, PortalError> {
        self.inner
            .find_one_and_update(live(filter), update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| PortalError::Database(format!("Update failed: {}", e)))
    }

    /// Soft delete a document
    pub async fn soft_delete(&self, filter: Document) -> Result<UpdateResult, PortalError> {
        let now = bson::to_bson(&Utc::now())
            .map_err(|e| PortalError::Internal(format!("Failed to encode timestamp: {}", e)))?;
        let update = doc! {
            "$set": {
                "metadata.is_deleted": true,
                "metadata.deleted_at": now.clone(),
                "metadata.updated_at": now,
            }
        };

        self.update_one(live(filter), update).await
    }

    /// Delete a document outright (sessions only; records are soft-deleted)
    pub async fn delete_one(&self, filter: Document) -> Result<(), PortalError> {
        self.inner
            .delete_one(filter)
            .await
            .map_err(|e| PortalError::Database(format!("Delete failed: {}", e)))?;
        Ok(())
    }

    /// Hard-delete every matching document, returning the count
    pub async fn delete_many(&self, filter: Document) -> Result<u64, PortalError> {
        let result = self
            .inner
            .delete_many(filter)
            .await
            .map_err(|e| PortalError::Database(format!("Delete failed: {}", e)))?;
        Ok(result.deleted_count)
    }
}

/// Restrict a filter to documents that are not soft-deleted
fn live(mut filter: Document) -> Document {
    filter.insert("metadata.is_deleted", doc! { "$ne": true });
    filter
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        e.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY_CODE
    )
}
