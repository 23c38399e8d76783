//! MongoDB client and typed collection wrapper
//!
//! Documents carry a [`Metadata`] block; reads skip soft-deleted documents.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::{
    options::{IndexOptions, UpdateModifications},
    results::UpdateResult,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::types::AppError;

/// Schemas that declare their own indexes
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Schemas with a metadata block stamped on insert
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
    /// Connect and ping; fails fast when the server is unreachable
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, AppError> {
        info!("Connecting to MongoDB database '{}'", db_name);

        let separator = if uri.contains('?') { '&' } else { '?' };
        let timeout_uri = format!(
            "{}{}serverSelectionTimeoutMS=3000&connectTimeoutMS=3000",
            uri, separator
        );

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| AppError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Typed collection with its indexes applied
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, AppError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection
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
    pub async fn new(client: &Client, db_name: &str, name: &str) -> Result<Self, AppError> {
        let collection = Self {
            inner: client.database(db_name).collection::<T>(name),
        };
        collection.apply_indexes().await?;
        Ok(collection)
    }

    async fn apply_indexes(&self) -> Result<(), AppError> {
        let indices: Vec<IndexModel> = T::into_indices()
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        if indices.is_empty() {
            return Ok(());
        }

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| AppError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, stamping its metadata
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId, AppError> {
        let now = DateTime::now();
        let metadata = item.mut_metadata();
        metadata.is_deleted = false;
        metadata.deleted_at = None;
        metadata.created_at = Some(now);
        metadata.updated_at = Some(now);

        let result = self
            .inner
            .insert_one(item)
            .await
            .map_err(|e| AppError::Database(format!("Insert failed: {}", e)))?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| AppError::Database("Failed to get inserted ID".into()))
    }

    /// Find one live document
    pub async fn find_one(&self, mut filter: Document) -> Result<Option<T>, AppError> {
        filter.insert("metadata.is_deleted", doc! { "$ne": true });

        self.inner
            .find_one(filter)
            .await
            .map_err(|e| AppError::Database(format!("Find failed: {}", e)))
    }

    /// Find every live document matching `filter`
    pub async fn find_many(&self, mut filter: Document) -> Result<Vec<T>, AppError> {
        use futures_util::StreamExt;

        filter.insert("metadata.is_deleted", doc! { "$ne": true });

        let cursor = self
            .inner
            .find(filter)
            .await
            .map_err(|e| AppError::Database(format!("Find failed: {}", e)))?;

        Ok(cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Error reading document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await)
    }

    /// Update one live document
    pub async fn update_one(
        &self,
        mut filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, AppError> {
        filter.insert("metadata.is_deleted", doc! { "$ne": true });

        self.inner
            .update_one(filter, update.into())
            .await
            .map_err(|e| AppError::Database(format!("Update failed: {}", e)))
    }
}
