//! MongoDB client and collection wrapper

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::{
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument,
              UpdateModifications},
    results::UpdateResult,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

use crate::types::CaselogError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas carrying their own audit timestamps
pub trait Stamped {
    fn stamp_created(&mut self, at: DateTime);
    fn stamp_updated(&mut self, at: DateTime);
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, CaselogError> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| CaselogError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        // Verify connection with timeout
        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| CaselogError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, CaselogError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + Stamped,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    /// Ping the server (readiness probe)
    pub async fn ping(&self) -> Result<(), CaselogError> {
        self.client
            .database(&self.db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| CaselogError::Database(format!("MongoDB ping failed: {}", e)))?;
        Ok(())
    }

    /// Get the raw MongoDB client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the database name
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
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + Stamped,
{
    /// Create a new collection and apply indexes
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, CaselogError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        // Apply indexes
        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> Result<(), CaselogError> {
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
            .map_err(|e| CaselogError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, stamping audit timestamps
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId, CaselogError> {
        let now = DateTime::now();
        item.stamp_created(now);
        item.stamp_updated(now);

        let result = self
            .inner
            .insert_one(item)
            .await
            .map_err(|e| CaselogError::Database(format!("Insert failed: {}", e)))?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| CaselogError::Database("Failed to get inserted ID".into()))
    }

    /// Find one document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, CaselogError> {
        self.inner
            .find_one(filter)
            .await
            .map_err(|e| CaselogError::Database(format!("Find failed: {}", e)))
    }

    /// Find many documents by filter with sort/skip/limit options
    pub async fn find_many(
        &self,
        filter: Document,
        options: Option<FindOptions>,
    ) -> Result<Vec<T>, CaselogError> {
        use futures_util::StreamExt;

        let cursor = self
            .inner
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| CaselogError::Database(format!("Find failed: {}", e)))?;

        let results: Vec<T> = cursor
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
            .await;

        Ok(results)
    }

    /// Count documents matching a filter
    pub async fn count(&self, filter: Document) -> Result<u64, CaselogError> {
        self.inner
            .count_documents(filter)
            .await
            .map_err(|e| CaselogError::Database(format!("Count failed: {}", e)))
    }

    /// Update one document
    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, CaselogError> {
        self.inner
            .update_one(filter, update)
            .await
            .map_err(|e| CaselogError::Database(format!("Update failed: {}", e)))
    }

    /// Update every document matching a filter
    pub async fn update_many(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, CaselogError> {
        self.inner
            .update_many(filter, update)
            .await
            .map_err(|e| CaselogError::Database(format!("Update failed: {}", e)))
    }

    /// Update one document and return it as stored after the update
    pub async fn update_and_fetch(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<Option<T>, CaselogError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.inner
            .find_one_and_update(filter, update)
            .with_options(options)
            .await
            .map_err(|e| CaselogError::Database(format!("Update failed: {}", e)))
    }

    /// Run an aggregation pipeline, draining the cursor
    pub async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, CaselogError> {
        use futures_util::StreamExt;

        let cursor = self
            .inner
            .aggregate(pipeline)
            .await
            .map_err(|e| CaselogError::Database(format!("Aggregation failed: {}", e)))?;

        let results: Vec<Document> = cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Error reading aggregation result: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    /// Get the underlying collection for advanced operations
    pub fn inner(&self) -> &Collection<T> {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running MongoDB instance;
    // filter and pipeline construction is covered in the activity module.
}
