//! MongoDB-backed record store.

use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{Document, RecordStore};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{self, doc, Bson};
use mongodb::options::{FindOptions, ReplaceOptions, UpdateOptions};
use mongodb::{Client as MongoClient, Collection, Database};
use serde_json::{Map, Value};
use service_core::error::AppError;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct MongoStore {
    client: MongoClient,
    db: Database,
}

impl MongoStore {
    #[instrument(skip(uri), fields(service = "bet-reconciliation-service"))]
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to MongoDB");
            AppError::from(e)
        })?;
        let db = client.database(database);
        info!(database = %database, "Connected to MongoDB database");
        Ok(Self { client, db })
    }

    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "MongoDB health check failed");
                AppError::from(e)
            })?;

        timer.observe_duration();
        Ok(())
    }

    fn collection(&self, name: &str) -> Collection<bson::Document> {
        self.db.collection(name)
    }
}

// ============================================================================
// BSON <-> JSON
// ============================================================================

fn id_to_string(id: &Bson) -> String {
    match id {
        Bson::String(s) => s.clone(),
        Bson::ObjectId(oid) => oid.to_hex(),
        other => other.to_string(),
    }
}

fn from_bson(mut raw: bson::Document) -> Document {
    let id = raw
        .remove("_id")
        .map(|id| id_to_string(&id))
        .unwrap_or_default();
    let fields = raw
        .into_iter()
        .map(|(key, value)| (key, value.into_relaxed_extjson()))
        .collect();
    Document::new(id, fields)
}

fn to_bson(fields: Map<String, Value>) -> Result<bson::Document, AppError> {
    let mut converted = bson::to_document(&Value::Object(fields)).map_err(|e| {
        AppError::ValidationError(anyhow::anyhow!("Fields are not BSON encodable: {}", e))
    })?;
    converted.remove("_id");
    Ok(converted)
}

#[async_trait]
impl RecordStore for MongoStore {
    #[instrument(skip(self))]
    async fn list_collection(&self, collection: &str) -> Result<Vec<Document>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_collection"])
            .start_timer();

        let find_options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let mut cursor = self
            .collection(collection)
            .find(None, find_options)
            .await
            .map_err(AppError::from)?;

        let mut documents = Vec::new();
        while let Some(raw) = cursor.try_next().await.map_err(AppError::from)? {
            documents.push(from_bson(raw));
        }

        timer.observe_duration();
        Ok(documents)
    }

    #[instrument(skip(self))]
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_document"])
            .start_timer();

        let found = self
            .collection(collection)
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(AppError::from)?;

        timer.observe_duration();
        Ok(found.map(from_bson))
    }

    #[instrument(skip(self, fields))]
    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
        merge: bool,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_document"])
            .start_timer();

        let body = to_bson(fields)?;
        let coll = self.collection(collection);
        if merge {
            let options = UpdateOptions::builder().upsert(true).build();
            coll.update_one(doc! { "_id": id }, doc! { "$set": body }, options)
                .await
                .map_err(AppError::from)?;
        } else {
            let options = ReplaceOptions::builder().upsert(true).build();
            coll.replace_one(doc! { "_id": id }, body, options)
                .await
                .map_err(AppError::from)?;
        }

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self, fields))]
    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_fields"])
            .start_timer();

        let result = self
            .collection(collection)
            .update_one(doc! { "_id": id }, doc! { "$set": to_bson(fields)? }, None)
            .await
            .map_err(AppError::from)?;

        timer.observe_duration();
        if result.matched_count == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Document {}/{} not found",
                collection,
                id
            )));
        }
        Ok(())
    }
}
