use async_trait::async_trait;
use serde_json::{Map, Value};
use service_core::error::AppError;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// A stored record: its id plus the loosely typed field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every document in the collection, ascending by id.
    async fn list_collection(&self, collection: &str) -> Result<Vec<Document>, AppError>;

    async fn get_document(&self, collection: &str, id: &str)
        -> Result<Option<Document>, AppError>;

    /// Create or overwrite. With `merge` the given fields are laid over the
    /// existing ones instead of replacing the whole document.
    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
        merge: bool,
    ) -> Result<(), AppError>;

    /// Partial update of an existing document; `NotFound` if the id is absent.
    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), AppError>;
}

#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Map<String, Value>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed documents without going through the trait, overwriting any
    /// existing ids.
    pub async fn insert_all(&self, collection: &str, documents: Vec<Document>) {
        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection.to_string()).or_default();
        for doc in documents {
            entries.insert(doc.id, doc.fields);
        }
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn list_collection(&self, collection: &str) -> Result<Vec<Document>, AppError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, AppError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|entries| entries.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
        merge: bool,
    ) -> Result<(), AppError> {
        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection.to_string()).or_default();
        match entries.get_mut(id) {
            Some(existing) if merge => existing.extend(fields),
            _ => {
                entries.insert(id.to_string(), fields);
            }
        }
        Ok(())
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), AppError> {
        let mut collections = self.collections.write().await;
        let existing = collections
            .get_mut(collection)
            .and_then(|entries| entries.get_mut(id))
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Document {}/{} not found", collection, id))
            })?;
        existing.extend(fields);
        Ok(())
    }
}
