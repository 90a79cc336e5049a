//! In-memory document store.
//!
//! Backs unit tests and local experiments. Mirrors the Postgres store's
//! semantics: system fields live outside the queryable document, queries
//! match on top-level field equality, and operating on a collection that
//! was never created is an error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::store::{
    is_valid_collection_name, strip_system_fields, Document, DocumentStore, StoreError,
};

#[derive(Debug, Clone)]
struct Entry {
    id: Uuid,
    fields: Document,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Entry {
    fn to_document(&self) -> Document {
        let mut doc = self.fields.clone();
        doc.insert("id".to_string(), Value::String(self.id.to_string()));
        doc.insert(
            "created_at".to_string(),
            Value::String(self.created_at.to_rfc3339()),
        );
        doc.insert(
            "updated_at".to_string(),
            Value::String(self.updated_at.to_rfc3339()),
        );
        doc
    }

    fn matches(&self, query: &Document) -> bool {
        query.iter().all(|(k, v)| self.fields.get(k) == Some(v))
    }
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Entry>>>,
    find_one_calls: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of find_one calls issued so far. Lets tests assert that a
    /// cached lookup did not go back to the store.
    pub fn find_one_count(&self) -> usize {
        self.find_one_calls.load(Ordering::SeqCst)
    }

    pub async fn has_collection(&self, name: &str) -> bool {
        self.collections.read().await.contains_key(name)
    }

    fn missing(name: &str) -> StoreError {
        StoreError::QueryError(format!("no such collection: {}", name))
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find(&self, collection: &str, query: &Document) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let entries = collections
            .get(collection)
            .ok_or_else(|| Self::missing(collection))?;
        Ok(entries
            .iter()
            .filter(|e| e.matches(query))
            .map(Entry::to_document)
            .collect())
    }

    async fn find_one(
        &self,
        collection: &str,
        query: &Document,
    ) -> Result<Option<Document>, StoreError> {
        self.find_one_calls.fetch_add(1, Ordering::SeqCst);
        let collections = self.collections.read().await;
        let entries = collections
            .get(collection)
            .ok_or_else(|| Self::missing(collection))?;
        Ok(entries
            .iter()
            .find(|e| e.matches(query))
            .map(Entry::to_document))
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        let entries = collections
            .get(collection)
            .ok_or_else(|| Self::missing(collection))?;
        Ok(entries.iter().find(|e| e.id == id).map(Entry::to_document))
    }

    async fn insert(&self, collection: &str, mut doc: Document) -> Result<Document, StoreError> {
        strip_system_fields(&mut doc);
        let mut collections = self.collections.write().await;
        let entries = collections
            .get_mut(collection)
            .ok_or_else(|| Self::missing(collection))?;
        let now = Utc::now();
        let entry = Entry {
            id: Uuid::new_v4(),
            fields: doc,
            created_at: now,
            updated_at: now,
        };
        let stored = entry.to_document();
        entries.push(entry);
        Ok(stored)
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: Uuid,
        mut patch: Document,
    ) -> Result<Option<Document>, StoreError> {
        strip_system_fields(&mut patch);
        let mut collections = self.collections.write().await;
        let entries = collections
            .get_mut(collection)
            .ok_or_else(|| Self::missing(collection))?;
        match entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                for (k, v) in patch {
                    entry.fields.insert(k, v);
                }
                entry.updated_at = Utc::now();
                Ok(Some(entry.to_document()))
            }
            None => Ok(None),
        }
    }

    async fn delete_by_id(
        &self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<Document>, StoreError> {
        let mut collections = self.collections.write().await;
        let entries = collections
            .get_mut(collection)
            .ok_or_else(|| Self::missing(collection))?;
        match entries.iter().position(|e| e.id == id) {
            Some(index) => Ok(Some(entries.remove(index).to_document())),
            None => Ok(None),
        }
    }

    async fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        if !is_valid_collection_name(name) {
            return Err(StoreError::QueryError(format!(
                "invalid collection name: {}",
                name
            )));
        }
        let mut collections = self.collections.write().await;
        // Already existing is not an error
        collections.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }
}
