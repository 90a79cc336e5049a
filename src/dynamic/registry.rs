//! Runtime schema registry for admin-defined pages.
//!
//! Materializes a document schema per page from its descriptor and caches it
//! by normalized slug. The cache is instance-owned: construct one registry at
//! startup and inject it wherever dynamic schemas are needed.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::database::models::entity::{model_identity, normalize_slug, EntityDescriptor, FieldDef};
use crate::database::models::from_document;
use crate::database::store::{query_eq, DocumentStore, StoreError};
use crate::database::PAGES_COLLECTION;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Page with URL {0} not found")]
    EntityNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Value type a field materializes to. The table is deliberately permissive:
/// unrecognized declared types fall back to text rather than erroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    File,
}

impl FieldKind {
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "File" => FieldKind::File,
            // "Text" and anything unrecognized store plain strings
            _ => FieldKind::Text,
        }
    }
}

/// Runtime document schema for one page, bound to its storage collection.
/// Creation/update timestamps are store-managed on every collection.
#[derive(Debug, Clone)]
pub struct DynamicSchema {
    pub model_identity: String,
    pub entity_id: Uuid,
    pub collection_key: String,
    pub fields: Vec<FieldDef>,
}

impl DynamicSchema {
    fn from_descriptor(descriptor: &EntityDescriptor) -> Self {
        Self {
            model_identity: model_identity(&descriptor.name),
            entity_id: descriptor.id,
            collection_key: descriptor.collection_key.clone(),
            fields: descriptor.fields.clone(),
        }
    }

    pub fn field_kind(&self, field_name: &str) -> Option<FieldKind> {
        self.fields
            .iter()
            .find(|f| f.field_name == field_name)
            .map(|f| FieldKind::from_type_name(&f.field_type))
    }

    /// Names of File-typed fields, in declaration order.
    pub fn file_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.is_file())
            .map(|f| f.field_name.as_str())
    }
}

pub struct SchemaRegistry {
    store: Arc<dyn DocumentStore>,
    /// normalized slug -> schema
    cache: RwLock<HashMap<String, Arc<DynamicSchema>>>,
    /// model identity -> schema; repeated registration reuses the entry
    models: RwLock<HashMap<String, Arc<DynamicSchema>>>,
}

impl SchemaRegistry {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
            models: RwLock::new(HashMap::new()),
        }
    }

    /// Get the runtime schema for a page slug, building and caching it on
    /// first access.
    pub async fn get(&self, slug: &str) -> Result<Arc<DynamicSchema>, RegistryError> {
        let normalized = normalize_slug(slug);

        // Fast path: try read lock
        {
            let cache = self.cache.read().await;
            if let Some(schema) = cache.get(&normalized) {
                return Ok(schema.clone());
            }
        }

        let descriptor = self.load_descriptor(&normalized).await?;
        let built = Arc::new(DynamicSchema::from_descriptor(&descriptor));

        // Get-or-insert under the write lock: a racing first access may have
        // registered the schema already, in which case the winner's entry is
        // adopted instead of re-declaring the model identity.
        let mut cache = self.cache.write().await;
        if let Some(existing) = cache.get(&normalized) {
            return Ok(existing.clone());
        }

        let mut models = self.models.write().await;
        let schema = models
            .entry(built.model_identity.clone())
            .or_insert_with(|| built.clone())
            .clone();
        drop(models);

        cache.insert(normalized.clone(), schema.clone());
        debug!("Registered dynamic schema {} for {}", schema.model_identity, normalized);
        Ok(schema)
    }

    /// Drop the cached schema for a slug. Called when the page's descriptor
    /// is updated or deleted so the next access rebuilds.
    pub async fn invalidate(&self, slug: &str) {
        let normalized = normalize_slug(slug);
        let mut cache = self.cache.write().await;
        if let Some(schema) = cache.remove(&normalized) {
            self.models.write().await.remove(&schema.model_identity);
            debug!("Invalidated dynamic schema for {}", normalized);
        }
    }

    async fn load_descriptor(&self, normalized: &str) -> Result<EntityDescriptor, RegistryError> {
        let doc = self
            .store
            .find_one(PAGES_COLLECTION, &query_eq("url_slug", normalized))
            .await?
            .ok_or_else(|| RegistryError::EntityNotFound(normalized.to_string()))?;
        Ok(from_document(doc)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::to_document;
    use crate::database::MemoryDocumentStore;
    use chrono::Utc;

    async fn seed_page(store: &MemoryDocumentStore, name: &str, fields: Vec<FieldDef>) -> String {
        use crate::database::models::entity::{collection_key, url_slug};
        store.create_collection(PAGES_COLLECTION).await.ok();
        let descriptor = EntityDescriptor {
            id: Uuid::new_v4(),
            name: name.to_string(),
            collection_key: collection_key(name),
            url_slug: url_slug(name),
            fields,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let doc = to_document(&descriptor).unwrap();
        store.insert(PAGES_COLLECTION, doc).await.unwrap();
        descriptor.url_slug
    }

    fn text_field(name: &str) -> FieldDef {
        FieldDef {
            field_name: name.to_string(),
            field_type: "Text".to_string(),
        }
    }

    #[tokio::test]
    async fn builds_schema_from_descriptor() {
        let store = Arc::new(MemoryDocumentStore::new());
        seed_page(
            &store,
            "Contact Form",
            vec![
                text_field("name"),
                FieldDef {
                    field_name: "photo".to_string(),
                    field_type: "File".to_string(),
                },
                FieldDef {
                    field_name: "note".to_string(),
                    field_type: "Markdown".to_string(),
                },
            ],
        )
        .await;

        let registry = SchemaRegistry::new(store);
        let schema = registry.get("contact-form").await.unwrap();

        assert_eq!(schema.collection_key, "contact_form");
        assert_eq!(schema.model_identity, "dynamic:ContactForm");
        assert_eq!(schema.field_kind("name"), Some(FieldKind::Text));
        assert_eq!(schema.field_kind("photo"), Some(FieldKind::File));
        // unrecognized declared type falls back to text
        assert_eq!(schema.field_kind("note"), Some(FieldKind::Text));
        assert_eq!(schema.file_fields().collect::<Vec<_>>(), vec!["photo"]);
    }

    #[tokio::test]
    async fn second_get_is_a_cache_hit() {
        let store = Arc::new(MemoryDocumentStore::new());
        seed_page(&store, "Contact Form", vec![text_field("name")]).await;

        let registry = SchemaRegistry::new(store.clone());
        let first = registry.get("/contact-form").await.unwrap();
        let lookups_after_first = store.find_one_count();

        // different spelling of the same slug normalizes to the same entry
        let second = registry.get("Contact-Form").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.find_one_count(), lookups_after_first);
    }

    #[tokio::test]
    async fn unknown_slug_is_not_found() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.create_collection(PAGES_COLLECTION).await.unwrap();
        let registry = SchemaRegistry::new(store);

        match registry.get("/missing").await {
            Err(RegistryError::EntityNotFound(slug)) => assert_eq!(slug, "/missing"),
            other => panic!("expected EntityNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn invalidate_forces_rebuild() {
        let store = Arc::new(MemoryDocumentStore::new());
        let slug = seed_page(&store, "Contact Form", vec![text_field("name")]).await;

        let registry = SchemaRegistry::new(store.clone());
        let before = registry.get(&slug).await.unwrap();
        assert_eq!(before.field_kind("extra"), None);

        // descriptor gains a field; stale cache would miss it
        let stored = store
            .find_one(PAGES_COLLECTION, &query_eq("url_slug", slug.as_str()))
            .await
            .unwrap()
            .unwrap();
        let id = Uuid::parse_str(stored["id"].as_str().unwrap()).unwrap();
        let mut patch = crate::database::store::Document::new();
        patch.insert(
            "fields".to_string(),
            serde_json::json!([
                { "field_name": "name", "field_type": "Text" },
                { "field_name": "extra", "field_type": "Text" },
            ]),
        );
        store
            .update_by_id(PAGES_COLLECTION, id, patch)
            .await
            .unwrap();

        registry.invalidate(&slug).await;
        let after = registry.get(&slug).await.unwrap();
        assert_eq!(after.field_kind("extra"), Some(FieldKind::Text));
    }

    #[tokio::test]
    async fn concurrent_first_access_converges() {
        let store = Arc::new(MemoryDocumentStore::new());
        seed_page(&store, "Contact Form", vec![text_field("name")]).await;

        let registry = Arc::new(SchemaRegistry::new(store));
        let (a, b) = tokio::join!(
            {
                let r = registry.clone();
                async move { r.get("/contact-form").await.unwrap() }
            },
            {
                let r = registry.clone();
                async move { r.get("/contact-form").await.unwrap() }
            }
        );
        assert!(Arc::ptr_eq(&a, &b));
    }
}
