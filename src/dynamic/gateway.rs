//! CRUD gateway for items of admin-defined pages.
//!
//! Resolves the page's runtime schema through the registry, routes
//! File-typed fields to the blob store, and cleans blobs up on delete.
//! Callers are expected to pass the authorization resolver first.

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::blob::BlobStore;
use crate::database::models::FieldDef;
use crate::database::store::{Document, DocumentStore, StoreError};
use crate::dynamic::registry::{FieldKind, RegistryError, SchemaRegistry};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid ID format: {0}")]
    InvalidIdentity(String),
    #[error("Page with URL {0} not found")]
    EntityNotFound(String),
    #[error("Item with ID {0} not found")]
    ItemNotFound(String),
    #[error("Unable to upload file: {0}")]
    UploadFailed(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RegistryError> for GatewayError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::EntityNotFound(slug) => GatewayError::EntityNotFound(slug),
            RegistryError::Store(e) => GatewayError::Store(e),
        }
    }
}

/// One uploaded file from a multipart request, matched to a field by name.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub field_name: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// A page's field definitions plus its items; lets a caller render a form
/// without a second fetch.
#[derive(Debug)]
pub struct ItemListing {
    pub fields: Vec<FieldDef>,
    pub items: Vec<Document>,
}

pub struct ItemGateway {
    store: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    registry: Arc<SchemaRegistry>,
}

impl ItemGateway {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        registry: Arc<SchemaRegistry>,
    ) -> Self {
        Self {
            store,
            blobs,
            registry,
        }
    }

    pub async fn list(&self, slug: &str) -> Result<ItemListing, GatewayError> {
        let schema = self.registry.get(slug).await?;
        let items = self
            .store
            .find(&schema.collection_key, &Document::new())
            .await?;
        Ok(ItemListing {
            fields: schema.fields.clone(),
            items,
        })
    }

    pub async fn get(&self, slug: &str, raw_id: &str) -> Result<Document, GatewayError> {
        let id = parse_item_id(raw_id)?;
        let schema = self.registry.get(slug).await?;
        self.store
            .find_by_id(&schema.collection_key, id)
            .await?
            .ok_or_else(|| GatewayError::ItemNotFound(raw_id.to_string()))
    }

    /// Create an item. File-typed fields source their value from the matching
    /// payload; every upload must resolve before anything is persisted, so a
    /// failed upload leaves no partial item behind.
    pub async fn create(
        &self,
        slug: &str,
        raw_fields: Document,
        files: Vec<FilePayload>,
    ) -> Result<Document, GatewayError> {
        let schema = self.registry.get(slug).await?;

        let mut item = Document::new();
        let mut uploads = Vec::new();

        for field in &schema.fields {
            let kind = FieldKind::from_type_name(&field.field_type);
            let payload = files.iter().find(|f| f.field_name == field.field_name);

            match (kind, payload) {
                (FieldKind::File, Some(payload)) => {
                    let key = blob_key(&payload.file_name);
                    let field_name = field.field_name.clone();
                    let blobs = self.blobs.clone();
                    let bytes = payload.bytes.clone();
                    uploads.push(async move {
                        let url = blobs
                            .put(&key, &bytes)
                            .await
                            .map_err(|e| GatewayError::UploadFailed(e.to_string()))?;
                        Ok::<(String, String), GatewayError>((field_name, url))
                    });
                }
                _ => {
                    if let Some(value) = raw_fields.get(&field.field_name) {
                        item.insert(field.field_name.clone(), value.clone());
                    }
                }
            }
        }

        // Fan-out/fan-in: uploads run concurrently and the first failure
        // aborts the create before any document is written.
        let uploaded = futures::future::try_join_all(uploads).await?;
        for (field_name, url) in uploaded {
            item.insert(field_name, Value::String(url));
        }

        Ok(self.store.insert(&schema.collection_key, item).await?)
    }

    pub async fn update(
        &self,
        slug: &str,
        raw_id: &str,
        mut raw_fields: Document,
    ) -> Result<Document, GatewayError> {
        let id = parse_item_id(raw_id)?;
        let schema = self.registry.get(slug).await?;

        // An item cannot be re-keyed through its own patch
        raw_fields.remove("id");

        self.store
            .update_by_id(&schema.collection_key, id, raw_fields)
            .await?
            .ok_or_else(|| GatewayError::ItemNotFound(raw_id.to_string()))
    }

    /// Delete an item and best-effort release the blobs behind its File
    /// fields. Blob deletion failures are logged, never surfaced.
    pub async fn delete(&self, slug: &str, raw_id: &str) -> Result<(), GatewayError> {
        let id = parse_item_id(raw_id)?;
        let schema = self.registry.get(slug).await?;

        let deleted = self
            .store
            .delete_by_id(&schema.collection_key, id)
            .await?
            .ok_or_else(|| GatewayError::ItemNotFound(raw_id.to_string()))?;

        for field_name in schema.file_fields() {
            let Some(Value::String(url)) = deleted.get(field_name) else {
                continue;
            };
            let Some(key) = blob_key_from_url(url) else {
                continue;
            };
            if let Err(e) = self.blobs.delete(key).await {
                warn!("Error deleting blob for field {}: {}", field_name, e);
            }
        }

        Ok(())
    }
}

fn parse_item_id(raw: &str) -> Result<Uuid, GatewayError> {
    Uuid::parse_str(raw).map_err(|_| GatewayError::InvalidIdentity(raw.to_string()))
}

/// Collision-resistant blob key: random prefix plus the sanitized original
/// file name (whitespace runs become "-").
fn blob_key(file_name: &str) -> String {
    let sanitized: String = {
        let mut out = String::with_capacity(file_name.len());
        let mut in_whitespace = false;
        for c in file_name.trim().chars() {
            if c.is_whitespace() {
                in_whitespace = true;
                continue;
            }
            if in_whitespace && !out.is_empty() {
                out.push('-');
            }
            in_whitespace = false;
            out.push(c);
        }
        out
    };
    format!("{}-{}", Uuid::new_v4(), sanitized)
}

/// Blob key for a stored public URL: the trailing path segment.
fn blob_key_from_url(url: &str) -> Option<&str> {
    url.rsplit('/').next().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;
    use crate::database::models::entity::{collection_key, url_slug};
    use crate::database::models::{to_document, EntityDescriptor};
    use crate::database::{MemoryDocumentStore, PAGES_COLLECTION};
    use chrono::Utc;
    use serde_json::json;

    struct Fixture {
        store: Arc<MemoryDocumentStore>,
        blobs: Arc<MemoryBlobStore>,
        gateway: ItemGateway,
    }

    async fn fixture(fields: Vec<(&str, &str)>) -> Fixture {
        let store = Arc::new(MemoryDocumentStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        store.create_collection(PAGES_COLLECTION).await.unwrap();

        let name = "Contact Form";
        let descriptor = EntityDescriptor {
            id: Uuid::new_v4(),
            name: name.to_string(),
            collection_key: collection_key(name),
            url_slug: url_slug(name),
            fields: fields
                .into_iter()
                .map(|(n, t)| FieldDef {
                    field_name: n.to_string(),
                    field_type: t.to_string(),
                })
                .collect(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store
            .insert(PAGES_COLLECTION, to_document(&descriptor).unwrap())
            .await
            .unwrap();
        store.create_collection("contact_form").await.unwrap();

        let registry = Arc::new(SchemaRegistry::new(store.clone()));
        let gateway = ItemGateway::new(store.clone(), blobs.clone(), registry);
        Fixture {
            store,
            blobs,
            gateway,
        }
    }

    fn fields(value: serde_json::Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn create_and_list_round_trip() {
        let fx = fixture(vec![("name", "Text")]).await;

        let created = fx
            .gateway
            .create("/contact-form", fields(json!({ "name": "Alice" })), vec![])
            .await
            .unwrap();
        assert_eq!(created["name"], json!("Alice"));
        assert!(Uuid::parse_str(created["id"].as_str().unwrap()).is_ok());

        let listing = fx.gateway.list("/contact-form").await.unwrap();
        assert_eq!(listing.items.len(), 1);
        assert_eq!(listing.fields.len(), 1);
        assert_eq!(listing.fields[0].field_name, "name");
    }

    #[tokio::test]
    async fn create_uploads_file_fields_and_stores_urls() {
        let fx = fixture(vec![("name", "Text"), ("photo", "File")]).await;

        let created = fx
            .gateway
            .create(
                "/contact-form",
                fields(json!({ "name": "Alice" })),
                vec![FilePayload {
                    field_name: "photo".to_string(),
                    file_name: "head shot.png".to_string(),
                    bytes: b"png-bytes".to_vec(),
                }],
            )
            .await
            .unwrap();

        let url = created["photo"].as_str().unwrap();
        assert!(url.starts_with("http://blobs.test/"));
        // whitespace in the original name was sanitized
        assert!(url.ends_with("-head-shot.png"));
        assert_eq!(fx.blobs.len().await, 1);
    }

    #[tokio::test]
    async fn failed_upload_aborts_create_without_persisting() {
        let fx = fixture(vec![("name", "Text"), ("photo", "File")]).await;
        fx.blobs.fail_puts(true);

        let result = fx
            .gateway
            .create(
                "/contact-form",
                fields(json!({ "name": "Alice" })),
                vec![FilePayload {
                    field_name: "photo".to_string(),
                    file_name: "photo.png".to_string(),
                    bytes: b"png-bytes".to_vec(),
                }],
            )
            .await;

        assert!(matches!(result, Err(GatewayError::UploadFailed(_))));
        let listing = fx.gateway.list("/contact-form").await.unwrap();
        assert!(listing.items.is_empty());
    }

    #[tokio::test]
    async fn delete_releases_one_blob_per_file_field() {
        let fx = fixture(vec![("photo", "File"), ("attachment", "File")]).await;

        let created = fx
            .gateway
            .create(
                "/contact-form",
                Document::new(),
                vec![
                    FilePayload {
                        field_name: "photo".to_string(),
                        file_name: "a.png".to_string(),
                        bytes: b"a".to_vec(),
                    },
                    FilePayload {
                        field_name: "attachment".to_string(),
                        file_name: "b.pdf".to_string(),
                        bytes: b"b".to_vec(),
                    },
                ],
            )
            .await
            .unwrap();

        let id = created["id"].as_str().unwrap();
        fx.gateway.delete("/contact-form", id).await.unwrap();

        assert_eq!(fx.blobs.deleted_keys().await.len(), 2);
        assert!(fx.blobs.is_empty().await);
    }

    #[tokio::test]
    async fn delete_survives_blob_failures() {
        let fx = fixture(vec![("photo", "File")]).await;

        let created = fx
            .gateway
            .create(
                "/contact-form",
                Document::new(),
                vec![FilePayload {
                    field_name: "photo".to_string(),
                    file_name: "a.png".to_string(),
                    bytes: b"a".to_vec(),
                }],
            )
            .await
            .unwrap();

        // second delete of the same key will fail inside the blob store
        let id = created["id"].as_str().unwrap();
        let key = fx.blobs.stored_keys().await.remove(0);
        fx.blobs.delete(&key).await.unwrap();

        fx.gateway.delete("/contact-form", id).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_id_fails_before_any_store_call() {
        let fx = fixture(vec![("name", "Text")]).await;
        let lookups_before = fx.store.find_one_count();

        for result in [
            fx.gateway.get("/contact-form", "not-a-uuid").await,
            fx.gateway
                .update("/contact-form", "not-a-uuid", Document::new())
                .await,
        ] {
            assert!(matches!(result, Err(GatewayError::InvalidIdentity(_))));
        }
        assert!(matches!(
            fx.gateway.delete("/contact-form", "not-a-uuid").await,
            Err(GatewayError::InvalidIdentity(_))
        ));

        assert_eq!(fx.store.find_one_count(), lookups_before);
    }

    #[tokio::test]
    async fn update_cannot_rekey_an_item() {
        let fx = fixture(vec![("name", "Text")]).await;

        let created = fx
            .gateway
            .create("/contact-form", fields(json!({ "name": "Alice" })), vec![])
            .await
            .unwrap();
        let id = created["id"].as_str().unwrap();

        let updated = fx
            .gateway
            .update(
                "/contact-form",
                id,
                fields(json!({ "name": "Alicia", "id": Uuid::new_v4().to_string() })),
            )
            .await
            .unwrap();

        assert_eq!(updated["name"], json!("Alicia"));
        assert_eq!(updated["id"], json!(id));
    }

    #[tokio::test]
    async fn missing_item_is_not_found() {
        let fx = fixture(vec![("name", "Text")]).await;
        let id = Uuid::new_v4().to_string();
        assert!(matches!(
            fx.gateway.get("/contact-form", &id).await,
            Err(GatewayError::ItemNotFound(_))
        ));
    }

    #[tokio::test]
    async fn unknown_slug_is_entity_not_found() {
        let fx = fixture(vec![("name", "Text")]).await;
        assert!(matches!(
            fx.gateway.list("/no-such-page").await,
            Err(GatewayError::EntityNotFound(_))
        ));
    }
}
