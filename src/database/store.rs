use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// A schemaless stored document: field name -> JSON value.
/// The store adds `id`, `created_at` and `updated_at` keys on read.
pub type Document = Map<String, Value>;

/// Errors from document store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Generic document store over named collections.
///
/// Collections are created and dropped at runtime as pages are defined, so
/// every operation is parametrized by collection name. Query documents match
/// on top-level field equality.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, collection: &str, query: &Document) -> Result<Vec<Document>, StoreError>;

    async fn find_one(
        &self,
        collection: &str,
        query: &Document,
    ) -> Result<Option<Document>, StoreError>;

    async fn find_by_id(&self, collection: &str, id: Uuid)
        -> Result<Option<Document>, StoreError>;

    /// Insert a document, assigning id and timestamps. Returns the stored form.
    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, StoreError>;

    /// Merge `patch` into the document with the given id and bump `updated_at`.
    /// Returns the updated document, or None if no document matched.
    async fn update_by_id(
        &self,
        collection: &str,
        id: Uuid,
        patch: Document,
    ) -> Result<Option<Document>, StoreError>;

    /// Delete by id, returning the deleted document if one matched.
    async fn delete_by_id(
        &self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<Document>, StoreError>;

    /// Create a collection. Must tolerate the collection already existing.
    async fn create_collection(&self, name: &str) -> Result<(), StoreError>;

    async fn drop_collection(&self, name: &str) -> Result<(), StoreError>;
}

/// Keys assigned by the store itself; caller-supplied values are discarded.
pub const SYSTEM_FIELDS: &[&str] = &["id", "created_at", "updated_at"];

/// Drop store-managed keys from an inbound document or patch.
pub fn strip_system_fields(doc: &mut Document) {
    for field in SYSTEM_FIELDS {
        doc.remove(*field);
    }
}

/// Build a single-field equality query document.
pub fn query_eq(field: &str, value: impl Into<Value>) -> Document {
    let mut query = Document::new();
    query.insert(field.to_string(), value.into());
    query
}

/// Validate collection names before they reach SQL or a path. Accepts names
/// produced by `slugify` plus the fixed system collections: lowercase
/// alphanumerics, `-` and `_`.
pub fn is_valid_collection_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_collection_names() {
        assert!(is_valid_collection_name("pages"));
        assert!(is_valid_collection_name("contact-form"));
        assert!(is_valid_collection_name("blog_posts2"));
        assert!(!is_valid_collection_name(""));
        assert!(!is_valid_collection_name("Contact Form"));
        assert!(!is_valid_collection_name("pages; DROP TABLE users"));
    }
}
