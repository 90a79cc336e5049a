//! Postgres-backed document store.
//!
//! Each collection is one table holding a `jsonb` document per row plus
//! store-managed id and timestamp columns. Collection names are validated
//! and quoted before they reach SQL.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::database::store::{
    is_valid_collection_name, strip_system_fields, Document, DocumentStore, StoreError,
};

pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Connect using DATABASE_URL.
    pub async fn connect() -> Result<Self, StoreError> {
        let raw = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::ConfigMissing("DATABASE_URL"))?;
        // Parse up front so a malformed URL fails here, not on first query
        url::Url::parse(&raw).map_err(|_| StoreError::InvalidDatabaseUrl)?;

        let pool = PgPoolOptions::new().connect(&raw).await?;
        info!("Connected document store pool");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Quote SQL identifier to prevent injection
    fn quote_identifier(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn table(name: &str) -> Result<String, StoreError> {
        if !is_valid_collection_name(name) {
            return Err(StoreError::QueryError(format!(
                "invalid collection name: {}",
                name
            )));
        }
        Ok(Self::quote_identifier(name))
    }

    fn row_to_document(row: &PgRow) -> Result<Document, StoreError> {
        let id: Uuid = row.try_get("id")?;
        let doc: Value = row.try_get("doc")?;
        let created_at: chrono::DateTime<chrono::Utc> = row.try_get("created_at")?;
        let updated_at: chrono::DateTime<chrono::Utc> = row.try_get("updated_at")?;

        let mut document = match doc {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::QueryError(format!(
                    "stored document is not an object: {}",
                    other
                )))
            }
        };
        document.insert("id".to_string(), Value::String(id.to_string()));
        document.insert(
            "created_at".to_string(),
            Value::String(created_at.to_rfc3339()),
        );
        document.insert(
            "updated_at".to_string(),
            Value::String(updated_at.to_rfc3339()),
        );
        Ok(document)
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find(&self, collection: &str, query: &Document) -> Result<Vec<Document>, StoreError> {
        let table = Self::table(collection)?;

        let rows = if query.is_empty() {
            let sql = format!(
                "SELECT id, doc, created_at, updated_at FROM {} ORDER BY created_at",
                table
            );
            sqlx::query(&sql).fetch_all(&self.pool).await?
        } else {
            let sql = format!(
                "SELECT id, doc, created_at, updated_at FROM {} WHERE doc @> $1 ORDER BY created_at",
                table
            );
            sqlx::query(&sql)
                .bind(Value::Object(query.clone()))
                .fetch_all(&self.pool)
                .await?
        };

        rows.iter().map(Self::row_to_document).collect()
    }

    async fn find_one(
        &self,
        collection: &str,
        query: &Document,
    ) -> Result<Option<Document>, StoreError> {
        let table = Self::table(collection)?;
        let sql = format!(
            "SELECT id, doc, created_at, updated_at FROM {} WHERE doc @> $1 LIMIT 1",
            table
        );
        let row = sqlx::query(&sql)
            .bind(Value::Object(query.clone()))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_document).transpose()
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<Document>, StoreError> {
        let table = Self::table(collection)?;
        let sql = format!(
            "SELECT id, doc, created_at, updated_at FROM {} WHERE id = $1",
            table
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::row_to_document).transpose()
    }

    async fn insert(&self, collection: &str, mut doc: Document) -> Result<Document, StoreError> {
        let table = Self::table(collection)?;
        strip_system_fields(&mut doc);

        let id = Uuid::new_v4();
        let sql = format!(
            "INSERT INTO {} (id, doc) VALUES ($1, $2) RETURNING id, doc, created_at, updated_at",
            table
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(Value::Object(doc))
            .fetch_one(&self.pool)
            .await?;
        Self::row_to_document(&row)
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: Uuid,
        mut patch: Document,
    ) -> Result<Option<Document>, StoreError> {
        let table = Self::table(collection)?;
        strip_system_fields(&mut patch);

        let sql = format!(
            "UPDATE {} SET doc = doc || $2, updated_at = now() \
             WHERE id = $1 RETURNING id, doc, created_at, updated_at",
            table
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(Value::Object(patch))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_document).transpose()
    }

    async fn delete_by_id(
        &self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<Document>, StoreError> {
        let table = Self::table(collection)?;
        let sql = format!(
            "DELETE FROM {} WHERE id = $1 RETURNING id, doc, created_at, updated_at",
            table
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::row_to_document).transpose()
    }

    async fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        let table = Self::table(name)?;
        // IF NOT EXISTS: re-creating an existing collection is not an error
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
                id UUID PRIMARY KEY, \
                doc JSONB NOT NULL DEFAULT '{{}}'::jsonb, \
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(), \
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()\
             )",
            table
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        info!("Created collection: {}", name);
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<(), StoreError> {
        let table = Self::table(name)?;
        let sql = format!("DROP TABLE IF EXISTS {}", table);
        sqlx::query(&sql).execute(&self.pool).await?;
        info!("Dropped collection: {}", name);
        Ok(())
    }
}
