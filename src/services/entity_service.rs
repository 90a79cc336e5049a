//! Page catalog: descriptor CRUD plus the provisioning flow around it.
//!
//! Creating a page is a three-step sequence (descriptor, physical
//! collection, administrator grant) with no transaction across the steps.
//! The window is kept small: a failed collection create compensates by
//! deleting the descriptor, and every step logs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config;
use crate::database::models::entity::{collection_key, normalize_slug, url_slug};
use crate::database::models::{
    from_document, ActionFlags, EntityDescriptor, FieldDef, PagePermission, Role,
};
use crate::database::store::{query_eq, Document, DocumentStore};
use crate::database::{PAGES_COLLECTION, ROLES_COLLECTION, USERS_COLLECTION};
use crate::dynamic::SchemaRegistry;
use crate::services::CatalogError;

#[derive(Debug, Deserialize)]
pub struct CreatePage {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePage {
    pub name: Option<String>,
    pub fields: Option<Vec<FieldDef>>,
}

/// A page as visible to one role: routing info plus that role's grant flags.
#[derive(Debug, Serialize)]
pub struct RolePageView {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub actions: ActionFlags,
}

pub struct EntityService {
    store: Arc<dyn DocumentStore>,
    registry: Arc<SchemaRegistry>,
}

impl EntityService {
    pub fn new(store: Arc<dyn DocumentStore>, registry: Arc<SchemaRegistry>) -> Self {
        Self { store, registry }
    }

    pub async fn create(&self, input: CreatePage) -> Result<EntityDescriptor, CatalogError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(CatalogError::Validation("Page name is required".into()));
        }
        validate_fields(&input.fields)?;

        let collection = collection_key(&name);
        let slug = url_slug(&name);

        // A page must not shadow the fixed system collections
        if [PAGES_COLLECTION, ROLES_COLLECTION, USERS_COLLECTION].contains(&collection.as_str()) {
            return Err(CatalogError::Validation(format!(
                "Page name {} is reserved",
                name
            )));
        }

        if self
            .store
            .find_one(PAGES_COLLECTION, &query_eq("url_slug", slug.as_str()))
            .await?
            .is_some()
        {
            return Err(CatalogError::Conflict(format!(
                "Page with URL {} already exists",
                slug
            )));
        }

        let mut doc = Document::new();
        doc.insert("name".to_string(), Value::String(name.clone()));
        doc.insert(
            "collection_key".to_string(),
            Value::String(collection.clone()),
        );
        doc.insert("url_slug".to_string(), Value::String(slug.clone()));
        doc.insert(
            "fields".to_string(),
            serde_json::to_value(&input.fields)
                .map_err(|e| CatalogError::Validation(e.to_string()))?,
        );
        let stored = self.store.insert(PAGES_COLLECTION, doc).await?;
        let descriptor: EntityDescriptor = from_document(stored)?;

        // Step two: materialize the physical collection. On failure the
        // descriptor insert is compensated so no page exists without a
        // backing collection.
        if let Err(e) = self.store.create_collection(&collection).await {
            error!("Error creating collection {}: {}", collection, e);
            if let Err(cleanup) = self
                .store
                .delete_by_id(PAGES_COLLECTION, descriptor.id)
                .await
            {
                error!(
                    "Failed to remove descriptor {} after collection error: {}",
                    descriptor.id, cleanup
                );
            }
            return Err(e.into());
        }
        info!("New collection created: {}", collection);

        // Step three: the administrator role receives a full grant.
        self.grant_to_admin_role(descriptor.id).await?;

        info!("New page created: {}", descriptor.name);
        Ok(descriptor)
    }

    pub async fn list(&self) -> Result<Vec<EntityDescriptor>, CatalogError> {
        let docs = self.store.find(PAGES_COLLECTION, &Document::new()).await?;
        docs.into_iter()
            .map(|d| from_document(d).map_err(CatalogError::from))
            .collect()
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<EntityDescriptor, CatalogError> {
        let normalized = normalize_slug(slug);
        let doc = self
            .store
            .find_one(PAGES_COLLECTION, &query_eq("url_slug", normalized.as_str()))
            .await?
            .ok_or_else(|| {
                CatalogError::NotFound(format!("Page with URL {} not found", normalized))
            })?;
        Ok(from_document(doc)?)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<EntityDescriptor, CatalogError> {
        let doc = self
            .store
            .find_by_id(PAGES_COLLECTION, id)
            .await?
            .ok_or_else(|| CatalogError::NotFound("Page not found".into()))?;
        Ok(from_document(doc)?)
    }

    /// Pages visible to a role, each with the role's action flags. Grants
    /// pointing at pages that no longer exist are skipped.
    pub async fn list_for_role(&self, role_id: Uuid) -> Result<Vec<RolePageView>, CatalogError> {
        let role_doc = self
            .store
            .find_by_id(ROLES_COLLECTION, role_id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Role not found for ID: {}", role_id)))?;
        let role: Role = from_document(role_doc)?;

        let mut views = Vec::with_capacity(role.page_permissions.len());
        for permission in &role.page_permissions {
            match self.store.find_by_id(PAGES_COLLECTION, permission.page_id).await? {
                Some(doc) => {
                    let page: EntityDescriptor = from_document(doc)?;
                    views.push(RolePageView {
                        id: page.id,
                        name: page.name,
                        url: page.url_slug,
                        actions: permission.actions,
                    });
                }
                None => {
                    warn!(
                        "Role {} grants a page that no longer exists: {}",
                        role.name, permission.page_id
                    );
                }
            }
        }
        Ok(views)
    }

    /// Update the display name and/or field list. The derived
    /// collection_key and url_slug are immutable once created; existing
    /// items are not migrated when the field list changes.
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdatePage,
    ) -> Result<EntityDescriptor, CatalogError> {
        let existing = self.find_by_id(id).await?;

        let mut patch = Document::new();
        if let Some(name) = input.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(CatalogError::Validation("Page name is required".into()));
            }
            patch.insert("name".to_string(), Value::String(name));
        }
        if let Some(fields) = input.fields {
            validate_fields(&fields)?;
            patch.insert(
                "fields".to_string(),
                serde_json::to_value(&fields)
                    .map_err(|e| CatalogError::Validation(e.to_string()))?,
            );
        }

        let updated = self
            .store
            .update_by_id(PAGES_COLLECTION, id, patch)
            .await?
            .ok_or_else(|| CatalogError::NotFound("Page not found".into()))?;

        // The next item operation rebuilds the runtime schema
        self.registry.invalidate(&existing.url_slug).await;

        Ok(from_document(updated)?)
    }

    /// Delete a page: drop its collection, remove the descriptor, strip the
    /// page's grants from every role, and forget the cached schema.
    pub async fn delete(&self, id: Uuid) -> Result<(), CatalogError> {
        let page = self.find_by_id(id).await?;

        if let Err(e) = self.store.drop_collection(&page.collection_key).await {
            error!("Error dropping collection {}: {}", page.collection_key, e);
        } else {
            info!("Collection {} deleted successfully", page.collection_key);
        }

        self.store.delete_by_id(PAGES_COLLECTION, id).await?;
        self.strip_grants(page.id).await?;
        self.registry.invalidate(&page.url_slug).await;

        info!("Page {} and related permissions deleted", page.name);
        Ok(())
    }

    async fn grant_to_admin_role(&self, page_id: Uuid) -> Result<(), CatalogError> {
        let admin_name = &config::config().security.admin_role_name;
        let role_doc = self
            .store
            .find_one(ROLES_COLLECTION, &query_eq("name", admin_name.as_str()))
            .await?
            .ok_or_else(|| {
                error!("Administrator role {} not found for page grant", admin_name);
                CatalogError::NotFound(format!("Role {} not found", admin_name))
            })?;
        let mut role: Role = from_document(role_doc)?;

        role.page_permissions.push(PagePermission {
            page_id,
            actions: ActionFlags::all(),
        });

        let mut patch = Document::new();
        patch.insert(
            "page_permissions".to_string(),
            serde_json::to_value(&role.page_permissions)
                .map_err(|e| CatalogError::Validation(e.to_string()))?,
        );
        self.store
            .update_by_id(ROLES_COLLECTION, role.id, patch)
            .await?
            .ok_or_else(|| {
                error!("Failed to update {} role with new page grant", admin_name);
                CatalogError::NotFound(format!("Role {} not found", admin_name))
            })?;
        Ok(())
    }

    async fn strip_grants(&self, page_id: Uuid) -> Result<(), CatalogError> {
        let roles = self.store.find(ROLES_COLLECTION, &Document::new()).await?;
        for doc in roles {
            let role: Role = from_document(doc)?;
            if role.permission_for(page_id).is_none() {
                continue;
            }
            let remaining: Vec<PagePermission> = role
                .page_permissions
                .into_iter()
                .filter(|p| p.page_id != page_id)
                .collect();
            let mut patch = Document::new();
            patch.insert(
                "page_permissions".to_string(),
                serde_json::to_value(&remaining)
                    .map_err(|e| CatalogError::Validation(e.to_string()))?,
            );
            self.store
                .update_by_id(ROLES_COLLECTION, role.id, patch)
                .await?;
        }
        Ok(())
    }
}

/// Field lists must not declare the same field name twice.
fn validate_fields(fields: &[FieldDef]) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for field in fields {
        if field.field_name.trim().is_empty() {
            return Err(CatalogError::Validation("Field name is required".into()));
        }
        if !seen.insert(field.field_name.as_str()) {
            return Err(CatalogError::Validation(format!(
                "Duplicate field name: {}",
                field.field_name
            )));
        }
    }
    Ok(())
}
