//! Role catalog: CRUD with referential validation.
//!
//! Every grant must point at an existing page at write time, one grant per
//! page, and a role still referenced by users cannot be deleted.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::database::models::{from_document, PagePermission, Role};
use crate::database::store::{query_eq, Document, DocumentStore};
use crate::database::{PAGES_COLLECTION, ROLES_COLLECTION, USERS_COLLECTION};
use crate::services::CatalogError;

#[derive(Debug, Deserialize)]
pub struct RoleInput {
    pub name: String,
    #[serde(default)]
    pub page_permissions: Vec<PagePermission>,
}

pub struct RoleService {
    store: Arc<dyn DocumentStore>,
}

impl RoleService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, input: RoleInput) -> Result<Role, CatalogError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(CatalogError::Validation("Role name is required".into()));
        }
        if self
            .store
            .find_one(ROLES_COLLECTION, &query_eq("name", name.as_str()))
            .await?
            .is_some()
        {
            return Err(CatalogError::Conflict(format!(
                "Role {} already exists",
                name
            )));
        }
        self.validate_permissions(&input.page_permissions).await?;

        let mut doc = Document::new();
        doc.insert("name".to_string(), Value::String(name.clone()));
        doc.insert(
            "page_permissions".to_string(),
            serde_json::to_value(&input.page_permissions)
                .map_err(|e| CatalogError::Validation(e.to_string()))?,
        );
        let stored = self.store.insert(ROLES_COLLECTION, doc).await?;

        info!("New role created: {}", name);
        Ok(from_document(stored)?)
    }

    pub async fn list(&self) -> Result<Vec<Role>, CatalogError> {
        let docs = self.store.find(ROLES_COLLECTION, &Document::new()).await?;
        docs.into_iter()
            .map(|d| from_document(d).map_err(CatalogError::from))
            .collect()
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Role, CatalogError> {
        let doc = self
            .store
            .find_by_id(ROLES_COLLECTION, id)
            .await?
            .ok_or_else(|| CatalogError::NotFound("Role not found".into()))?;
        Ok(from_document(doc)?)
    }

    pub async fn update(&self, id: Uuid, input: RoleInput) -> Result<Role, CatalogError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(CatalogError::Validation("Role name is required".into()));
        }
        self.validate_permissions(&input.page_permissions).await?;

        let mut patch = Document::new();
        patch.insert("name".to_string(), Value::String(name));
        patch.insert(
            "page_permissions".to_string(),
            serde_json::to_value(&input.page_permissions)
                .map_err(|e| CatalogError::Validation(e.to_string()))?,
        );

        let updated = self
            .store
            .update_by_id(ROLES_COLLECTION, id, patch)
            .await?
            .ok_or_else(|| CatalogError::NotFound("Role not found".into()))?;
        Ok(from_document(updated)?)
    }

    /// Delete a role. Rejected while any user still references it.
    pub async fn delete(&self, id: Uuid) -> Result<(), CatalogError> {
        let role = self.find_by_id(id).await?;

        let in_use = self
            .store
            .find_one(USERS_COLLECTION, &query_eq("role_id", id.to_string()))
            .await?
            .is_some();
        if in_use {
            return Err(CatalogError::Conflict(format!(
                "Role {} is still assigned to users",
                role.name
            )));
        }

        self.store.delete_by_id(ROLES_COLLECTION, id).await?;
        info!("Role deleted: {}", role.name);
        Ok(())
    }

    /// One grant per page, and every page must exist.
    async fn validate_permissions(
        &self,
        permissions: &[PagePermission],
    ) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for permission in permissions {
            if !seen.insert(permission.page_id) {
                return Err(CatalogError::Validation(format!(
                    "Duplicate permission for page: {}",
                    permission.page_id
                )));
            }
            if self
                .store
                .find_by_id(PAGES_COLLECTION, permission.page_id)
                .await?
                .is_none()
            {
                return Err(CatalogError::NotFound(format!(
                    "Page not found with ID: {}",
                    permission.page_id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::ActionFlags;
    use crate::services::{CreatePage, RegisterUser};
    use crate::testing;

    #[tokio::test]
    async fn create_validates_page_references() {
        let backend = testing::TestBackend::new().await;

        let result = backend
            .roles
            .create(RoleInput {
                name: "Editor".to_string(),
                page_permissions: vec![PagePermission {
                    page_id: Uuid::new_v4(),
                    actions: ActionFlags::default(),
                }],
            })
            .await;
        assert!(matches!(result, Err(CatalogError::NotFound(_))));
    }

    #[tokio::test]
    async fn create_rejects_duplicate_grants_for_one_page() {
        let backend = testing::TestBackend::new().await;
        let page = backend
            .entities
            .create(CreatePage {
                name: "Contact Form".to_string(),
                fields: vec![],
            })
            .await
            .unwrap();

        let result = backend
            .roles
            .create(RoleInput {
                name: "Editor".to_string(),
                page_permissions: vec![
                    PagePermission {
                        page_id: page.id,
                        actions: ActionFlags::default(),
                    },
                    PagePermission {
                        page_id: page.id,
                        actions: ActionFlags::all(),
                    },
                ],
            })
            .await;
        assert!(matches!(result, Err(CatalogError::Validation(_))));
    }

    #[tokio::test]
    async fn create_rejects_duplicate_name() {
        let backend = testing::TestBackend::new().await;
        let result = backend
            .roles
            .create(RoleInput {
                name: "Administrator".to_string(),
                page_permissions: vec![],
            })
            .await;
        assert!(matches!(result, Err(CatalogError::Conflict(_))));
    }

    #[tokio::test]
    async fn delete_is_rejected_while_users_reference_the_role() {
        let backend = testing::TestBackend::new().await;
        let role = backend
            .roles
            .create(RoleInput {
                name: "Editor".to_string(),
                page_permissions: vec![],
            })
            .await
            .unwrap();

        backend
            .users
            .register(RegisterUser {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "hunter2hunter2".to_string(),
                role_id: role.id,
            })
            .await
            .unwrap();

        assert!(matches!(
            backend.roles.delete(role.id).await,
            Err(CatalogError::Conflict(_))
        ));

        // still deletable once unreferenced
        let users = backend.users.list().await.unwrap();
        backend.users.delete(users[0].id).await.unwrap();
        backend.roles.delete(role.id).await.unwrap();
    }
}
