//! Authorization resolver: per-request allow/deny for an action on a page.
//!
//! Resolution order is fixed: principal -> role -> page -> grant -> action
//! flag. Policy denials are terminal and specific; store failures propagate
//! separately as infrastructure errors.

use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::database::models::entity::normalize_slug;
use crate::database::models::{from_document, EntityDescriptor, Role};
use crate::database::store::{query_eq, DocumentStore, StoreError};
use crate::database::{PAGES_COLLECTION, ROLES_COLLECTION};
use crate::types::Action;

/// Authenticated principal, resolved from a verified token. Threaded through
/// authorization and gateway calls as a plain value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role_id: Uuid,
}

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("User not authenticated")]
    Unauthenticated,
    #[error("Role not found for ID: {0}")]
    RoleNotFound(Uuid),
    #[error("Page not found for URL: {0}")]
    EntityNotFound(String),
    #[error("Access denied")]
    NoGrant,
    #[error("Access denied for action {0}")]
    ActionNotPermitted(Action),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Authorizer {
    store: Arc<dyn DocumentStore>,
}

impl Authorizer {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Resolve whether `principal` may perform `action` on the page at
    /// `slug`. Ok(()) means allowed; every Err is either a specific denial
    /// or an infrastructure failure.
    pub async fn check(
        &self,
        principal: Option<Principal>,
        slug: &str,
        action: Action,
    ) -> Result<(), AuthzError> {
        let Some(principal) = principal else {
            warn!("User not authenticated");
            return Err(AuthzError::Unauthenticated);
        };

        // Role lookup always precedes the page lookup, so a dangling role
        // surfaces even when the slug is also unknown.
        let role = self.load_role(principal.role_id).await?;
        let page = self.load_page(slug).await?;

        let Some(grant) = role.permission_for(page.id) else {
            warn!(
                "Access denied for user {} on page {}",
                principal.user_id, page.url_slug
            );
            return Err(AuthzError::NoGrant);
        };

        if grant.actions.allows(action) {
            Ok(())
        } else {
            warn!(
                "Access denied for action {} on page {}",
                action, page.url_slug
            );
            Err(AuthzError::ActionNotPermitted(action))
        }
    }

    async fn load_role(&self, role_id: Uuid) -> Result<Role, AuthzError> {
        let doc = self
            .store
            .find_by_id(ROLES_COLLECTION, role_id)
            .await?
            .ok_or_else(|| {
                warn!("Role not found for ID: {}", role_id);
                AuthzError::RoleNotFound(role_id)
            })?;
        Ok(from_document(doc)?)
    }

    async fn load_page(&self, slug: &str) -> Result<EntityDescriptor, AuthzError> {
        let normalized = normalize_slug(slug);
        let doc = self
            .store
            .find_one(PAGES_COLLECTION, &query_eq("url_slug", normalized.as_str()))
            .await?
            .ok_or_else(|| {
                warn!("Page not found for URL: {}", normalized);
                AuthzError::EntityNotFound(normalized.clone())
            })?;
        Ok(from_document(doc)?)
    }
}
