//! Principal catalog: registration, login, and administrative user CRUD.
//!
//! Passwords are hashed before storage and the hash never appears in a
//! response; reads go out as `PublicUser`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::{generate_jwt, Claims};
use crate::database::models::{from_document, PublicUser, User};
use crate::database::store::{query_eq, Document, DocumentStore};
use crate::database::{ROLES_COLLECTION, USERS_COLLECTION};
use crate::services::CatalogError;

#[derive(Debug, Deserialize)]
pub struct RegisterUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub token: String,
    pub username: String,
    pub role_id: Uuid,
}

pub struct UserService {
    store: Arc<dyn DocumentStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn register(&self, input: RegisterUser) -> Result<PublicUser, CatalogError> {
        if input.username.trim().is_empty() || input.email.trim().is_empty() {
            return Err(CatalogError::Validation(
                "Username and email are required".into(),
            ));
        }
        if input.password.len() < 6 {
            return Err(CatalogError::Validation(
                "Password must be at least 6 characters long".into(),
            ));
        }
        self.require_role(input.role_id).await?;

        for (field, value) in [("username", &input.username), ("email", &input.email)] {
            if self
                .store
                .find_one(USERS_COLLECTION, &query_eq(field, value.as_str()))
                .await?
                .is_some()
            {
                return Err(CatalogError::Conflict(format!(
                    "A user with that {} already exists",
                    field
                )));
            }
        }

        let hash =
            hash_password(&input.password).map_err(|e| CatalogError::Credential(e.to_string()))?;

        let mut doc = Document::new();
        doc.insert("username".to_string(), Value::String(input.username.clone()));
        doc.insert("email".to_string(), Value::String(input.email));
        doc.insert("password_hash".to_string(), Value::String(hash));
        doc.insert(
            "role_id".to_string(),
            Value::String(input.role_id.to_string()),
        );
        let stored = self.store.insert(USERS_COLLECTION, doc).await?;

        info!("New user registered: {}", input.username);
        let user: User = from_document(stored)?;
        Ok(user.into())
    }

    /// Verify credentials and issue a token. Unknown email and wrong
    /// password are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, CatalogError> {
        let doc = self
            .store
            .find_one(USERS_COLLECTION, &query_eq("email", email))
            .await?;
        let Some(doc) = doc else {
            warn!("Login attempt with non-existent email: {}", email);
            return Err(CatalogError::InvalidCredentials);
        };
        let user: User = from_document(doc)?;

        let matches = verify_password(password, &user.password_hash)
            .map_err(|e| CatalogError::Credential(e.to_string()))?;
        if !matches {
            warn!("Failed login attempt for user: {}", email);
            return Err(CatalogError::InvalidCredentials);
        }

        let token = generate_jwt(Claims::new(user.id, user.role_id))
            .map_err(|e| CatalogError::Token(e.to_string()))?;

        info!("User logged in: {}", email);
        Ok(LoginResponse {
            user_id: user.id,
            token,
            username: user.username,
            role_id: user.role_id,
        })
    }

    pub async fn list(&self) -> Result<Vec<PublicUser>, CatalogError> {
        let docs = self.store.find(USERS_COLLECTION, &Document::new()).await?;
        docs.into_iter()
            .map(|d| {
                from_document::<User>(d)
                    .map(PublicUser::from)
                    .map_err(CatalogError::from)
            })
            .collect()
    }

    pub async fn update(&self, id: Uuid, input: UpdateUser) -> Result<PublicUser, CatalogError> {
        if let Some(role_id) = input.role_id {
            self.require_role(role_id).await?;
        }

        let mut patch = Document::new();
        if let Some(username) = input.username {
            patch.insert("username".to_string(), Value::String(username));
        }
        if let Some(email) = input.email {
            patch.insert("email".to_string(), Value::String(email));
        }
        if let Some(role_id) = input.role_id {
            patch.insert("role_id".to_string(), Value::String(role_id.to_string()));
        }
        if let Some(password) = input.password {
            if password.len() < 6 {
                return Err(CatalogError::Validation(
                    "Password must be at least 6 characters long".into(),
                ));
            }
            let hash =
                hash_password(&password).map_err(|e| CatalogError::Credential(e.to_string()))?;
            patch.insert("password_hash".to_string(), Value::String(hash));
        }

        let updated = self
            .store
            .update_by_id(USERS_COLLECTION, id, patch)
            .await?
            .ok_or_else(|| CatalogError::NotFound("User not found".into()))?;

        info!("User updated: {}", id);
        let user: User = from_document(updated)?;
        Ok(user.into())
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), CatalogError> {
        self.store
            .delete_by_id(USERS_COLLECTION, id)
            .await?
            .ok_or_else(|| CatalogError::NotFound("User not found".into()))?;
        info!("User deleted: {}", id);
        Ok(())
    }

    async fn require_role(&self, role_id: Uuid) -> Result<(), CatalogError> {
        self.store
            .find_by_id(ROLES_COLLECTION, role_id)
            .await?
            .ok_or_else(|| CatalogError::NotFound("Role not found".into()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::validate_jwt;
    use crate::testing;

    #[tokio::test]
    async fn register_requires_existing_role() {
        let backend = testing::TestBackend::new().await;
        let result = backend
            .users
            .register(RegisterUser {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "hunter2hunter2".to_string(),
                role_id: Uuid::new_v4(),
            })
            .await;
        assert!(matches!(result, Err(CatalogError::NotFound(_))));
    }

    #[tokio::test]
    async fn register_never_exposes_the_hash() {
        let backend = testing::TestBackend::new().await;
        let admin = backend.admin_role().await;

        let user = backend
            .users
            .register(RegisterUser {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "hunter2hunter2".to_string(),
                role_id: admin.id,
            })
            .await
            .unwrap();

        let as_json = serde_json::to_value(&user).unwrap();
        assert!(as_json.get("password_hash").is_none());
        assert!(!as_json.to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn register_rejects_duplicate_username_and_email() {
        let backend = testing::TestBackend::new().await;
        let admin = backend.admin_role().await;
        backend
            .users
            .register(RegisterUser {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "hunter2hunter2".to_string(),
                role_id: admin.id,
            })
            .await
            .unwrap();

        let duplicate_username = backend
            .users
            .register(RegisterUser {
                username: "alice".to_string(),
                email: "other@example.com".to_string(),
                password: "hunter2hunter2".to_string(),
                role_id: admin.id,
            })
            .await;
        assert!(matches!(duplicate_username, Err(CatalogError::Conflict(_))));
    }

    #[tokio::test]
    async fn login_issues_a_token_carrying_the_role() {
        let backend = testing::TestBackend::new().await;
        let admin = backend.admin_role().await;
        let user = backend
            .users
            .register(RegisterUser {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "hunter2hunter2".to_string(),
                role_id: admin.id,
            })
            .await
            .unwrap();

        let login = backend
            .users
            .login("alice@example.com", "hunter2hunter2")
            .await
            .unwrap();
        assert_eq!(login.user_id, user.id);
        assert_eq!(login.role_id, admin.id);

        let claims = validate_jwt(&login.token).unwrap();
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.role_id, admin.id);
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials_uniformly() {
        let backend = testing::TestBackend::new().await;
        let admin = backend.admin_role().await;
        backend
            .users
            .register(RegisterUser {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "hunter2hunter2".to_string(),
                role_id: admin.id,
            })
            .await
            .unwrap();

        assert!(matches!(
            backend.users.login("alice@example.com", "wrong").await,
            Err(CatalogError::InvalidCredentials)
        ));
        assert!(matches!(
            backend.users.login("nobody@example.com", "wrong").await,
            Err(CatalogError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn update_rehashes_password() {
        let backend = testing::TestBackend::new().await;
        let admin = backend.admin_role().await;
        let user = backend
            .users
            .register(RegisterUser {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "hunter2hunter2".to_string(),
                role_id: admin.id,
            })
            .await
            .unwrap();

        backend
            .users
            .update(
                user.id,
                UpdateUser {
                    password: Some("new-password".to_string()),
                    ..UpdateUser::default()
                },
            )
            .await
            .unwrap();

        assert!(backend
            .users
            .login("alice@example.com", "new-password")
            .await
            .is_ok());
        assert!(backend
            .users
            .login("alice@example.com", "hunter2hunter2")
            .await
            .is_err());
    }
}
