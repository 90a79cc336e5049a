pub mod entity_service;
pub mod role_service;
pub mod user_service;

pub use entity_service::{CreatePage, EntityService, RolePageView, UpdatePage};
pub use role_service::{RoleInput, RoleService};
pub use user_service::{LoginResponse, RegisterUser, UpdateUser, UserService};

use thiserror::Error;

use crate::database::store::StoreError;

/// Errors from the catalog services (pages, roles, users)
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Token error: {0}")]
    Token(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
