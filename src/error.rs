// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::ValidationError(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code()
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        ApiError::ValidationError(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert subsystem error types to ApiError
impl From<crate::database::store::StoreError> for ApiError {
    fn from(err: crate::database::store::StoreError) -> Self {
        match err {
            crate::database::store::StoreError::NotFound(msg) => ApiError::not_found(msg),
            crate::database::store::StoreError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
            crate::database::store::StoreError::ConfigMissing(_)
            | crate::database::store::StoreError::InvalidDatabaseUrl => {
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            crate::database::store::StoreError::QueryError(msg) => {
                tracing::error!("Store query error: {}", msg);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<crate::authz::AuthzError> for ApiError {
    fn from(err: crate::authz::AuthzError) -> Self {
        use crate::authz::AuthzError;
        match err {
            AuthzError::Unauthenticated => ApiError::unauthorized("User not authenticated"),
            AuthzError::RoleNotFound(role_id) => {
                ApiError::not_found(format!("Role not found for ID: {}", role_id))
            }
            AuthzError::EntityNotFound(slug) => {
                ApiError::not_found(format!("Page not found for URL: {}", slug))
            }
            AuthzError::NoGrant | AuthzError::ActionNotPermitted(_) => {
                ApiError::forbidden("Access denied")
            }
            AuthzError::Store(store_err) => store_err.into(),
        }
    }
}

impl From<crate::dynamic::gateway::GatewayError> for ApiError {
    fn from(err: crate::dynamic::gateway::GatewayError) -> Self {
        use crate::dynamic::gateway::GatewayError;
        match err {
            GatewayError::InvalidIdentity(id) => {
                ApiError::bad_request(format!("Invalid ID format: {}", id))
            }
            GatewayError::EntityNotFound(slug) => {
                ApiError::not_found(format!("Page with URL {} not found", slug))
            }
            GatewayError::ItemNotFound(id) => {
                ApiError::not_found(format!("Item with ID {} not found", id))
            }
            GatewayError::UploadFailed(msg) => {
                tracing::error!("File upload failed: {}", msg);
                ApiError::internal_server_error("An error occurred while creating the item")
            }
            GatewayError::Store(store_err) => store_err.into(),
        }
    }
}

impl From<crate::services::CatalogError> for ApiError {
    fn from(err: crate::services::CatalogError) -> Self {
        use crate::services::CatalogError;
        match err {
            CatalogError::Validation(msg) => ApiError::validation_error(msg),
            CatalogError::NotFound(msg) => ApiError::not_found(msg),
            CatalogError::Conflict(msg) => ApiError::conflict(msg),
            CatalogError::InvalidCredentials => ApiError::bad_request("Invalid credentials"),
            CatalogError::Credential(msg) => {
                tracing::error!("Credential error: {}", msg);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            CatalogError::Token(msg) => {
                tracing::error!("Token error: {}", msg);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            CatalogError::Store(store_err) => store_err.into(),
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
