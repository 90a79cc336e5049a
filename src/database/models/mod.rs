pub mod entity;
pub mod role;
pub mod user;

pub use entity::{EntityDescriptor, FieldDef};
pub use role::{ActionFlags, PagePermission, Role};
pub use user::{PublicUser, User};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::database::store::{Document, StoreError};

/// Serialize a model into a store document.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::QueryError(format!(
            "model did not serialize to an object: {}",
            other
        ))),
        Err(e) => Err(StoreError::QueryError(e.to_string())),
    }
}

/// Deserialize a store document into a model.
pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(doc)).map_err(|e| StoreError::QueryError(e.to_string()))
}
