//! /api/dynamic/:slug handlers: item CRUD for admin-defined pages.
//!
//! Every handler resolves the caller's permission through the authorization
//! resolver before touching the gateway. Create is multipart so File-typed
//! fields can carry payloads; update takes JSON.

use axum::{
    extract::{Extension, Multipart, Path},
    response::Json,
};
use serde_json::{json, Value};

use crate::authz::Principal;
use crate::context::AppContext;
use crate::database::store::Document;
use crate::dynamic::FilePayload;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::types::Action;

/// GET /api/dynamic/:slug - all items plus the page's field definitions
pub async fn list(
    Path(slug): Path<String>,
    Extension(ctx): Extension<AppContext>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Value> {
    ctx.authz.check(Some(principal), &slug, Action::Read).await?;

    let listing = ctx.gateway.list(&slug).await?;
    Ok(ApiResponse::success(json!({
        "fields": listing.fields,
        "data": listing.items,
    })))
}

/// GET /api/dynamic/:slug/:id
pub async fn get(
    Path((slug, id)): Path<(String, String)>,
    Extension(ctx): Extension<AppContext>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Document> {
    ctx.authz.check(Some(principal), &slug, Action::Read).await?;
    Ok(ApiResponse::success(ctx.gateway.get(&slug, &id).await?))
}

/// POST /api/dynamic/:slug - multipart create
pub async fn create(
    Path(slug): Path<String>,
    Extension(ctx): Extension<AppContext>,
    Extension(principal): Extension<Principal>,
    multipart: Multipart,
) -> ApiResult<Document> {
    ctx.authz
        .check(Some(principal), &slug, Action::Create)
        .await?;

    let (raw_fields, files) = read_multipart(multipart).await?;
    let item = ctx.gateway.create(&slug, raw_fields, files).await?;
    Ok(ApiResponse::created(item))
}

/// PUT /api/dynamic/:slug/:id
pub async fn update(
    Path((slug, id)): Path<(String, String)>,
    Extension(ctx): Extension<AppContext>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<Value>,
) -> ApiResult<Document> {
    ctx.authz
        .check(Some(principal), &slug, Action::Update)
        .await?;

    let raw_fields = match payload {
        Value::Object(map) => map,
        _ => return Err(ApiError::bad_request("Expected a JSON object")),
    };
    Ok(ApiResponse::success(
        ctx.gateway.update(&slug, &id, raw_fields).await?,
    ))
}

/// DELETE /api/dynamic/:slug/:id
pub async fn delete(
    Path((slug, id)): Path<(String, String)>,
    Extension(ctx): Extension<AppContext>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Value> {
    ctx.authz
        .check(Some(principal), &slug, Action::Delete)
        .await?;

    ctx.gateway.delete(&slug, &id).await?;
    Ok(ApiResponse::success(
        json!({ "message": "Item deleted successfully" }),
    ))
}

/// Split a multipart body into plain fields and file payloads. Parts with a
/// file name become payloads matched to File-typed fields by part name.
async fn read_multipart(
    mut multipart: Multipart,
) -> Result<(Document, Vec<FilePayload>), ApiError> {
    let mut raw_fields = Document::new();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.to_string()))?;
                files.push(FilePayload {
                    field_name: name,
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.to_string()))?;
                raw_fields.insert(name, Value::String(text));
            }
        }
    }

    Ok((raw_fields, files))
}
