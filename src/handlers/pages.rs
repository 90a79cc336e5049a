//! /api/pages handlers: administrative page catalog CRUD.
//!
//! These routes are authenticated but not permission-checked; only item
//! routes go through the authorization resolver.

use axum::{
    extract::{Extension, Path},
    response::Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::authz::Principal;
use crate::context::AppContext;
use crate::database::models::EntityDescriptor;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{CreatePage, RolePageView, UpdatePage};

/// POST /api/pages
pub async fn create(
    Extension(ctx): Extension<AppContext>,
    Json(input): Json<CreatePage>,
) -> ApiResult<EntityDescriptor> {
    let page = ctx.entities.create(input).await?;
    Ok(ApiResponse::created(page))
}

/// GET /api/pages
pub async fn list(Extension(ctx): Extension<AppContext>) -> ApiResult<Vec<EntityDescriptor>> {
    Ok(ApiResponse::success(ctx.entities.list().await?))
}

/// GET /api/pages/role - pages visible to the caller's role
pub async fn list_for_role(
    Extension(ctx): Extension<AppContext>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<RolePageView>> {
    let views = ctx.entities.list_for_role(principal.role_id).await?;
    Ok(ApiResponse::success(views))
}

/// GET /api/pages/:slug
pub async fn get_by_slug(
    Path(slug): Path<String>,
    Extension(ctx): Extension<AppContext>,
) -> ApiResult<EntityDescriptor> {
    Ok(ApiResponse::success(ctx.entities.find_by_slug(&slug).await?))
}

/// PUT /api/pages/:id
///
/// Shares its path segment with GET-by-slug, so the id arrives as a string
/// and is parsed here.
pub async fn update(
    Path(id): Path<String>,
    Extension(ctx): Extension<AppContext>,
    Json(input): Json<UpdatePage>,
) -> ApiResult<EntityDescriptor> {
    let id = parse_page_id(&id)?;
    Ok(ApiResponse::success(ctx.entities.update(id, input).await?))
}

/// DELETE /api/pages/:id
pub async fn delete(
    Path(id): Path<String>,
    Extension(ctx): Extension<AppContext>,
) -> ApiResult<Value> {
    let id = parse_page_id(&id)?;
    ctx.entities.delete(id).await?;
    Ok(ApiResponse::success(
        json!({ "message": "Page and related permissions deleted successfully" }),
    ))
}

fn parse_page_id(raw: &str) -> Result<Uuid, crate::error::ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| crate::error::ApiError::bad_request(format!("Invalid page ID format: {}", raw)))
}
