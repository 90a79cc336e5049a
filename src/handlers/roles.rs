//! /api/roles handlers: administrative role catalog CRUD.

use axum::{
    extract::{Extension, Path},
    response::Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::context::AppContext;
use crate::database::models::Role;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::RoleInput;

/// POST /api/roles
pub async fn create(
    Extension(ctx): Extension<AppContext>,
    Json(input): Json<RoleInput>,
) -> ApiResult<Role> {
    let role = ctx.roles.create(input).await?;
    Ok(ApiResponse::created(role))
}

/// GET /api/roles
pub async fn list(Extension(ctx): Extension<AppContext>) -> ApiResult<Vec<Role>> {
    Ok(ApiResponse::success(ctx.roles.list().await?))
}

/// PUT /api/roles/:id
pub async fn update(
    Path(id): Path<Uuid>,
    Extension(ctx): Extension<AppContext>,
    Json(input): Json<RoleInput>,
) -> ApiResult<Role> {
    Ok(ApiResponse::success(ctx.roles.update(id, input).await?))
}

/// DELETE /api/roles/:id
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(ctx): Extension<AppContext>,
) -> ApiResult<Value> {
    ctx.roles.delete(id).await?;
    Ok(ApiResponse::success(
        json!({ "message": "Role deleted successfully" }),
    ))
}
