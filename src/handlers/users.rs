//! /api/users handlers: registration, login and administrative user CRUD.

use axum::{
    extract::{Extension, Path},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::context::AppContext;
use crate::database::models::PublicUser;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{LoginResponse, RegisterUser, UpdateUser};

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// POST /api/users/register
pub async fn register(
    Extension(ctx): Extension<AppContext>,
    Json(input): Json<RegisterUser>,
) -> ApiResult<Value> {
    ctx.users.register(input).await?;
    Ok(ApiResponse::created(
        json!({ "message": "User registered successfully" }),
    ))
}

/// POST /api/users/login
pub async fn login(
    Extension(ctx): Extension<AppContext>,
    Json(input): Json<LoginInput>,
) -> ApiResult<LoginResponse> {
    let response = ctx.users.login(&input.email, &input.password).await?;
    Ok(ApiResponse::success(response))
}

/// GET /api/users
pub async fn list(Extension(ctx): Extension<AppContext>) -> ApiResult<Vec<PublicUser>> {
    Ok(ApiResponse::success(ctx.users.list().await?))
}

/// PUT /api/users/:id
pub async fn update(
    Path(id): Path<Uuid>,
    Extension(ctx): Extension<AppContext>,
    Json(input): Json<UpdateUser>,
) -> ApiResult<PublicUser> {
    Ok(ApiResponse::success(ctx.users.update(id, input).await?))
}

/// DELETE /api/users/:id
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(ctx): Extension<AppContext>,
) -> ApiResult<Value> {
    ctx.users.delete(id).await?;
    Ok(ApiResponse::success(
        json!({ "message": "User deleted successfully" }),
    ))
}
