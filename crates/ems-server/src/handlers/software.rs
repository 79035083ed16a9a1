//! Software inventory CRUD.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::{Extension, Json};

use ems_core::{ApiResponse, PaginationQuery};
use ems_storage::repos::software::{self, NewSoftware, SoftwareUpdate};

use super::{cached_detail, cached_list, invalidate_entity, require};
use crate::error::ApiError;
use crate::middleware::AuthContext;
use crate::state::AppState;

const ENTITY: &str = "software";
const LABEL: &str = "Software";

pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(page): Query<PaginationQuery>,
) -> Result<Response, ApiError> {
    cached_list(&state, ENTITY, &ctx, page, |scope, limit, offset| {
        software::list(&state.db, scope, limit, offset)
    })
    .await
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    cached_detail(&state, ENTITY, LABEL, &ctx, id, |scope, id| {
        software::find_by_id(&state.db, scope, id)
    })
    .await
}

pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<NewSoftware>,
) -> Result<Json<ApiResponse<software::Software>>, ApiError> {
    require("name", &body.name)?;

    let created = software::create(&state.db, body, ctx.employee_id).await?;
    invalidate_entity(&state, ENTITY, Some(created.id)).await;
    Ok(Json(ApiResponse::ok(created)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(body): Json<SoftwareUpdate>,
) -> Result<Json<ApiResponse<software::Software>>, ApiError> {
    let updated = software::update(&state.db, ctx.scope(), id, body).await?;
    invalidate_entity(&state, ENTITY, Some(id)).await;
    Ok(Json(ApiResponse::ok(updated)))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    software::delete(&state.db, ctx.scope(), id).await?;
    invalidate_entity(&state, ENTITY, Some(id)).await;
    Ok(Json(ApiResponse::message("Software deleted")))
}
