//! License CRUD.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::{Extension, Json};

use ems_core::{ApiResponse, PaginationQuery};
use ems_storage::repos::licenses::{self, LicenseUpdate, NewLicense};

use super::{cached_detail, cached_list, invalidate_entity, require};
use crate::error::ApiError;
use crate::middleware::AuthContext;
use crate::state::AppState;

const ENTITY: &str = "licenses";
const LABEL: &str = "License";

pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(page): Query<PaginationQuery>,
) -> Result<Response, ApiError> {
    cached_list(&state, ENTITY, &ctx, page, |scope, limit, offset| {
        licenses::list(&state.db, scope, limit, offset)
    })
    .await
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    cached_detail(&state, ENTITY, LABEL, &ctx, id, |scope, id| {
        licenses::find_by_id(&state.db, scope, id)
    })
    .await
}

pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<NewLicense>,
) -> Result<Json<ApiResponse<licenses::License>>, ApiError> {
    require("name", &body.name)?;
    if body.seats < 1 {
        return Err(ApiError::validation("seats", "must be at least 1"));
    }

    let created = licenses::create(&state.db, body, ctx.employee_id).await?;
    invalidate_entity(&state, ENTITY, Some(created.id)).await;
    Ok(Json(ApiResponse::ok(created)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(body): Json<LicenseUpdate>,
) -> Result<Json<ApiResponse<licenses::License>>, ApiError> {
    if let Some(seats) = body.seats
        && seats < 1
    {
        return Err(ApiError::validation("seats", "must be at least 1"));
    }

    let updated = licenses::update(&state.db, ctx.scope(), id, body).await?;
    invalidate_entity(&state, ENTITY, Some(id)).await;
    Ok(Json(ApiResponse::ok(updated)))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    licenses::delete(&state.db, ctx.scope(), id).await?;
    invalidate_entity(&state, ENTITY, Some(id)).await;
    Ok(Json(ApiResponse::message("License deleted")))
}
