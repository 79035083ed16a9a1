//! Department CRUD. Departments are reference data: readable by every
//! authenticated caller, writable by administrators.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};

use ems_core::{ApiResponse, CoreError, Pagination, PaginationQuery};
use ems_storage::repos::departments::{self, DepartmentUpdate, NewDepartment};

use super::{invalidate_entity, require};
use crate::cache::{CacheKey, DETAIL_TTL, LIST_TTL};
use crate::error::ApiError;
use crate::middleware::AuthContext;
use crate::state::AppState;

const ENTITY: &str = "departments";
const LABEL: &str = "Department";

fn require_admin(ctx: &AuthContext) -> Result<(), ApiError> {
    if ctx.role.is_admin() {
        Ok(())
    } else {
        Err(ApiError(CoreError::forbidden(
            "Only administrators can modify departments",
        )))
    }
}

/// Unscoped list (the same rows for everyone), so one cached page per
/// page/limit pair serves all callers.
pub async fn list(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
) -> Result<Response, ApiError> {
    let page = page.clamped();
    let key = format!("{ENTITY}:list:{}:{}", page.page, page.limit);

    if let Some(cached) = state.cache.get(&key).await {
        return Ok(super::json_bytes(&cached));
    }

    let (rows, total) = departments::list(&state.db, page.limit, page.offset()).await?;
    let envelope = ApiResponse::paginated(rows, Pagination::new(page.page, page.limit, total));
    let bytes = serde_json::to_vec(&envelope).map_err(CoreError::from)?;
    state.cache.set(&key, bytes.clone(), LIST_TTL).await;
    Ok(super::json_bytes(&bytes))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let key = CacheKey::detail(ENTITY, id);
    if let Some(cached) = state.cache.get(&key).await {
        return Ok(super::json_bytes(&cached));
    }

    let row = departments::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found(LABEL, id))?;
    let envelope = ApiResponse::ok(row);
    let bytes = serde_json::to_vec(&envelope).map_err(CoreError::from)?;
    state.cache.set(&key, bytes.clone(), DETAIL_TTL).await;
    Ok(super::json_bytes(&bytes))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<NewDepartment>,
) -> Result<Response, ApiError> {
    require_admin(&ctx)?;
    require("name", &body.name)?;

    let created = departments::create(&state.db, body).await?;
    invalidate_entity(&state, ENTITY, Some(created.id)).await;
    Ok(Json(ApiResponse::ok(created)).into_response())
}

pub async fn update(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(body): Json<DepartmentUpdate>,
) -> Result<Response, ApiError> {
    require_admin(&ctx)?;

    let updated = departments::update(&state.db, id, body).await?;
    invalidate_entity(&state, ENTITY, Some(id)).await;
    Ok(Json(ApiResponse::ok(updated)).into_response())
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    require_admin(&ctx)?;

    departments::delete(&state.db, id).await?;
    invalidate_entity(&state, ENTITY, Some(id)).await;
    Ok(Json(ApiResponse::<()>::message("Department deleted")).into_response())
}
