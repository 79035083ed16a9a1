//! Employee CRUD. Creating and deleting employee records is reserved to
//! administrators; non-admin callers can read (and update) only their
//! own row through the scope predicate.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::{Extension, Json};

use ems_core::{ApiResponse, PaginationQuery};
use ems_storage::repos::employees::{self, EmployeeUpdate, NewEmployee};

use super::{cached_detail, cached_list, invalidate_entity, require};
use crate::error::ApiError;
use crate::middleware::AuthContext;
use crate::state::AppState;

const ENTITY: &str = "employees";
const LABEL: &str = "Employee";

pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(page): Query<PaginationQuery>,
) -> Result<Response, ApiError> {
    cached_list(&state, ENTITY, &ctx, page, |scope, limit, offset| {
        employees::list(&state.db, scope, limit, offset)
    })
    .await
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    cached_detail(&state, ENTITY, LABEL, &ctx, id, |scope, id| {
        employees::find_by_id(&state.db, scope, id)
    })
    .await
}

pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<NewEmployee>,
) -> Result<Json<ApiResponse<employees::Employee>>, ApiError> {
    if !ctx.role.is_admin() {
        return Err(ApiError(ems_core::CoreError::forbidden(
            "Only administrators can create employees",
        )));
    }
    require("employee_code", &body.employee_code)?;
    require("first_name", &body.first_name)?;
    require("last_name", &body.last_name)?;
    require("email", &body.email)?;
    if !body.email.contains('@') {
        return Err(ApiError::validation("email", "must be a valid email address"));
    }

    let created = employees::create(&state.db, body).await?;
    invalidate_entity(&state, ENTITY, Some(created.id)).await;
    Ok(Json(ApiResponse::ok(created)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(body): Json<EmployeeUpdate>,
) -> Result<Json<ApiResponse<employees::Employee>>, ApiError> {
    if let Some(email) = body.email.as_deref()
        && !email.contains('@')
    {
        return Err(ApiError::validation("email", "must be a valid email address"));
    }

    let updated = employees::update(&state.db, ctx.scope(), id, body).await?;
    invalidate_entity(&state, ENTITY, Some(id)).await;
    Ok(Json(ApiResponse::ok(updated)))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    if !ctx.role.is_admin() {
        return Err(ApiError(ems_core::CoreError::forbidden(
            "Only administrators can delete employees",
        )));
    }

    employees::delete(&state.db, id).await?;
    invalidate_entity(&state, ENTITY, Some(id)).await;
    Ok(Json(ApiResponse::message("Employee deleted")))
}
