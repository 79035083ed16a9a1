//! Attendance tracking: check-in, check-out, and the scoped log listing.

use axum::extract::{Query, State};
use axum::response::Response;
use axum::{Extension, Json};
use serde::Deserialize;

use ems_core::{ApiResponse, PaginationQuery};
use ems_storage::repos::attendance::{self, AttendanceLog};

use super::cached_list;
use crate::error::ApiError;
use crate::middleware::AuthContext;
use crate::state::AppState;

const ENTITY: &str = "attendance";

#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    #[serde(default = "default_source")]
    pub source: String,
}

impl Default for CheckInRequest {
    fn default() -> Self {
        Self {
            source: default_source(),
        }
    }
}

fn default_source() -> String {
    "web".into()
}

fn employee_id(ctx: &AuthContext) -> Result<i64, ApiError> {
    ctx.employee_id.ok_or_else(|| {
        ApiError::validation("employee", "no employee record linked to this account")
    })
}

/// Opens an attendance log. A second check-in without a check-out is a
/// conflict.
pub async fn check_in(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    body: Option<Json<CheckInRequest>>,
) -> Result<Json<ApiResponse<AttendanceLog>>, ApiError> {
    let employee_id = employee_id(&ctx)?;
    let source = body.map(|Json(b)| b.source).unwrap_or_else(default_source);

    let log = attendance::check_in(&state.db, employee_id, &source).await?;
    super::invalidate_entity(&state, ENTITY, None).await;
    Ok(Json(ApiResponse::ok(log)))
}

/// Closes the caller's open attendance log.
pub async fn check_out(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<ApiResponse<AttendanceLog>>, ApiError> {
    let employee_id = employee_id(&ctx)?;

    let log = attendance::check_out(&state.db, employee_id).await?;
    super::invalidate_entity(&state, ENTITY, None).await;
    Ok(Json(ApiResponse::ok(log)))
}

pub async fn logs(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(page): Query<PaginationQuery>,
) -> Result<Response, ApiError> {
    cached_list(&state, ENTITY, &ctx, page, |scope, limit, offset| {
        attendance::list(&state.db, scope, limit, offset)
    })
    .await
}
