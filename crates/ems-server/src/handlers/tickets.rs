//! Support ticket CRUD.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::{Extension, Json};

use ems_core::{ApiResponse, PaginationQuery};
use ems_storage::repos::tickets::{self, NewTicket, TicketUpdate};

use super::{cached_detail, cached_list, invalidate_entity, require};
use crate::error::ApiError;
use crate::middleware::AuthContext;
use crate::state::AppState;

const ENTITY: &str = "tickets";
const LABEL: &str = "Ticket";

const STATUSES: &[&str] = &["open", "in_progress", "resolved", "closed"];
const PRIORITIES: &[&str] = &["low", "medium", "high", "urgent"];

pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(page): Query<PaginationQuery>,
) -> Result<Response, ApiError> {
    cached_list(&state, ENTITY, &ctx, page, |scope, limit, offset| {
        tickets::list(&state.db, scope, limit, offset)
    })
    .await
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    cached_detail(&state, ENTITY, LABEL, &ctx, id, |scope, id| {
        tickets::find_by_id(&state.db, scope, id)
    })
    .await
}

pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<NewTicket>,
) -> Result<Json<ApiResponse<tickets::Ticket>>, ApiError> {
    require("subject", &body.subject)?;
    if let Some(priority) = body.priority.as_deref() {
        validate_one_of("priority", priority, PRIORITIES)?;
    }

    let created = tickets::create(&state.db, body, ctx.employee_id).await?;
    invalidate_entity(&state, ENTITY, Some(created.id)).await;
    Ok(Json(ApiResponse::ok(created)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(body): Json<TicketUpdate>,
) -> Result<Json<ApiResponse<tickets::Ticket>>, ApiError> {
    if let Some(status) = body.status.as_deref() {
        validate_one_of("status", status, STATUSES)?;
    }
    if let Some(priority) = body.priority.as_deref() {
        validate_one_of("priority", priority, PRIORITIES)?;
    }

    let updated = tickets::update(&state.db, ctx.scope(), id, body).await?;
    invalidate_entity(&state, ENTITY, Some(id)).await;
    Ok(Json(ApiResponse::ok(updated)))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    tickets::delete(&state.db, ctx.scope(), id).await?;
    invalidate_entity(&state, ENTITY, Some(id)).await;
    Ok(Json(ApiResponse::message("Ticket deleted")))
}

fn validate_one_of(field: &'static str, value: &str, allowed: &[&str]) -> Result<(), ApiError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(ApiError::validation(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_priority_validation() {
        assert!(validate_one_of("status", "open", STATUSES).is_ok());
        assert!(validate_one_of("status", "reopened", STATUSES).is_err());
        assert!(validate_one_of("priority", "urgent", PRIORITIES).is_ok());
        assert!(validate_one_of("priority", "critical", PRIORITIES).is_err());
    }
}
