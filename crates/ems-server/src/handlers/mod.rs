//! REST handlers.
//!
//! Entity modules share the cache-first read path below: list and detail
//! reads consult the cache and fall through to the repository, writes go
//! straight to the repository and then invalidate the entity's cached
//! pages best-effort.

pub mod auth;
pub mod departments;
pub mod employees;
pub mod hardware;
pub mod health;
pub mod integrations;
pub mod licenses;
pub mod software;
pub mod tickets;
pub mod time_tracking;

use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use ems_core::{ApiResponse, Pagination, PaginationQuery, RoleScope};

use crate::cache::{CacheKey, DETAIL_TTL, LIST_TTL};
use crate::error::ApiError;
use crate::middleware::AuthContext;
use crate::state::AppState;

fn json_bytes(bytes: &[u8]) -> Response {
    (
        [(CONTENT_TYPE, "application/json")],
        bytes.to_vec(),
    )
        .into_response()
}

/// Cache-first scoped list. Cached pages are stored as the serialized
/// envelope, so a hit is served without re-serialization.
pub(crate) async fn cached_list<T, F, Fut>(
    state: &AppState,
    entity: &'static str,
    ctx: &AuthContext,
    page: PaginationQuery,
    fetch: F,
) -> Result<Response, ApiError>
where
    T: Serialize,
    F: FnOnce(RoleScope, u32, u64) -> Fut,
    Fut: Future<Output = ems_storage::Result<(Vec<T>, u64)>>,
{
    let page = page.clamped();
    let scope = ctx.scope();
    let key = CacheKey::list(entity, ctx.role, scope, page.page, page.limit);

    if let Some(cached) = state.cache.get(&key).await {
        return Ok(json_bytes(&cached));
    }

    let (rows, total) = fetch(scope, page.limit, page.offset()).await?;
    let envelope = ApiResponse::paginated(rows, Pagination::new(page.page, page.limit, total));
    let bytes = serde_json::to_vec(&envelope).map_err(ems_core::CoreError::from)?;
    state.cache.set(&key, bytes.clone(), LIST_TTL).await;
    Ok(json_bytes(&bytes))
}

/// Cache-first scoped detail read. Rows filtered out by scope read as
/// absent, so non-admin probes cannot distinguish hidden from missing.
pub(crate) async fn cached_detail<T, F, Fut>(
    state: &AppState,
    entity: &'static str,
    label: &'static str,
    ctx: &AuthContext,
    id: i64,
    fetch: F,
) -> Result<Response, ApiError>
where
    T: Serialize,
    F: FnOnce(RoleScope, i64) -> Fut,
    Fut: Future<Output = ems_storage::Result<Option<T>>>,
{
    // Detail rows are only cached for admin-scoped reads; self-scoped
    // visibility depends on the caller, so those always hit the database.
    let scope = ctx.scope();
    let key = CacheKey::detail(entity, id);
    let cacheable = scope == RoleScope::All;

    if cacheable && let Some(cached) = state.cache.get(&key).await {
        return Ok(json_bytes(&cached));
    }

    let row = fetch(scope, id)
        .await?
        .ok_or_else(|| ApiError::not_found(label, id))?;
    let envelope = ApiResponse::ok(row);
    let bytes = serde_json::to_vec(&envelope).map_err(ems_core::CoreError::from)?;
    if cacheable {
        state.cache.set(&key, bytes.clone(), DETAIL_TTL).await;
    }
    Ok(json_bytes(&bytes))
}

/// Best-effort post-write invalidation: every cached list page of the
/// entity plus the touched detail row.
pub(crate) async fn invalidate_entity(state: &AppState, entity: &'static str, id: Option<i64>) {
    state
        .cache
        .invalidate_prefix(&CacheKey::list_prefix(entity))
        .await;
    if let Some(id) = id {
        state.cache.invalidate(&CacheKey::detail(entity, id)).await;
    }
}

/// Required-field check shared by create handlers.
pub(crate) fn require(field: &'static str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(field, "must not be empty"));
    }
    Ok(())
}
