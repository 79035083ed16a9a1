//! Liveness and readiness endpoints.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::state::AppState;

pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "ems-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn healthz() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Readiness: the database must answer a ping; Redis state is reported
/// but never fails readiness, the server degrades to its local cache.
pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let db_ok = ems_storage::pool::ping(&state.db).await.is_ok();
    let redis_available = state.cache.is_redis_available().await;

    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if db_ok { "ready" } else { "unavailable" },
            "database": db_ok,
            "cache": {
                "mode": state.cache.mode(),
                "redis_available": redis_available,
            },
        })),
    )
}
