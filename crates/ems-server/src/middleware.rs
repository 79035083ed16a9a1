//! Request-id and bearer-authentication middleware.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, Request, header::AUTHORIZATION};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;
use uuid::Uuid;

use ems_core::{Role, RoleScope};

use crate::error::ApiError;
use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Authenticated caller identity, injected into request extensions by
/// [`authentication`] and read by handlers via `Extension`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// `user_role_maps.id`, the `sub` of our JWTs.
    pub role_map_id: i64,
    pub employee_id: Option<i64>,
    pub email: String,
    pub role: Role,
}

impl AuthContext {
    pub fn scope(&self) -> RoleScope {
        RoleScope::for_caller(self.role, self.employee_id)
    }
}

/// Reuses an incoming `x-request-id` or generates a uuid, stores it in
/// request extensions, and echoes it on the response.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let header_value = HeaderValue::from_str(&id)
        .unwrap_or_else(|_| HeaderValue::from_static("invalid"));
    req.extensions_mut().insert(header_value.clone());

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert(HeaderName::from_static(REQUEST_ID_HEADER), header_value);
    response
}

/// Public endpoints reachable without a bearer token.
fn is_public_path(path: &str) -> bool {
    matches!(path, "/" | "/healthz" | "/readyz")
        || (path.starts_with("/api/v1/auth/") && path != "/api/v1/auth/me")
}

/// Verifies the bearer JWT and injects [`AuthContext`]. The role map is
/// re-read so deactivated users lose access before their token expires.
pub async fn authentication(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if is_public_path(req.uri().path()) {
        return next.run(req).await;
    }

    let token = match req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
    {
        Some(t) => t,
        None => {
            debug!(path = %req.uri().path(), "missing bearer token");
            return ApiError::unauthorized("Authentication required").into_response();
        }
    };

    let claims = match state.jwt.verify_access(token) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "token verification failed");
            return ApiError::unauthorized("Invalid or expired token").into_response();
        }
    };

    let role_map_id: i64 = match claims.sub.parse() {
        Ok(id) => id,
        Err(_) => {
            return ApiError::unauthorized("Invalid or expired token").into_response();
        }
    };

    let mapping = match state.identity.active_mapping_by_id(role_map_id).await {
        Ok(Some(m)) => m,
        Ok(None) => {
            debug!(role_map_id, "role mapping missing or deactivated");
            return ApiError::unauthorized("Account is not active").into_response();
        }
        Err(e) => return ApiError::from(e).into_response(),
    };

    req.extensions_mut().insert(AuthContext {
        role_map_id: mapping.id,
        employee_id: mapping.employee_id,
        email: claims.email,
        role: mapping.role(),
    });
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_paths() {
        assert!(is_public_path("/healthz"));
        assert!(is_public_path("/readyz"));
        assert!(is_public_path("/api/v1/auth/login"));
        assert!(is_public_path("/api/v1/auth/redirect"));
        assert!(is_public_path("/api/v1/auth/refresh"));
        assert!(!is_public_path("/api/v1/auth/me"));
        assert!(!is_public_path("/api/v1/licenses"));
    }

    #[test]
    fn test_scope_derivation() {
        let admin = AuthContext {
            role_map_id: 1,
            employee_id: Some(5),
            email: "a@example.com".into(),
            role: Role::Admin,
        };
        assert_eq!(admin.scope(), RoleScope::All);

        let employee = AuthContext {
            role_map_id: 2,
            employee_id: Some(5),
            email: "e@example.com".into(),
            role: Role::Employee,
        };
        assert_eq!(employee.scope(), RoleScope::SelfOnly { employee_id: 5 });
    }
}
