//! Authentication flow: provider login redirect, the callback leg,
//! refresh, and identity introspection.
//!
//! The flow is stateless between the two redirect legs; the only state
//! is the authorization code held by the provider. Redirect-leg failures
//! surface as `error=` query parameters on the frontend login page, never
//! as API error bodies, because the caller at that point is a browser.

use axum::extract::{Query, State};
use axum::http::{StatusCode, header::LOCATION};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use ems_core::ApiResponse;

use crate::error::ApiError;
use crate::middleware::AuthContext;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    pub identifier: String,
}

#[derive(Debug, Deserialize)]
pub struct RedirectQuery {
    pub code: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// `GET /api/v1/auth/login?identifier=` — resolve the identifier to an
/// email and redirect to the provider's authorize URL with a login hint.
/// Identifiers with an `@` pass through as emails; anything else is
/// looked up as an employee code.
pub async fn login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> Result<Response, ApiError> {
    let identifier = query.identifier.trim();
    if identifier.is_empty() {
        return Err(ApiError::validation("identifier", "must not be empty"));
    }

    let email = if identifier.contains('@') {
        identifier.to_string()
    } else {
        match state.identity.employee_email_by_code(identifier).await? {
            Some(email) => email,
            None => return Ok(unknown_identifier()),
        }
    };

    let url = state.entra.authorization_url(&email)?;
    info!(login_hint = %email, "redirecting to identity provider");
    Ok(found(url.as_str()))
}

fn unknown_identifier() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error("Unknown employee code or email")),
    )
        .into_response()
}

/// Plain 302 so browsers replay the next leg as a GET.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

/// `GET /api/v1/auth/redirect` — the provider calls back here with the
/// authorization code. Every failure branch 302s to the frontend login
/// page with a machine-readable error code.
pub async fn redirect(
    State(state): State<AppState>,
    Query(query): Query<RedirectQuery>,
) -> Response {
    let frontend = state.config.auth.frontend_url.trim_end_matches('/');

    if let Some(provider_error) = query.error.as_deref() {
        warn!(
            error = provider_error,
            description = query.error_description.as_deref().unwrap_or(""),
            "provider returned an error on redirect"
        );
        return login_redirect(frontend, "invalid_request");
    }
    let Some(code) = query.code.as_deref().filter(|c| !c.is_empty()) else {
        return login_redirect(frontend, "invalid_request");
    };

    // Exchange the code and read the caller's directory profile with
    // their own delegated token.
    let tokens = match state.entra.exchange_code(code).await {
        Ok(t) => t,
        Err(e) => {
            warn!(error = %e, "authorization code exchange failed");
            return login_redirect(frontend, "auth_failed");
        }
    };
    let profile = match state.directory.get_profile(&tokens.access_token).await {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "profile lookup failed after code exchange");
            return login_redirect(frontend, "auth_failed");
        }
    };

    let email = profile.email().unwrap_or_default().to_string();
    let mapping = match state
        .identity
        .active_mapping_by_subject_or_email(&profile.id, &email)
        .await
    {
        Ok(Some(m)) => m,
        Ok(None) => {
            info!(subject = %profile.id, "no active role mapping for authenticated user");
            return login_redirect(frontend, "not_found");
        }
        Err(e) => {
            warn!(error = %e, "role mapping lookup failed");
            return login_redirect(frontend, "auth_failed");
        }
    };

    // First login matched by email: pin the provider subject id.
    if mapping.provider_subject_id.is_none()
        && let Err(e) = state.identity.attach_subject_id(mapping.id, &profile.id).await
    {
        warn!(error = %e, role_map_id = mapping.id, "failed to attach subject id");
    }

    let pair = match state
        .jwt
        .mint_pair(&mapping.id.to_string(), &email, mapping.role().as_str())
    {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "failed to mint token pair");
            return login_redirect(frontend, "auth_failed");
        }
    };

    info!(role_map_id = mapping.id, role = %mapping.role(), "login completed");
    found(&format!(
        "{frontend}/auth/callback?token={}&refreshToken={}",
        urlencoding::encode(&pair.access_token),
        urlencoding::encode(&pair.refresh_token),
    ))
}

fn login_redirect(frontend: &str, error: &str) -> Response {
    found(&format!("{frontend}/login?error={error}"))
}

/// `POST /api/v1/auth/refresh` — verify the refresh token, re-check the
/// role mapping is still active, and mint a fresh pair.
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<ems_auth::TokenPair>>, ApiError> {
    let claims = state
        .jwt
        .verify_refresh(&body.refresh_token)
        .map_err(|_| ApiError::unauthorized("Invalid or expired refresh token"))?;
    let role_map_id: i64 = claims
        .sub
        .parse()
        .map_err(|_| ApiError::unauthorized("Invalid or expired refresh token"))?;

    let mapping = state
        .identity
        .active_mapping_by_id(role_map_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Account is not active"))?;

    let pair = state.jwt.mint_pair(
        &mapping.id.to_string(),
        &claims.email,
        mapping.role().as_str(),
    )?;
    Ok(Json(ApiResponse::ok(pair)))
}

/// `GET /api/v1/auth/me` — the authenticated caller's identity.
pub async fn me(
    Extension(ctx): Extension<AuthContext>,
) -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::ok(json!({
        "id": ctx.role_map_id,
        "email": ctx.email,
        "role": ctx.role.as_str(),
        "employee_id": ctx.employee_id,
    })))
}
