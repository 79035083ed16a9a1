//! Bearer-authenticated client for the directory (Graph) API.
//!
//! Tokens come from the shared [`TokenCache`] unless the caller supplies
//! a delegated bearer of its own (the redirect leg of the login flow uses
//! the user's freshly exchanged access token). Transient failures back
//! off exponentially; a 401 on the app-token path invalidates the cache
//! and retries the original request exactly once.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::DirectoryError;
use crate::token_cache::TokenCache;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Directory profile for an authenticated user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Provider subject id.
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub user_principal_name: Option<String>,
}

impl UserProfile {
    /// Preferred email: `mail` when set, otherwise the UPN.
    pub fn email(&self) -> Option<&str> {
        self.mail
            .as_deref()
            .or(self.user_principal_name.as_deref())
    }
}

/// HTTP client for the directory API.
#[derive(Clone)]
pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenCache>,
}

impl DirectoryClient {
    pub fn new(base_url: impl Into<String>, tokens: Arc<TokenCache>) -> Result<Self, DirectoryError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        })
    }

    /// Profile of the user owning `bearer` (`GET /me`).
    #[instrument(skip(self, bearer))]
    pub async fn get_profile(&self, bearer: &str) -> Result<UserProfile, DirectoryError> {
        let value = self
            .request_with_auth("get_profile", "/me", Some(bearer))
            .await?;
        parse_profile(value)
    }

    /// Directory user looked up by email, using the application token.
    #[instrument(skip(self))]
    pub async fn get_user_by_email(&self, email: &str) -> Result<UserProfile, DirectoryError> {
        let path = format!("/users/{}", urlencoding::encode(email));
        let value = self
            .request_with_auth("get_user_by_email", &path, None)
            .await?;
        parse_profile(value)
    }

    /// One-shot 401 recovery: on the app-token path, a 401 means our
    /// cached token went bad - invalidate and replay the request once
    /// with a fresh token. A second 401 propagates. Caller-supplied
    /// bearers are not ours to refresh, so they fail straight through.
    async fn request_with_auth(
        &self,
        operation: &'static str,
        path: &str,
        bearer: Option<&str>,
    ) -> Result<Value, DirectoryError> {
        match self.send_with_retry(operation, path, bearer).await {
            Err(DirectoryError::AuthFailed { .. }) if bearer.is_none() => {
                warn!(operation, "directory returned 401, refreshing app token and retrying once");
                self.tokens.invalidate("directory 401").await;
                self.send_with_retry(operation, path, None).await
            }
            other => other,
        }
    }

    /// Exponential-backoff retry over transient failures (>= 500, 429,
    /// connect errors, timeouts). Other 4xx never retry.
    async fn send_with_retry(
        &self,
        operation: &'static str,
        path: &str,
        bearer: Option<&str>,
    ) -> Result<Value, DirectoryError> {
        let mut delay = INITIAL_BACKOFF;
        let mut attempt = 1;

        loop {
            match self.send_once(operation, path, bearer).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < MAX_ATTEMPTS => {
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient directory failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_once(
        &self,
        operation: &'static str,
        path: &str,
        bearer: Option<&str>,
    ) -> Result<Value, DirectoryError> {
        let token = match bearer {
            Some(t) => t.to_string(),
            None => self.tokens.get_valid_token().await?,
        };

        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).bearer_auth(&token).send().await?;

        let status = response.status();
        if status.is_success() {
            debug!(operation, status = status.as_u16(), "directory call succeeded");
            return Ok(response.json().await?);
        }

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        warn!(
            operation,
            status = status.as_u16(),
            "directory call failed"
        );
        Err(DirectoryError::from_status(
            status.as_u16(),
            operation,
            retry_after,
        ))
    }
}

fn parse_profile(value: Value) -> Result<UserProfile, DirectoryError> {
    serde_json::from_value(value).map_err(|e| {
        warn!(error = %e, "malformed directory profile payload");
        DirectoryError::Malformed {
            operation: "parse_profile",
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_email_prefers_mail() {
        let p = UserProfile {
            id: "sub".into(),
            display_name: None,
            mail: Some("mail@example.com".into()),
            user_principal_name: Some("upn@example.com".into()),
        };
        assert_eq!(p.email(), Some("mail@example.com"));
    }

    #[test]
    fn test_profile_email_falls_back_to_upn() {
        let p = UserProfile {
            id: "sub".into(),
            display_name: None,
            mail: None,
            user_principal_name: Some("upn@example.com".into()),
        };
        assert_eq!(p.email(), Some("upn@example.com"));
    }

    #[test]
    fn test_profile_deserializes_graph_casing() {
        let p: UserProfile = serde_json::from_value(serde_json::json!({
            "id": "abc-123",
            "displayName": "Ana Ruiz",
            "userPrincipalName": "ana@example.com"
        }))
        .unwrap();
        assert_eq!(p.id, "abc-123");
        assert_eq!(p.email(), Some("ana@example.com"));
    }
}
