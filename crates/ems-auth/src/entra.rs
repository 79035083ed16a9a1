//! Microsoft Entra client: authorization URLs, code exchange, refresh.
//!
//! Token-endpoint calls are direct form-encoded POSTs rather than going
//! through a generic OAuth library; the provider's v2.0 endpoints are
//! stable and the direct path keeps correlation ids and error detail in
//! our hands.

use std::time::Duration;

use rand::RngCore;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::config::EntraConfig;
use crate::error::AuthError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Token response from the provider's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    pub expires_in: u64,
}

/// Client for the identity provider.
#[derive(Clone)]
pub struct EntraClient {
    config: EntraConfig,
    http: reqwest::Client,
}

impl EntraClient {
    pub fn new(config: EntraConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &EntraConfig {
        &self.config
    }

    /// Builds the provider authorization URL for the code flow, carrying a
    /// fresh state/nonce pair and a login hint for the resolved email.
    pub fn authorization_url(&self, login_hint: &str) -> Result<Url, AuthError> {
        let state = random_token();
        let nonce = random_token();
        let scopes = self.config.scopes.join(" ");

        let mut url = Url::parse(&self.config.authorize_endpoint())?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_mode", "query")
            .append_pair("scope", &scopes)
            .append_pair("state", &state)
            .append_pair("nonce", &nonce)
            .append_pair("login_hint", login_hint);

        debug!(login_hint, state, "built authorization URL");
        Ok(url)
    }

    /// Exchanges an authorization code for tokens.
    #[instrument(skip(self, code), fields(correlation_id = %Uuid::new_v4()))]
    pub async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, AuthError> {
        let scopes = self.config.scopes.join(" ");
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("scope", scopes.as_str()),
        ];
        self.token_request("exchange_code", &params).await
    }

    /// Silently refreshes a user token.
    #[instrument(skip(self, refresh_token), fields(correlation_id = %Uuid::new_v4()))]
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<ProviderTokens, AuthError> {
        let scopes = self.config.scopes.join(" ");
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", scopes.as_str()),
        ];
        self.token_request("refresh_token", &params).await
    }

    /// Application (client-credentials) token for directory API calls.
    #[instrument(skip(self))]
    pub async fn client_credentials_token(&self) -> Result<ProviderTokens, AuthError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "client_credentials"),
            ("scope", "https://graph.microsoft.com/.default"),
        ];
        self.token_request("client_credentials", &params).await
    }

    async fn token_request(
        &self,
        operation: &'static str,
        params: &[(&str, &str)],
    ) -> Result<ProviderTokens, AuthError> {
        let correlation_id = Uuid::new_v4().to_string();
        let response = self
            .http
            .post(self.config.token_endpoint())
            .header("client-request-id", &correlation_id)
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(
                operation,
                status = status.as_u16(),
                correlation_id,
                "token endpoint rejected request"
            );
            return Err(AuthError::Rejected {
                operation,
                status: status.as_u16(),
                detail: truncate(&detail, 512),
            });
        }

        let tokens: ProviderTokens = response
            .json()
            .await
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        if tokens.access_token.is_empty() {
            return Err(AuthError::MalformedResponse(
                "empty access_token in provider response".into(),
            ));
        }

        debug!(operation, correlation_id, "token endpoint call succeeded");
        Ok(tokens)
    }
}

/// 32 hex chars of CSPRNG output for state/nonce values.
fn random_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    // Walk back to a char boundary; slicing mid-codepoint panics.
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &s[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> EntraClient {
        EntraClient::new(EntraConfig {
            tenant_id: "tenant".into(),
            client_id: "client-id".into(),
            client_secret: "secret".into(),
            redirect_uri: "http://localhost:8080/api/v1/auth/redirect".into(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_authorization_url_carries_required_params() {
        let url = client().authorization_url("user@example.com").unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(pairs["client_id"], "client-id");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["login_hint"], "user@example.com");
        assert_eq!(pairs["state"].len(), 32);
        assert_eq!(pairs["nonce"].len(), 32);
        assert!(pairs["scope"].contains("openid"));
    }

    #[test]
    fn test_state_and_nonce_are_fresh_per_url() {
        let c = client();
        let a = c.authorization_url("u@e.com").unwrap();
        let b = c.authorization_url("u@e.com").unwrap();
        let state = |u: &Url| {
            u.query_pairs()
                .find(|(k, _)| k == "state")
                .map(|(_, v)| v.into_owned())
                .unwrap()
        };
        assert_ne!(state(&a), state(&b));
    }

    #[test]
    fn test_truncate_long_error_bodies() {
        let long = "x".repeat(1000);
        assert_eq!(truncate(&long, 512).len(), 515);
        assert_eq!(truncate("short", 512), "short");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let mut body = "x".repeat(511);
        body.push('€');
        assert_eq!(truncate(&body, 512), format!("{}...", "x".repeat(511)));

        let all_multibyte = "€".repeat(200);
        let cut = truncate(&all_multibyte, 512);
        assert!(cut.ends_with("..."));
        assert!(cut.trim_end_matches("...").chars().all(|c| c == '€'));
    }
}
