//! Authentication configuration.

use serde::{Deserialize, Serialize};

use ems_core::CoreError;

/// Top-level auth configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub entra: EntraConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    /// Frontend base URL for post-login redirects.
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
}

fn default_frontend_url() -> String {
    "http://localhost:3000".into()
}

impl AuthConfig {
    /// Validate required values. The process must refuse to start when any
    /// of these is missing.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.entra.tenant_id.is_empty() {
            return Err(CoreError::configuration("auth.entra.tenant_id is required"));
        }
        if self.entra.client_id.is_empty() {
            return Err(CoreError::configuration("auth.entra.client_id is required"));
        }
        if self.entra.client_secret.is_empty() {
            return Err(CoreError::configuration(
                "auth.entra.client_secret is required",
            ));
        }
        if self.entra.redirect_uri.is_empty() {
            return Err(CoreError::configuration(
                "auth.entra.redirect_uri is required",
            ));
        }
        if self.jwt.access_secret.is_empty() {
            return Err(CoreError::configuration("auth.jwt.access_secret is required"));
        }
        if self.jwt.refresh_secret.is_empty() {
            return Err(CoreError::configuration(
                "auth.jwt.refresh_secret is required",
            ));
        }
        Ok(())
    }
}

/// Microsoft Entra (identity provider) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntraConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    /// Redirect URI registered with the provider (the `/auth/redirect`
    /// endpoint of this server).
    pub redirect_uri: String,
    /// Authority base URL; overridable so tests can point at a mock
    /// provider.
    #[serde(default = "default_authority")]
    pub authority: String,
    /// Directory (Graph) API base URL; overridable for tests.
    #[serde(default = "default_graph_base")]
    pub graph_base_url: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_authority() -> String {
    "https://login.microsoftonline.com".into()
}
fn default_graph_base() -> String {
    "https://graph.microsoft.com/v1.0".into()
}
fn default_scopes() -> Vec<String> {
    vec![
        "openid".into(),
        "profile".into(),
        "email".into(),
        "User.Read".into(),
    ]
}

impl Default for EntraConfig {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            authority: default_authority(),
            graph_base_url: default_graph_base(),
            scopes: default_scopes(),
        }
    }
}

impl EntraConfig {
    pub fn authorize_endpoint(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/authorize",
            self.authority, self.tenant_id
        )
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority, self.tenant_id)
    }
}

/// Local JWT settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: u64,
    #[serde(default = "default_issuer")]
    pub issuer: String,
}

fn default_access_ttl() -> u64 {
    3600 // 1 hour
}
fn default_refresh_ttl() -> u64 {
    7 * 24 * 3600 // 7 days
}
fn default_issuer() -> String {
    "ems-server".into()
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(),
            refresh_secret: String::new(),
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
            issuer: default_issuer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AuthConfig {
        AuthConfig {
            entra: EntraConfig {
                tenant_id: "tenant".into(),
                client_id: "client".into(),
                client_secret: "secret".into(),
                redirect_uri: "http://localhost:8080/api/v1/auth/redirect".into(),
                ..Default::default()
            },
            jwt: JwtConfig {
                access_secret: "a".repeat(32),
                refresh_secret: "r".repeat(32),
                ..Default::default()
            },
            frontend_url: "http://localhost:3000".into(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_client_secret_rejected() {
        let mut cfg = valid_config();
        cfg.entra.client_secret.clear();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("client_secret"));
    }

    #[test]
    fn test_missing_jwt_secret_rejected() {
        let mut cfg = valid_config();
        cfg.jwt.refresh_secret.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_endpoints_include_tenant() {
        let cfg = valid_config();
        assert_eq!(
            cfg.entra.token_endpoint(),
            "https://login.microsoftonline.com/tenant/oauth2/v2.0/token"
        );
        assert!(cfg.entra.authorize_endpoint().ends_with("/authorize"));
    }
}
