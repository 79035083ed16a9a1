//! Application-issued JWTs.
//!
//! Access and refresh tokens are HS256-signed with separate secrets so a
//! leaked refresh secret cannot mint access tokens (and vice versa). The
//! `token_use` claim pins each token to its purpose and is checked on
//! verification.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::error::AuthError;

/// Which purpose a token was minted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenUse {
    Access,
    Refresh,
}

/// Claims carried by application tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User role map id.
    pub sub: String,
    pub email: String,
    pub role: String,
    pub token_use: TokenUse,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

/// Freshly minted access/refresh pair.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Mints and verifies the application's own tokens.
#[derive(Clone)]
pub struct JwtService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
    issuer: String,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            access_ttl_secs: config.access_ttl_secs,
            refresh_ttl_secs: config.refresh_ttl_secs,
            issuer: config.issuer.clone(),
        }
    }

    /// Mint a fresh access/refresh pair for `sub`.
    pub fn mint_pair(&self, sub: &str, email: &str, role: &str) -> Result<TokenPair, AuthError> {
        let access_token = self.mint(sub, email, role, TokenUse::Access)?;
        let refresh_token = self.mint(sub, email, role, TokenUse::Refresh)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl_secs,
        })
    }

    fn mint(
        &self,
        sub: &str,
        email: &str,
        role: &str,
        token_use: TokenUse,
    ) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let (key, ttl) = match token_use {
            TokenUse::Access => (&self.access_encoding, self.access_ttl_secs),
            TokenUse::Refresh => (&self.refresh_encoding, self.refresh_ttl_secs),
        };
        let claims = Claims {
            sub: sub.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            token_use,
            exp: now + ttl as i64,
            iat: now,
            iss: self.issuer.clone(),
        };
        Ok(jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, key)?)
    }

    /// Verify signature, expiry, issuer and purpose of an access token.
    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify(token, TokenUse::Access, &self.access_decoding)
    }

    /// Verify signature, expiry, issuer and purpose of a refresh token.
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify(token, TokenUse::Refresh, &self.refresh_decoding)
    }

    fn verify(
        &self,
        token: &str,
        expected_use: TokenUse,
        key: &DecodingKey,
    ) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.validate_aud = false;

        let data = jsonwebtoken::decode::<Claims>(token, key, &validation)?;
        if data.claims.token_use != expected_use {
            return Err(AuthError::MalformedResponse(
                "token presented for the wrong purpose".into(),
            ));
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(&JwtConfig {
            access_secret: "access-secret-for-tests".into(),
            refresh_secret: "refresh-secret-for-tests".into(),
            access_ttl_secs: 3600,
            refresh_ttl_secs: 7 * 24 * 3600,
            issuer: "ems-server".into(),
        })
    }

    #[test]
    fn test_mint_and_verify_roundtrip() {
        let svc = service();
        let pair = svc.mint_pair("42", "ana@example.com", "admin").unwrap();

        let access = svc.verify_access(&pair.access_token).unwrap();
        assert_eq!(access.sub, "42");
        assert_eq!(access.email, "ana@example.com");
        assert_eq!(access.role, "admin");
        assert_eq!(access.token_use, TokenUse::Access);

        let refresh = svc.verify_refresh(&pair.refresh_token).unwrap();
        assert_eq!(refresh.token_use, TokenUse::Refresh);
        assert!(refresh.exp > access.exp);
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let svc = service();
        let pair = svc.mint_pair("42", "ana@example.com", "employee").unwrap();
        // Different secret, so the signature check fails before token_use.
        assert!(svc.verify_access(&pair.refresh_token).is_err());
        assert!(svc.verify_refresh(&pair.access_token).is_err());
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let other = JwtService::new(&JwtConfig {
            access_secret: "access-secret-for-tests".into(),
            refresh_secret: "refresh-secret-for-tests".into(),
            access_ttl_secs: 3600,
            refresh_ttl_secs: 7 * 24 * 3600,
            issuer: "someone-else".into(),
        });
        let pair = other.mint_pair("1", "x@example.com", "manager").unwrap();
        assert!(service().verify_access(&pair.access_token).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(service().verify_access("not.a.jwt").is_err());
    }
}
