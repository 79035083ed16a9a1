//! Error types for identity-provider and directory operations.

use ems_core::CoreError;

/// Errors from the identity provider (token endpoint, authorization flow).
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Transport-level failure reaching the provider.
    #[error("Identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider rejected the request (non-transient 4xx).
    #[error("Identity provider rejected {operation}: {status} {detail}")]
    Rejected {
        operation: &'static str,
        status: u16,
        detail: String,
    },

    /// Retries exhausted against a transiently failing provider.
    #[error("Identity provider unavailable after {attempts} attempts for {operation}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
    },

    /// Token response missing required fields.
    #[error("Malformed token response: {0}")]
    MalformedResponse(String),

    /// Local JWT signing/verification failure.
    #[error("Token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// URL construction failed.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl AuthError {
    /// Whether a fresh attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::RetriesExhausted { .. } => true,
            _ => false,
        }
    }
}

impl From<AuthError> for CoreError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Jwt(_) => CoreError::unauthorized("invalid token"),
            other => CoreError::Upstream(other.to_string()),
        }
    }
}

/// Fixed user-facing taxonomy for directory API failures. The original
/// status and operation are retained for logging, never for clients.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Authentication with the directory service failed")]
    AuthFailed { operation: &'static str },

    #[error("Access to the requested directory resource is forbidden")]
    Forbidden { operation: &'static str },

    #[error("The requested directory resource was not found")]
    NotFound { operation: &'static str },

    #[error("The directory service is rate limiting requests")]
    RateLimited {
        operation: &'static str,
        retry_after_secs: u64,
    },

    #[error("The directory service is currently unavailable")]
    Unavailable {
        operation: &'static str,
        status: Option<u16>,
    },

    #[error("The directory service returned a malformed payload")]
    Malformed { operation: &'static str },

    #[error("Directory request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Token(#[from] AuthError),
}

impl DirectoryError {
    /// Classify an unexpected HTTP status for `operation`.
    pub fn from_status(status: u16, operation: &'static str, retry_after_secs: Option<u64>) -> Self {
        match status {
            401 => Self::AuthFailed { operation },
            403 => Self::Forbidden { operation },
            404 => Self::NotFound { operation },
            429 => Self::RateLimited {
                operation,
                retry_after_secs: retry_after_secs.unwrap_or(30),
            },
            s => Self::Unavailable {
                operation,
                status: Some(s),
            },
        }
    }

    /// Whether the failure is worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Unavailable { status, .. } => status.is_none_or(|s| s >= 500),
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::AuthFailed { operation }
            | Self::Forbidden { operation }
            | Self::NotFound { operation }
            | Self::RateLimited { operation, .. }
            | Self::Unavailable { operation, .. }
            | Self::Malformed { operation } => Some(operation),
            _ => None,
        }
    }
}

impl From<DirectoryError> for CoreError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::AuthFailed { .. } => {
                CoreError::unauthorized("directory authentication failed")
            }
            DirectoryError::Forbidden { .. } => CoreError::forbidden("directory access denied"),
            DirectoryError::NotFound { .. } => CoreError::not_found("DirectoryResource", "-"),
            DirectoryError::RateLimited {
                retry_after_secs, ..
            } => CoreError::RateLimited { retry_after_secs },
            other => CoreError::Upstream(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            DirectoryError::from_status(401, "get_profile", None),
            DirectoryError::AuthFailed { .. }
        ));
        assert!(matches!(
            DirectoryError::from_status(403, "get_profile", None),
            DirectoryError::Forbidden { .. }
        ));
        assert!(matches!(
            DirectoryError::from_status(404, "get_user", None),
            DirectoryError::NotFound { .. }
        ));
        assert!(matches!(
            DirectoryError::from_status(429, "get_user", Some(10)),
            DirectoryError::RateLimited {
                retry_after_secs: 10,
                ..
            }
        ));
        assert!(matches!(
            DirectoryError::from_status(503, "get_user", None),
            DirectoryError::Unavailable {
                status: Some(503),
                ..
            }
        ));
    }

    #[test]
    fn test_transient_classification() {
        assert!(DirectoryError::from_status(500, "op", None).is_transient());
        assert!(DirectoryError::from_status(429, "op", None).is_transient());
        assert!(!DirectoryError::from_status(404, "op", None).is_transient());
        assert!(!DirectoryError::from_status(403, "op", None).is_transient());
    }

    #[test]
    fn test_user_facing_messages_are_sanitized() {
        let err = DirectoryError::from_status(500, "get_profile", None);
        let msg = err.to_string();
        assert!(!msg.contains("500"), "status must not leak: {msg}");
        assert_eq!(err.operation(), Some("get_profile"));
    }
}
