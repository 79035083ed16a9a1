use thiserror::Error;

/// Core error types for EMS operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("{entity} conflict: {detail}")]
    Conflict { entity: String, detail: String },

    // The payload is the full client-facing sentence; no prefix, it
    // reaches the response body verbatim.
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Upstream service unavailable: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Create a new Validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new NotFound error
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create a new Conflict error
    pub fn conflict(entity: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Conflict {
            entity: entity.into(),
            detail: detail.into(),
        }
    }

    /// Create a new Unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Create a new Forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a new Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is a client error (4xx category)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::NotFound { .. }
                | Self::Conflict { .. }
                | Self::Unauthorized(_)
                | Self::Forbidden(_)
                | Self::RateLimited { .. }
        )
    }

    /// Check if this error is a server error (5xx category)
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Upstream(_) | Self::Configuration(_) | Self::Json(_) | Self::Internal(_)
        )
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Unauthorized(_) | Self::Forbidden(_) => ErrorCategory::Auth,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Upstream(_) => ErrorCategory::Upstream,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Json(_) => ErrorCategory::Serialization,
            Self::Internal(_) => ErrorCategory::System,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Conflict,
    Auth,
    RateLimit,
    Upstream,
    Serialization,
    System,
    Configuration,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Auth => write!(f, "auth"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Upstream => write!(f, "upstream"),
            Self::Serialization => write!(f, "serialization"),
            Self::System => write!(f, "system"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CoreError::validation("email", "must not be empty");
        assert_eq!(
            err.to_string(),
            "Validation failed for 'email': must not be empty"
        );
        assert!(err.is_client_error());
        assert!(!err.is_server_error());
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_not_found_error() {
        let err = CoreError::not_found("License", 42);
        assert_eq!(err.to_string(), "License not found: 42");
        assert!(err.is_client_error());
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_conflict_error() {
        let err = CoreError::conflict("Employee", "employee_code already exists");
        assert!(err.to_string().contains("employee_code already exists"));
        assert!(err.is_client_error());
        assert_eq!(err.category(), ErrorCategory::Conflict);
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err: serde_json::Error =
            serde_json::from_str::<serde_json::Value>("{ invalid json }").unwrap_err();
        let core_err: CoreError = json_err.into();

        assert!(matches!(core_err, CoreError::Json(_)));
        assert!(core_err.is_server_error());
        assert_eq!(core_err.category(), ErrorCategory::Serialization);
    }

    #[test]
    fn test_auth_errors_display_message_verbatim() {
        let err = CoreError::unauthorized("Authentication required");
        assert_eq!(err.to_string(), "Authentication required");
        assert_eq!(err.category(), ErrorCategory::Auth);

        let err = CoreError::forbidden("Only administrators can create employees");
        assert_eq!(err.to_string(), "Only administrators can create employees");
    }

    #[test]
    fn test_client_vs_server_classification() {
        assert!(CoreError::unauthorized("no token").is_client_error());
        assert!(CoreError::forbidden("admin only").is_client_error());
        assert!(CoreError::RateLimited { retry_after_secs: 30 }.is_client_error());

        assert!(CoreError::Upstream("identity provider down".into()).is_server_error());
        assert!(CoreError::configuration("missing secret").is_server_error());

        let client_err = CoreError::not_found("Ticket", "7");
        assert!(client_err.is_client_error());
        assert!(!client_err.is_server_error());
    }

    #[test]
    fn test_error_categories_display() {
        assert_eq!(ErrorCategory::Validation.to_string(), "validation");
        assert_eq!(ErrorCategory::NotFound.to_string(), "not_found");
        assert_eq!(ErrorCategory::RateLimit.to_string(), "rate_limit");
        assert_eq!(ErrorCategory::Upstream.to_string(), "upstream");
        assert_eq!(ErrorCategory::Auth.to_string(), "auth");
    }
}
