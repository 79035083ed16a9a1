//! Cached client-credentials token with single-flight refresh.
//!
//! One application-level bearer token is held for outbound directory
//! calls. Reads are lock-cheap; refresh is serialized through an async
//! mutex so N concurrent callers that all find the token stale trigger
//! exactly one acquisition - the losers queue on the guard, re-check the
//! slot, and reuse the winner's result.

use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::entra::EntraClient;
use crate::error::AuthError;

/// A token is not considered usable within this buffer of its expiry, so
/// it cannot expire mid-request.
pub const EXPIRY_BUFFER: Duration = Duration::from_secs(300);

/// Maximum acquisition attempts against a transiently failing provider.
const MAX_ATTEMPTS: u32 = 3;

/// Base retry delay; grows linearly with the attempt number.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self, now: Instant) -> bool {
        now + EXPIRY_BUFFER < self.expires_at
    }
}

/// Single-flight cache for the client-credentials token.
pub struct TokenCache {
    entra: EntraClient,
    slot: RwLock<Option<CachedToken>>,
    refresh_guard: Mutex<()>,
}

impl TokenCache {
    pub fn new(entra: EntraClient) -> Self {
        Self {
            entra,
            slot: RwLock::new(None),
            refresh_guard: Mutex::new(()),
        }
    }

    /// Returns a usable bearer token, acquiring one if the cached token is
    /// absent or inside the expiry buffer.
    pub async fn get_valid_token(&self) -> Result<String, AuthError> {
        let now = Instant::now();
        {
            let slot = self.slot.read().await;
            if let Some(cached) = slot.as_ref()
                && cached.is_valid(now)
            {
                return Ok(cached.token.clone());
            }
        }

        // Single-flight: the first caller through performs the
        // acquisition; everyone else queues here and finds the fresh
        // token on the re-check.
        let _guard = self.refresh_guard.lock().await;

        let now = Instant::now();
        {
            let slot = self.slot.read().await;
            if let Some(cached) = slot.as_ref()
                && cached.is_valid(now)
            {
                debug!("token refreshed by concurrent caller, reusing");
                return Ok(cached.token.clone());
            }
        }

        let cached = self.acquire().await?;
        let token = cached.token.clone();
        *self.slot.write().await = Some(cached);
        Ok(token)
    }

    /// Clears the cached token. Called after a downstream 401 and on
    /// explicit manual refresh.
    pub async fn invalidate(&self, reason: &str) {
        info!(reason, "invalidating cached directory token");
        *self.slot.write().await = None;
    }

    /// Performs the client-credentials token request, retrying transient
    /// failures with linearly increasing delay. Non-transient provider
    /// rejections propagate immediately.
    async fn acquire(&self) -> Result<CachedToken, AuthError> {
        let mut last_err = None;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.entra.client_credentials_token().await {
                Ok(tokens) => {
                    let expires_in = Duration::from_secs(tokens.expires_in);
                    debug!(
                        attempt,
                        expires_in_secs = tokens.expires_in,
                        "acquired client-credentials token"
                    );
                    return Ok(CachedToken {
                        token: tokens.access_token,
                        expires_at: Instant::now() + expires_in,
                    });
                }
                Err(err) if is_transient(&err) && attempt < MAX_ATTEMPTS => {
                    let delay = RETRY_BASE_DELAY * attempt;
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient token acquisition failure, retrying"
                    );
                    last_err = Some(err);
                    tokio::time::sleep(delay).await;
                }
                Err(err) if is_transient(&err) => {
                    warn!(attempt, error = %err, "token acquisition retries exhausted");
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or(AuthError::RetriesExhausted {
            operation: "client_credentials",
            attempts: MAX_ATTEMPTS,
        }))
    }
}

/// HTTP >= 500, 429, connect errors, and timeouts are worth retrying.
fn is_transient(err: &AuthError) -> bool {
    match err {
        AuthError::Rejected { status, .. } => *status >= 500 || *status == 429,
        AuthError::Transport(e) => e.is_timeout() || e.is_connect(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_validity_buffer() {
        let now = Instant::now();
        let valid = CachedToken {
            token: "t".into(),
            expires_at: now + Duration::from_secs(600),
        };
        assert!(valid.is_valid(now));

        // Expires in 4 minutes: inside the 5-minute buffer, must refresh.
        let stale = CachedToken {
            token: "t".into(),
            expires_at: now + Duration::from_secs(240),
        };
        assert!(!stale.is_valid(now));
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient(&AuthError::Rejected {
            operation: "client_credentials",
            status: 503,
            detail: String::new(),
        }));
        assert!(is_transient(&AuthError::Rejected {
            operation: "client_credentials",
            status: 429,
            detail: String::new(),
        }));
        assert!(!is_transient(&AuthError::Rejected {
            operation: "client_credentials",
            status: 400,
            detail: "invalid_client".into(),
        }));
    }
}
