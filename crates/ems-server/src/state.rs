//! Shared application state, constructed once in the server builder and
//! injected everywhere. No module-level singletons.

use std::sync::Arc;

use sqlx_postgres::PgPool;

use ems_auth::{DirectoryClient, EntraClient, JwtService, TokenCache};
use ems_storage::IdentityStore;

use crate::cache::CacheBackend;
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: PgPool,
    pub identity: Arc<dyn IdentityStore>,
    pub cache: CacheBackend,
    pub token_cache: Arc<TokenCache>,
    pub entra: EntraClient,
    pub directory: DirectoryClient,
    pub jwt: JwtService,
}
