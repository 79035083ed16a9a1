//! Router assembly and server lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Router, middleware};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use ems_auth::{DirectoryClient, EntraClient, JwtService, TokenCache};

use crate::cache::CacheBackend;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::handlers;
use crate::middleware as app_middleware;
use crate::state::AppState;

pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;

    let api = Router::new()
        .route("/auth/login", get(handlers::auth::login))
        .route("/auth/redirect", get(handlers::auth::redirect))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/me", get(handlers::auth::me))
        .route(
            "/employees",
            get(handlers::employees::list).post(handlers::employees::create),
        )
        .route(
            "/employees/{id}",
            get(handlers::employees::get_by_id)
                .put(handlers::employees::update)
                .delete(handlers::employees::delete),
        )
        .route(
            "/departments",
            get(handlers::departments::list).post(handlers::departments::create),
        )
        .route(
            "/departments/{id}",
            get(handlers::departments::get_by_id)
                .put(handlers::departments::update)
                .delete(handlers::departments::delete),
        )
        .route(
            "/licenses",
            get(handlers::licenses::list).post(handlers::licenses::create),
        )
        .route(
            "/licenses/{id}",
            get(handlers::licenses::get_by_id)
                .put(handlers::licenses::update)
                .delete(handlers::licenses::delete),
        )
        .route(
            "/hardware",
            get(handlers::hardware::list).post(handlers::hardware::create),
        )
        .route(
            "/hardware/{id}",
            get(handlers::hardware::get_by_id)
                .put(handlers::hardware::update)
                .delete(handlers::hardware::delete),
        )
        .route(
            "/software",
            get(handlers::software::list).post(handlers::software::create),
        )
        .route(
            "/software/{id}",
            get(handlers::software::get_by_id)
                .put(handlers::software::update)
                .delete(handlers::software::delete),
        )
        .route(
            "/tickets",
            get(handlers::tickets::list).post(handlers::tickets::create),
        )
        .route(
            "/tickets/{id}",
            get(handlers::tickets::get_by_id)
                .put(handlers::tickets::update)
                .delete(handlers::tickets::delete),
        )
        .route(
            "/integrations",
            get(handlers::integrations::list).post(handlers::integrations::create),
        )
        .route(
            "/integrations/{id}",
            get(handlers::integrations::get_by_id)
                .put(handlers::integrations::update)
                .delete(handlers::integrations::delete),
        )
        .route(
            "/time-tracking/check-in",
            post(handlers::time_tracking::check_in),
        )
        .route(
            "/time-tracking/check-out",
            post(handlers::time_tracking::check_out),
        )
        .route("/time-tracking/logs", get(handlers::time_tracking::logs))
        .fallback(not_found);

    Router::new()
        .route("/", get(handlers::health::root))
        .route("/healthz", get(handlers::health::healthz))
        .route("/readyz", get(handlers::health::readyz))
        .nest("/api/v1", api)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::authentication,
        ))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        // Outside TraceLayer so the span sees the generated request id.
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

pub struct EmsServer {
    addr: SocketAddr,
    app: Router,
}

pub struct ServerBuilder {
    config: AppConfig,
}

impl ServerBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Connects the database (running migrations), the optional Redis
    /// pool, and the identity-provider clients, then assembles the
    /// router. Everything lives in `AppState`; nothing is global.
    pub async fn build(self) -> anyhow::Result<EmsServer> {
        let config = Arc::new(self.config);

        let db = ems_storage::create_pool(&config.postgres).await?;
        if config.postgres.run_migrations {
            ems_storage::migrations::run(&db).await?;
            info!("database migrations applied");
        }

        let cache = match &config.redis.url {
            Some(url) => {
                let pool = deadpool_redis::Config::from_url(url.as_str())
                    .create_pool(Some(deadpool_redis::Runtime::Tokio1))?;
                match pool.get().await {
                    Ok(_) => info!("redis cache connected"),
                    Err(e) => {
                        warn!(error = %e, "redis unreachable at startup, continuing in degraded mode")
                    }
                }
                CacheBackend::new_redis(pool)
            }
            None => {
                info!("no redis url configured, using local in-process cache");
                CacheBackend::new_local()
            }
        };

        let entra = EntraClient::new(config.auth.entra.clone())?;
        let token_cache = Arc::new(TokenCache::new(entra.clone()));
        let directory = DirectoryClient::new(
            config.auth.entra.graph_base_url.clone(),
            Arc::clone(&token_cache),
        )?;
        let jwt = JwtService::new(&config.auth.jwt);

        let identity = Arc::new(ems_storage::PgIdentityStore::new(db.clone()));

        let addr = config.addr();
        let state = AppState {
            config,
            db,
            identity,
            cache,
            token_cache,
            entra,
            directory,
            jwt,
        };

        Ok(EmsServer {
            addr,
            app: build_app(state),
        })
    }
}

impl EmsServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

// Fallback for unmatched API routes so clients always get the envelope.
async fn not_found() -> ApiError {
    ApiError::not_found("Route", "-")
}
