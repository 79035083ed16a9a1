//! EMS HTTP server: router assembly, REST handlers, caching, and auth
//! middleware over the storage and identity-provider crates.

pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod state;

pub use config::AppConfig;
pub use error::ApiError;
pub use server::{EmsServer, ServerBuilder, build_app};
pub use state::AppState;
