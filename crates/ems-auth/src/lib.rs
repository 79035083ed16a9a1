//! Identity-provider integration for the EMS server.
//!
//! This crate owns everything that touches Microsoft Entra and the Graph
//! directory API:
//!
//! - [`token_cache::TokenCache`] - single-flight cached client-credentials
//!   token with an expiry buffer
//! - [`entra::EntraClient`] - authorization URLs, code exchange, silent
//!   refresh against the provider's token endpoint
//! - [`directory::DirectoryClient`] - bearer-authenticated Graph calls
//!   with retry/backoff and a fixed user-facing error taxonomy
//! - [`jwt::JwtService`] - local HS256 access/refresh token pair

pub mod config;
pub mod directory;
pub mod entra;
pub mod error;
pub mod jwt;
pub mod token_cache;

pub use config::{AuthConfig, EntraConfig, JwtConfig};
pub use directory::{DirectoryClient, UserProfile};
pub use entra::{EntraClient, ProviderTokens};
pub use error::{AuthError, DirectoryError};
pub use jwt::{Claims, JwtService, TokenPair, TokenUse};
pub use token_cache::TokenCache;
