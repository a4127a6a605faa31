//! TokenForge Server
//!
//! HTTP host for the token engine. Builds the engine from environment
//! configuration and exposes it over a small JSON API.
//!
//! ## API Endpoints
//!
//! - `GET /health` - Liveness check
//! - `GET /.well-known/jwks.json` - The engine's public key set
//! - `POST /v1/token/issue` - Issue a token for caller claims
//! - `POST /v1/token/verify` - Verify a token, return its claims
//! - `GET /v1/token/introspect` - Verify the request's bearer token, require `sub`
//! - `GET /v1/policy` - Active policy set and its conflicts

pub mod api;
pub mod config;

pub use api::create_router;
pub use api::handlers::AppState;
pub use config::{ConfigError, ServerConfig};
