//! Key-set publication

use axum::{extract::State, Json};
use std::sync::Arc;

use tokenforge_core::KeySet;

use crate::api::error::ApiError;
use crate::api::handlers::token::AppState;

/// The engine's public verification keys
///
/// GET /.well-known/jwks.json
pub async fn jwks(State(state): State<Arc<AppState>>) -> Result<Json<KeySet>, ApiError> {
    state
        .engine
        .key_set()
        .map(Json)
        .map_err(|e| ApiError::Internal(e.to_string()))
}
