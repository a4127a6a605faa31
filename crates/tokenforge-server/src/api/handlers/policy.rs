//! Policy inspection

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use tokenforge_core::{PolicyConflict, PolicySet, Toggle};

use crate::api::handlers::token::AppState;

/// Active policy set
#[derive(Debug, Serialize)]
pub struct PolicyResponse {
    pub hardened: bool,
    pub enabled: Vec<Toggle>,
    pub policy: PolicySet,
    pub conflicts: Vec<PolicyConflict>,
}

/// Report the policy the engine was built with
///
/// GET /v1/policy
pub async fn get_policy(State(state): State<Arc<AppState>>) -> Json<PolicyResponse> {
    let policy = *state.engine.policy();
    Json(PolicyResponse {
        hardened: policy.is_hardened(),
        enabled: policy.enabled_toggles(),
        policy,
        conflicts: policy.conflicts(),
    })
}
