use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::circuit::{CircuitBreakerView, ForceCommand};
use crate::dependency::{DependencyKey, ResilienceConfiguration};
use crate::http::response::AdminError;
use crate::http::server::AppState;

/// Body of `PUT /circuitbreakers/{key}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceStateRequest {
    pub state: ForceCommand,
}

fn parse_key(state: &AppState, raw: &str) -> Result<DependencyKey, AdminError> {
    state
        .keys
        .from_name(raw)
        .ok_or_else(|| AdminError::UnknownKey(raw.to_string()))
}

pub async fn get_property_keys(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(
        state
            .registry
            .keys()
            .iter()
            .map(|k| k.name().to_string())
            .collect(),
    )
}

pub async fn get_configuration(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<ResilienceConfiguration>, AdminError> {
    let key = parse_key(&state, &raw)?;
    Ok(Json(state.registry.resolve(&key)))
}

pub async fn get_circuit_breakers(State(state): State<AppState>) -> Json<Vec<CircuitBreakerView>> {
    let keys = state.registry.keys();
    Json(state.admin.list(&keys))
}

pub async fn get_circuit_breaker(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<CircuitBreakerView>, AdminError> {
    let key = parse_key(&state, &raw)?;
    state
        .admin
        .get(&key)
        .map(Json)
        .ok_or(AdminError::NoBreaker(key))
}

pub async fn put_circuit_breaker(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    body: Result<Json<ForceStateRequest>, JsonRejection>,
) -> Result<Json<CircuitBreakerView>, AdminError> {
    let key = parse_key(&state, &raw)?;
    let Json(request) = body.map_err(|e| AdminError::BadRequest(e.body_text()))?;
    state
        .admin
        .force_state(&key, request.state)
        .map(Json)
        .ok_or(AdminError::NoBreaker(key))
}
