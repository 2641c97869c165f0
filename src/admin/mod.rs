//! Admin API.
//!
//! ```text
//! GET /propertykeys            → registered keys
//! GET /configuration/{key}     → resolved configuration, 404 on unknown key
//! GET /circuitbreakers         → instantiated breakers
//! GET /circuitbreakers/{key}   → one breaker, 404 when absent
//! PUT /circuitbreakers/{key}   → force state, 404 when absent
//! ```

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/propertykeys", get(get_property_keys))
        .route("/configuration/{key}", get(get_configuration))
        .route("/circuitbreakers", get(get_circuit_breakers))
        .route(
            "/circuitbreakers/{key}",
            get(get_circuit_breaker).put(put_circuit_breaker),
        )
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
