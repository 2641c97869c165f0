//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the admin API nested under its prefix
//! - Mount application routes that call dependencies through the facade
//! - Wire up middleware (tracing, timeout, request ID, cache headers)
//! - Bind server to listener and stop on shutdown

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::circuit::CircuitBreakerAdmin;
use crate::config::TenacityConfig;
use crate::dependency::KeyFactory;
use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};
use crate::http::response::{AdminError, ThrottlingMapper, CACHE_CONTROL_VALUE};
use crate::registry::ConfigurationRegistry;
use crate::resilience::ResilienceFacade;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConfigurationRegistry>,
    pub facade: ResilienceFacade,
    pub admin: CircuitBreakerAdmin,
    pub keys: Arc<dyn KeyFactory>,
    pub api_key: Option<Arc<str>>,
    pub throttling: ThrottlingMapper,
}

/// HTTP server exposing the admin API.
pub struct HttpServer {
    router: Router,
    config: TenacityConfig,
}

impl HttpServer {
    pub fn new(config: TenacityConfig, state: AppState) -> Self {
        Self::with_routes(config, state, Router::new())
    }

    /// Serve `routes` next to the admin API. Handlers reach dependencies via
    /// `AppState::facade` and return failures through `AppState::throttling`.
    pub fn with_routes(config: TenacityConfig, state: AppState, routes: Router<AppState>) -> Self {
        let router = Self::build_router(&config, state, routes);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &TenacityConfig, state: AppState, routes: Router<AppState>) -> Router {
        let mut router = routes.with_state(state.clone());
        if config.admin.enabled {
            let admin = setup_admin_router(state);
            let prefix = config.admin.path_prefix.trim_end_matches('/');
            router = if prefix.is_empty() {
                router.merge(admin)
            } else {
                router.nest(prefix, admin)
            };
        }

        router
            .fallback(|| async { AdminError::NotFound })
            .layer(SetResponseHeaderLayer::overriding(
                header::CACHE_CONTROL,
                HeaderValue::from_static(CACHE_CONTROL_VALUE),
            ))
            .layer(TimeoutLayer::new(Duration::from_secs(config.http.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` completes.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            admin_prefix = %self.config.admin.path_prefix,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &TenacityConfig {
        &self.config
    }
}
