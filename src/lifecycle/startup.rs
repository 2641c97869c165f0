//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the property store and start remote refreshers
//! - Register the configured dependencies
//! - Wire engine, facade and admin together
//! - Serve the admin API and stop everything on shutdown

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use url::Url;

use super::shutdown::Shutdown;
use crate::circuit::CircuitBreakerAdmin;
use crate::config::TenacityConfig;
use crate::dependency::{DependencyKey, KeyError, ResilienceConfiguration, StaticKeyFactory};
use crate::engine::LocalEngine;
use crate::http::{AppState, HttpServer, ThrottlingMapper};
use crate::observability::metrics;
use crate::properties::{
    FetchError, HttpFetcher, InMemoryPropertySource, PollingPropertySource, PropertyFileWatcher,
    RemoteOverrides,
};
use crate::registry::ConfigurationRegistry;
use crate::resilience::ResilienceFacade;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid dependency name '{name}': {source}")]
    Key {
        name: String,
        #[source]
        source: KeyError,
    },

    #[error("invalid poll URL: {0}")]
    PollUrl(#[from] url::ParseError),

    #[error("property fetcher: {0}")]
    Fetcher(#[from] FetchError),

    #[error("overrides watcher: {0}")]
    Watcher(#[from] notify::Error),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("listener: {0}")]
    Io(#[from] std::io::Error),
}

/// A fully wired service.
pub struct Tenacity {
    config: TenacityConfig,
    store: Arc<InMemoryPropertySource>,
    registry: Arc<ConfigurationRegistry>,
    engine: Arc<LocalEngine>,
    facade: ResilienceFacade,
    admin: CircuitBreakerAdmin,
    keys: Arc<StaticKeyFactory>,
    shutdown: Shutdown,
    // Dropping the watcher stops it.
    _watcher: Option<RecommendedWatcher>,
    tasks: Vec<JoinHandle<()>>,
}

impl Tenacity {
    /// Wire every subsystem from `config`. Must run inside a tokio runtime.
    pub fn bootstrap(config: TenacityConfig) -> Result<Self, StartupError> {
        let entries = dependency_entries(&config)?;
        let keys = Arc::new(StaticKeyFactory::new(entries.keys().cloned()));
        let shutdown = Shutdown::new();
        let store = Arc::new(InMemoryPropertySource::new());
        let mut tasks = Vec::new();

        let watcher = match &config.properties.overrides_file {
            Some(path) => {
                let overrides = Arc::new(RemoteOverrides::new(store.clone()));
                Some(PropertyFileWatcher::new(Path::new(path), overrides).run()?)
            }
            None => None,
        };

        if let Some(raw) = &config.properties.poll_url {
            let fetcher = HttpFetcher::new(
                Url::parse(raw)?,
                Duration::from_secs(config.properties.poll_timeout_secs),
            )?;
            let poller = Arc::new(PollingPropertySource::new(
                store.clone(),
                Box::new(fetcher),
                Duration::from_secs(config.properties.poll_interval_secs),
            ));
            tasks.push(tokio::spawn(poller.run(shutdown.subscribe())));
        }

        let registry = Arc::new(ConfigurationRegistry::new(store.clone()));
        registry.register(&entries);

        let engine = Arc::new(LocalEngine::new(store.clone()));
        let facade = ResilienceFacade::new(registry.clone(), engine.clone(), Handle::current());
        let admin = CircuitBreakerAdmin::new(store.clone(), engine.clone());

        if config.observability.metrics_enabled {
            let addr: SocketAddr = config
                .observability
                .metrics_address
                .parse()
                .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
            metrics::init_metrics(addr)?;
        }

        tracing::info!(
            dependencies = entries.len(),
            polling = config.properties.poll_url.is_some(),
            overrides_file = config.properties.overrides_file.is_some(),
            "Tenacity bootstrapped"
        );

        Ok(Self {
            config,
            store,
            registry,
            engine,
            facade,
            admin,
            keys,
            shutdown,
            _watcher: watcher,
            tasks,
        })
    }

    pub fn config(&self) -> &TenacityConfig {
        &self.config
    }

    pub fn properties(&self) -> &Arc<InMemoryPropertySource> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ConfigurationRegistry> {
        &self.registry
    }

    pub fn engine(&self) -> &Arc<LocalEngine> {
        &self.engine
    }

    pub fn facade(&self) -> &ResilienceFacade {
        &self.facade
    }

    pub fn admin(&self) -> &CircuitBreakerAdmin {
        &self.admin
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            registry: self.registry.clone(),
            facade: self.facade.clone(),
            admin: self.admin.clone(),
            keys: self.keys.clone(),
            api_key: self.config.admin.api_key.as_deref().map(Arc::from),
            throttling: ThrottlingMapper::new(self.config.http.throttle_status_code),
        }
    }

    pub fn router(&self) -> axum::Router {
        self.router_with(axum::Router::new())
    }

    /// The admin router plus application `routes`.
    pub fn router_with(&self, routes: axum::Router<AppState>) -> axum::Router {
        HttpServer::build_router(&self.config, self.app_state(), routes)
    }

    /// Serve the admin API until `signal` completes, then stop the
    /// background refreshers.
    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> Result<(), StartupError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.serve_with(listener, axum::Router::new(), signal).await
    }

    /// Like `serve`, with application `routes` mounted next to the admin API.
    pub async fn serve_with<F>(
        self,
        listener: TcpListener,
        routes: axum::Router<AppState>,
        signal: F,
    ) -> Result<(), StartupError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let server = HttpServer::with_routes(self.config.clone(), self.app_state(), routes);
        let result = server.run(listener, signal).await;

        self.shutdown.trigger();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Background task ended abnormally");
            }
        }
        result.map_err(StartupError::from)
    }
}

fn dependency_entries(
    config: &TenacityConfig,
) -> Result<HashMap<DependencyKey, ResilienceConfiguration>, StartupError> {
    config
        .dependencies
        .iter()
        .map(|(name, dependency)| {
            DependencyKey::new(name)
                .map(|key| (key, *dependency))
                .map_err(|source| StartupError::Key {
                    name: name.clone(),
                    source,
                })
        })
        .collect()
}
