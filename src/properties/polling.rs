//! Remote-polling property source.
//!
//! # Responsibilities
//! - Fetch a full property snapshot from a remote origin on an interval
//! - Hand each snapshot to `RemoteOverrides`
//! - Keep serving the last good values when a fetch fails
//!
//! # Design Decisions
//! - Fetchers are pluggable (HTTP endpoint, local file)
//! - Failures back off exponentially, never beyond the poll interval
//! - Loop exits on the shutdown broadcast

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use url::Url;

use super::backoff::RefreshBackoff;
use super::remote::{flatten, RefreshSummary, RemoteOverrides};
use super::{InMemoryPropertySource, PropertySource, RefreshCallback};

/// Errors raised while fetching a remote snapshot.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("remote returned status {0}")]
    Status(u16),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("snapshot must be a table/object of property names")]
    NotAnObject,
}

/// Source of full property snapshots.
#[async_trait]
pub trait PropertyFetcher: Send + Sync {
    /// Short label for logs and metrics.
    fn origin(&self) -> String;

    async fn fetch(&self) -> Result<HashMap<String, String>, FetchError>;
}

/// Fetches a JSON object of properties over HTTP.
pub struct HttpFetcher {
    client: reqwest::Client,
    url: Url,
}

impl HttpFetcher {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl PropertyFetcher for HttpFetcher {
    fn origin(&self) -> String {
        self.url.to_string()
    }

    async fn fetch(&self) -> Result<HashMap<String, String>, FetchError> {
        let response = self.client.get(self.url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let document: serde_json::Value = response.json().await?;
        flatten(&document).ok_or(FetchError::NotAnObject)
    }
}

/// Reads a TOML overrides file.
///
/// ```toml
/// "resilience.command.PAYMENTS.circuitBreaker.forceOpen" = true
///
/// [resilience.threadpool.PAYMENTS]
/// coreSize = 4
/// ```
#[derive(Debug, Clone)]
pub struct FileFetcher {
    path: PathBuf,
}

impl FileFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Synchronous read, usable from notify callbacks.
    pub fn load(&self) -> Result<HashMap<String, String>, FetchError> {
        let content = std::fs::read_to_string(&self.path)?;
        let document: serde_json::Value = toml::from_str(&content)?;
        flatten(&document).ok_or(FetchError::NotAnObject)
    }
}

#[async_trait]
impl PropertyFetcher for FileFetcher {
    fn origin(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<HashMap<String, String>, FetchError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let document: serde_json::Value = toml::from_str(&content)?;
        flatten(&document).ok_or(FetchError::NotAnObject)
    }
}

/// A property source refreshed from a remote origin.
///
/// Reads and writes go to an in-memory store; `run` keeps it in step with
/// the fetcher.
pub struct PollingPropertySource {
    store: Arc<InMemoryPropertySource>,
    overrides: RemoteOverrides,
    fetcher: Box<dyn PropertyFetcher>,
    interval: Duration,
}

impl PollingPropertySource {
    pub fn new(
        store: Arc<InMemoryPropertySource>,
        fetcher: Box<dyn PropertyFetcher>,
        interval: Duration,
    ) -> Self {
        let overrides = RemoteOverrides::new(store.clone());
        Self {
            store,
            overrides,
            fetcher,
            interval,
        }
    }

    pub fn store(&self) -> &Arc<InMemoryPropertySource> {
        &self.store
    }

    /// Fetch and apply one snapshot.
    pub async fn poll_once(&self) -> Result<RefreshSummary, FetchError> {
        let snapshot = self.fetcher.fetch().await?;
        Ok(self.overrides.apply(&self.fetcher.origin(), snapshot))
    }

    /// Poll until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let origin = self.fetcher.origin();
        tracing::info!(
            origin = %origin,
            interval_secs = self.interval.as_secs(),
            "Property poller starting"
        );

        let mut backoff = RefreshBackoff::new(Duration::from_millis(500), self.interval);
        loop {
            let delay = match self.poll_once().await {
                Ok(_) => {
                    backoff.reset();
                    self.interval
                }
                Err(e) => {
                    let delay = backoff.record_failure();
                    tracing::warn!(
                        origin = %origin,
                        error = %e,
                        failures = backoff.failures(),
                        retry_in = ?delay,
                        "Property refresh failed, keeping last known values"
                    );
                    delay
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => {
                    tracing::info!(origin = %origin, "Property poller received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

impl PropertySource for PollingPropertySource {
    fn get(&self, name: &str) -> Option<String> {
        self.store.get(name)
    }

    fn set(&self, name: &str, value: &str) {
        self.store.set(name, value)
    }

    fn clear(&self, name: &str) {
        self.store.clear(name)
    }

    fn subscribe(&self, callback: RefreshCallback) {
        self.store.subscribe(callback)
    }

    fn set_if_absent(&self, name: &str, value: &str) -> bool {
        self.store.set_if_absent(name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedFetcher {
        calls: AtomicU32,
    }

    #[async_trait]
    impl PropertyFetcher for ScriptedFetcher {
        fn origin(&self) -> String {
            "scripted".into()
        }

        async fn fetch(&self) -> Result<HashMap<String, String>, FetchError> {
            match self.calls.fetch_add(1, Ordering::SeqCst) {
                0 => Ok(HashMap::from([("a".to_string(), "1".to_string())])),
                _ => Err(FetchError::Status(503)),
            }
        }
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_last_values() {
        let store = Arc::new(InMemoryPropertySource::new());
        let source = PollingPropertySource::new(
            store.clone(),
            Box::new(ScriptedFetcher { calls: AtomicU32::new(0) }),
            Duration::from_secs(30),
        );

        let summary = source.poll_once().await.unwrap();
        assert_eq!(summary.written, 1);
        assert!(matches!(source.poll_once().await, Err(FetchError::Status(503))));
        assert_eq!(source.get("a").as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_file_fetcher_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "\"resilience.command.LEDGER.circuitBreaker.forceOpen\" = true\n\n[resilience.threadpool.LEDGER]\ncoreSize = 4"
        )
        .unwrap();

        let fetcher = FileFetcher::new(file.path());
        let snapshot = fetcher.fetch().await.unwrap();
        assert_eq!(snapshot["resilience.command.LEDGER.circuitBreaker.forceOpen"], "true");
        assert_eq!(snapshot["resilience.threadpool.LEDGER.coreSize"], "4");
        assert_eq!(fetcher.load().unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = Arc::new(InMemoryPropertySource::new());
        let source = Arc::new(PollingPropertySource::new(
            store.clone(),
            Box::new(ScriptedFetcher { calls: AtomicU32::new(0) }),
            Duration::from_secs(60),
        ));
        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(source.run(rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert_eq!(store.get("a").as_deref(), Some("1"));
    }
}
