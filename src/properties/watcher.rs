//! Overrides file watcher for immediate refresh.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use super::polling::FileFetcher;
use super::remote::RemoteOverrides;

/// Watches a TOML overrides file and applies it on every change.
pub struct PropertyFileWatcher {
    fetcher: FileFetcher,
    overrides: Arc<RemoteOverrides>,
}

impl PropertyFileWatcher {
    pub fn new(path: &Path, overrides: Arc<RemoteOverrides>) -> Self {
        Self {
            fetcher: FileFetcher::new(path),
            overrides,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.fetcher.path().to_path_buf()
    }

    /// Apply the file once, synchronously.
    pub fn load_now(&self) -> bool {
        apply_file(&self.fetcher, &self.overrides)
    }

    /// Apply the file now, then keep watching it in the background.
    ///
    /// The returned watcher must be kept alive for as long as updates
    /// should be applied.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        self.load_now();

        let fetcher = self.fetcher.clone();
        let overrides = self.overrides.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = %fetcher.path().display(), "Overrides file change detected, reloading");
                        apply_file(&fetcher, &overrides);
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Overrides watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(self.fetcher.path(), RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.fetcher.path(), "Overrides watcher started");
        Ok(watcher)
    }
}

fn apply_file(fetcher: &FileFetcher, overrides: &RemoteOverrides) -> bool {
    match fetcher.load() {
        Ok(snapshot) => {
            overrides.apply(&fetcher.path().display().to_string(), snapshot);
            true
        }
        Err(e) => {
            tracing::error!(
                path = %fetcher.path().display(),
                error = %e,
                "Failed to load overrides file. Keeping current properties."
            );
            false
        }
    }
}
