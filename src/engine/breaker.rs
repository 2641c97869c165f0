//! Per-dependency circuit breaker.
//!
//! # States
//! - Closed: calls pass, outcomes feed the rolling window
//! - Open: calls are short-circuited until the sleep window elapses
//! - Forced open / forced closed: property overrides that bypass the above
//!
//! # State Transitions
//! ```text
//! Closed → Open: volume >= requestVolumeThreshold AND error% >= threshold
//! Open → (single trial) after sleepWindowMs
//! trial succeeds → Closed (window reset)
//! trial fails → Open, sleep window restarts
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use arc_swap::ArcSwap;

use super::CircuitBreakerState;
use crate::dependency::CircuitBreakerSettings;

/// Administrative override read from the property source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forced {
    None,
    Open,
    Closed,
}

/// Success/failure totals over the current window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthCounts {
    pub total: u64,
    pub failures: u64,
}

impl HealthCounts {
    pub fn error_percentage(&self) -> u32 {
        if self.total == 0 {
            0
        } else {
            ((self.failures * 100) / self.total) as u32
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    start_ms: u64,
    successes: u64,
    failures: u64,
}

/// Bucketed rolling window of call outcomes.
#[derive(Debug)]
struct RollingWindow {
    window_ms: u64,
    bucket_ms: u64,
    buckets: VecDeque<Bucket>,
}

impl RollingWindow {
    fn new(window_ms: u64, num_buckets: u32) -> Self {
        let bucket_ms = (window_ms / u64::from(num_buckets.max(1))).max(1);
        Self {
            window_ms,
            bucket_ms,
            buckets: VecDeque::new(),
        }
    }

    fn roll(&mut self, now_ms: u64) {
        while let Some(front) = self.buckets.front() {
            if front.start_ms.saturating_add(self.window_ms) <= now_ms {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }

    fn record(&mut self, now_ms: u64, failure: bool) {
        self.roll(now_ms);
        if self.window_ms == 0 {
            return;
        }
        let start_ms = now_ms - now_ms % self.bucket_ms;
        let current = match self.buckets.back_mut() {
            Some(bucket) if bucket.start_ms == start_ms => bucket,
            _ => {
                self.buckets.push_back(Bucket {
                    start_ms,
                    successes: 0,
                    failures: 0,
                });
                // just pushed, so back_mut() is Some
                match self.buckets.back_mut() {
                    Some(bucket) => bucket,
                    None => return,
                }
            }
        };
        if failure {
            current.failures += 1;
        } else {
            current.successes += 1;
        }
    }

    fn counts(&mut self, now_ms: u64) -> HealthCounts {
        self.roll(now_ms);
        self.buckets.iter().fold(HealthCounts::default(), |acc, b| HealthCounts {
            total: acc.total + b.successes + b.failures,
            failures: acc.failures + b.failures,
        })
    }

    fn reset(&mut self) {
        self.buckets.clear();
    }
}

/// Automatic breaker for one dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    settings: ArcSwap<CircuitBreakerSettings>,
    epoch: Instant,
    open: AtomicBool,
    opened_at_ms: AtomicU64,
    window: Mutex<RollingWindow>,
}

impl CircuitBreaker {
    pub fn new(settings: CircuitBreakerSettings) -> Self {
        Self {
            window: Mutex::new(RollingWindow::new(
                settings.metrics_window_ms(),
                settings.metrics_window_buckets(),
            )),
            settings: ArcSwap::from_pointee(settings),
            epoch: Instant::now(),
            open: AtomicBool::new(false),
            opened_at_ms: AtomicU64::new(0),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn window(&self) -> std::sync::MutexGuard<'_, RollingWindow> {
        self.window.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn settings(&self) -> CircuitBreakerSettings {
        **self.settings.load()
    }

    /// Apply the latest resolved thresholds. Changing the window geometry
    /// starts a fresh window.
    pub fn update(&self, settings: CircuitBreakerSettings) {
        let current = self.settings();
        if current == settings {
            return;
        }
        if current.metrics_window_ms() != settings.metrics_window_ms()
            || current.metrics_window_buckets() != settings.metrics_window_buckets()
        {
            *self.window() = RollingWindow::new(
                settings.metrics_window_ms(),
                settings.metrics_window_buckets(),
            );
        }
        self.settings.store(std::sync::Arc::new(settings));
    }

    pub fn health(&self) -> HealthCounts {
        let now = self.now_ms();
        self.window().counts(now)
    }

    /// Automatic open check; trips the breaker when health demands it.
    pub fn is_open(&self) -> bool {
        if self.open.load(Ordering::Acquire) {
            return true;
        }

        let settings = self.settings();
        let health = self.health();
        if health.total < u64::from(settings.request_volume_threshold()) {
            return false;
        }
        if health.error_percentage() < settings.error_threshold_percent() {
            return false;
        }

        if self
            .open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.opened_at_ms.store(self.now_ms(), Ordering::Release);
            tracing::warn!(
                total = health.total,
                failures = health.failures,
                error_percentage = health.error_percentage(),
                "Circuit opened"
            );
        }
        true
    }

    /// Let exactly one caller through once the sleep window has elapsed.
    fn allow_single_trial(&self) -> bool {
        let opened_at = self.opened_at_ms.load(Ordering::Acquire);
        let now = self.now_ms();
        if now <= opened_at.saturating_add(self.settings().sleep_window_ms()) {
            return false;
        }
        self.opened_at_ms
            .compare_exchange(opened_at, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn allow_request(&self, forced: Forced) -> bool {
        match forced {
            Forced::Open => false,
            Forced::Closed => true,
            Forced::None => !self.is_open() || self.allow_single_trial(),
        }
    }

    pub fn state(&self, forced: Forced) -> CircuitBreakerState {
        match forced {
            Forced::Open => CircuitBreakerState::ForcedOpen,
            Forced::Closed => CircuitBreakerState::ForcedClosed,
            Forced::None if self.is_open() => CircuitBreakerState::Open,
            Forced::None => CircuitBreakerState::Closed,
        }
    }

    pub fn mark_success(&self) {
        let now = self.now_ms();
        let mut window = self.window();
        if self
            .open
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            window.reset();
            tracing::info!("Circuit closed after successful trial");
        }
        window.record(now, false);
    }

    pub fn mark_failure(&self) {
        let now = self.now_ms();
        self.window().record(now, true);
    }
}
