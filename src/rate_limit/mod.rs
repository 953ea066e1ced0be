//! Fixed-window request quota keyed by caller identity.
//!
//! The window map is the only state shared across concurrent requests. The
//! in-memory store keeps it in a `DashMap`, so the read-increment-write for one
//! identifier happens under that identifier's shard lock.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use dashmap::DashMap;
use serde::Serialize;

use crate::auth::Credentials;

/// Millisecond wall clock, injectable so tests control time.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self { now: AtomicI64::new(start_millis) }
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: i64,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, never less than one.
    pub fn retry_after_secs(&self, now_millis: i64) -> u64 {
        let millis = (self.reset_at - now_millis).max(0) as u64;
        millis.div_ceil(1000).max(1)
    }
}

#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    count: u32,
    reset_at: i64,
}

pub trait RateLimitStore: Send + Sync {
    fn check_and_consume(&self, identifier: &str, max_requests: u32, window_millis: i64) -> RateLimitDecision;

    /// Drop windows that have expired. Returns how many were removed.
    fn sweep(&self) -> usize;

    fn window_count(&self) -> usize;

    fn now_millis(&self) -> i64;
}

pub struct InMemoryRateLimitStore {
    windows: DashMap<String, RateLimitWindow>,
    clock: Arc<dyn Clock>,
}

impl InMemoryRateLimitStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { windows: DashMap::new(), clock }
    }
}

impl Default for InMemoryRateLimitStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn check_and_consume(&self, identifier: &str, max_requests: u32, window_millis: i64) -> RateLimitDecision {
        let now = self.clock.now_millis();
        let fresh = RateLimitWindow { count: 1, reset_at: now + window_millis };

        // entry() holds the shard lock until the guard drops
        let mut entry = self.windows.entry(identifier.to_string()).or_insert(RateLimitWindow {
            count: 0,
            reset_at: fresh.reset_at,
        });
        let window = entry.value_mut();

        if window.count == 0 || now > window.reset_at {
            *window = fresh;
            return RateLimitDecision {
                allowed: true,
                remaining: max_requests.saturating_sub(1),
                reset_at: window.reset_at,
            };
        }

        if window.count >= max_requests {
            return RateLimitDecision { allowed: false, remaining: 0, reset_at: window.reset_at };
        }

        window.count += 1;
        RateLimitDecision {
            allowed: true,
            remaining: max_requests - window.count,
            reset_at: window.reset_at,
        }
    }

    fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.windows.len();
        // retain re-checks expiry under the shard write lock
        self.windows.retain(|_, window| now <= window.reset_at);
        before.saturating_sub(self.windows.len())
    }

    fn window_count(&self) -> usize {
        self.windows.len()
    }

    fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }
}

const MIN_WINDOW: Duration = Duration::from_secs(1);

/// Quota policy plus the store it is enforced against.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    max_requests: u32,
    window: Duration,
    enabled: bool,
}

impl RateLimiter {
    /// A zero window is raised to one second and a zero quota to one request.
    pub fn new(store: Arc<dyn RateLimitStore>, max_requests: u32, window: Duration) -> Self {
        Self {
            store,
            max_requests: max_requests.max(1),
            window: window.max(MIN_WINDOW),
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            store: Arc::new(InMemoryRateLimitStore::default()),
            max_requests: u32::MAX,
            window: Duration::from_secs(60),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn now_millis(&self) -> i64 {
        self.store.now_millis()
    }

    pub fn check(&self, identifier: &str) -> RateLimitDecision {
        self.store
            .check_and_consume(identifier, self.max_requests, self.window.as_millis() as i64)
    }

    /// Sweep expired windows once per window length.
    pub fn start_sweep_task(&self) -> tokio::task::JoinHandle<()> {
        let store = self.store.clone();
        let period = self.window;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let removed = store.sweep();
                if removed > 0 {
                    tracing::debug!("rate limiter swept {} expired windows", removed);
                }
            }
        })
    }
}

/// Caller identity for quota purposes: the presented key, else the client address.
pub fn identifier_for(headers: &HeaderMap, credentials: &Credentials) -> String {
    if let Some(key) = credentials.caller_key() {
        return key.to_string();
    }

    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| header("x-real-ip").map(str::trim).filter(|s| !s.is_empty()))
        .unwrap_or("unknown")
        .to_string()
}
