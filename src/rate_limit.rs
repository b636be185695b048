use axum::http::HeaderMap;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;

use crate::metrics::RATE_LIMIT_ENTRIES;

// Every route counts requests in 60 second windows.
pub const WINDOW: Duration = Duration::from_secs(60);

// Shared by every client whose address cannot be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

// Rate limit entry - tracks requests per route + client
#[derive(Debug, Clone, Copy)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_reset_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteLimit {
    pub max_requests: u32,
    pub window: Duration,
}

impl RouteLimit {
    pub const fn per_window(max_requests: u32) -> Self {
        Self {
            max_requests,
            window: WINDOW,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied { retry_after_secs: u64 },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

// backing store for the counters; hit is the whole check-then-increment for one key
pub trait RateLimitStore: Send + Sync {
    fn hit(&self, key: &str, limit: RouteLimit, now: Instant) -> Admission;

    // Drop entries whose window has already closed. Returns how many went.
    fn sweep(&self, now: Instant) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    entries: DashMap<String, RateLimitEntry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for InMemoryStore {
    fn hit(&self, key: &str, limit: RouteLimit, now: Instant) -> Admission {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                window_reset_at: now,
            });

        // window expired (or brand new)..? start a fresh one
        if now >= entry.window_reset_at {
            entry.count = 1;
            entry.window_reset_at = now + limit.window;
            return Admission::Allowed;
        }

        if entry.count < limit.max_requests {
            entry.count += 1;
            return Admission::Allowed;
        }

        let remaining = entry.window_reset_at.saturating_duration_since(now);
        let retry_after_secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
        Admission::Denied {
            retry_after_secs: retry_after_secs.max(1),
        }
    }

    fn sweep(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.window_reset_at);
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// Admission control shared by all routes; the store is injected.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    pub fn check(&self, route: &str, client_id: &str, limit: RouteLimit) -> Admission {
        self.check_at(route, client_id, limit, Instant::now())
    }

    pub fn check_at(
        &self,
        route: &str,
        client_id: &str,
        limit: RouteLimit,
        now: Instant,
    ) -> Admission {
        let key = format!("{route}:{client_id}");
        self.store.hit(&key, limit, now)
    }

    // evict closed windows and refresh the entry gauge; returns (removed, remaining)
    pub fn sweep(&self, now: Instant) -> (usize, usize) {
        let removed = self.store.sweep(now);
        let remaining = self.store.len();
        RATE_LIMIT_ENTRIES.set(remaining as f64);
        (removed, remaining)
    }

    pub fn store(&self) -> &Arc<dyn RateLimitStore> {
        &self.store
    }
}

// First `X-Forwarded-For` hop, then the peer address, then UNKNOWN_CLIENT
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

// Eviction loop - removes closed windows so the table stays bounded
pub async fn sweeper(limiter: RateLimiter, every: Duration) {
    let every = every.max(Duration::from_secs(1));
    let mut interval = interval(every);

    tracing::info!(interval = ?every, "rate limit sweeper started");

    loop {
        interval.tick().await;

        let (removed, remaining) = limiter.sweep(Instant::now());

        if removed > 0 {
            tracing::debug!(removed, remaining, "evicted expired rate limit entries");
        }
    }
}
