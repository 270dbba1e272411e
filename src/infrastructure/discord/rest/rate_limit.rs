use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use super::transport::QuotaMetadata;

/// Quota state of one route.
///
/// Learned from response headers; until the first response nothing is known
/// and calls go through. Locally defined buckets carry a fixed window instead.
#[derive(Debug, Clone, Default)]
pub struct RateBucket {
    limit: Option<u32>,
    remaining: Option<u32>,
    reset_at: Option<Instant>,
    window: Option<Duration>,
    id: Option<String>,
}

impl RateBucket {
    #[must_use]
    pub fn fixed(limit: u32, window: Duration) -> Self {
        Self {
            limit: Some(limit),
            remaining: Some(limit),
            window: Some(window),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn limit(&self) -> Option<u32> {
        self.limit
    }

    #[must_use]
    pub const fn remaining(&self) -> Option<u32> {
        self.remaining
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// How long to wait before the next call may go out.
    fn ready_in(&mut self, now: Instant) -> Option<Duration> {
        if let Some(reset_at) = self.reset_at
            && now >= reset_at
        {
            self.remaining = self.limit;
            self.reset_at = None;
        }
        match (self.remaining, self.reset_at) {
            (Some(0), Some(reset_at)) => Some(reset_at - now),
            _ => None,
        }
    }

    fn consume(&mut self, now: Instant) {
        if let Some(remaining) = self.remaining {
            self.remaining = Some(remaining.saturating_sub(1));
        }
        if let Some(window) = self.window
            && self.reset_at.is_none()
        {
            self.reset_at = Some(now + window);
        }
    }

    fn update(&mut self, quota: &QuotaMetadata, now: Instant) {
        if self.window.is_some() {
            return;
        }
        if let Some(limit) = quota.limit {
            self.limit = Some(limit);
        }
        if let Some(remaining) = quota.remaining {
            self.remaining = Some(remaining);
        }
        if let Some(reset_after) = quota.reset_after {
            self.reset_at = Some(now + reset_after);
        }
        if quota.bucket.is_some() {
            self.id.clone_from(&quota.bucket);
        }
    }

    fn throttle(&mut self, retry_after: Duration, now: Instant) {
        self.remaining = Some(0);
        self.reset_at = Some(now + retry_after);
    }
}

type SharedBucket = Arc<AsyncMutex<RateBucket>>;

/// Per-route quota tracking plus the global limit.
///
/// Each route has its own async mutex, held for the whole call, so same-route
/// calls are serialized while unrelated routes never wait on each other.
#[derive(Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, SharedBucket>>,
    global_until: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a bucket with a locally known quota, such as gateway commands.
    #[must_use]
    pub fn with_fixed_bucket(self, key: impl Into<String>, limit: u32, window: Duration) -> Self {
        self.buckets.lock().insert(
            key.into(),
            Arc::new(AsyncMutex::new(RateBucket::fixed(limit, window))),
        );
        self
    }

    fn bucket(&self, key: &str) -> SharedBucket {
        self.buckets
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Snapshot of a route's bucket, if the route was ever used.
    pub async fn bucket_state(&self, key: &str) -> Option<RateBucket> {
        let bucket = self.buckets.lock().get(key).cloned()?;
        let state = bucket.lock().await.clone();
        Some(state)
    }

    /// Waits until the route may make a call and reserves it.
    ///
    /// The permit keeps the route locked until dropped.
    pub async fn acquire(&self, key: &str) -> RatePermit {
        let bucket = self.bucket(key).lock_owned().await;
        let mut permit = RatePermit {
            key: key.to_string(),
            bucket,
            global_until: self.global_until.clone(),
        };
        permit.wait_ready().await;
        permit
    }
}

/// Exclusive right to call one route.
#[derive(Debug)]
pub struct RatePermit {
    key: String,
    bucket: OwnedMutexGuard<RateBucket>,
    global_until: Arc<Mutex<Option<Instant>>>,
}

impl RatePermit {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    fn global_wait(&self, now: Instant) -> Option<Duration> {
        let mut global = self.global_until.lock();
        match *global {
            Some(until) if until > now => Some(until - now),
            Some(_) => {
                *global = None;
                None
            }
            None => None,
        }
    }

    /// Sleeps until both the route and the global limit allow a call, then
    /// counts it against the route.
    pub async fn wait_ready(&mut self) {
        loop {
            let now = Instant::now();
            let wait = self.global_wait(now).max(self.bucket.ready_in(now));
            match wait {
                Some(delay) => {
                    debug!(route = %self.key, delay_ms = delay.as_millis(), "Waiting for rate limit");
                    sleep(delay).await;
                }
                None => break,
            }
        }
        self.bucket.consume(Instant::now());
    }

    /// Applies the quota headers of a response.
    pub fn update(&mut self, quota: &QuotaMetadata) {
        self.bucket.update(quota, Instant::now());
    }

    /// Applies an explicit throttling rejection. It overrides whatever the
    /// headers said.
    pub fn throttled(&mut self, retry_after: Duration, global: bool) {
        let now = Instant::now();
        warn!(
            route = %self.key,
            retry_after_ms = retry_after.as_millis(),
            global,
            "Rate limited"
        );
        if global {
            let until = now + retry_after;
            let mut current = self.global_until.lock();
            if current.is_none_or(|existing| existing < until) {
                *current = Some(until);
            }
        } else {
            self.bucket.throttle(retry_after, now);
        }
    }

    #[must_use]
    pub fn remaining(&self) -> Option<u32> {
        self.bucket.remaining()
    }
}
