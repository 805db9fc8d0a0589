//! Rate limiting with per-class token buckets.

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use dashmap::DashMap;

use crate::policy::{RateLimitRule, RouteClass};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { limit: u32, remaining: u32 },
    Limited { limit: u32, retry_after: Duration },
}

/// Rate-limit collaborator consulted by the gate.
pub trait RateLimiter: Send + Sync {
    /// Count one request from `key` against `rule` for `class`.
    fn check(&self, key: &str, class: RouteClass, rule: &RateLimitRule) -> RateLimitDecision;

    /// Drop state that no longer affects any decision. Returns how many
    /// entries were removed.
    fn sweep(&self) -> usize {
        0
    }
}

/// Allows everything.
#[derive(Clone, Debug, Default)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _key: &str, _class: RouteClass, rule: &RateLimitRule) -> RateLimitDecision {
        RateLimitDecision::Allowed {
            limit: rule.max_requests,
            remaining: rule.max_requests,
        }
    }
}

/// A simple token bucket.
///
/// Capacity is the rule's request ceiling; it refills continuously at
/// `max_requests / window`, so a client that used its full allowance is
/// whole again exactly one window later.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
    capacity: f64,
    refill_rate: f64,
    window: Duration,
}

impl TokenBucket {
    fn new(rule: &RateLimitRule, now: Instant) -> Self {
        let capacity = f64::from(rule.max_requests);
        let window = rule.window.as_secs_f64().max(f64::EPSILON);
        Self {
            tokens: capacity,
            last_update: now,
            capacity,
            refill_rate: capacity / window,
            window: rule.window,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_update = now;
    }

    fn try_acquire(&mut self, now: Instant) -> Result<u32, Duration> {
        self.refill(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(self.tokens.floor() as u32)
        } else if self.refill_rate > 0.0 {
            let missing = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_rate))
        } else {
            // Zero-capacity rule: never refills.
            Err(self.window)
        }
    }

    fn is_full_at(&self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens + elapsed * self.refill_rate >= self.capacity
    }
}

/// Token-bucket limiter keyed by (class, client).
#[derive(Debug, Default)]
pub struct TokenBucketLimiter {
    buckets: DashMap<(RouteClass, String), TokenBucket>,
}

impl TokenBucketLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn check_at(
        &self,
        key: &str,
        class: RouteClass,
        rule: &RateLimitRule,
        now: Instant,
    ) -> RateLimitDecision {
        let mut bucket = self
            .buckets
            .entry((class, key.to_string()))
            .or_insert_with(|| TokenBucket::new(rule, now));

        match bucket.try_acquire(now) {
            Ok(remaining) => RateLimitDecision::Allowed {
                limit: rule.max_requests,
                remaining,
            },
            Err(retry_after) => RateLimitDecision::Limited {
                limit: rule.max_requests,
                retry_after,
            },
        }
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        // A full bucket is indistinguishable from a fresh one.
        self.buckets.retain(|_, bucket| !bucket.is_full_at(now));
        before.saturating_sub(self.buckets.len())
    }
}

impl RateLimiter for TokenBucketLimiter {
    fn check(&self, key: &str, class: RouteClass, rule: &RateLimitRule) -> RateLimitDecision {
        self.check_at(key, class, rule, Instant::now())
    }

    fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }
}

/// Identify the client for rate limiting.
///
/// Forwarded headers are honoured only when `trust_forwarded` is set, since
/// any client can send them.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .and_then(|v| v.parse::<IpAddr>().ok());
        let real = || {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<IpAddr>().ok())
        };
        if let Some(ip) = forwarded.or_else(real) {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
