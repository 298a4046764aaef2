//! Fixed-window request limiting
//!
//! Counters live in one in-process map keyed by `endpoint-class:identity`.
//! Expired windows are reopened on the next request for that key. Other
//! expired entries are only removed by an occasional full sweep, which runs
//! after the admission decision and cannot change it. The store is not shared
//! across processes.
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, PoisonError};
use tracing::debug;

use crate::config::DEFAULT_EVICTION_PROBABILITY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    pub fn login() -> Self {
        Self::new(5, Duration::minutes(15))
    }

    pub fn register() -> Self {
        Self::new(3, Duration::hours(1))
    }

    pub fn offer_create() -> Self {
        Self::new(10, Duration::minutes(1))
    }

    pub fn api() -> Self {
        Self::new(100, Duration::minutes(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResult {
    pub success: bool,
    pub remaining: u32,
    pub reset_time: DateTime<Utc>,
    /// Whole seconds until the window resets, only set on denial.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    reset_time: DateTime<Utc>,
}

pub struct RateLimiter {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
    eviction_probability: f64,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_EVICTION_PROBABILITY)
    }
}

impl RateLimiter {
    /// Probabilities outside `[0, 1]`, NaN included, fall back to the default.
    pub fn new(eviction_probability: f64) -> Self {
        let eviction_probability = if (0.0..=1.0).contains(&eviction_probability) {
            eviction_probability
        } else {
            DEFAULT_EVICTION_PROBABILITY
        };
        Self {
            entries: Mutex::new(HashMap::new()),
            eviction_probability,
        }
    }

    pub fn check(&self, identifier: &str, config: &RateLimitConfig) -> RateLimitResult {
        self.check_at(identifier, config, Utc::now())
    }

    pub fn check_at(
        &self,
        identifier: &str,
        config: &RateLimitConfig,
        now: DateTime<Utc>,
    ) -> RateLimitResult {
        // a poisoned map still holds valid counters
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let result = match entries.get_mut(identifier) {
            Some(entry) if now < entry.reset_time => {
                if entry.count >= config.max_requests {
                    let wait_ms = (entry.reset_time - now).num_milliseconds().max(0) as u64;
                    debug!(identifier, count = entry.count, "rate limit exceeded");
                    RateLimitResult {
                        success: false,
                        remaining: 0,
                        reset_time: entry.reset_time,
                        retry_after: Some(wait_ms.div_ceil(1000)),
                    }
                } else {
                    entry.count += 1;
                    RateLimitResult {
                        success: true,
                        remaining: config.max_requests - entry.count,
                        reset_time: entry.reset_time,
                        retry_after: None,
                    }
                }
            }
            _ => {
                let entry = RateLimitEntry {
                    count: 1,
                    reset_time: now + config.window,
                };
                entries.insert(identifier.to_owned(), entry);
                RateLimitResult {
                    success: true,
                    remaining: config.max_requests.saturating_sub(1),
                    reset_time: entry.reset_time,
                    retry_after: None,
                }
            }
        };

        if rand::thread_rng().gen_bool(self.eviction_probability) {
            sweep(&mut entries, now);
        }

        result
    }

    /// Removes every entry whose window has ended.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        sweep(&mut entries, now)
    }

    pub fn tracked_keys(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn sweep(entries: &mut HashMap<String, RateLimitEntry>, now: DateTime<Utc>) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| entry.reset_time > now);
    let evicted = before - entries.len();
    if evicted > 0 {
        debug!(evicted, "evicted expired rate limit windows");
    }
    evicted
}

static GLOBAL_LIMITER: LazyLock<RateLimiter> = LazyLock::new(RateLimiter::default);

/// Checks against the process-wide limiter.
pub fn check_rate_limit(identifier: &str, config: &RateLimitConfig) -> RateLimitResult {
    GLOBAL_LIMITER.check(identifier, config)
}

pub fn rate_limit_key(endpoint_class: &str, identity: &str) -> String {
    format!("{endpoint_class}:{identity}")
}
