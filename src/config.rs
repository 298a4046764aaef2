//! Runtime configuration read from the environment
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::payment::{MockTimings, PaymentProvider, create_payment_provider};
use crate::rate_limit::RateLimiter;

pub const DEFAULT_PAYMENT_PROVIDER: &str = "mock";
pub const DEFAULT_EVICTION_PROBABILITY: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Provider name handed to [`crate::payment::create_payment_provider`].
    pub payment_provider: String,
    pub mock_payment: MockTimings,
    /// Chance that a rate-limit check also sweeps expired entries.
    pub rate_limit_eviction_probability: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            payment_provider: DEFAULT_PAYMENT_PROVIDER.to_owned(),
            mock_payment: MockTimings::default(),
            rate_limit_eviction_probability: DEFAULT_EVICTION_PROBABILITY,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup, falling back to defaults for
    /// missing or unparseable values.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let millis = |key: &str, fallback: Duration| {
            parsed::<u64>(&lookup, key)
                .map(Duration::from_millis)
                .unwrap_or(fallback)
        };

        Self {
            payment_provider: lookup("PAYMENT_PROVIDER")
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(defaults.payment_provider),
            mock_payment: MockTimings {
                to_pending: millis(
                    "MOCK_PAYMENT_PENDING_DELAY_MS",
                    defaults.mock_payment.to_pending,
                ),
                to_processing: millis(
                    "MOCK_PAYMENT_PROCESSING_DELAY_MS",
                    defaults.mock_payment.to_processing,
                ),
                to_settled: millis(
                    "MOCK_PAYMENT_SETTLE_DELAY_MS",
                    defaults.mock_payment.to_settled,
                ),
                failure_rate: parsed::<f64>(&lookup, "MOCK_PAYMENT_FAILURE_RATE")
                    .filter(|rate| (0.0..=1.0).contains(rate))
                    .unwrap_or(defaults.mock_payment.failure_rate),
            },
            rate_limit_eviction_probability: parsed::<f64>(
                &lookup,
                "RATE_LIMIT_EVICTION_PROBABILITY",
            )
            .filter(|p| (0.0..=1.0).contains(p))
            .unwrap_or(defaults.rate_limit_eviction_probability),
        }
    }

    pub fn build_payment_provider(&self) -> Arc<dyn PaymentProvider> {
        create_payment_provider(&self.payment_provider, self.mock_payment.clone())
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.rate_limit_eviction_probability)
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}
