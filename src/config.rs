use std::env::var;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;

use crate::application::services::{
    activity_log::DEFAULT_ACTIVITY_LOG_CAPACITY, backoff::RetryPolicy,
    circuit_breaker::BreakerConfig, rate_limiter::RateLimitConfig,
};

/// Tunables of a [`crate::DispatchEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Retry rounds per attempt. Clamped to at least one.
    pub max_attempts: u32,
    pub retry: RetryPolicy,
    pub breaker: BreakerConfig,
    pub rate_limit: RateLimitConfig,
    pub dedup_window: Duration,
    pub activity_log_capacity: usize,
    /// Per-invocation backend deadline. `None` waits indefinitely.
    pub backend_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry: RetryPolicy::default(),
            breaker: BreakerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            dedup_window: Duration::from_secs(5 * 60),
            activity_log_capacity: DEFAULT_ACTIVITY_LOG_CAPACITY,
            backend_timeout: None,
        }
    }
}

/// Process configuration read from the environment (and `.env`).
pub struct Config {
    pub engine: EngineConfig,
    pub log_filter: String,
}

impl Config {
    pub fn try_parse() -> Result<Config, &'static str> {
        let _ = dotenv();
        Self::from_lookup(|key| var(key).ok())
    }

    /// Unset keys keep their defaults; malformed values are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, &'static str>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = EngineConfig::default();
        let millis = |key: &str, err: &'static str, default: Duration| {
            parse(&lookup, key, err).map(|v: Option<u64>| v.map_or(default, Duration::from_millis))
        };

        let engine = EngineConfig {
            max_attempts: parse(
                &lookup,
                "DISPATCH_MAX_ATTEMPTS",
                "An error occured while parsing DISPATCH_MAX_ATTEMPTS env param",
            )?
            .unwrap_or(defaults.max_attempts),
            retry: RetryPolicy {
                initial_delay: millis(
                    "DISPATCH_RETRY_INITIAL_MS",
                    "An error occured while parsing DISPATCH_RETRY_INITIAL_MS env param",
                    defaults.retry.initial_delay,
                )?,
                multiplier: parse(
                    &lookup,
                    "DISPATCH_RETRY_MULTIPLIER",
                    "An error occured while parsing DISPATCH_RETRY_MULTIPLIER env param",
                )?
                .unwrap_or(defaults.retry.multiplier),
                max_delay: millis(
                    "DISPATCH_RETRY_MAX_MS",
                    "An error occured while parsing DISPATCH_RETRY_MAX_MS env param",
                    defaults.retry.max_delay,
                )?,
            },
            breaker: BreakerConfig {
                failure_threshold: parse(
                    &lookup,
                    "DISPATCH_BREAKER_THRESHOLD",
                    "An error occured while parsing DISPATCH_BREAKER_THRESHOLD env param",
                )?
                .unwrap_or(defaults.breaker.failure_threshold),
                reset_interval: millis(
                    "DISPATCH_BREAKER_RESET_MS",
                    "An error occured while parsing DISPATCH_BREAKER_RESET_MS env param",
                    defaults.breaker.reset_interval,
                )?,
            },
            rate_limit: RateLimitConfig {
                limit: parse(
                    &lookup,
                    "DISPATCH_RATE_LIMIT",
                    "An error occured while parsing DISPATCH_RATE_LIMIT env param",
                )?
                .unwrap_or(defaults.rate_limit.limit),
                window: millis(
                    "DISPATCH_RATE_WINDOW_MS",
                    "An error occured while parsing DISPATCH_RATE_WINDOW_MS env param",
                    defaults.rate_limit.window,
                )?,
            },
            dedup_window: millis(
                "DISPATCH_DEDUP_WINDOW_MS",
                "An error occured while parsing DISPATCH_DEDUP_WINDOW_MS env param",
                defaults.dedup_window,
            )?,
            activity_log_capacity: parse(
                &lookup,
                "DISPATCH_ACTIVITY_LOG_CAPACITY",
                "An error occured while parsing DISPATCH_ACTIVITY_LOG_CAPACITY env param",
            )?
            .unwrap_or(defaults.activity_log_capacity),
            backend_timeout: parse(
                &lookup,
                "DISPATCH_BACKEND_TIMEOUT_MS",
                "An error occured while parsing DISPATCH_BACKEND_TIMEOUT_MS env param",
            )?
            .map(Duration::from_millis),
        };

        Ok(Config {
            engine,
            log_filter: lookup("RUST_LOG").unwrap_or_else(|| "dispatch_engine=info".to_string()),
        })
    }
}

fn parse<F, T>(lookup: &F, key: &str, err: &'static str) -> Result<Option<T>, &'static str>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .map(|raw| raw.trim().parse::<T>().map_err(|_| err))
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, &'static str> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn unset_keys_fall_back_to_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.log_filter, "dispatch_engine=info");
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("DISPATCH_MAX_ATTEMPTS", "5"),
            ("DISPATCH_RETRY_INITIAL_MS", "250"),
            ("DISPATCH_RETRY_MULTIPLIER", "1.5"),
            ("DISPATCH_RATE_LIMIT", "10"),
            ("DISPATCH_BACKEND_TIMEOUT_MS", "2000"),
        ])
        .unwrap();

        assert_eq!(config.engine.max_attempts, 5);
        assert_eq!(config.engine.retry.initial_delay, Duration::from_millis(250));
        assert_eq!(config.engine.retry.multiplier, 1.5);
        assert_eq!(config.engine.rate_limit.limit, 10);
        assert_eq!(config.engine.backend_timeout, Some(Duration::from_millis(2000)));
    }

    #[test]
    fn rejects_malformed_values() {
        let err = config_from(&[("DISPATCH_BREAKER_THRESHOLD", "many")]).err();
        assert_eq!(
            err,
            Some("An error occured while parsing DISPATCH_BREAKER_THRESHOLD env param")
        );
    }
}
