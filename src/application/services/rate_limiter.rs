use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    application::services::clock::{Clock, after},
    domain::models::RateLimitStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Admissions allowed per window.
    pub limit: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct Window {
    admitted: u32,
    resets_at: DateTime<Utc>,
}

/// Fixed-window admission counter.
///
/// The window is re-anchored at "now" by the first read or write after it
/// expires, so a burst straddling a boundary can admit up to twice the limit.
pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    window: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        let resets_at = after(clock.now(), config.window);
        Self {
            config,
            clock,
            window: Mutex::new(Window {
                admitted: 0,
                resets_at,
            }),
        }
    }

    fn roll(&self, window: &mut Window) {
        let now = self.clock.now();
        if now >= window.resets_at {
            window.admitted = 0;
            window.resets_at = after(now, self.config.window);
        }
    }

    /// Consumes one admission if the current window has room.
    pub async fn admit(&self) -> bool {
        let mut window = self.window.lock().await;
        self.roll(&mut window);

        if window.admitted < self.config.limit {
            window.admitted += 1;
            true
        } else {
            false
        }
    }

    pub async fn status(&self) -> RateLimitStatus {
        let mut window = self.window.lock().await;
        self.roll(&mut window);

        RateLimitStatus {
            admitted_count: window.admitted,
            limit: self.config.limit,
            window_reset_at: window.resets_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::clock::ManualClock;

    fn limiter(limit: u32) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let config = RateLimitConfig {
            limit,
            window: Duration::from_secs(60),
        };
        (RateLimiter::new(config, clock.clone()), clock)
    }

    #[tokio::test]
    async fn admits_up_to_limit_per_window() {
        let (limiter, _) = limiter(2);

        assert!(limiter.admit().await);
        assert!(limiter.admit().await);
        assert!(!limiter.admit().await);

        let status = limiter.status().await;
        assert_eq!(status.admitted_count, 2);
        assert_eq!(status.limit, 2);
    }

    #[tokio::test]
    async fn window_resets_lazily_from_now() {
        let (limiter, clock) = limiter(1);
        assert!(limiter.admit().await);
        assert!(!limiter.admit().await);

        clock.advance(Duration::from_secs(75));
        let status = limiter.status().await;
        assert_eq!(status.admitted_count, 0);
        assert_eq!(status.window_reset_at, after(clock.now(), Duration::from_secs(60)));

        assert!(limiter.admit().await);
        assert!(!limiter.admit().await);
    }

    #[tokio::test]
    async fn denial_does_not_move_the_window() {
        let (limiter, clock) = limiter(1);
        assert!(limiter.admit().await);
        let reset_at = limiter.status().await.window_reset_at;

        clock.advance(Duration::from_secs(30));
        assert!(!limiter.admit().await);
        assert_eq!(limiter.status().await.window_reset_at, reset_at);
    }
}
