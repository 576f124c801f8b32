// src/services/rate_limit.rs
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Attempts allowed inside one window
    pub max_attempts: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            window: Duration::from_secs(15 * 60),
        }
    }
}

/// Timestamps of recent attempts for one key, oldest first.
#[derive(Debug, Clone, Default)]
struct AttemptLog {
    attempts: VecDeque<Instant>,
}

impl AttemptLog {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.attempts.front() {
            if now.duration_since(*oldest) >= window {
                self.attempts.pop_front();
            } else {
                break;
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed,
    Limited { retry_after: u32 },
}

/// Sliding-window limiter for credential endpoints, keyed by caller.
#[derive(Debug, Clone)]
pub struct RateLimitService {
    config: RateLimitConfig,
    rate_limiter: Arc<RwLock<HashMap<String, AttemptLog>>>,
}

impl RateLimitService {
    pub fn new(config: RateLimitConfig) -> Self {
        info!(
            enabled = config.enabled,
            max_attempts = config.max_attempts,
            window_seconds = config.window.as_secs(),
            "Initializing RateLimitService"
        );
        Self {
            config,
            rate_limiter: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Records an attempt for `identifier` unless the window is already full.
    pub async fn check_rate_limit(&self, identifier: &str) -> RateLimitResult {
        if !self.config.enabled {
            return RateLimitResult::Allowed;
        }

        let now = Instant::now();
        let window = self.config.window;
        let mut limiter = self.rate_limiter.write().await;
        let log = limiter.entry(identifier.to_string()).or_default();
        log.prune(now, window);

        if log.attempts.len() >= self.config.max_attempts as usize {
            let retry_after = log
                .attempts
                .front()
                .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(window);
            // Round up so clients never retry a moment too early
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            return RateLimitResult::Limited {
                retry_after: u32::try_from(secs).unwrap_or(u32::MAX),
            };
        }

        log.attempts.push_back(now);
        debug!(
            identifier = %identifier,
            attempts = log.attempts.len(),
            "Rate limit attempt recorded"
        );
        RateLimitResult::Allowed
    }

    /// Log a rate limit violation
    pub fn log_violation(&self, identifier: &str, ip_address: Option<&str>, endpoint: &str) {
        warn!(
            identifier = %identifier,
            ip_address = ?ip_address,
            endpoint = %endpoint,
            "Rate limit violation detected"
        );
    }

    /// Drops keys whose attempts have all left the window.
    pub async fn cleanup_expired(&self) {
        let now = Instant::now();
        let window = self.config.window;
        let mut limiter = self.rate_limiter.write().await;
        let before = limiter.len();
        limiter.retain(|_, log| {
            log.prune(now, window);
            !log.is_empty()
        });
        debug!(
            removed = before - limiter.len(),
            "Cleaned up expired rate limit entries"
        );
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.rate_limiter.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_service(max_attempts: u32, window: Duration) -> RateLimitService {
        RateLimitService::new(RateLimitConfig {
            enabled: true,
            max_attempts,
            window,
        })
    }

    #[tokio::test]
    async fn test_rate_limit_allows_within_limit() {
        let service = create_test_service(3, Duration::from_secs(60));

        for _ in 0..3 {
            let result = service.check_rate_limit("/api/auth/login:10.0.0.1").await;
            assert_eq!(result, RateLimitResult::Allowed);
        }
    }

    #[tokio::test]
    async fn test_rate_limit_blocks_when_exceeded() {
        let service = create_test_service(3, Duration::from_secs(60));

        for _ in 0..3 {
            service.check_rate_limit("key").await;
        }

        match service.check_rate_limit("key").await {
            RateLimitResult::Limited { retry_after } => {
                assert!(retry_after > 0 && retry_after <= 60);
            }
            other => panic!("expected Limited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_different_keys_have_separate_limits() {
        let service = create_test_service(2, Duration::from_secs(60));

        service.check_rate_limit("ip-1").await;
        service.check_rate_limit("ip-1").await;
        assert!(matches!(
            service.check_rate_limit("ip-1").await,
            RateLimitResult::Limited { .. }
        ));

        assert_eq!(
            service.check_rate_limit("ip-2").await,
            RateLimitResult::Allowed
        );
    }

    #[tokio::test]
    async fn test_disabled_allows_everything() {
        let service = RateLimitService::new(RateLimitConfig {
            enabled: false,
            max_attempts: 1,
            window: Duration::from_secs(60),
        });

        for _ in 0..10 {
            assert_eq!(service.check_rate_limit("key").await, RateLimitResult::Allowed);
        }
    }

    #[tokio::test]
    async fn test_window_slides() {
        let service = create_test_service(1, Duration::from_millis(50));

        assert_eq!(service.check_rate_limit("key").await, RateLimitResult::Allowed);
        assert!(matches!(
            service.check_rate_limit("key").await,
            RateLimitResult::Limited { .. }
        ));

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(service.check_rate_limit("key").await, RateLimitResult::Allowed);
    }

    #[tokio::test]
    async fn test_cleanup_expired_drops_idle_keys() {
        let service = create_test_service(5, Duration::from_millis(20));
        service.check_rate_limit("a").await;
        service.check_rate_limit("b").await;
        assert_eq!(service.tracked_keys().await, 2);

        tokio::time::sleep(Duration::from_millis(40)).await;
        service.cleanup_expired().await;

        assert_eq!(service.tracked_keys().await, 0);
    }
}
