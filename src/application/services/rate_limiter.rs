//! Sliding-window rate limiter for plugin commands

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::infrastructure::config::RateLimitConfig;

/// Per-user sliding window limiter
pub struct RateLimiter {
    requests: Mutex<HashMap<String, Vec<Instant>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window_seconds)
    }

    /// Record a request; false when the user is over the limit
    pub fn check(&self, user_id: &str) -> bool {
        self.check_at(user_id, Instant::now())
    }

    /// Time until the oldest request in the window expires, if throttled
    pub fn retry_after(&self, user_id: &str) -> Option<Duration> {
        let requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
        let times = requests.get(user_id)?;
        if times.len() < self.max_requests as usize {
            return None;
        }
        let now = Instant::now();
        times
            .first()
            .map(|t| self.window.saturating_sub(now.duration_since(*t)))
    }

    fn check_at(&self, user_id: &str, now: Instant) -> bool {
        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);

        // Remove old requests outside the window, and users left with none
        requests.retain(|_, times| {
            times.retain(|&t| now.saturating_duration_since(t) < self.window);
            !times.is_empty()
        });

        let times = requests.entry(user_id.to_string()).or_default();

        if times.len() >= self.max_requests as usize {
            return false;
        }

        times.push(now);
        true
    }

    /// Users with at least one request inside the window
    pub fn tracked_users(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttles_after_limit_within_window() {
        let limiter = RateLimiter::new(2, 60);
        let now = Instant::now();
        assert!(limiter.check_at("u", now));
        assert!(limiter.check_at("u", now));
        assert!(!limiter.check_at("u", now));
        assert!(limiter.check_at("other", now));
        assert!(limiter.retry_after("u").is_some());
    }

    #[test]
    fn window_slides() {
        let limiter = RateLimiter::new(1, 10);
        let start = Instant::now();
        assert!(limiter.check_at("u", start));
        assert!(!limiter.check_at("u", start + Duration::from_secs(5)));
        assert!(limiter.check_at("u", start + Duration::from_secs(11)));
    }

    #[test]
    fn idle_users_are_forgotten() {
        let limiter = RateLimiter::new(3, 10);
        let start = Instant::now();
        assert!(limiter.check_at("a", start));
        assert!(limiter.check_at("b", start));
        assert_eq!(limiter.tracked_users(), 2);

        assert!(limiter.check_at("c", start + Duration::from_secs(11)));
        assert_eq!(limiter.tracked_users(), 1);
    }
}
