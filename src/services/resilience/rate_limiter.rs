//! Named fixed-window rate limiter.
//!
//! # Design Decisions
//! - Keyed by limiter name, not by caller: every request to a protected route shares one budget
//! - Window bookkeeping happens in a single mutex critical section (no lost updates)
//! - No waiting for permits; a rejected call is surfaced as 429 by the caller

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    started_at: Instant,
    admitted: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    limit_for_period: u32,
    refresh_period: Duration,
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            limit_for_period: config.limit_for_period,
            refresh_period: config.refresh_period,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn admit(&self, name: &str) -> bool {
        self.admit_at(name, Instant::now())
    }

    pub fn admit_at(&self, name: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let window = windows.entry(name.to_string()).or_insert(RateWindow {
            started_at: now,
            admitted: 0,
        });

        if now.saturating_duration_since(window.started_at) >= self.refresh_period {
            window.started_at = now;
            window.admitted = 0;
        }

        if window.admitted < self.limit_for_period {
            window.admitted += 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn limiter(limit: u32, period_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            limit_for_period: limit,
            refresh_period: Duration::from_millis(period_ms),
        })
    }

    #[test]
    fn rejects_once_window_is_exhausted() {
        let limiter = limiter(3, 1000);
        let now = Instant::now();

        assert!(limiter.admit_at("api", now));
        assert!(limiter.admit_at("api", now));
        assert!(limiter.admit_at("api", now));
        assert!(!limiter.admit_at("api", now));
    }

    #[test]
    fn window_resets_after_refresh_period() {
        let limiter = limiter(1, 1000);
        let now = Instant::now();

        assert!(limiter.admit_at("api", now));
        assert!(!limiter.admit_at("api", now + Duration::from_millis(999)));
        assert!(limiter.admit_at("api", now + Duration::from_millis(1000)));
    }

    #[test]
    fn names_have_independent_budgets() {
        let limiter = limiter(1, 1000);
        let now = Instant::now();

        assert!(limiter.admit_at("api", now));
        assert!(limiter.admit_at("reports", now));
        assert!(!limiter.admit_at("api", now));
    }

    #[test]
    fn concurrent_admissions_never_exceed_limit() {
        let limiter = Arc::new(limiter(50, 60_000));
        let admitted = Arc::new(AtomicU32::new(0));

        std::thread::scope(|s| {
            for _ in 0..8 {
                let limiter = Arc::clone(&limiter);
                let admitted = Arc::clone(&admitted);
                s.spawn(move || {
                    for _ in 0..100 {
                        if limiter.admit("api") {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::SeqCst), 50);
    }
}
