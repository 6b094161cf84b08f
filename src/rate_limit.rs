//! Fixed-window request counter, keyed by client identifier.
//!
//! State is process-local: it is lost on restart and not shared between
//! instances. Good enough for a marketing form, not a security control.

use std::time::Duration;
use std::time::Instant;

use dashmap::DashMap;

use crate::configuration::RateLimitSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Admitted,
    /// `retry_after` is the time left until the current window resets
    Limited { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    resets_at: Instant,
}

pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(
        max_requests: u32,
        window: Duration,
    ) -> Self {
        Self {
            max_requests,
            window,
            windows: DashMap::new(),
        }
    }

    pub fn from_settings(cfg: &RateLimitSettings) -> Self { Self::new(cfg.max_requests.get(), cfg.window()) }

    pub fn check(
        &self,
        client: &str,
    ) -> RateLimitDecision {
        self.check_at(client, Instant::now())
    }

    /// Count one request from `client` at `now`.
    ///
    /// The first request (or the first after the window expired) opens a new
    /// window of `self.window`; within a window, at most `max_requests` are
    /// admitted.
    pub fn check_at(
        &self,
        client: &str,
        now: Instant,
    ) -> RateLimitDecision {
        // the entry guard holds the shard lock, so read-check-increment is a single step
        let mut window = self.windows.entry(client.to_string()).or_insert(Window {
            count: 0,
            resets_at: now,
        });

        if window.count == 0 || now > window.resets_at {
            *window = Window {
                count: 1,
                resets_at: now + self.window,
            };
            return RateLimitDecision::Admitted;
        }

        if window.count >= self.max_requests {
            return RateLimitDecision::Limited {
                retry_after: window.resets_at.saturating_duration_since(now),
            };
        }

        window.count += 1;
        RateLimitDecision::Admitted
    }

    /// Drop every window that has already expired; returns how many were
    /// dropped.
    pub fn sweep_at(
        &self,
        now: Instant,
    ) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| now <= w.resets_at);
        before.saturating_sub(self.windows.len())
    }

    /// Number of clients currently tracked
    pub fn tracked(&self) -> usize { self.windows.len() }
}

/// Periodically sweep expired windows, so that memory is bounded by recent
/// traffic. To be run as a separate worker, next to the API.
pub async fn init_sweep_worker(
    limiter: actix_web::web::Data<RateLimiter>,
    interval: Duration,
) -> Result<(), anyhow::Error> {
    loop {
        tokio::time::sleep(interval).await;
        let dropped = limiter.sweep_at(Instant::now());
        tracing::debug!(
            dropped,
            tracked = limiter.tracked(),
            "swept expired rate limit windows"
        );
    }
}
