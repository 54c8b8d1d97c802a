//! Per-session sliding window rate limiter (spec §4.4).

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct SessionWindow {
    timestamps: VecDeque<Instant>,
    last_seen: Instant,
}

/// Admits or rejects a request based on how many requests a session made
/// inside the trailing `window`. `None` session ids (heartbeats) are always
/// admitted and never tracked.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    max_idle: Duration,
    sessions: Mutex<HashMap<String, SessionWindow>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration, max_idle: Duration) -> Self {
        Self {
            max_requests,
            window,
            max_idle,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if the request is admitted, recording it on success.
    pub fn check(&self, session_id: Option<&str>) -> bool {
        let Some(session_id) = session_id else {
            return true;
        };

        let now = Instant::now();
        let mut sessions = self.sessions.lock();
        let entry = sessions.entry(session_id.to_string()).or_insert_with(|| SessionWindow {
            timestamps: VecDeque::new(),
            last_seen: now,
        });

        while let Some(&front) = entry.timestamps.front() {
            if now.duration_since(front) > self.window {
                entry.timestamps.pop_front();
            } else {
                break;
            }
        }

        entry.last_seen = now;
        if entry.timestamps.len() as u32 >= self.max_requests {
            return false;
        }

        entry.timestamps.push_back(now);
        true
    }

    /// Drops sessions that have seen no activity inside `max_idle`. Intended
    /// to be called periodically from the OBSERVE phase (spec §4.1 step 9).
    pub fn cleanup(&self) {
        let now = Instant::now();
        let max_idle = self.max_idle;
        self.sessions.lock().retain(|_, w| now.duration_since(w.last_seen) <= max_idle);
    }

    pub fn tracked_session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_limit_then_rejects() {
        let limiter = RateLimiter::new(3, Duration::from_secs(10), Duration::from_secs(300));
        assert!(limiter.check(Some("s1")));
        assert!(limiter.check(Some("s1")));
        assert!(limiter.check(Some("s1")));
        assert!(!limiter.check(Some("s1")));
    }

    #[test]
    fn heartbeat_sessions_always_admitted() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10), Duration::from_secs(300));
        assert!(limiter.check(None));
        assert!(limiter.check(None));
        assert!(limiter.check(None));
    }

    #[test]
    fn different_sessions_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10), Duration::from_secs(300));
        assert!(limiter.check(Some("a")));
        assert!(limiter.check(Some("b")));
        assert!(!limiter.check(Some("a")));
    }

    #[test]
    fn cleanup_drops_idle_sessions() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10), Duration::from_millis(1));
        limiter.check(Some("s1"));
        std::thread::sleep(Duration::from_millis(5));
        limiter.cleanup();
        assert_eq!(limiter.tracked_session_count(), 0);
    }
}
