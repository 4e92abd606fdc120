//! Client-side rate limiting for login attempts.
//!
//! Flow Overview:
//! 1) A call while blocked is refused with the remaining wait and is not counted.
//! 2) An expired block clears both the block and the attempt log (lazy expiry,
//!    no background timers).
//! 3) Each counted attempt is kept in a sliding log and forgiven individually
//!    once `window` has elapsed since it was made.
//! 4) Reaching `max_attempts` inside the window starts a block of `block_duration`.
//!
//! State is in memory only; a reload starts from zero. This is defense in depth
//! on top of the backend's own limits, never the only protection.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    max_attempts: u32,
    window: Duration,
    block_duration: Duration,
}

impl RateLimitConfig {
    /// Default login limits: 5 attempts per 15 minutes, then a 15 minute block.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::from_secs(15 * 60),
            block_duration: Duration::from_secs(15 * 60),
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    #[must_use]
    pub fn with_block_duration(mut self, block_duration: Duration) -> Self {
        self.block_duration = block_duration;
        self
    }

    #[must_use]
    pub fn normalize(self) -> Self {
        let window = if self.window.is_zero() {
            Duration::from_secs(1)
        } else {
            self.window
        };
        let block_duration = if self.block_duration.is_zero() {
            Duration::from_secs(1)
        } else {
            self.block_duration
        };
        Self {
            max_attempts: self.max_attempts.max(1),
            window,
            block_duration,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    #[must_use]
    pub fn block_duration(&self) -> Duration {
        self.block_duration
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of [`LoginRateLimiter::check_limit`]. Being limited is not an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Seconds until the block ends, rounded up. Zero when allowed.
    pub remaining_time: u64,
    /// Human readable wait message. Empty when allowed.
    pub message: String,
}

impl RateLimitResult {
    fn allowed() -> Self {
        Self {
            allowed: true,
            remaining_time: 0,
            message: String::new(),
        }
    }

    fn blocked(remaining: Duration) -> Self {
        let remaining_time = ceil_secs(remaining);
        Self {
            allowed: false,
            remaining_time,
            message: wait_message(remaining_time),
        }
    }
}

/// Snapshot of the limiter with expired entries already treated as gone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitState {
    pub attempts: u32,
    pub blocked_until: Option<Instant>,
}

#[derive(Debug, Default)]
struct Inner {
    attempts: VecDeque<Instant>,
    blocked_until: Option<Instant>,
}

impl Inner {
    fn forgive_expired(&mut self, now: Instant, window: Duration) {
        while self
            .attempts
            .front()
            .is_some_and(|made_at| *made_at + window <= now)
        {
            self.attempts.pop_front();
        }
    }
}

#[derive(Debug)]
pub struct LoginRateLimiter {
    config: RateLimitConfig,
    inner: Mutex<Inner>,
}

impl LoginRateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config: config.normalize(),
            inner: Mutex::new(Inner::default()),
        }
    }

    #[must_use]
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Checks the limit and, unless currently blocked, records one attempt.
    pub fn check_limit(&self) -> RateLimitResult {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(until) = inner.blocked_until {
            if until > now {
                return RateLimitResult::blocked(until - now);
            }
            debug!("rate limit block expired");
            inner.blocked_until = None;
            inner.attempts.clear();
        }

        inner.forgive_expired(now, self.config.window);
        inner.attempts.push_back(now);

        if inner.attempts.len() >= self.config.max_attempts as usize {
            inner.blocked_until = Some(now + self.config.block_duration);
            warn!(
                attempts = inner.attempts.len(),
                block_seconds = self.config.block_duration.as_secs(),
                "too many attempts, blocking"
            );
            return RateLimitResult::blocked(self.config.block_duration);
        }

        RateLimitResult::allowed()
    }

    /// Clears attempts and any block, typically after a successful login.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.attempts.clear();
        inner.blocked_until = None;
    }

    #[must_use]
    pub fn state(&self) -> RateLimitState {
        let now = Instant::now();
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        let blocked_until = inner.blocked_until.filter(|until| *until > now);
        if inner.blocked_until.is_some() && blocked_until.is_none() {
            // The next check clears everything.
            return RateLimitState {
                attempts: 0,
                blocked_until: None,
            };
        }

        let live = inner
            .attempts
            .iter()
            .filter(|made_at| **made_at + self.config.window > now)
            .count();
        RateLimitState {
            attempts: u32::try_from(live).unwrap_or(u32::MAX),
            blocked_until,
        }
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

/// Tracked keys above which idle limiters are dropped before adding a new one.
pub const DEFAULT_PRUNE_THRESHOLD: usize = 1024;

/// Independent limiters keyed by an opaque caller identifier (e.g. the login e-mail).
///
/// Keys with no live attempts and no block are pruned once more than
/// `prune_threshold` keys are tracked, so the map only grows with keys that
/// are still limited.
#[derive(Debug)]
pub struct RateLimiterRegistry {
    config: RateLimitConfig,
    prune_threshold: usize,
    limiters: Mutex<HashMap<String, Arc<LoginRateLimiter>>>,
}

impl RateLimiterRegistry {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            prune_threshold: DEFAULT_PRUNE_THRESHOLD,
            limiters: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_prune_threshold(mut self, prune_threshold: usize) -> Self {
        self.prune_threshold = prune_threshold;
        self
    }

    #[must_use]
    pub fn limiter(&self, key: &str) -> Arc<LoginRateLimiter> {
        let mut limiters = self.limiters.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(limiter) = limiters.get(key) {
            return Arc::clone(limiter);
        }

        if limiters.len() >= self.prune_threshold {
            let before = limiters.len();
            retain_limited(&mut limiters);
            debug!(
                dropped = before - limiters.len(),
                tracked = limiters.len(),
                "pruned idle rate limiters"
            );
        }

        let limiter = Arc::new(LoginRateLimiter::new(self.config));
        limiters.insert(key.to_string(), Arc::clone(&limiter));
        limiter
    }

    pub fn check_limit(&self, key: &str) -> RateLimitResult {
        self.limiter(key).check_limit()
    }

    pub fn reset(&self, key: &str) {
        let limiter = self
            .limiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        if let Some(limiter) = limiter {
            limiter.reset();
        }
    }

    /// Drops limiters that hold no attempts and no block.
    pub fn prune(&self) {
        retain_limited(&mut self.limiters.lock().unwrap_or_else(PoisonError::into_inner));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.limiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

fn retain_limited(limiters: &mut HashMap<String, Arc<LoginRateLimiter>>) {
    limiters.retain(|_, limiter| {
        let state = limiter.state();
        state.attempts > 0 || state.blocked_until.is_some()
    });
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

fn wait_message(remaining_secs: u64) -> String {
    if remaining_secs >= 60 {
        let minutes = remaining_secs.div_ceil(60);
        let unit = if minutes == 1 { "minute" } else { "minutes" };
        format!("Too many attempts. Please try again in {minutes} {unit}.")
    } else {
        let unit = if remaining_secs == 1 {
            "second"
        } else {
            "seconds"
        };
        format!("Too many attempts. Please try again in {remaining_secs} {unit}.")
    }
}
