use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Returned by the non-blocking [`RateLimiter::try_acquire`] when the current
/// window is full.
///
/// # Examples
///
/// ```rust
/// use ps_harness::rate_limiter::{RateLimiter, RateLimitConfig, RateLimitError};
///
/// let limiter = RateLimiter::new(RateLimitConfig::per_minute(1));
/// let _first = limiter.try_acquire().unwrap();
///
/// match limiter.try_acquire() {
///     Err(RateLimitError::Exceeded { retry_after }) => {
///         assert!(retry_after.as_secs() <= 60);
///     }
///     Ok(_) => unreachable!("window holds a single permit"),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("rate limit exceeded – retry after {retry_after:?}")]
    Exceeded { retry_after: Duration },
}

/// Implemented by error types that can carry a remote "too many requests"
/// signal, so [`RateLimiter::run`] knows which failures to retry.
pub trait RateLimitSignal {
    fn is_rate_limited(&self) -> bool;
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Permits handed out per window.
    pub max_requests: u32,
    /// Window length. The counter resets once this much time has passed since
    /// the last reset.
    pub window: Duration,
    /// Cap on operation-level retries after a remote throttle signal. `None`
    /// retries until the operation stops being throttled.
    pub max_throttle_retries: Option<u32>,
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            max_throttle_retries: None,
        }
    }

    /// Allow `count` requests per minute.
    pub fn per_minute(count: u32) -> Self {
        Self::new(count, Duration::from_secs(60))
    }

    pub fn with_max_throttle_retries(mut self, retries: u32) -> Self {
        self.max_throttle_retries = Some(retries);
        self
    }
}

impl Default for RateLimitConfig {
    /// Five requests per sixty seconds.
    fn default() -> Self {
        Self::per_minute(5)
    }
}

// ---------------------------------------------------------------------------
// Permit
// ---------------------------------------------------------------------------

/// Proof that one slot of the current window was consumed.
#[derive(Debug)]
#[must_use = "a permit is consumed by acquiring it; drop it only after the guarded call"]
pub struct Permit {
    pub window_count: u32,
}

// ---------------------------------------------------------------------------
// RateLimiter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct WindowState {
    window_start: Duration,
    count: u32,
}

/// Fixed-capacity limiter over a rolling window.
///
/// Shared by reference (usually `Arc<RateLimiter>`) between every caller whose
/// requests count against the same remote quota; acquisition is safe from
/// concurrent tasks.
pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<WindowState>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("state", &*self.lock())
            .finish()
    }
}

impl RateLimiter {
    /// Limiter on the real (tokio) clock.
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        let window_start = clock.now();
        Self {
            config,
            clock,
            state: Mutex::new(WindowState {
                window_start,
                count: 0,
            }),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take a permit if the window has room, otherwise report how long until
    /// the window resets.
    pub fn try_acquire(&self) -> Result<Permit, RateLimitError> {
        let now = self.clock.now();
        let mut state = self.lock();

        let elapsed = now.saturating_sub(state.window_start);
        if elapsed >= self.config.window {
            state.window_start = now;
            state.count = 0;
        }

        if state.count < self.config.max_requests {
            state.count += 1;
            Ok(Permit {
                window_count: state.count,
            })
        } else {
            let elapsed = now.saturating_sub(state.window_start);
            Err(RateLimitError::Exceeded {
                retry_after: self.config.window.saturating_sub(elapsed),
            })
        }
    }

    /// Wait until a permit is available.
    ///
    /// Capacity is re-checked after every wait, since another caller may have
    /// taken the freed slot first.
    pub async fn acquire(&self) -> Permit {
        loop {
            match self.try_acquire() {
                Ok(permit) => {
                    debug!(window_count = permit.window_count, "rate limit permit acquired");
                    return permit;
                }
                Err(RateLimitError::Exceeded { retry_after }) => {
                    info!(
                        wait_ms = retry_after.as_millis() as u64,
                        "rate limit reached, waiting before next request"
                    );
                    self.clock.sleep(retry_after).await;
                }
            }
        }
    }

    /// Run `op` under the limiter.
    ///
    /// Each attempt takes a permit first. If the operation itself reports a
    /// remote throttle, the limiter sleeps a full window and tries again; any
    /// other error is returned immediately.
    pub async fn run<F, Fut, T, E>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RateLimitSignal,
    {
        let mut throttled = 0u32;
        loop {
            let _permit = self.acquire().await;
            match op().await {
                Err(err) if err.is_rate_limited() => {
                    throttled += 1;
                    if matches!(self.config.max_throttle_retries, Some(max) if throttled > max) {
                        warn!(attempts = throttled, "remote rate limit persisted, giving up");
                        return Err(err);
                    }
                    warn!(
                        wait_ms = self.config.window.as_millis() as u64,
                        attempt = throttled,
                        "remote rate limit exceeded, waiting before retrying"
                    );
                    self.clock.sleep(self.config.window).await;
                }
                other => return other,
            }
        }
    }

    /// Permits left in the current window.
    pub fn remaining(&self) -> u32 {
        let now = self.clock.now();
        let state = self.lock();
        if now.saturating_sub(state.window_start) >= self.config.window {
            self.config.max_requests
        } else {
            self.config.max_requests.saturating_sub(state.count)
        }
    }
}
