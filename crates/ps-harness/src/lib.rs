//! Reliability infrastructure for outbound calls.
//!
//! - An injectable [`clock::Clock`] so waits can be driven by virtual time
//! - A sliding-window [`rate_limiter::RateLimiter`] that blocks callers instead
//!   of failing them and retries operations the remote side throttled

pub mod clock;
pub mod rate_limiter;
