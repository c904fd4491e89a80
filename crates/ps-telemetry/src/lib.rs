//! Logging initialisation for prsynth binaries.
//!
//! Human-readable or JSON output via `tracing-subscriber`, filtered by
//! `RUST_LOG` with a configured fallback level.

pub mod logging;
