use std::time::Instant;

pub mod diagnostics;
pub mod memo;
pub mod prober;
pub mod registry;
pub mod service;
pub mod session_cache;
pub mod shape;

/// Milliseconds since `started`, saturating.
pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
