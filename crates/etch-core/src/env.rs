//! Environment abstraction for time and randomness.
//!
//! Production uses the system clock and OS randomness; the simulation harness
//! substitutes a virtual clock and a seeded RNG so every run is reproducible.

use std::{
    future::Future,
    time::{Duration, Instant},
};

/// Source of time and randomness for the sync engine.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic time used for timers.
    fn now(&self) -> Instant;

    /// Wall-clock time in unix milliseconds, used for message timestamps.
    fn unix_millis(&self) -> u64;

    /// Wait for `duration`.
    ///
    /// The controller never calls this; drivers use it to wait for the next
    /// deadline.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Random `u64` built from [`Environment::random_bytes`].
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    }
}
