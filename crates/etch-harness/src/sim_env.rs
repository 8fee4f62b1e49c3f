//! Simulated environment.
//!
//! Time only moves when the harness advances it. Forks share one clock so all
//! peers of a world agree on "now", while each gets its own RNG stream.

use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use etch_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Wall-clock origin of every simulation, in unix milliseconds.
pub const SIM_EPOCH_MS: u64 = 1_700_000_000_000;

/// Deterministic environment with a virtual clock.
#[derive(Debug, Clone)]
pub struct SimEnv {
    origin: Instant,
    elapsed: Arc<Mutex<Duration>>,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimEnv {
    /// Create an environment whose randomness is fully determined by `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Derive an environment that shares this clock but has its own RNG
    /// stream, seeded from this one.
    pub fn fork(&self) -> Self {
        let seed = self.lock_rng().next_u64();
        Self {
            origin: self.origin,
            elapsed: Arc::clone(&self.elapsed),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Move the shared clock forward.
    pub fn advance(&self, duration: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(PoisonError::into_inner);
        *elapsed = elapsed.saturating_add(duration);
    }

    /// Move the shared clock to `instant` if it lies in the future.
    pub fn advance_to(&self, instant: Instant) {
        let target = instant.saturating_duration_since(self.origin);
        let mut elapsed = self.elapsed.lock().unwrap_or_else(PoisonError::into_inner);
        if target > *elapsed {
            *elapsed = target;
        }
    }

    /// Virtual time since the simulation started.
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_rng(&self) -> std::sync::MutexGuard<'_, ChaCha8Rng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn unix_millis(&self) -> u64 {
        SIM_EPOCH_MS + self.elapsed().as_millis() as u64
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.advance(duration);
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.lock_rng().fill_bytes(buffer);
    }
}
