//! Seeded environment for deterministic testing.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use canopy_core::env::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Simulation environment with Turmoil-aware timers and a seeded RNG.
///
/// `sleep` goes through Tokio's timer, which Turmoil virtualizes inside a
/// simulation. Random bytes come from a ChaCha20 stream, so the same seed
/// always yields the same neighbour choices.
///
/// Clones share the RNG stream.
#[derive(Clone, Debug)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
}

impl SimEnv {
    /// Create a SimEnv with seed 0.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Create a SimEnv with a specific seed.
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))) }
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}
