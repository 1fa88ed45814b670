//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples protocol logic from system resources
//! (time, randomness). This enables:
//!
//! - Deterministic Simulation: Turmoil provides a virtual clock and the
//!   harness a seeded RNG, so a failing traversal can be replayed exactly.
//!
//! - Production Runtime: the node binary uses the real clock and OS entropy
//!   without any code changes to the protocol logic.
//!
//! # Invariants
//!
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

use std::time::Duration;

/// Abstract environment providing randomness and async sleeping.
///
/// # Implementations
///
/// - Simulation (`canopy-harness::SimEnv`): Virtual time, seeded ChaCha RNG.
/// - Production (`canopy-node::SystemEnv`): Tokio timers, OS entropy.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Sleeps for the specified duration.
    ///
    /// Only driver code calls this (e.g. the root's start delay). The state
    /// machine itself never waits.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a uniformly distributed index in `0..bound`.
    ///
    /// Uses a multiply-shift reduction of a random `u64`; the bias is below
    /// `bound / 2^64`.
    ///
    /// # Panics
    ///
    /// Panics if `bound` is zero.
    fn random_index(&self, bound: usize) -> usize {
        assert!(bound > 0, "random_index requires a non-empty range");
        let wide = u128::from(self.random_u64()) * bound as u128;
        (wide >> 64) as usize
    }
}
