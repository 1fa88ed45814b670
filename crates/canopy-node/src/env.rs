//! Production environment.

use std::time::Duration;

use canopy_core::env::Environment;
use rand::{RngCore, rngs::OsRng};

/// Real Tokio timers and OS entropy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        OsRng.fill_bytes(buffer);
    }
}
