//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from system resources (randomness, wall-clock
//! time). Production code uses the system environment in the service crate;
//! tests use a seeded RNG and a manually advanced clock, which is what makes
//! the secret-expiry boundary directly testable.

/// Abstract environment providing randomness and wall-clock time.
///
/// Implementations MUST use cryptographically secure entropy for
/// `random_bytes` in production, and `unix_time_secs` must be
/// non-decreasing within a single execution context.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Seconds since the Unix epoch.
    ///
    /// Wall-clock time: secret-expiry windows are measured against it and
    /// persist across process restarts.
    fn unix_time_secs(&self) -> u64;

    /// Generates a fixed-size array of random bytes.
    ///
    /// Convenience for seeds, IVs, and nonces.
    fn random_array<const N: usize>(&self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.random_bytes(&mut bytes);
        bytes
    }
}

#[cfg(feature = "test_utils")]
pub use test_env::TestEnv;

#[cfg(feature = "test_utils")]
mod test_env {
    use std::sync::{Arc, Mutex};

    use super::Environment;

    /// Deterministic environment for tests.
    ///
    /// Random bytes come from a seeded xorshift generator (NOT
    /// cryptographically secure, test use only) and time advances only
    /// when the test says so. Clones share state.
    #[derive(Clone)]
    pub struct TestEnv {
        inner: Arc<Mutex<Inner>>,
    }

    struct Inner {
        rng_state: u64,
        now_secs: u64,
    }

    impl TestEnv {
        /// Create an environment with the given RNG seed, starting at time
        /// zero.
        pub fn new(seed: u64) -> Self {
            // Zero would make xorshift degenerate
            let rng_state = if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed };
            Self { inner: Arc::new(Mutex::new(Inner { rng_state, now_secs: 0 })) }
        }

        /// Advance the clock by `secs`.
        ///
        /// # Panics
        ///
        /// Panics if the internal mutex is poisoned. Acceptable for test
        /// code.
        #[allow(clippy::expect_used)]
        pub fn advance_secs(&self, secs: u64) {
            let mut inner = self.inner.lock().expect("mutex poisoned");
            inner.now_secs += secs;
        }

        /// Set the clock to an absolute time.
        ///
        /// # Panics
        ///
        /// Panics if the internal mutex is poisoned. Acceptable for test
        /// code.
        #[allow(clippy::expect_used)]
        pub fn set_time(&self, secs: u64) {
            let mut inner = self.inner.lock().expect("mutex poisoned");
            inner.now_secs = secs;
        }
    }

    impl Environment for TestEnv {
        #[allow(clippy::expect_used)]
        fn random_bytes(&self, buffer: &mut [u8]) {
            let mut inner = self.inner.lock().expect("mutex poisoned");
            for byte in buffer {
                // xorshift64*
                inner.rng_state ^= inner.rng_state << 13;
                inner.rng_state ^= inner.rng_state >> 7;
                inner.rng_state ^= inner.rng_state << 17;
                *byte = (inner.rng_state.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 56) as u8;
            }
        }

        #[allow(clippy::expect_used)]
        fn unix_time_secs(&self) -> u64 {
            self.inner.lock().expect("mutex poisoned").now_secs
        }
    }

}
