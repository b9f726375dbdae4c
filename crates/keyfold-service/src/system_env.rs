//! Production Environment implementation using system time and RNG.

use keyfold_core::Environment;

/// Production environment using the system clock and cryptographic RNG.
///
/// # Security
///
/// Randomness comes from getrandom, which provides OS-level cryptographic
/// entropy (e.g., /dev/urandom on Linux). Suitable for nonces, ephemeral
/// seal seeds, and the service key pair.
///
/// # Panics
///
/// Panics if the OS RNG fails. This is intentional - a service without
/// functioning cryptographic randomness cannot operate securely, and RNG
/// failure indicates OS-level breakage.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - the service cannot operate securely");
    }

    #[allow(clippy::expect_used)]
    fn unix_time_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)")
            .as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_bytes_are_random() {
        let env = SystemEnv::new();

        let mut bytes1 = [0u8; 32];
        let mut bytes2 = [0u8; 32];
        env.random_bytes(&mut bytes1);
        env.random_bytes(&mut bytes2);

        assert_ne!(bytes1, bytes2);
    }

    #[test]
    fn clock_is_past_2020() {
        let env = SystemEnv::new();
        assert!(env.unix_time_secs() > 1_577_836_800);
    }
}
