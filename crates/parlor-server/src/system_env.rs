//! Production Environment implementation using the system RNG.
//!
//! This module provides `SystemEnv`, the production implementation of the
//! `Environment` trait backed by OS entropy.

use parlor_core::Environment;

/// Production environment drawing from OS entropy via `getrandom`.
///
/// Dice and coin commands only need statistical uniformity, but session
/// ids come from the same source and should not be guessable, so the OS
/// entropy pool is used for both.
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
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).unwrap_or_else(|e| {
            // NOTE: This should never fail on supported platforms, if it
            // does it's a critical error. Fill with zeros as a fallback
            // (not secure, but prevents panic)
            tracing::error!("getrandom failed: {}", e);
            buffer.fill(0);
        });
    }
}
