//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples room logic from the system RNG. Dice
//! rolls and coin flips are cosmetic, but routing them through this seam
//! means tests can pin a seed and assert on exact responses, while the
//! production runtime plugs in OS entropy without any change to room code.
//!
//! # Invariants
//!
//! - Uniformity: `random_bytes()` output is statistically uniform
//! - Determinism: seeded implementations produce the same sequence for the
//!   same seed
//! - Isolation: implementations must not share global state

/// Abstract source of randomness.
///
/// Room code holds environments as `Arc<dyn Environment>` so rooms created
/// at different times share one source; implementations therefore take
/// `&self` and must be internally synchronized.
pub trait Environment: Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Determinism in tests: given the same seed, this produces the same
    ///   sequence of bytes
    /// - Uniformity in production: draws from the OS entropy pool
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// Convenience for dice-style draws where the caller reduces the value
    /// to a small range.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
