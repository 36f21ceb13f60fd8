//! Seedable noise source for combustion and sensor fluctuation.
//!
//! Each physical component owns its own [`Noise`]. Components built from the
//! same seed produce the same trajectory, which keeps tests reproducible.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Owned pseudo-random generator producing bounded symmetric perturbations.
#[derive(Debug, Clone)]
pub struct Noise {
    rng: ChaCha8Rng,
}

impl Noise {
    /// Deterministic generator for the given seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Generator seeded from the thread-local entropy source.
    pub fn from_entropy() -> Self {
        Self::from_seed(rand::random())
    }

    /// Uniform sample in `[-amplitude, amplitude)`.
    ///
    /// Returns `0` without consuming randomness when `amplitude` is zero,
    /// negative or not finite.
    pub fn symmetric(&mut self, amplitude: f64) -> f64 {
        if !amplitude.is_finite() || amplitude <= 0.0 {
            return 0.0;
        }
        self.rng.random_range(-amplitude..amplitude)
    }

    /// Split off an independent generator, e.g. one per component.
    pub fn fork(&mut self) -> Self {
        Self::from_seed(self.rng.random())
    }
}

impl Default for Noise {
    fn default() -> Self {
        Self::from_entropy()
    }
}
