//! Random Sources
//!
//! Holder selection and update targets draw from an injected source so test
//! suites can force deterministic choices.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of randomness injected into nodes.
pub trait RandomSource: Send + Sync {
    /// Uniform value in `0..max`. Returns 0 when `max` is 0.
    fn random_usize(&self, max: usize) -> usize;

    /// Fill `buf` with printable ASCII (`' '..='~'`).
    fn fill_printable(&self, buf: &mut [u8]);
}

/// Seedable production source backed by [`StdRng`].
#[derive(Debug)]
pub struct SeededRandomSource {
    rng: Mutex<StdRng>,
}

impl SeededRandomSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl RandomSource for SeededRandomSource {
    fn random_usize(&self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        self.rng.lock().gen_range(0..max)
    }

    fn fill_printable(&self, buf: &mut [u8]) {
        let mut rng = self.rng.lock();
        for byte in buf.iter_mut() {
            *byte = rng.gen_range(32u8..127);
        }
    }
}

/// Fixed random source for deterministic testing.
///
/// Always picks `value % max`.
///
/// ```rust
/// use shared_types::{FixedRandomSource, RandomSource};
///
/// let rng = FixedRandomSource::new(1);
/// assert_eq!(rng.random_usize(3), 1);
/// assert_eq!(rng.random_usize(3), 1);
/// ```
#[derive(Debug, Clone)]
pub struct FixedRandomSource {
    value: usize,
}

impl FixedRandomSource {
    pub fn new(value: usize) -> Self {
        Self { value }
    }

    /// Always the first candidate.
    pub fn first() -> Self {
        Self::new(0)
    }
}

impl RandomSource for FixedRandomSource {
    fn random_usize(&self, max: usize) -> usize {
        if max == 0 {
            0
        } else {
            self.value % max
        }
    }

    fn fill_printable(&self, buf: &mut [u8]) {
        buf.fill(b'x');
    }
}
