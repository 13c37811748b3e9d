//! Seeded random stream
//!
//! The only source of randomness for level generation. Same seed, same
//! sequence, on every platform: PCG32 is fully specified and never touches
//! OS entropy or the clock.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Deterministic stream of floats in `[0, 1)`
#[derive(Debug, Clone)]
pub struct SeededStream {
    seed: u64,
    rng: Pcg32,
}

impl SeededStream {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Seed this stream was created with
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Next value in `[0, 1)`
    pub fn next(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// Uniform value in `[a, b)`
    pub fn range(&mut self, a: f64, b: f64) -> f64 {
        a + self.next() * (b - a)
    }

    /// Uniform pick; `None` for an empty slice
    pub fn choice<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = (self.next() * items.len() as f64) as usize;
        items.get(idx.min(items.len() - 1))
    }

    /// `true` with probability `p`
    #[inline]
    pub fn chance(&mut self, p: f64) -> bool {
        self.next() < p
    }
}
