//! The simulation's deterministic random stream.
//!
//! All randomness — miner selection, peer distances, solve times — is drawn
//! from one seeded generator, so runs with the same seed and configuration
//! replay the same uniform stream.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[derive(Debug)]
pub struct SimRng(SmallRng);

impl SimRng {
    pub fn seeded(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }

    /// Uniform integer in `[0, n)`. `n` must be non-zero.
    pub fn randrange(&mut self, n: u64) -> u64 {
        self.0.gen_range(0..n)
    }

    /// Uniform float in `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.0.gen::<f64>()
    }

    pub fn chance(&mut self, p: f64) -> bool {
        self.uniform() < p
    }

    /// Sample the exponential distribution with the given mean: the
    /// inter-arrival spacing of a Poisson process. Used for block solve
    /// times.
    pub fn poisson(&mut self, average: f64) -> f64 {
        -(1.0 - self.uniform()).ln() * average
    }
}
