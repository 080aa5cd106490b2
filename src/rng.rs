//! Seeded random source shared by every generator stage.
//!
//! A run owns one `SimRng` built from the user-supplied seed. Stages never
//! draw from an ambient generator: they either draw from the handle they are
//! given or fork a sub-stream from it. Forks are keyed by a stage domain and
//! an index (usually the user index), so each user's draws are isolated and a
//! partitioned or parallel run reproduces the sequential one exactly.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

/// Stream domains used when forking sub-streams.
pub mod domain {
    pub const POPULATION: u64 = 0x504f_5055;
    pub const ACTIVITY: u64 = 0x4143_5449;
    pub const MISSINGNESS: u64 = 0x4d49_5353;
    pub const OUTLIERS: u64 = 0x4f55_544c;
}

#[derive(Debug, Clone)]
pub struct SimRng {
    seed: u64,
    inner: StdRng,
}

impl SimRng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            inner: StdRng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Derive an independent stream for `(domain, index)`.
    ///
    /// The derived seed depends only on the base seed and the key, never on
    /// how many values have been drawn from `self`.
    pub fn fork(&self, domain: u64, index: u64) -> SimRng {
        let mixed = splitmix64(splitmix64(self.seed ^ splitmix64(domain)) ^ index);
        SimRng::new(mixed)
    }

    /// Uniform value in [0, 1)
    pub fn uniform(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// Uniform value in [low, high)
    pub fn uniform_range(&mut self, low: f64, high: f64) -> f64 {
        debug_assert!(low < high);
        self.inner.gen_range(low..high)
    }

    /// Uniform integer in [low, high)
    pub fn int_range(&mut self, low: u64, high: u64) -> u64 {
        debug_assert!(low < high);
        self.inner.gen_range(low..high)
    }

    pub fn next_u32(&mut self) -> u32 {
        self.inner.gen::<u32>()
    }

    /// Poisson draw using Knuth's multiplication method.
    ///
    /// Only small rates are used by the simulator, where this is exact and
    /// cheap.
    pub fn poisson(&mut self, lambda: f64) -> u32 {
        debug_assert!(lambda.is_finite() && lambda > 0.0);
        let limit = (-lambda).exp();
        let mut count = 0;
        let mut product = self.uniform();
        while product > limit {
            count += 1;
            product *= self.uniform();
        }
        count
    }

    /// Choose `amount` distinct indices out of `len`, clamping `amount` to
    /// `len`. Returned indices are sorted.
    pub fn sample_indices(&mut self, len: usize, amount: usize) -> Vec<usize> {
        let amount = amount.min(len);
        if amount == 0 {
            return Vec::new();
        }
        let mut picked = index::sample(&mut self.inner, len, amount).into_vec();
        picked.sort_unstable();
        picked
    }
}

fn splitmix64(value: u64) -> u64 {
    let mut z = value.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = SimRng::new(42);
        let mut b = SimRng::new(42);
        for _ in 0..100 {
            assert_eq!(a.uniform().to_bits(), b.uniform().to_bits());
        }
    }

    #[test]
    fn test_fork_ignores_parent_position() {
        let mut parent = SimRng::new(7);
        let before = parent.fork(domain::ACTIVITY, 3).next_u32();
        parent.uniform();
        parent.uniform();
        let after = parent.fork(domain::ACTIVITY, 3).next_u32();
        assert_eq!(before, after);
    }

    #[test]
    fn test_forks_are_disjoint() {
        let parent = SimRng::new(7);
        let a = parent.fork(domain::ACTIVITY, 0).next_u32();
        let b = parent.fork(domain::ACTIVITY, 1).next_u32();
        let c = parent.fork(domain::POPULATION, 0).next_u32();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_poisson_mean() {
        let mut rng = SimRng::new(1);
        let n = 20_000;
        let total: u64 = (0..n).map(|_| rng.poisson(2.0) as u64).sum();
        let mean = total as f64 / n as f64;
        assert!((mean - 2.0).abs() < 0.1, "mean was {}", mean);
    }

    #[test]
    fn test_sample_indices_clamps() {
        let mut rng = SimRng::new(3);
        let picked = rng.sample_indices(5, 10);
        assert_eq!(picked, vec![0, 1, 2, 3, 4]);

        let picked = rng.sample_indices(100, 10);
        assert_eq!(picked.len(), 10);
        assert!(picked.windows(2).all(|w| w[0] < w[1]));
        assert!(rng.sample_indices(0, 3).is_empty());
    }
}
