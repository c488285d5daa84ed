//! Random replacement.
//!
//! Seeded deterministically (the simulation needs repeatable runs across
//! invocations with identical configuration, not cryptographic quality) via
//! `rand`'s `SeedableRng`/`StdRng`, rather than a hand-rolled generator.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::ReplacementPolicy;

/// Arbitrary fixed seed. Two runs of the same configuration pick the same
/// eviction sequence, which is what makes a simulation reproducible.
const SEED: u64 = 0x5eed_cace_0bad_f00d;

pub struct RandomPolicy {
    ways: usize,
    rng: StdRng,
}

impl RandomPolicy {
    #[must_use]
    pub fn new(_sets: usize, ways: usize) -> Self {
        Self { ways: ways.max(1), rng: StdRng::seed_from_u64(SEED) }
    }
}

impl ReplacementPolicy for RandomPolicy {
    fn update(&mut self, _set: usize, _way: usize) {}

    fn get_victim(&mut self, _set: usize) -> usize {
        self.rng.gen_range(0..self.ways)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn victims_stay_within_way_bounds() {
        let mut policy = RandomPolicy::new(1, 4);
        for _ in 0..64 {
            assert!(policy.get_victim(0) < 4);
        }
    }

    #[test]
    fn same_seed_gives_the_same_eviction_sequence() {
        let mut a = RandomPolicy::new(1, 8);
        let mut b = RandomPolicy::new(1, 8);
        let seq_a: Vec<usize> = (0..16).map(|_| a.get_victim(0)).collect();
        let seq_b: Vec<usize> = (0..16).map(|_| b.get_victim(0)).collect();
        assert_eq!(seq_a, seq_b);
    }
}
