//! Source of randomness used for sampling.
use rand::{
    rngs::{SmallRng, StdRng},
    Rng, SeedableRng,
};

/// Uniform random numbers consumed by the buffers.
///
/// The buffer owns its source, so tests can inject a seeded generator and
/// get reproducible batches.
pub trait RandomSource {
    /// Creates a generator from a seed.
    fn seeded(seed: u64) -> Self
    where
        Self: Sized;

    /// Returns a uniform sample in `[0, 1)`.
    fn uniform(&mut self) -> f64;

    /// Returns a uniform integer in `[0, n)`. `n` must be positive.
    fn below(&mut self, n: usize) -> usize;
}

impl RandomSource for StdRng {
    fn seeded(seed: u64) -> Self {
        StdRng::seed_from_u64(seed)
    }

    fn uniform(&mut self) -> f64 {
        self.gen::<f64>()
    }

    fn below(&mut self, n: usize) -> usize {
        self.gen_range(0..n)
    }
}

impl RandomSource for SmallRng {
    fn seeded(seed: u64) -> Self {
        SmallRng::seed_from_u64(seed)
    }

    fn uniform(&mut self) -> f64 {
        self.gen::<f64>()
    }

    fn below(&mut self, n: usize) -> usize {
        self.gen_range(0..n)
    }
}

impl RandomSource for fastrand::Rng {
    fn seeded(seed: u64) -> Self {
        fastrand::Rng::with_seed(seed)
    }

    fn uniform(&mut self) -> f64 {
        self.f64()
    }

    fn below(&mut self, n: usize) -> usize {
        self.usize(..n)
    }
}

#[cfg(test)]
mod tests {
    use super::RandomSource;
    use rand::rngs::StdRng;

    fn check_ranges<R: RandomSource>(mut rng: R) {
        for _ in 0..1000 {
            let u = rng.uniform();
            assert!((0.0..1.0).contains(&u));
            assert!(rng.below(7) < 7);
        }
        assert_eq!(rng.below(1), 0);
    }

    #[test]
    fn test_ranges() {
        check_ranges(<StdRng as RandomSource>::seeded(42));
        check_ranges(<rand::rngs::SmallRng as RandomSource>::seeded(42));
        check_ranges(<fastrand::Rng as RandomSource>::seeded(42));
    }

    #[test]
    fn test_seeded_sources_repeat() {
        let mut a = <StdRng as RandomSource>::seeded(7);
        let mut b = <StdRng as RandomSource>::seeded(7);
        let xs: Vec<usize> = (0..16).map(|_| a.below(100)).collect();
        let ys: Vec<usize> = (0..16).map(|_| b.below(100)).collect();
        assert_eq!(xs, ys);
    }
}
