use rand::Rng;

/// Source of the two kinds of random draw the samplers need.
///
/// Every [rand::Rng] is a `RandomSource`,
/// so seeding and ownership of the generator stay with the caller.
pub trait RandomSource {
    /// Uniform value in `[0, 1)`.
    fn next_uniform(&mut self) -> f64;

    /// Uniform integer in `[0, n)`.
    ///
    /// `n` must be non-zero.
    fn next_below(&mut self, n: usize) -> usize;
}

impl<R: Rng> RandomSource for R {
    fn next_uniform(&mut self) -> f64 {
        self.random::<f64>()
    }

    fn next_below(&mut self, n: usize) -> usize {
        self.random_range(0..n)
    }
}

#[cfg(test)]
mod tests {
    use super::RandomSource;
    use crate::tests::new_rng;

    #[test]
    fn test_draws_in_range() {
        let mut rng = new_rng();
        for _ in 0..1000 {
            let u = rng.next_uniform();
            assert!((0.0..1.0).contains(&u));
            assert!(rng.next_below(7) < 7);
        }
        assert_eq!(rng.next_below(1), 0);
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let mut a = new_rng();
        let mut b = new_rng();
        let draws_a: Vec<_> = (0..20).map(|_| a.next_below(1000)).collect();
        let draws_b: Vec<_> = (0..20).map(|_| b.next_below(1000)).collect();
        assert_eq!(draws_a, draws_b);
    }
}
