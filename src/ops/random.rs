//! Random generation kernel bodies.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::extra::ExtraArguments;

opcodes! {
    /// Random fills. The number of source arrays depends on the op.
    pub enum RandomOp ("random") {
        /// `extra = [from, to]`, default `[0, 1)`.
        Uniform = 0,
        /// `extra = [mean, stddev]`, default `[0, 1]`.
        Gaussian = 1,
        /// `extra = [p]`: 1 with probability `p`.
        Bernoulli = 2,
        /// Keep each source element with probability `extra[0]`, else 0.
        DropOut = 3,
        /// Like `DropOut`, rescaling kept elements by `1 / p`.
        DropOutInverted = 4,
        /// Pick from the first source with probability `extra[0]`, else the
        /// second.
        ProbabilisticMerge = 5,
    }
}

impl RandomOp {
    /// Number of source arrays the op reads.
    pub fn arity(self) -> usize {
        match self {
            RandomOp::Uniform | RandomOp::Gaussian | RandomOp::Bernoulli => 0,
            RandomOp::DropOut | RandomOp::DropOutInverted => 1,
            RandomOp::ProbabilisticMerge => 2,
        }
    }

    /// Next output value given the source values of this position.
    #[inline]
    pub fn sample(self, rng: &mut RandomGenerator, sources: &[f64], extra: &ExtraArguments) -> f64 {
        let source = |k: usize| sources.get(k).copied().unwrap_or(0.0);
        match self {
            RandomOp::Uniform => {
                let from = extra.get_or(0, 0.0);
                let to = extra.get_or(1, 1.0);
                from + (to - from) * rng.next_uniform()
            }
            RandomOp::Gaussian => extra.get_or(0, 0.0) + extra.get_or(1, 1.0) * rng.next_gaussian(),
            RandomOp::Bernoulli => {
                if rng.next_uniform() < extra.get_or(0, 0.5) {
                    1.0
                } else {
                    0.0
                }
            }
            RandomOp::DropOut => {
                if rng.next_uniform() < extra.get_or(0, 0.5) {
                    source(0)
                } else {
                    0.0
                }
            }
            RandomOp::DropOutInverted => {
                let p = extra.get_or(0, 0.5);
                if rng.next_uniform() < p {
                    source(0) / p
                } else {
                    0.0
                }
            }
            RandomOp::ProbabilisticMerge => {
                if rng.next_uniform() < extra.get_or(0, 0.5) {
                    source(0)
                } else {
                    source(1)
                }
            }
        }
    }
}

/// Seedable generator driving [`RandomOp`] kernels.
#[derive(Clone, Debug)]
pub struct RandomGenerator {
    seed: u64,
    rng: StdRng,
}

impl RandomGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generator seeded from system entropy.
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restart the stream from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        *self = Self::new(seed);
    }

    /// Uniform sample in `[0, 1)`.
    #[inline]
    pub fn next_uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Standard normal sample.
    #[inline]
    pub fn next_gaussian(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = RandomGenerator::new(42);
        let mut b = RandomGenerator::new(42);
        for _ in 0..16 {
            assert_eq!(a.next_uniform(), b.next_uniform());
        }
        a.reseed(7);
        assert_eq!(a.seed(), 7);
        assert_eq!(a.next_gaussian(), RandomGenerator::new(7).next_gaussian());
    }

    #[test]
    fn test_uniform_respects_bounds() {
        let mut rng = RandomGenerator::new(1);
        let extra = ExtraArguments::from([-2.0, 3.0]);
        for _ in 0..1000 {
            let v = RandomOp::Uniform.sample(&mut rng, &[], &extra);
            assert!((-2.0..3.0).contains(&v));
        }
    }

    #[test]
    fn test_dropout_extremes() {
        let mut rng = RandomGenerator::new(3);
        let keep = ExtraArguments::from([1.0]);
        let drop = ExtraArguments::from([0.0]);
        assert_eq!(RandomOp::DropOut.sample(&mut rng, &[5.0], &keep), 5.0);
        assert_eq!(RandomOp::DropOut.sample(&mut rng, &[5.0], &drop), 0.0);
        assert_eq!(RandomOp::DropOutInverted.sample(&mut rng, &[5.0], &keep), 5.0);
        assert_eq!(
            RandomOp::ProbabilisticMerge.sample(&mut rng, &[1.0, 2.0], &drop),
            2.0
        );
    }

    #[test]
    fn test_arity() {
        assert_eq!(RandomOp::Gaussian.arity(), 0);
        assert_eq!(RandomOp::DropOut.arity(), 1);
        assert_eq!(RandomOp::ProbabilisticMerge.arity(), 2);
    }
}
