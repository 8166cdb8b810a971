//! Joint reductions over two equally long operands.

use crate::extra::ExtraArguments;

opcodes! {
    /// Distance, similarity and comparison reductions over element pairs.
    pub enum Reduce3Op ("reduce3") {
        ManhattanDistance = 0,
        EuclideanDistance = 1,
        CosineSimilarity = 2,
        CosineDistance = 3,
        Dot = 4,
        /// Number of pairs differing by more than `extra[0]` (default 1e-5).
        EqualsWithEps = 5,
        /// Fraction of differing pairs.
        HammingDistance = 6,
        JaccardDistance = 7,
    }
}

/// Default tolerance of [`Reduce3Op::EqualsWithEps`].
pub const DEFAULT_EPS: f64 = 1e-5;

/// Accumulator with the main value and two auxiliary slots.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Reduce3Accumulator {
    pub value: f64,
    pub aux: [f64; 2],
}

impl Reduce3Accumulator {
    #[inline]
    pub fn merge(self, other: Self) -> Self {
        Self {
            value: self.value + other.value,
            aux: [self.aux[0] + other.aux[0], self.aux[1] + other.aux[1]],
        }
    }
}

/// Equality within `eps`: absolute test first, then, for floating inputs,
/// relative to the larger magnitude. Infinities are equal when their signs
/// match.
pub fn approx_eq(a: f64, b: f64, eps: f64, floating: bool) -> bool {
    if a.is_infinite() || b.is_infinite() {
        return a == b;
    }
    let diff = (a - b).abs();
    if diff <= eps {
        return true;
    }
    floating && diff <= a.abs().max(b.abs()) * eps
}

impl Reduce3Op {
    #[inline]
    pub fn start(self) -> Reduce3Accumulator {
        Reduce3Accumulator::default()
    }

    #[inline]
    pub fn update(
        self,
        mut acc: Reduce3Accumulator,
        x: f64,
        y: f64,
        floating: bool,
        extra: &ExtraArguments,
    ) -> Reduce3Accumulator {
        match self {
            Reduce3Op::ManhattanDistance => acc.value += (x - y).abs(),
            Reduce3Op::EuclideanDistance => acc.value += (x - y) * (x - y),
            Reduce3Op::CosineSimilarity | Reduce3Op::CosineDistance => {
                acc.value += x * y;
                acc.aux[0] += x * x;
                acc.aux[1] += y * y;
            }
            Reduce3Op::Dot => acc.value += x * y,
            Reduce3Op::EqualsWithEps => {
                if !approx_eq(x, y, extra.get_or(0, DEFAULT_EPS), floating) {
                    acc.value += 1.0;
                }
            }
            Reduce3Op::HammingDistance => {
                if x != y {
                    acc.value += 1.0;
                }
            }
            Reduce3Op::JaccardDistance => {
                acc.value += x.min(y);
                acc.aux[0] += x.max(y);
            }
        }
        acc
    }

    #[inline]
    pub fn finish(self, acc: Reduce3Accumulator, n: usize) -> f64 {
        match self {
            Reduce3Op::EuclideanDistance => acc.value.sqrt(),
            Reduce3Op::CosineSimilarity => cosine(acc),
            Reduce3Op::CosineDistance => 1.0 - cosine(acc),
            Reduce3Op::HammingDistance => {
                if n == 0 {
                    0.0
                } else {
                    acc.value / n as f64
                }
            }
            Reduce3Op::JaccardDistance => {
                if acc.aux[0] == 0.0 {
                    0.0
                } else {
                    1.0 - acc.value / acc.aux[0]
                }
            }
            _ => acc.value,
        }
    }
}

#[inline]
fn cosine(acc: Reduce3Accumulator) -> f64 {
    acc.value / (acc.aux[0].sqrt() * acc.aux[1].sqrt())
}
