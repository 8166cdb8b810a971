//! Reduction kernel bodies.
//!
//! Every reduction is described by a start value, an update folding one
//! element into the accumulator, a merge combining two partial
//! accumulators, and a finish step that sees the element count.

use std::fmt;

use ndexec_traits::Element;

opcodes! {
    /// Reductions with a floating result, accumulated in `f64`.
    pub enum ReduceFloatOp ("reduce_float") {
        Mean = 0,
        /// Mean of absolute values.
        AMean = 1,
        Norm1 = 2,
        Norm2 = 3,
        NormMax = 4,
        SquaredNorm = 5,
    }
}

impl ReduceFloatOp {
    #[inline]
    pub fn start(self) -> f64 {
        0.0
    }

    #[inline]
    pub fn update(self, acc: f64, x: f64) -> f64 {
        match self {
            ReduceFloatOp::Mean => acc + x,
            ReduceFloatOp::AMean | ReduceFloatOp::Norm1 => acc + x.abs(),
            ReduceFloatOp::Norm2 | ReduceFloatOp::SquaredNorm => acc + x * x,
            ReduceFloatOp::NormMax => acc.max(x.abs()),
        }
    }

    #[inline]
    pub fn merge(self, a: f64, b: f64) -> f64 {
        match self {
            ReduceFloatOp::NormMax => a.max(b),
            _ => a + b,
        }
    }

    #[inline]
    pub fn finish(self, acc: f64, n: usize) -> f64 {
        match self {
            ReduceFloatOp::Mean | ReduceFloatOp::AMean => acc / n as f64,
            ReduceFloatOp::Norm2 => acc.sqrt(),
            _ => acc,
        }
    }
}

opcodes! {
    /// Reductions keeping the input type.
    pub enum ReduceSameOp ("reduce_same") {
        Sum = 0,
        Prod = 1,
        Max = 2,
        Min = 3,
        /// Largest absolute value.
        AMax = 4,
        /// Smallest absolute value.
        AMin = 5,
    }
}

impl ReduceSameOp {
    #[inline]
    pub fn start<T: Element>(self) -> T {
        match self {
            ReduceSameOp::Sum => T::zero(),
            ReduceSameOp::Prod => T::one(),
            ReduceSameOp::Max => T::lowest(),
            ReduceSameOp::Min | ReduceSameOp::AMin => T::highest(),
            ReduceSameOp::AMax => T::zero(),
        }
    }

    #[inline]
    pub fn update<T: Element>(self, acc: T, x: T) -> T {
        match self {
            ReduceSameOp::AMax => self.merge(acc, x.abs()),
            ReduceSameOp::AMin => self.merge(acc, x.abs()),
            _ => self.merge(acc, x),
        }
    }

    #[inline]
    pub fn merge<T: Element>(self, a: T, b: T) -> T {
        match self {
            ReduceSameOp::Sum => a.add(b),
            ReduceSameOp::Prod => a.mul(b),
            ReduceSameOp::Max | ReduceSameOp::AMax => {
                if b > a {
                    b
                } else {
                    a
                }
            }
            ReduceSameOp::Min | ReduceSameOp::AMin => {
                if b < a {
                    b
                } else {
                    a
                }
            }
        }
    }
}

opcodes! {
    /// Reductions to a boolean.
    pub enum ReduceBoolOp ("reduce_bool") {
        Any = 0,
        All = 1,
    }
}

impl ReduceBoolOp {
    #[inline]
    pub fn start(self) -> bool {
        matches!(self, ReduceBoolOp::All)
    }

    #[inline]
    pub fn update<T: Element>(self, acc: bool, x: T) -> bool {
        self.merge(acc, x.is_truthy())
    }

    #[inline]
    pub fn merge(self, a: bool, b: bool) -> bool {
        match self {
            ReduceBoolOp::Any => a || b,
            ReduceBoolOp::All => a && b,
        }
    }
}

opcodes! {
    /// Reductions to an `i64` count.
    pub enum ReduceLongOp ("reduce_long") {
        CountNonZero = 0,
        CountZero = 1,
    }
}

impl ReduceLongOp {
    #[inline]
    pub fn start(self) -> i64 {
        0
    }

    #[inline]
    pub fn update<T: Element>(self, acc: i64, x: T) -> i64 {
        let hit = match self {
            ReduceLongOp::CountNonZero => x.is_truthy(),
            ReduceLongOp::CountZero => !x.is_truthy(),
        };
        acc + i64::from(hit)
    }

    #[inline]
    pub fn merge(self, a: i64, b: i64) -> i64 {
        a + b
    }
}

/// A reduction opcode of any family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    Float(ReduceFloatOp),
    Same(ReduceSameOp),
    Bool(ReduceBoolOp),
    Long(ReduceLongOp),
}

impl From<ReduceFloatOp> for ReduceOp {
    fn from(op: ReduceFloatOp) -> Self {
        ReduceOp::Float(op)
    }
}

impl From<ReduceSameOp> for ReduceOp {
    fn from(op: ReduceSameOp) -> Self {
        ReduceOp::Same(op)
    }
}

impl From<ReduceBoolOp> for ReduceOp {
    fn from(op: ReduceBoolOp) -> Self {
        ReduceOp::Bool(op)
    }
}

impl From<ReduceLongOp> for ReduceOp {
    fn from(op: ReduceLongOp) -> Self {
        ReduceOp::Long(op)
    }
}

impl fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReduceOp::Float(op) => op.fmt(f),
            ReduceOp::Same(op) => op.fmt(f),
            ReduceOp::Bool(op) => op.fmt(f),
            ReduceOp::Long(op) => op.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn run_float(op: ReduceFloatOp, xs: &[f64]) -> f64 {
        let acc = xs.iter().fold(op.start(), |acc, &x| op.update(acc, x));
        op.finish(acc, xs.len())
    }

    fn run_same<T: Element>(op: ReduceSameOp, xs: &[T]) -> T {
        xs.iter().fold(op.start(), |acc, &x| op.update(acc, x))
    }

    #[test]
    fn test_float_reductions() {
        let xs = [3.0, -4.0];
        assert_relative_eq!(run_float(ReduceFloatOp::Mean, &xs), -0.5);
        assert_relative_eq!(run_float(ReduceFloatOp::AMean, &xs), 3.5);
        assert_relative_eq!(run_float(ReduceFloatOp::Norm1, &xs), 7.0);
        assert_relative_eq!(run_float(ReduceFloatOp::Norm2, &xs), 5.0);
        assert_relative_eq!(run_float(ReduceFloatOp::NormMax, &xs), 4.0);
        assert_relative_eq!(run_float(ReduceFloatOp::SquaredNorm, &xs), 25.0);
    }

    #[test]
    fn test_same_reductions() {
        assert_eq!(run_same(ReduceSameOp::Sum, &[1i32, 2, 3]), 6);
        assert_eq!(run_same(ReduceSameOp::Prod, &[2.0f32, 3.0, 4.0]), 24.0);
        assert_eq!(run_same(ReduceSameOp::Max, &[-5i8, -2, -9]), -2);
        assert_eq!(run_same(ReduceSameOp::Min, &[5u8, 2, 9]), 2);
        assert_eq!(run_same(ReduceSameOp::AMax, &[-5i16, 2]), 5);
        assert_eq!(run_same(ReduceSameOp::AMin, &[-5.0f64, 2.0]), 2.0);
    }

    #[test]
    fn test_merge_matches_sequential_update() {
        let op = ReduceSameOp::AMax;
        let left = run_same(op, &[-7i32, 1]);
        let right = run_same(op, &[3i32, -2]);
        assert_eq!(op.merge(left, right), run_same(op, &[-7, 1, 3, -2]));
    }

    #[test]
    fn test_bool_and_long_reductions() {
        let xs = [0.0f32, 2.0, 0.0];
        let any = xs.iter().fold(ReduceBoolOp::Any.start(), |a, &x| ReduceBoolOp::Any.update(a, x));
        let all = xs.iter().fold(ReduceBoolOp::All.start(), |a, &x| ReduceBoolOp::All.update(a, x));
        assert!(any);
        assert!(!all);
        let zeros = xs
            .iter()
            .fold(0, |a, &x| ReduceLongOp::CountZero.update(a, x));
        assert_eq!(zeros, 2);
    }
}
