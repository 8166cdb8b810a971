//! Pairwise, broadcast and scalar kernel bodies.

use ndexec_traits::Element;

opcodes! {
    /// Binary numeric operations; `y` is the second array, the broadcast
    /// operand or the scalar.
    pub enum PairwiseOp ("pairwise") {
        Add = 0,
        Subtract = 1,
        Multiply = 2,
        Divide = 3,
        ReverseSubtract = 4,
        ReverseDivide = 5,
        Max = 6,
        Min = 7,
        /// `z = y`
        Copy = 8,
        Pow = 9,
        /// `z = (x - y)^2`
        SquaredSubtract = 10,
        FloorDiv = 11,
        FloorMod = 12,
    }
}

impl PairwiseOp {
    /// Ops that divide by one of their operands.
    pub fn divides(self) -> bool {
        matches!(
            self,
            PairwiseOp::Divide | PairwiseOp::ReverseDivide | PairwiseOp::FloorDiv | PairwiseOp::FloorMod
        )
    }

    #[inline]
    pub fn apply<T: Element>(self, x: T, y: T) -> T {
        match self {
            PairwiseOp::Add => x.add(y),
            PairwiseOp::Subtract => x.sub(y),
            PairwiseOp::Multiply => x.mul(y),
            PairwiseOp::Divide => x.div(y),
            PairwiseOp::ReverseSubtract => y.sub(x),
            PairwiseOp::ReverseDivide => y.div(x),
            PairwiseOp::Max => {
                if y > x {
                    y
                } else {
                    x
                }
            }
            PairwiseOp::Min => {
                if y < x {
                    y
                } else {
                    x
                }
            }
            PairwiseOp::Copy => y,
            PairwiseOp::Pow => T::from_f64(x.to_f64().powf(y.to_f64())),
            PairwiseOp::SquaredSubtract => {
                let d = x.sub(y);
                d.mul(d)
            }
            PairwiseOp::FloorDiv => floor_div(x, y),
            PairwiseOp::FloorMod => floor_mod(x, y),
        }
    }
}

fn floor_div<T: Element>(x: T, y: T) -> T {
    if T::DTYPE.is_float() {
        return T::from_f64((x.to_f64() / y.to_f64()).floor());
    }
    let (a, b) = (x.to_i64(), y.to_i64());
    if b == 0 {
        return T::zero();
    }
    let q = a.wrapping_div(b);
    if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
        T::from_i64(q - 1)
    } else {
        T::from_i64(q)
    }
}

fn floor_mod<T: Element>(x: T, y: T) -> T {
    if T::DTYPE.is_float() {
        let (a, b) = (x.to_f64(), y.to_f64());
        return T::from_f64(a - (a / b).floor() * b);
    }
    let (a, b) = (x.to_i64(), y.to_i64());
    if b == 0 {
        return T::zero();
    }
    let r = a.wrapping_rem(b);
    if r != 0 && ((r < 0) != (b < 0)) {
        T::from_i64(r + b)
    } else {
        T::from_i64(r)
    }
}

opcodes! {
    /// Binary predicates producing a boolean result.
    pub enum PairwiseBoolOp ("pairwise_bool") {
        EqualTo = 0,
        NotEqualTo = 1,
        GreaterThan = 2,
        GreaterThanOrEqual = 3,
        LessThan = 4,
        LessThanOrEqual = 5,
        And = 6,
        Or = 7,
        Xor = 8,
    }
}

impl PairwiseBoolOp {
    #[inline]
    pub fn apply<T: Element>(self, x: T, y: T) -> bool {
        match self {
            PairwiseBoolOp::EqualTo => x == y,
            PairwiseBoolOp::NotEqualTo => x != y,
            PairwiseBoolOp::GreaterThan => x > y,
            PairwiseBoolOp::GreaterThanOrEqual => x >= y,
            PairwiseBoolOp::LessThan => x < y,
            PairwiseBoolOp::LessThanOrEqual => x <= y,
            PairwiseBoolOp::And => x.is_truthy() && y.is_truthy(),
            PairwiseBoolOp::Or => x.is_truthy() || y.is_truthy(),
            PairwiseBoolOp::Xor => x.is_truthy() != y.is_truthy(),
        }
    }
}
