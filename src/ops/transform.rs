//! Unary transform kernel bodies.
//!
//! Float transforms compute in `f64` and are rounded into the destination
//! type; same-type transforms stay in the element type.

use std::fmt;

use ndexec_traits::Element;

use crate::extra::ExtraArguments;

opcodes! {
    /// Transforms whose result is floating point whatever the input.
    pub enum TransformFloatOp ("transform_float") {
        Sqrt = 0,
        Rsqrt = 1,
        Exp = 2,
        Log = 3,
        Sigmoid = 4,
        Tanh = 5,
        Sin = 6,
        Cos = 7,
    }
}

impl TransformFloatOp {
    #[inline]
    pub fn apply(self, x: f64) -> f64 {
        match self {
            TransformFloatOp::Sqrt => x.sqrt(),
            TransformFloatOp::Rsqrt => 1.0 / x.sqrt(),
            TransformFloatOp::Exp => x.exp(),
            TransformFloatOp::Log => x.ln(),
            TransformFloatOp::Sigmoid => sigmoid(x),
            TransformFloatOp::Tanh => x.tanh(),
            TransformFloatOp::Sin => x.sin(),
            TransformFloatOp::Cos => x.cos(),
        }
    }
}

opcodes! {
    /// Transforms keeping the input type.
    pub enum TransformSameOp ("transform_same") {
        Abs = 0,
        Neg = 1,
        Square = 2,
        Cube = 3,
        Sign = 4,
        Floor = 5,
        Ceil = 6,
        Round = 7,
        OneMinus = 8,
        Identity = 9,
    }
}

impl TransformSameOp {
    #[inline]
    pub fn apply<T: Element>(self, x: T) -> T {
        match self {
            TransformSameOp::Abs => x.abs(),
            TransformSameOp::Neg => x.neg(),
            TransformSameOp::Square => x.mul(x),
            TransformSameOp::Cube => x.mul(x).mul(x),
            TransformSameOp::Sign => {
                if x > T::zero() {
                    T::one()
                } else if x < T::zero() {
                    T::zero().sub(T::one())
                } else {
                    T::zero()
                }
            }
            TransformSameOp::Floor => round_with(x, f64::floor),
            TransformSameOp::Ceil => round_with(x, f64::ceil),
            TransformSameOp::Round => round_with(x, f64::round),
            TransformSameOp::OneMinus => T::one().sub(x),
            TransformSameOp::Identity => x,
        }
    }
}

#[inline]
fn round_with<T: Element>(x: T, f: fn(f64) -> f64) -> T {
    if T::DTYPE.is_float() {
        T::from_f64(f(x.to_f64()))
    } else {
        x
    }
}

opcodes! {
    /// Predicates over one operand.
    pub enum TransformBoolOp ("transform_bool") {
        IsNan = 0,
        IsInf = 1,
        IsFinite = 2,
        IsPositive = 3,
        Not = 4,
    }
}

impl TransformBoolOp {
    #[inline]
    pub fn apply<T: Element>(self, x: T) -> bool {
        match self {
            TransformBoolOp::IsNan => x.to_f64().is_nan(),
            TransformBoolOp::IsInf => x.to_f64().is_infinite(),
            TransformBoolOp::IsFinite => x.to_f64().is_finite(),
            TransformBoolOp::IsPositive => x > T::zero(),
            TransformBoolOp::Not => !x.is_truthy(),
        }
    }
}

opcodes! {
    /// Transforms between any two numeric types.
    pub enum TransformAnyOp ("transform_any") {
        /// Convert each element to the destination type.
        Assign = 0,
    }
}

impl TransformAnyOp {
    #[inline]
    pub fn apply<X: Element, Z: Element>(self, x: X) -> Z {
        match self {
            TransformAnyOp::Assign => x.cast(),
        }
    }
}

opcodes! {
    /// Floating transforms whose input and output types must match.
    pub enum TransformStrictOp ("transform_strict") {
        Swish = 0,
        SoftPlus = 1,
        SoftSign = 2,
        /// `extra[0]` is alpha (default 1).
        Elu = 3,
        HardSigmoid = 4,
    }
}

impl TransformStrictOp {
    #[inline]
    pub fn apply(self, x: f64, extra: &ExtraArguments) -> f64 {
        match self {
            TransformStrictOp::Swish => x * sigmoid(x),
            TransformStrictOp::SoftPlus => x.exp().ln_1p(),
            TransformStrictOp::SoftSign => x / (1.0 + x.abs()),
            TransformStrictOp::Elu => {
                if x >= 0.0 {
                    x
                } else {
                    extra.get_or(0, 1.0) * x.exp_m1()
                }
            }
            TransformStrictOp::HardSigmoid => (0.2 * x + 0.5).clamp(0.0, 1.0),
        }
    }
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// A transform opcode of any family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransformOp {
    Float(TransformFloatOp),
    Same(TransformSameOp),
    Bool(TransformBoolOp),
    Any(TransformAnyOp),
    Strict(TransformStrictOp),
}

impl From<TransformFloatOp> for TransformOp {
    fn from(op: TransformFloatOp) -> Self {
        TransformOp::Float(op)
    }
}

impl From<TransformSameOp> for TransformOp {
    fn from(op: TransformSameOp) -> Self {
        TransformOp::Same(op)
    }
}

impl From<TransformBoolOp> for TransformOp {
    fn from(op: TransformBoolOp) -> Self {
        TransformOp::Bool(op)
    }
}

impl From<TransformAnyOp> for TransformOp {
    fn from(op: TransformAnyOp) -> Self {
        TransformOp::Any(op)
    }
}

impl From<TransformStrictOp> for TransformOp {
    fn from(op: TransformStrictOp) -> Self {
        TransformOp::Strict(op)
    }
}

impl fmt::Display for TransformOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformOp::Float(op) => op.fmt(f),
            TransformOp::Same(op) => op.fmt(f),
            TransformOp::Bool(op) => op.fmt(f),
            TransformOp::Any(op) => op.fmt(f),
            TransformOp::Strict(op) => op.fmt(f),
        }
    }
}
