//! Statically typed element kinds backing the [`DataType`] catalog.
//!
//! Every numeric kind maps to exactly one Rust type implementing [`Element`].
//! Kernels are generic over `T: Element` and the executor instantiates them
//! once per catalog entry, so the trait is sealed: adding a type outside this
//! crate would create a kind the dispatch tables cannot reach.

use std::fmt::Debug;

use half::{bf16, f16};
use num_traits::{Bounded, One, Zero};

use crate::DataType;

mod sealed {
    pub trait Sealed {}
}

/// A concrete element type of the numeric catalog.
///
/// Arithmetic helpers never panic: integer arithmetic wraps, and integer
/// division or remainder by zero yields zero. For `bool`, addition is `or`,
/// subtraction is `xor`, multiplication and division are `and`.
pub trait Element:
    Copy + Default + PartialEq + PartialOrd + Debug + Send + Sync + 'static + sealed::Sealed
{
    /// Runtime tag of this type.
    const DTYPE: DataType;

    fn zero() -> Self;
    fn one() -> Self;
    /// Smallest finite value.
    fn lowest() -> Self;
    /// Largest finite value.
    fn highest() -> Self;

    fn to_f64(self) -> f64;
    fn from_f64(v: f64) -> Self;
    fn to_i64(self) -> i64;
    fn from_i64(v: i64) -> Self;

    fn add(self, rhs: Self) -> Self;
    fn sub(self, rhs: Self) -> Self;
    fn mul(self, rhs: Self) -> Self;
    fn div(self, rhs: Self) -> Self;
    fn rem(self, rhs: Self) -> Self;
    fn neg(self) -> Self;
    fn abs(self) -> Self;

    #[inline]
    fn from_bool(v: bool) -> Self {
        if v {
            Self::one()
        } else {
            Self::zero()
        }
    }

    #[inline]
    fn is_truthy(self) -> bool {
        self != Self::zero()
    }

    /// Convert into another catalog type.
    ///
    /// Integral-to-integral conversions go through `i64` so 64-bit values
    /// survive; anything involving a float goes through `f64`.
    #[inline]
    fn cast<U: Element>(self) -> U {
        if Self::DTYPE.is_float() || U::DTYPE.is_float() {
            U::from_f64(self.to_f64())
        } else {
            U::from_i64(self.to_i64())
        }
    }
}

macro_rules! impl_signed_element {
    ($($t:ty => $dtype:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $t {}

            impl Element for $t {
                const DTYPE: DataType = DataType::$dtype;

                #[inline] fn zero() -> Self { <$t as Zero>::zero() }
                #[inline] fn one() -> Self { <$t as One>::one() }
                #[inline] fn lowest() -> Self { <$t as Bounded>::min_value() }
                #[inline] fn highest() -> Self { <$t as Bounded>::max_value() }
                #[inline] fn to_f64(self) -> f64 { self as f64 }
                #[inline] fn from_f64(v: f64) -> Self { v as $t }
                #[inline] fn to_i64(self) -> i64 { self as i64 }
                #[inline] fn from_i64(v: i64) -> Self { v as $t }
                #[inline] fn add(self, rhs: Self) -> Self { self.wrapping_add(rhs) }
                #[inline] fn sub(self, rhs: Self) -> Self { self.wrapping_sub(rhs) }
                #[inline] fn mul(self, rhs: Self) -> Self { self.wrapping_mul(rhs) }
                #[inline]
                fn div(self, rhs: Self) -> Self {
                    if rhs == 0 { 0 } else { self.wrapping_div(rhs) }
                }
                #[inline]
                fn rem(self, rhs: Self) -> Self {
                    if rhs == 0 { 0 } else { self.wrapping_rem(rhs) }
                }
                #[inline] fn neg(self) -> Self { self.wrapping_neg() }
                #[inline] fn abs(self) -> Self { self.wrapping_abs() }
            }
        )*
    };
}

macro_rules! impl_float_element {
    ($($t:ty => $dtype:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $t {}

            impl Element for $t {
                const DTYPE: DataType = DataType::$dtype;

                #[inline] fn zero() -> Self { 0.0 }
                #[inline] fn one() -> Self { 1.0 }
                #[inline] fn lowest() -> Self { <$t as Bounded>::min_value() }
                #[inline] fn highest() -> Self { <$t as Bounded>::max_value() }
                #[inline] fn to_f64(self) -> f64 { self as f64 }
                #[inline] fn from_f64(v: f64) -> Self { v as $t }
                #[inline] fn to_i64(self) -> i64 { self as i64 }
                #[inline] fn from_i64(v: i64) -> Self { v as $t }
                #[inline] fn add(self, rhs: Self) -> Self { self + rhs }
                #[inline] fn sub(self, rhs: Self) -> Self { self - rhs }
                #[inline] fn mul(self, rhs: Self) -> Self { self * rhs }
                #[inline] fn div(self, rhs: Self) -> Self { self / rhs }
                #[inline] fn rem(self, rhs: Self) -> Self { self % rhs }
                #[inline] fn neg(self) -> Self { -self }
                #[inline] fn abs(self) -> Self { <$t>::abs(self) }
            }
        )*
    };
}

// f16 and bf16 compute through f32 and round back on every operation.
macro_rules! impl_half_element {
    ($($t:ty => $dtype:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $t {}

            impl Element for $t {
                const DTYPE: DataType = DataType::$dtype;

                #[inline] fn zero() -> Self { <$t>::ZERO }
                #[inline] fn one() -> Self { <$t>::ONE }
                #[inline] fn lowest() -> Self { <$t>::MIN }
                #[inline] fn highest() -> Self { <$t>::MAX }
                #[inline] fn to_f64(self) -> f64 { <$t>::to_f64(self) }
                #[inline] fn from_f64(v: f64) -> Self { <$t>::from_f64(v) }
                #[inline] fn to_i64(self) -> i64 { <$t>::to_f32(self) as i64 }
                #[inline] fn from_i64(v: i64) -> Self { <$t>::from_f64(v as f64) }
                #[inline]
                fn add(self, rhs: Self) -> Self {
                    <$t>::from_f32(self.to_f32() + rhs.to_f32())
                }
                #[inline]
                fn sub(self, rhs: Self) -> Self {
                    <$t>::from_f32(self.to_f32() - rhs.to_f32())
                }
                #[inline]
                fn mul(self, rhs: Self) -> Self {
                    <$t>::from_f32(self.to_f32() * rhs.to_f32())
                }
                #[inline]
                fn div(self, rhs: Self) -> Self {
                    <$t>::from_f32(self.to_f32() / rhs.to_f32())
                }
                #[inline]
                fn rem(self, rhs: Self) -> Self {
                    <$t>::from_f32(self.to_f32() % rhs.to_f32())
                }
                #[inline] fn neg(self) -> Self { <$t>::from_f32(-self.to_f32()) }
                #[inline] fn abs(self) -> Self { <$t>::from_f32(self.to_f32().abs()) }
            }
        )*
    };
}

impl_signed_element!(i8 => Int8, i16 => Int16, i32 => Int32, i64 => Int64);
impl_float_element!(f32 => Float, f64 => Double);
impl_half_element!(f16 => Half, bf16 => BFloat16);

impl sealed::Sealed for u8 {}

impl Element for u8 {
    const DTYPE: DataType = DataType::UInt8;

    #[inline]
    fn zero() -> Self {
        0
    }
    #[inline]
    fn one() -> Self {
        1
    }
    #[inline]
    fn lowest() -> Self {
        u8::MIN
    }
    #[inline]
    fn highest() -> Self {
        u8::MAX
    }
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
    #[inline]
    fn from_f64(v: f64) -> Self {
        v as u8
    }
    #[inline]
    fn to_i64(self) -> i64 {
        self as i64
    }
    #[inline]
    fn from_i64(v: i64) -> Self {
        v as u8
    }
    #[inline]
    fn add(self, rhs: Self) -> Self {
        self.wrapping_add(rhs)
    }
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self.wrapping_sub(rhs)
    }
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        self.wrapping_mul(rhs)
    }
    #[inline]
    fn div(self, rhs: Self) -> Self {
        self.checked_div(rhs).unwrap_or(0)
    }
    #[inline]
    fn rem(self, rhs: Self) -> Self {
        self.checked_rem(rhs).unwrap_or(0)
    }
    #[inline]
    fn neg(self) -> Self {
        self.wrapping_neg()
    }
    #[inline]
    fn abs(self) -> Self {
        self
    }
}

impl sealed::Sealed for bool {}

impl Element for bool {
    const DTYPE: DataType = DataType::Bool;

    #[inline]
    fn zero() -> Self {
        false
    }
    #[inline]
    fn one() -> Self {
        true
    }
    #[inline]
    fn lowest() -> Self {
        false
    }
    #[inline]
    fn highest() -> Self {
        true
    }
    #[inline]
    fn to_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }
    #[inline]
    fn from_f64(v: f64) -> Self {
        v != 0.0
    }
    #[inline]
    fn to_i64(self) -> i64 {
        self as i64
    }
    #[inline]
    fn from_i64(v: i64) -> Self {
        v != 0
    }
    #[inline]
    fn add(self, rhs: Self) -> Self {
        self | rhs
    }
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self ^ rhs
    }
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        self & rhs
    }
    #[inline]
    fn div(self, rhs: Self) -> Self {
        self & rhs
    }
    #[inline]
    fn rem(self, _rhs: Self) -> Self {
        false
    }
    #[inline]
    fn neg(self) -> Self {
        self
    }
    #[inline]
    fn abs(self) -> Self {
        self
    }
}
