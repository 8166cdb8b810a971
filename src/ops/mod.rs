//! Opcode catalog.
//!
//! Each operation family is a `#[repr(i32)]` enum whose discriminants are
//! the wire-level opcodes. The enums carry the reference kernel bodies the
//! executor instantiates per element type.

use std::fmt;

/// Declare an opcode enum with code lookup.
macro_rules! opcodes {
    (
        $(#[$meta:meta])*
        pub enum $name:ident ($family:literal) {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $code),*
        }

        impl $name {
            /// Family name used in diagnostics.
            pub const FAMILY: &'static str = $family;

            /// Every opcode of the family, in code order.
            pub const ALL: &'static [$name] = &[$($name::$variant),*];

            /// Look up an opcode; unknown codes are `UnsupportedOperation`.
            pub fn from_code(code: i32) -> $crate::Result<Self> {
                match code {
                    $($code => Ok($name::$variant),)*
                    _ => Err($crate::NdError::UnsupportedOperation {
                        family: $family,
                        code,
                    }),
                }
            }

            #[inline]
            pub fn code(self) -> i32 {
                self as i32
            }
        }

        impl TryFrom<i32> for $name {
            type Error = $crate::NdError;

            fn try_from(code: i32) -> $crate::Result<Self> {
                Self::from_code(code)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}::{:?}", $family, self)
            }
        }
    };
}

pub mod index_reduce;
pub mod pairwise;
pub mod random;
pub mod reduce;
pub mod reduce3;
pub mod summary;
pub mod transform;

pub use index_reduce::IndexReduceOp;
pub use pairwise::{PairwiseBoolOp, PairwiseOp};
pub use random::{RandomGenerator, RandomOp};
pub use reduce::{ReduceBoolOp, ReduceFloatOp, ReduceLongOp, ReduceOp, ReduceSameOp};
pub use reduce3::{Reduce3Accumulator, Reduce3Op};
pub use summary::{Moments, SummaryStatsOp};
pub use transform::{
    TransformAnyOp, TransformBoolOp, TransformFloatOp, TransformOp, TransformSameOp,
    TransformStrictOp,
};

/// Any opcode of the catalog, tagged with its family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpCode {
    Pairwise(PairwiseOp),
    PairwiseBool(PairwiseBoolOp),
    Transform(TransformOp),
    Reduce(ReduceOp),
    IndexReduce(IndexReduceOp),
    Reduce3(Reduce3Op),
    SummaryStats(SummaryStatsOp),
    Random(RandomOp),
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpCode::Pairwise(op) => op.fmt(f),
            OpCode::PairwiseBool(op) => op.fmt(f),
            OpCode::Transform(op) => op.fmt(f),
            OpCode::Reduce(op) => op.fmt(f),
            OpCode::IndexReduce(op) => op.fmt(f),
            OpCode::Reduce3(op) => op.fmt(f),
            OpCode::SummaryStats(op) => op.fmt(f),
            OpCode::Random(op) => op.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NdError;

    #[test]
    fn test_codes_round_trip_for_every_family() {
        for &op in PairwiseOp::ALL {
            assert_eq!(PairwiseOp::from_code(op.code()).unwrap(), op);
        }
        for &op in Reduce3Op::ALL {
            assert_eq!(Reduce3Op::try_from(op.code()).unwrap(), op);
        }
    }

    #[test]
    fn test_unknown_code_is_unsupported_operation() {
        let err = TransformFloatOp::from_code(999).unwrap_err();
        assert_eq!(
            err,
            NdError::UnsupportedOperation {
                family: "transform_float",
                code: 999
            }
        );
    }

    #[test]
    fn test_display_names_family() {
        assert_eq!(PairwiseOp::Add.to_string(), "pairwise::Add");
        assert_eq!(
            OpCode::Reduce(ReduceSameOp::Sum.into()).to_string(),
            "reduce_same::Sum"
        );
    }
}
