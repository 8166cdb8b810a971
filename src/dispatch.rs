//! Runtime type tag to statically typed kernel selection.
//!
//! The dispatch macros expand to an exhaustive `match` over [`DataType`],
//! binding a local type alias to the concrete element type of each arm
//! before evaluating the kernel expression. Nesting them yields the
//! double- and triple-type tables. [`dispatch_numeric!`] names every tag of
//! the catalog explicitly, so adding a tag without a kernel instantiation
//! fails to compile.

use ndexec_shape::{NdError, Result};
use ndexec_traits::{DataType, TypeFamily};

/// Bind `$t` to the element type of a numeric tag; `Utf8` evaluates
/// `$fallback`.
macro_rules! dispatch_numeric {
    ($dtype:expr, $fallback:expr, |$t:ident| $body:expr) => {
        match $dtype {
            $crate::DataType::Bool => {
                type $t = bool;
                $body
            }
            $crate::DataType::Int8 => {
                type $t = i8;
                $body
            }
            $crate::DataType::UInt8 => {
                type $t = u8;
                $body
            }
            $crate::DataType::Int16 => {
                type $t = i16;
                $body
            }
            $crate::DataType::Int32 => {
                type $t = i32;
                $body
            }
            $crate::DataType::Int64 => {
                type $t = i64;
                $body
            }
            $crate::DataType::Half => {
                type $t = ::half::f16;
                $body
            }
            $crate::DataType::BFloat16 => {
                type $t = ::half::bf16;
                $body
            }
            $crate::DataType::Float => {
                type $t = f32;
                $body
            }
            $crate::DataType::Double => {
                type $t = f64;
                $body
            }
            $crate::DataType::Utf8 => $fallback,
        }
    };
}

/// Bind `$t` to the element type of a floating tag; any other tag
/// evaluates `$fallback`.
macro_rules! dispatch_float {
    ($dtype:expr, $fallback:expr, |$t:ident| $body:expr) => {
        match $dtype {
            $crate::DataType::Half => {
                type $t = ::half::f16;
                $body
            }
            $crate::DataType::BFloat16 => {
                type $t = ::half::bf16;
                $body
            }
            $crate::DataType::Float => {
                type $t = f32;
                $body
            }
            $crate::DataType::Double => {
                type $t = f64;
                $body
            }
            _ => $fallback,
        }
    };
}

pub(crate) use dispatch_float;
pub(crate) use dispatch_numeric;

/// Error for a tag tuple with no kernel entry.
pub(crate) fn unsupported(op: &'static str, types: &[DataType]) -> NdError {
    NdError::UnsupportedTypeCombination {
        op,
        types: types.to_vec(),
    }
}

/// Reject the string kind for numeric-only operations.
pub(crate) fn require_numeric(op: &'static str, dtype: DataType) -> Result<()> {
    if dtype.is_string() {
        return Err(NdError::UnsupportedOnStringArray { op });
    }
    Ok(())
}

/// Require `dtype` to belong to `family`.
pub(crate) fn require_family(
    op: &'static str,
    role: &str,
    dtype: DataType,
    family: TypeFamily,
) -> Result<()> {
    require_numeric(op, dtype)?;
    if !dtype.in_family(family) {
        return Err(NdError::type_mismatch(
            op,
            format!("{role} must be {family}, got {dtype}"),
        ));
    }
    Ok(())
}

/// Require two operand roles to share one tag.
pub(crate) fn require_same(
    op: &'static str,
    roles: (&str, &str),
    left: DataType,
    right: DataType,
) -> Result<()> {
    if left != right {
        return Err(NdError::type_mismatch(
            op,
            format!("{} is {left} but {} is {right}", roles.0, roles.1),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndexec_traits::Element;

    fn size_via_dispatch(dtype: DataType) -> Option<usize> {
        dispatch_numeric!(dtype, None, |T| Some(std::mem::size_of::<T>()))
    }

    #[test]
    fn test_numeric_dispatch_binds_matching_type() {
        for &dtype in DataType::NUMERIC.iter() {
            let tag = dispatch_numeric!(dtype, None, |T| Some(<T as Element>::DTYPE));
            assert_eq!(tag, Some(dtype));
            assert_eq!(size_via_dispatch(dtype), dtype.size_of());
        }
        assert_eq!(size_via_dispatch(DataType::Utf8), None);
    }

    #[test]
    fn test_float_dispatch_rejects_integers() {
        for &dtype in DataType::NUMERIC.iter() {
            let hit = dispatch_float!(dtype, false, |T| <T as Element>::DTYPE == dtype);
            assert_eq!(hit, dtype.is_float());
        }
    }

    #[test]
    fn test_nested_dispatch() {
        let pair = dispatch_numeric!(DataType::Int16, None, |X| {
            dispatch_float!(DataType::Double, None, |Z| Some((X::DTYPE, Z::DTYPE)))
        });
        assert_eq!(pair, Some((DataType::Int16, DataType::Double)));
    }

    #[test]
    fn test_requirements() {
        assert!(matches!(
            require_numeric("op", DataType::Utf8),
            Err(NdError::UnsupportedOnStringArray { op: "op" })
        ));
        assert!(require_family("op", "z", DataType::Half, TypeFamily::Float).is_ok());
        assert!(matches!(
            require_family("op", "z", DataType::Int32, TypeFamily::Float),
            Err(NdError::DataTypeMismatch { .. })
        ));
        assert!(require_same("op", ("x", "y"), DataType::Int8, DataType::Int8).is_ok());
        assert!(require_same("op", ("x", "y"), DataType::Int8, DataType::UInt8).is_err());
    }
}
