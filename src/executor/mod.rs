//! Operation executor.
//!
//! Every `exec_*` function follows the same sequence:
//!
//! 1. validate operand types against the family rule,
//! 2. validate lengths, extents and axes,
//! 3. resolve the element types through the dispatch tables,
//! 4. lock the operand buffers and run the kernel instantiation.
//!
//! Errors are raised before any destination element is written. When the
//! destination shares its buffer with a source the kernel runs in place;
//! element-wise kernels read each position before writing it, so an
//! element's result only depends on that element's previous value.

use std::sync::Arc;

use ndexec_shape::{NdError, Result, ShapeInfo, TadPack};
use ndexec_traits::{DataType, Element};

use crate::buffer::{DataBuffer, LockedBuffers};
use crate::context::LaunchContext;
use crate::maybe_sync::{MaybeSend, MaybeSync};
use crate::ops::OpCode;
use crate::threading::{par_for_ranges, SendPtr};

mod broadcast;
mod elementwise;
mod random;
mod reduce;
mod reduce3;

pub use broadcast::{exec_broadcast, exec_broadcast_bool};
pub use elementwise::{
    exec_pairwise_bool_transform, exec_pairwise_transform, exec_scalar, exec_scalar_bool,
    exec_scalar_bool_tad, exec_scalar_tad, exec_transform, exec_transform_any,
    exec_transform_bool, exec_transform_float, exec_transform_same, exec_transform_strict,
};
pub use random::exec_random;
pub use reduce::{
    exec_index_reduce, exec_index_reduce_scalar, exec_reduce, exec_reduce_bool,
    exec_reduce_bool_scalar, exec_reduce_float, exec_reduce_float_scalar, exec_reduce_long,
    exec_reduce_long_scalar, exec_reduce_same, exec_reduce_same_scalar, exec_summary_stats,
    exec_summary_stats_scalar,
};
pub use reduce3::{exec_reduce3, exec_reduce3_all, exec_reduce3_scalar, exec_reduce3_tad};

pub(crate) use elementwise::{
    binary_indexed_kernel, binary_kernel, gather_kernel, read_values, ternary_kernel,
    unary_indexed_kernel, unary_kernel,
};

/// Borrowed operand: a buffer, the head offset of the view and its shape.
#[derive(Clone, Copy, Debug)]
pub struct ArrayRef<'a> {
    buffer: &'a DataBuffer,
    offset: usize,
    shape: &'a ShapeInfo,
}

impl<'a> ArrayRef<'a> {
    /// Check that the shape's type tag matches the buffer and that every
    /// addressed element lies inside it.
    pub fn new(buffer: &'a DataBuffer, offset: usize, shape: &'a ShapeInfo) -> Result<Self> {
        if buffer.dtype() != shape.dtype() {
            return Err(NdError::type_mismatch(
                "operand",
                format!("buffer holds {}, shape says {}", buffer.dtype(), shape.dtype()),
            ));
        }
        shape.validate_bounds("operand", buffer.len(), offset)?;
        Ok(Self {
            buffer,
            offset,
            shape,
        })
    }

    #[inline]
    pub fn buffer(&self) -> &'a DataBuffer {
        self.buffer
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn shape(&self) -> &'a ShapeInfo {
        self.shape
    }

    #[inline]
    pub fn dtype(&self) -> DataType {
        self.shape.dtype()
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.shape.length()
    }

    fn shares_buffer(&self, other: &ArrayRef<'_>) -> bool {
        std::ptr::eq(self.buffer, other.buffer)
    }

    /// Same head and the same stride along every non-unit axis, so both
    /// address the same element at every multi-index.
    fn same_elements(&self, other: &ArrayRef<'_>) -> bool {
        let (a, b) = (self.shape, other.shape);
        self.offset == other.offset
            && a.dims() == b.dims()
            && a.dims()
                .iter()
                .zip(a.strides().iter().zip(b.strides()))
                .all(|(&d, (sa, sb))| d <= 1 || sa == sb)
    }
}

// ============================================================================
// Shared validation
// ============================================================================

pub(crate) fn require_len(op: &'static str, a: &ArrayRef<'_>, expected: usize) -> Result<()> {
    if a.length() != expected {
        return Err(NdError::ShapeMismatch {
            op,
            left: a.shape.dims().to_vec(),
            right: vec![expected],
        });
    }
    Ok(())
}

pub(crate) fn require_same_dims(op: &'static str, a: &ArrayRef<'_>, b: &ArrayRef<'_>) -> Result<()> {
    if a.shape.dims() != b.shape.dims() {
        return Err(NdError::shape_mismatch(op, a.shape.dims(), b.shape.dims()));
    }
    Ok(())
}

/// A destination must address every element at a distinct position.
pub(crate) fn require_writable(op: &'static str, z: &ArrayRef<'_>) -> Result<()> {
    let overlapping = z
        .shape
        .dims()
        .iter()
        .zip(z.shape.strides())
        .any(|(&d, &s)| d > 1 && s == 0);
    if overlapping {
        return Err(NdError::invalid(
            op,
            "destination has a zero stride along a non-unit axis",
        ));
    }
    Ok(())
}

/// Reductions write positions that other iterations still read, so the
/// destination may not share a buffer with a source.
pub(crate) fn require_distinct(op: &'static str, z: &ArrayRef<'_>, sources: &[&ArrayRef<'_>]) -> Result<()> {
    if sources.iter().any(|s| s.shares_buffer(z)) {
        return Err(NdError::invalid(op, "destination aliases a source buffer"));
    }
    Ok(())
}

/// Element-wise kernels update in place only when every source that shares
/// the destination buffer maps each index to the destination's own element.
pub(crate) fn require_in_place(op: &'static str, z: &ArrayRef<'_>, sources: &[&ArrayRef<'_>]) -> Result<()> {
    if sources.iter().any(|s| s.shares_buffer(z) && !s.same_elements(z)) {
        return Err(NdError::invalid(
            op,
            "source overlaps the destination under a different layout",
        ));
    }
    Ok(())
}

pub(crate) fn log_dispatch(op: OpCode, types: &[DataType]) {
    tracing::debug!(%op, ?types, "dispatch");
}

// ============================================================================
// Tad plumbing
// ============================================================================

/// Tad pack of `a` along `axes`, served by the context cache.
pub(crate) fn tad_pack(ctx: &LaunchContext, a: &ArrayRef<'_>, axes: &[isize]) -> Result<Arc<TadPack>> {
    ctx.tad_pack(a.shape, axes)
}

/// Number of outer positions of a pack; nonzero even when the tads are
/// empty.
pub(crate) fn outer_count(shape: &ShapeInfo, pack: &TadPack) -> usize {
    shape
        .dims()
        .iter()
        .enumerate()
        .filter(|(k, _)| !pack.axes().contains(k))
        .map(|(_, &d)| d)
        .product()
}

/// Run `f(t, par)` for every tad index `t`.
///
/// Above the tad threshold the tads are spread over workers and `par` is
/// `None`, so the per-tad loop stays on its worker; otherwise `par` is the
/// context and the per-tad loop may fan out over elements.
pub(crate) fn for_each_tad<F>(ctx: &LaunchContext, num_tads: usize, f: F)
where
    F: Fn(usize, Option<&LaunchContext>) + MaybeSync + MaybeSend,
{
    if ctx.parallel_tads(num_tads) {
        tracing::trace!(num_tads, "tads in parallel");
        par_for_ranges(num_tads, 1, |range| {
            for t in range {
                f(t, None);
            }
        });
    } else {
        for t in 0..num_tads {
            f(t, Some(ctx));
        }
    }
}

/// Typed pointers for one source and one destination.
pub(crate) fn io_ptrs<X: Element, Z: Element>(
    op: &'static str,
    locks: &LockedBuffers<'_>,
    x: &ArrayRef<'_>,
    z: &ArrayRef<'_>,
) -> Result<(SendPtr<X>, SendPtr<Z>)> {
    let xp = SendPtr::from_const(locks.ptr::<X>(op, x.buffer, x.offset)?);
    let zp = SendPtr(locks.ptr_mut::<Z>(op, z.buffer, z.offset)?);
    Ok((xp, zp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndexec_shape::Order;

    #[test]
    fn test_array_ref_checks_type_and_bounds() {
        let buf = DataBuffer::from_vec(vec![1.0f32; 6]).unwrap();
        let shape = ShapeInfo::new(&[2, 3], Order::C, DataType::Float).unwrap();
        assert!(ArrayRef::new(&buf, 0, &shape).is_ok());
        assert!(matches!(
            ArrayRef::new(&buf, 1, &shape),
            Err(NdError::OffsetOverflow { .. })
        ));
        let wrong = shape.with_dtype(DataType::Double);
        assert!(matches!(
            ArrayRef::new(&buf, 0, &wrong),
            Err(NdError::DataTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_zero_stride_destination_rejected() {
        let buf = DataBuffer::from_vec(vec![0.0f64; 3]).unwrap();
        let row = ShapeInfo::new(&[3], Order::C, DataType::Double).unwrap();
        let spread = row.broadcast_to(&[2, 3]).unwrap();
        let z = ArrayRef::new(&buf, 0, &spread).unwrap();
        assert!(require_writable("test", &z).is_err());
        let z = ArrayRef::new(&buf, 0, &row).unwrap();
        assert!(require_writable("test", &z).is_ok());
    }

    #[test]
    fn test_in_place_requires_identical_layout() {
        let buf = DataBuffer::from_vec(vec![1.0f64, 2.0, 3.0, 4.0]).unwrap();
        let square = ShapeInfo::new(&[2, 2], Order::C, DataType::Double).unwrap();
        let transposed = square.permuted(&[1, 0]).unwrap();
        let z = ArrayRef::new(&buf, 0, &square).unwrap();
        let same = ArrayRef::new(&buf, 0, &square).unwrap();
        assert!(require_in_place("test", &z, &[&same]).is_ok());

        let t = ArrayRef::new(&buf, 0, &transposed).unwrap();
        assert!(matches!(
            require_in_place("test", &z, &[&same, &t]),
            Err(NdError::InvalidArgument { .. })
        ));

        let pair = ShapeInfo::new(&[2], Order::C, DataType::Double).unwrap();
        let head = ArrayRef::new(&buf, 0, &pair).unwrap();
        let tail = ArrayRef::new(&buf, 1, &pair).unwrap();
        assert!(require_in_place("test", &head, &[&tail]).is_err());

        let other = DataBuffer::from_vec(vec![0.0f64; 4]).unwrap();
        let elsewhere = ArrayRef::new(&other, 0, &transposed).unwrap();
        assert!(require_in_place("test", &z, &[&elsewhere]).is_ok());
    }

    #[test]
    fn test_outer_count_with_empty_tads() {
        let shape = ShapeInfo::new(&[0, 3], Order::C, DataType::Float).unwrap();
        let pack = TadPack::build(&shape, &[0]).unwrap();
        assert_eq!(pack.num_tads(), 0);
        assert_eq!(outer_count(&shape, &pack), 3);
    }
}
