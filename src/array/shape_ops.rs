//! Copies, layout transforms, tiling and sub-array extraction.

use std::sync::Arc;

use ndexec_shape::{
    normalize_axes, repeat_shape, sub_array_offset, tile_shape, NdError, Order, Result, ShapeInfo,
};

use super::NdArray;
use crate::dispatch::{dispatch_numeric, unsupported};
use crate::executor::{exec_transform_any, gather_kernel, ArrayRef};
use crate::maybe_sync::{MaybeSend, MaybeSync};
use crate::ops::TransformAnyOp;

const TILE: &str = "tile";
const REPEAT: &str = "repeat";

impl NdArray {
    // ------------------------------------------------------------------------
    // Copies
    // ------------------------------------------------------------------------

    /// Copy `source` into this array, converting element types.
    ///
    /// A single-element source is spread over every element. Otherwise the
    /// lengths must match; equal extents pair by multi-index, anything else
    /// by linear index in this array's ordering. A source viewing this
    /// array's buffer under another layout is copied out first.
    pub fn assign(&self, source: &NdArray) -> Result<()> {
        if self.dtype().is_string() || source.dtype().is_string() {
            return self.assign_strings(source);
        }
        let snapshot;
        let source = if self.overlaps(source) {
            snapshot = source.dup()?;
            &snapshot
        } else {
            source
        };
        let z = self.operand()?;
        if source.length() == 1 && self.length() != 1 {
            let strides = vec![0isize; self.rank()];
            let spread =
                ShapeInfo::with_strides(self.dims(), &strides, self.ordering(), source.dtype())?;
            let x = ArrayRef::new(&source.buffer, source.offset, &spread)?;
            return exec_transform_any(&self.context, TransformAnyOp::Assign, x, z);
        }
        exec_transform_any(&self.context, TransformAnyOp::Assign, source.operand()?, z)
    }

    /// Shares a buffer with `other` without addressing the same elements
    /// at every index.
    fn overlaps(&self, other: &NdArray) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
            && !(self.offset == other.offset
                && self.dims() == other.dims()
                && self.strides() == other.strides())
    }

        fn assign_strings(&self, source: &NdArray) -> Result<()> {
        const OP: &str = "assign";
        if !(self.dtype().is_string() && source.dtype().is_string()) {
            return Err(NdError::UnsupportedOnStringArray { op: OP });
        }
        if self.length() != source.length() {
            return Err(NdError::shape_mismatch(OP, self.dims(), source.dims()));
        }
        for (i, value) in source.to_strings()?.into_iter().enumerate() {
            let coords = self.shape.coords_of(i, Order::C);
            let flat = self.shape.offset_of(&coords);
            self.p_string_at(OP, flat, value)?;
        }
        Ok(())
    }

    fn p_string_at(&self, op: &'static str, rel: isize, value: String) -> Result<()> {
        let index = usize::try_from(self.offset as isize + rel)
            .map_err(|_| NdError::OffsetOverflow { op })?;
        let mut storage = self.buffer.write();
        let slot = storage
            .strings_mut()
            .and_then(|s| s.get_mut(index))
            .ok_or(NdError::OffsetOverflow { op })?;
        *slot = value;
        Ok(())
    }

    /// Deep copy in this array's ordering.
    pub fn dup(&self) -> Result<NdArray> {
        self.dup_with_order(self.ordering())
    }

    /// Deep copy laid out in `order`.
    pub fn dup_with_order(&self, order: Order) -> Result<NdArray> {
        let out = self.allocate(ShapeInfo::new(self.dims(), order, self.dtype())?);
        out.assign(self)?;
        Ok(out)
    }

    /// Exchange the contents of two arrays of one type and length.
    pub fn swap_unsafe(&self, other: &NdArray) -> Result<()> {
        const OP: &str = "swap_unsafe";
        if self.dtype() != other.dtype() {
            return Err(NdError::type_mismatch(
                OP,
                format!("cannot swap {} with {}", self.dtype(), other.dtype()),
            ));
        }
        if self.is_empty() || other.is_empty() {
            return Err(NdError::invalid(OP, "arrays must not be empty"));
        }
        if self.length() != other.length() {
            return Err(NdError::shape_mismatch(OP, self.dims(), other.dims()));
        }
        let saved = self.dup()?;
        self.assign(other)?;
        other.assign(&saved)
    }

    // ------------------------------------------------------------------------
    // Layout
    // ------------------------------------------------------------------------

    /// View with axis `i` taken from axis `perm[i]`.
    pub fn permute(&self, perm: &[usize]) -> Result<NdArray> {
        Ok(self.view_of(self.offset, self.shape.permuted(perm)?))
    }

    /// Permute this handle's axes in place.
    pub fn permutei(&mut self, perm: &[usize]) -> Result<()> {
        self.shape = self.shape.permuted(perm)?;
        Ok(())
    }

    /// View with the axis order reversed.
    pub fn transpose(&self) -> Result<NdArray> {
        let perm: Vec<usize> = (0..self.rank()).rev().collect();
        self.permute(&perm)
    }

    /// Same elements under new extents, enumerated in `order`.
    ///
    /// Returns a view when the layout allows it and a copy otherwise.
    pub fn reshape(&self, dims: &[usize], order: Order) -> Result<NdArray> {
        if let Some(shape) = self.shape.reshaped(dims, order)? {
            return Ok(self.view_of(self.offset, shape));
        }
        tracing::trace!(from = ?self.dims(), to = ?dims, "reshape copies");
        let out = self.allocate(ShapeInfo::new(dims, order, self.dtype())?);
        out.assign(self)?;
        Ok(out)
    }

    // ------------------------------------------------------------------------
    // Tiling and repetition
    // ------------------------------------------------------------------------

    /// New array holding `reps` copies of this one along each axis.
    pub fn tile(&self, reps: &[usize]) -> Result<NdArray> {
        self.require_numeric(TILE)?;
        let out = self.allocate(tile_shape(&self.shape, reps)?);
        self.tile_into(&out)?;
        Ok(out)
    }

    /// New array of extents `dims`, each a multiple of the matching
    /// (right-aligned) extent of this array, filled by tiling.
    pub fn tile_to(&self, dims: &[usize]) -> Result<NdArray> {
        self.require_numeric(TILE)?;
        let out = self.allocate(ShapeInfo::new(dims, self.ordering(), self.dtype())?);
        self.tile_into(&out)?;
        Ok(out)
    }

    /// Fill `target` by tiling this array, converting to the target type.
    pub fn tile_into(&self, target: &NdArray) -> Result<()> {
        self.require_numeric(TILE)?;
        target.require_numeric(TILE)?;
        require_tileable(self.dims(), target.dims())?;
        let (x, z) = (self.operand()?, target.operand()?);
        let (xs, zs) = (&self.shape, &target.shape);
        self.gather(TILE, x, z, move |i| sub_array_offset(i, zs, xs))
    }

    /// New array with every slice along `axis` repeated.
    ///
    /// `reps` holds one count for all slices or one count per slice.
    pub fn repeat(&self, axis: isize, reps: &[usize]) -> Result<NdArray> {
        self.require_numeric(REPEAT)?;
        let axis = self.resolve_axis(REPEAT, axis)?;
        let out = self.allocate(repeat_shape(&self.shape, axis, reps)?);
        self.repeat_axis_into(axis, reps, &out)?;
        Ok(out)
    }

    /// Fill `target` with this array repeated along `axis`.
    pub fn repeat_into(&self, axis: isize, reps: &[usize], target: &NdArray) -> Result<()> {
        self.require_numeric(REPEAT)?;
        let axis = self.resolve_axis(REPEAT, axis)?;
        self.repeat_axis_into(axis, reps, target)
    }

    fn repeat_axis_into(&self, axis: usize, reps: &[usize], target: &NdArray) -> Result<()> {
        target.require_numeric(REPEAT)?;
        let expected = repeat_shape(&self.shape, axis, reps)?;
        if expected.dims() != target.dims() {
            return Err(NdError::shape_mismatch(REPEAT, expected.dims(), target.dims()));
        }
        // source slice feeding each position along the repeated axis
        let slice_of: Vec<usize> = if reps.len() == 1 {
            (0..expected.dims()[axis]).map(|c| c / reps[0]).collect()
        } else {
            reps.iter()
                .enumerate()
                .flat_map(|(k, &r)| std::iter::repeat(k).take(r))
                .collect()
        };
        let (x, z) = (self.operand()?, target.operand()?);
        let (xs, zs) = (&self.shape, &target.shape);
        self.gather(REPEAT, x, z, move |i| {
            let mut coords = zs.coords_of(i, Order::C);
            coords[axis] = slice_of[coords[axis]];
            xs.offset_of(&coords)
        })
    }

    fn gather<S>(&self, op: &'static str, x: ArrayRef<'_>, z: ArrayRef<'_>, source: S) -> Result<()>
    where
        S: Fn(usize) -> isize + MaybeSync + MaybeSend,
    {
        let types = [x.dtype(), z.dtype()];
        tracing::debug!(op, ?types, "gather");
        dispatch_numeric!(types[0], Err(unsupported(op, &types)), |X| {
            dispatch_numeric!(types[1], Err(unsupported(op, &types)), |Z| {
                gather_kernel::<X, Z, _>(Some(&self.context), op, x, z, source)
            })
        })
    }

    fn resolve_axis(&self, op: &'static str, axis: isize) -> Result<usize> {
        let axes = normalize_axes(op, self.rank(), &[axis])?;
        Ok(axes[0])
    }

    // ------------------------------------------------------------------------
    // Sub-arrays
    // ------------------------------------------------------------------------

    /// View of tad `index` along `axes`.
    pub fn tensor_along_dimension(&self, index: usize, axes: &[isize]) -> Result<NdArray> {
        const OP: &str = "tensor_along_dimension";
        let pack = self.context.tad_pack(&self.shape, axes)?;
        let start = pack.offsets().get(index).ok_or(NdError::IndexOutOfRange {
            op: OP,
            index,
            bound: pack.num_tads(),
        })?;
        let offset = usize::try_from(self.offset as isize + start)
            .map_err(|_| NdError::OffsetOverflow { op: OP })?;
        Ok(self.view_of(offset, pack.tad_shape().clone()))
    }

    /// Views of every tad along `axes`, in row-major tad order.
    pub fn tensors_along_dimension(&self, axes: &[isize]) -> Result<Vec<NdArray>> {
        let pack = self.context.tad_pack(&self.shape, axes)?;
        (0..pack.num_tads())
            .map(|t| self.tensor_along_dimension(t, axes))
            .collect()
    }
}

/// Every target extent (aligned from the right) must be a multiple of the
/// source extent; extra leading target axes are free.
fn require_tileable(src: &[usize], dst: &[usize]) -> Result<()> {
    let fits = dst.len() >= src.len()
        && src
            .iter()
            .rev()
            .zip(dst.iter().rev())
            .all(|(&s, &d)| if s == 0 { d == 0 } else { d % s == 0 });
    if !fits {
        return Err(NdError::invalid(
            TILE,
            format!("cannot tile {src:?} onto {dst:?}"),
        ));
    }
    Ok(())
}
