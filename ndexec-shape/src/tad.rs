//! Tensor-along-dimension decomposition.

use std::sync::Arc;

use crate::helpers::normalize_axes;
use crate::shape_info::{Order, ShapeInfo};
use crate::{NdError, Result};

/// Decomposition of an array into equally shaped sub-arrays ("tads").
///
/// Every tad shares `tad_shape`; tad `i` starts at `offsets[i]` relative to
/// the parent's head offset. Tads are enumerated row-major over the axes
/// that were *not* selected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TadPack {
    tad_shape: ShapeInfo,
    offsets: Arc<[isize]>,
    axes: Arc<[usize]>,
}

impl TadPack {
    /// Build the pack of `shape` along `axes` (negative axes allowed).
    pub fn build(shape: &ShapeInfo, axes: &[isize]) -> Result<Self> {
        if axes.is_empty() {
            return Err(NdError::invalid("tad", "empty axis list"));
        }
        let axes = normalize_axes("tad", shape.rank(), axes)?;
        Self::build_normalized(shape, &axes)
    }

    pub(crate) fn build_normalized(shape: &ShapeInfo, axes: &[usize]) -> Result<Self> {
        let dims = shape.dims();
        let strides = shape.strides();

        let tad_dims: Vec<usize> = axes.iter().map(|&k| dims[k]).collect();
        let tad_strides: Vec<isize> = axes.iter().map(|&k| strides[k]).collect();
        let tad_shape =
            ShapeInfo::with_strides(&tad_dims, &tad_strides, shape.order(), shape.dtype())?;

        let outer: Vec<usize> = (0..shape.rank()).filter(|k| !axes.contains(k)).collect();
        let outer_dims: Vec<usize> = outer.iter().map(|&k| dims[k]).collect();
        let outer_strides: Vec<isize> = outer.iter().map(|&k| strides[k]).collect();
        let outer_shape =
            ShapeInfo::with_strides(&outer_dims, &outer_strides, Order::C, shape.dtype())?;

        let num_tads = if tad_shape.is_empty() {
            0
        } else {
            outer_shape.length()
        };
        let offsets: Vec<isize> = (0..num_tads)
            .map(|i| outer_shape.offset_of(&outer_shape.coords_of(i, Order::C)))
            .collect();

        Ok(Self {
            tad_shape,
            offsets: Arc::from(offsets),
            axes: Arc::from(axes),
        })
    }

    #[inline]
    pub fn tad_shape(&self) -> &ShapeInfo {
        &self.tad_shape
    }

    #[inline]
    pub fn offsets(&self) -> &[isize] {
        &self.offsets
    }

    /// Normalized axes the pack was built along.
    #[inline]
    pub fn axes(&self) -> &[usize] {
        &self.axes
    }

    #[inline]
    pub fn num_tads(&self) -> usize {
        self.offsets.len()
    }

    #[inline]
    pub fn tad_length(&self) -> usize {
        self.tad_shape.length()
    }
}
