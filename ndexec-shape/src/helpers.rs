//! Shape construction for derived results.
//!
//! These routines compute the descriptor of a result array from its
//! sources (reductions, tiling, repetition, broadcasting) and never look at
//! element data. Callers treat their output as authoritative.

use smallvec::SmallVec;

use crate::shape_info::{Order, ShapeInfo};
use crate::{DataType, NdError, Result};

/// Resolve an axis list against `rank`: negative axes count from the end,
/// duplicates and out-of-range axes are rejected, the result is sorted.
pub fn normalize_axes(op: &'static str, rank: usize, axes: &[isize]) -> Result<Vec<usize>> {
    let mut out = Vec::with_capacity(axes.len());
    for &axis in axes {
        let k = if axis < 0 { axis + rank as isize } else { axis };
        if k < 0 || k >= rank as isize {
            return Err(NdError::invalid(
                op,
                format!("axis {axis} out of range for rank {rank}"),
            ));
        }
        let k = k as usize;
        if out.contains(&k) {
            return Err(NdError::invalid(op, format!("axis {axis} given twice")));
        }
        out.push(k);
    }
    out.sort_unstable();
    Ok(out)
}

/// Descriptor of a reduction of `shape` over `axes` (already normalized).
///
/// An empty axis list or one naming every axis reduces to a scalar. With
/// `keep_dims` the reduced axes stay as unit extents.
pub fn reduced_shape(
    shape: &ShapeInfo,
    axes: &[usize],
    keep_dims: bool,
    dtype: DataType,
) -> Result<ShapeInfo> {
    let rank = shape.rank();
    let whole = axes.is_empty() || axes.len() == rank;
    let dims: Vec<usize> = if keep_dims {
        (0..rank)
            .map(|k| {
                if whole || axes.contains(&k) {
                    1
                } else {
                    shape.dims()[k]
                }
            })
            .collect()
    } else if whole {
        Vec::new()
    } else {
        (0..rank)
            .filter(|k| !axes.contains(k))
            .map(|k| shape.dims()[k])
            .collect()
    };
    ShapeInfo::new(&dims, Order::C, dtype)
}

/// Descriptor of `shape` tiled by `reps`.
///
/// When `reps` is longer than the rank, unit extents are prepended to the
/// source; when shorter, unit repetitions are prepended to `reps`.
pub fn tile_shape(shape: &ShapeInfo, reps: &[usize]) -> Result<ShapeInfo> {
    if reps.iter().any(|&r| r == 0) {
        return Err(NdError::invalid("tile", "repetition count of zero"));
    }
    let rank = shape.rank().max(reps.len());
    let mut dims = vec![1usize; rank];
    let src_lead = rank - shape.rank();
    let rep_lead = rank - reps.len();
    for (k, dim) in dims.iter_mut().enumerate() {
        let src = if k >= src_lead {
            shape.dims()[k - src_lead]
        } else {
            1
        };
        let rep = if k >= rep_lead { reps[k - rep_lead] } else { 1 };
        *dim = src * rep;
    }
    ShapeInfo::new(&dims, shape.order(), shape.dtype())
}

/// Descriptor of `shape` with axis `axis` repeated.
///
/// `reps` holds either one count applied to every slice along `axis`, or
/// one count per slice.
pub fn repeat_shape(shape: &ShapeInfo, axis: usize, reps: &[usize]) -> Result<ShapeInfo> {
    if axis >= shape.rank() {
        return Err(NdError::invalid(
            "repeat",
            format!("axis {axis} out of range for rank {}", shape.rank()),
        ));
    }
    let extent = shape.dims()[axis];
    let new_extent = match reps.len() {
        1 => extent * reps[0],
        n if n == extent => reps.iter().sum(),
        n => {
            return Err(NdError::invalid(
                "repeat",
                format!("{n} repetition counts for an axis of extent {extent}"),
            ))
        }
    };
    if new_extent == 0 && extent != 0 {
        return Err(NdError::invalid("repeat", "repetition count of zero"));
    }
    let mut dims = shape.dims().to_vec();
    dims[axis] = new_extent;
    ShapeInfo::new(&dims, Order::C, shape.dtype())
}

/// Broadcast two shapes together (right-aligned, unit extents stretch).
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    let rank = a.len().max(b.len());
    let mut out = vec![1usize; rank];
    for (k, slot) in out.iter_mut().enumerate() {
        let da = if k + a.len() >= rank { a[k + a.len() - rank] } else { 1 };
        let db = if k + b.len() >= rank { b[k + b.len() - rank] } else { 1 };
        *slot = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => return Err(NdError::shape_mismatch("broadcast", a, b)),
        };
    }
    Ok(out)
}

/// Offset into `src` of the element feeding linear (row-major) index
/// `index` of `dst`, with every destination coordinate wrapped modulo the
/// matching source extent. Axes are aligned from the right.
pub fn sub_array_offset(index: usize, dst: &ShapeInfo, src: &ShapeInfo) -> isize {
    let coords = dst.coords_of(index, Order::C);
    let lead = dst.rank().saturating_sub(src.rank());
    let wrapped: SmallVec<[usize; 8]> = src
        .dims()
        .iter()
        .enumerate()
        .map(|(k, &d)| coords[k + lead] % d.max(1))
        .collect();
    src.offset_of(&wrapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(dims: &[usize]) -> ShapeInfo {
        ShapeInfo::new(dims, Order::C, DataType::Float).unwrap()
    }

    #[test]
    fn test_normalize_axes() {
        assert_eq!(normalize_axes("t", 3, &[-1, 0]).unwrap(), vec![0, 2]);
        assert!(normalize_axes("t", 3, &[3]).is_err());
        assert!(normalize_axes("t", 3, &[1, -2]).is_err());
    }

    #[test]
    fn test_reduced_shape() {
        let s = shape(&[2, 3, 4]);
        assert_eq!(reduced_shape(&s, &[1], false, DataType::Float).unwrap().dims(), &[2, 4]);
        assert_eq!(reduced_shape(&s, &[1], true, DataType::Float).unwrap().dims(), &[2, 1, 4]);
        assert_eq!(reduced_shape(&s, &[], false, DataType::Float).unwrap().rank(), 0);
        assert_eq!(
            reduced_shape(&s, &[0, 1, 2], true, DataType::Float).unwrap().dims(),
            &[1, 1, 1]
        );
    }

    #[test]
    fn test_tile_shape() {
        assert_eq!(tile_shape(&shape(&[3]), &[2]).unwrap().dims(), &[6]);
        assert_eq!(tile_shape(&shape(&[2, 3]), &[2]).unwrap().dims(), &[2, 6]);
        assert_eq!(tile_shape(&shape(&[3]), &[2, 2]).unwrap().dims(), &[2, 6]);
        assert!(tile_shape(&shape(&[3]), &[0]).is_err());
    }

    #[test]
    fn test_repeat_shape() {
        let s = shape(&[2, 3]);
        assert_eq!(repeat_shape(&s, 1, &[2]).unwrap().dims(), &[2, 6]);
        assert_eq!(repeat_shape(&s, 0, &[1, 3]).unwrap().dims(), &[4, 3]);
        assert!(repeat_shape(&s, 2, &[2]).is_err());
        assert!(repeat_shape(&s, 1, &[1, 2]).is_err());
    }

    #[test]
    fn test_broadcast_shape() {
        assert_eq!(broadcast_shape(&[2, 1], &[3]).unwrap(), vec![2, 3]);
        assert_eq!(broadcast_shape(&[], &[4]).unwrap(), vec![4]);
        assert!(broadcast_shape(&[2], &[3]).is_err());
    }

    #[test]
    fn test_sub_array_offset_wraps() {
        let src = shape(&[3]);
        let dst = shape(&[6]);
        let offsets: Vec<isize> = (0..6).map(|i| sub_array_offset(i, &dst, &src)).collect();
        assert_eq!(offsets, vec![0, 1, 2, 0, 1, 2]);

        let src = shape(&[2, 2]);
        let dst = shape(&[2, 4, 4]);
        // (1, 3, 2) wraps to (1, 0)
        let i = 16 + 3 * 4 + 2;
        assert_eq!(sub_array_offset(i, &dst, &src), 2);
    }
}
