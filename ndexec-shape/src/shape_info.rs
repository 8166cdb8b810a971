//! Shape descriptors and the element addressing formula.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::{DataType, NdError, Result};

/// Highest supported rank.
pub const MAX_RANK: usize = 32;

/// Stack-allocated multi-index; covers rank 8 without touching the heap.
pub type Coords = SmallVec<[usize; 8]>;

// ============================================================================
// Ordering
// ============================================================================

/// Memory ordering of an array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Order {
    /// Row-major: last axis varies fastest.
    #[default]
    C,
    /// Column-major: first axis varies fastest.
    F,
}

impl Order {
    /// Parse the `'c'` / `'f'` tokens (case-insensitive).
    pub fn from_char(c: char) -> Result<Self> {
        match c {
            'c' | 'C' => Ok(Order::C),
            'f' | 'F' => Ok(Order::F),
            other => Err(NdError::invalid(
                "order",
                format!("unknown ordering token '{other}'"),
            )),
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Order::C => 'c',
            Order::F => 'f',
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

// ============================================================================
// Default strides
// ============================================================================

/// Compute column-major strides (first index varies fastest).
pub fn col_major_strides(dims: &[usize]) -> Vec<isize> {
    let rank = dims.len();
    if rank == 0 {
        return vec![];
    }
    let mut strides = vec![1isize; rank];
    for i in 1..rank {
        strides[i] = strides[i - 1] * dims[i - 1].max(1) as isize;
    }
    strides
}

/// Compute row-major strides (last index varies fastest).
pub fn row_major_strides(dims: &[usize]) -> Vec<isize> {
    let rank = dims.len();
    if rank == 0 {
        return vec![];
    }
    let mut strides = vec![1isize; rank];
    for i in (0..rank - 1).rev() {
        strides[i] = strides[i + 1] * dims[i + 1].max(1) as isize;
    }
    strides
}

pub fn default_strides(dims: &[usize], order: Order) -> Vec<isize> {
    match order {
        Order::C => row_major_strides(dims),
        Order::F => col_major_strides(dims),
    }
}

/// Element-wise stride: `Some(k)` when the strides are `k` times the dense
/// strides of `order` (unit extents ignored), `None` otherwise.
fn compute_ews(dims: &[usize], strides: &[isize], order: Order) -> Option<usize> {
    if dims.iter().any(|&d| d == 0) {
        return Some(1);
    }
    let axes: SmallVec<[usize; 8]> = match order {
        Order::C => (0..dims.len()).rev().filter(|&k| dims[k] > 1).collect(),
        Order::F => (0..dims.len()).filter(|&k| dims[k] > 1).collect(),
    };
    let Some(&inner) = axes.first() else {
        return Some(1);
    };
    let step = strides[inner];
    if step <= 0 {
        return None;
    }
    let mut expected = step;
    for &k in &axes {
        if strides[k] != expected {
            return None;
        }
        expected = expected.checked_mul(dims[k] as isize)?;
    }
    Some(step as usize)
}

// ============================================================================
// ShapeInfo
// ============================================================================

/// Shape descriptor: extents, strides (in elements), ordering, element-wise
/// stride and element type.
///
/// The descriptor does not carry the head offset of a view; that lives with
/// the array so that one descriptor can be shared by every tad of a pack.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShapeInfo {
    dims: Arc<[usize]>,
    strides: Arc<[isize]>,
    order: Order,
    ews: Option<usize>,
    dtype: DataType,
}

impl ShapeInfo {
    /// Dense descriptor with the default strides of `order`.
    pub fn new(dims: &[usize], order: Order, dtype: DataType) -> Result<Self> {
        let strides = default_strides(dims, order);
        Self::with_strides(dims, &strides, order, dtype)
    }

    /// Descriptor over explicit strides.
    pub fn with_strides(
        dims: &[usize],
        strides: &[isize],
        order: Order,
        dtype: DataType,
    ) -> Result<Self> {
        if dims.len() != strides.len() {
            return Err(NdError::invalid(
                "shape",
                format!(
                    "{} extents but {} strides",
                    dims.len(),
                    strides.len()
                ),
            ));
        }
        if dims.len() > MAX_RANK {
            return Err(NdError::invalid(
                "shape",
                format!("rank {} exceeds the maximum of {MAX_RANK}", dims.len()),
            ));
        }
        Ok(Self {
            ews: compute_ews(dims, strides, order),
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            order,
            dtype,
        })
    }

    /// Rank-0 descriptor.
    pub fn scalar(dtype: DataType) -> Self {
        Self {
            dims: Arc::from(Vec::new()),
            strides: Arc::from(Vec::new()),
            order: Order::C,
            ews: Some(1),
            dtype,
        }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn order(&self) -> Order {
        self.order
    }

    #[inline]
    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Element-wise stride, `None` when per-element offsets must be computed.
    #[inline]
    pub fn ews(&self) -> Option<usize> {
        self.ews
    }

    /// Dense with unit stride in its own ordering.
    #[inline]
    pub fn is_contiguous(&self) -> bool {
        self.ews == Some(1)
    }

    /// Total number of elements (1 for rank 0).
    #[inline]
    pub fn length(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|&d| d == 0)
    }

    /// A single element, whatever the rank.
    pub fn is_scalar(&self) -> bool {
        self.length() == 1
    }

    /// Rank 1, or rank 2 with a leading unit extent.
    pub fn is_row_vector(&self) -> bool {
        match self.rank() {
            1 => true,
            2 => self.dims[0] == 1,
            _ => false,
        }
    }

    /// Rank 2 with a trailing unit extent.
    pub fn is_column_vector(&self) -> bool {
        self.rank() == 2 && self.dims[1] == 1
    }

    /// Extent along `axis`; negative values count from the end.
    pub fn size_at(&self, axis: isize) -> Result<usize> {
        let rank = self.rank() as isize;
        let k = if axis < 0 { axis + rank } else { axis };
        if k < 0 || k >= rank {
            return Err(NdError::invalid(
                "size_at",
                format!("axis {axis} out of range for rank {rank}"),
            ));
        }
        Ok(self.dims[k as usize])
    }

    /// Same extents, strides and order with another element type.
    pub fn with_dtype(&self, dtype: DataType) -> Self {
        Self {
            dtype,
            ..self.clone()
        }
    }

    /// Same extents (strides, order and type ignored).
    pub fn equals_soft(&self, other: &ShapeInfo) -> bool {
        self.dims == other.dims
    }

    // ------------------------------------------------------------------------
    // Addressing
    // ------------------------------------------------------------------------

    /// Offset of a multi-index; the caller guarantees the index is in bounds.
    #[inline]
    pub fn offset_of(&self, coords: &[usize]) -> isize {
        coords
            .iter()
            .zip(self.strides.iter())
            .map(|(&i, &s)| i as isize * s)
            .sum()
    }

    /// Offset of a multi-index with rank and bounds checks.
    pub fn checked_offset(&self, op: &'static str, coords: &[usize]) -> Result<isize> {
        if coords.len() != self.rank() {
            return Err(NdError::RankMismatch {
                op,
                expected: self.rank(),
                actual: coords.len(),
            });
        }
        for (&i, &d) in coords.iter().zip(self.dims.iter()) {
            if i >= d {
                return Err(NdError::IndexOutOfRange {
                    op,
                    index: i,
                    bound: d,
                });
            }
        }
        Ok(self.offset_of(coords))
    }

    /// Expand a linear index into a multi-index, enumerating in `order`.
    pub fn coords_of(&self, index: usize, order: Order) -> Coords {
        let rank = self.rank();
        let mut coords: Coords = SmallVec::from_elem(0, rank);
        let mut rest = index;
        match order {
            Order::C => {
                for k in (0..rank).rev() {
                    let d = self.dims[k].max(1);
                    coords[k] = rest % d;
                    rest /= d;
                }
            }
            Order::F => {
                for k in 0..rank {
                    let d = self.dims[k].max(1);
                    coords[k] = rest % d;
                    rest /= d;
                }
            }
        }
        coords
    }

    /// Offset of the `index`-th element in the array's own ordering.
    #[inline]
    pub fn index_offset(&self, index: usize) -> isize {
        if let Some(ews) = self.ews {
            return (index * ews) as isize;
        }
        self.offset_of(&self.coords_of(index, self.order))
    }

    /// Offset of the `index`-th element when enumerating in `order`.
    #[inline]
    pub fn index_offset_in(&self, index: usize, order: Order) -> isize {
        if order == self.order || self.rank() <= 1 {
            return self.index_offset(index);
        }
        self.offset_of(&self.coords_of(index, order))
    }

    /// Smallest and largest relative offsets touched, `None` when empty.
    pub fn offset_span(&self) -> Option<(isize, isize)> {
        if self.is_empty() {
            return None;
        }
        let mut lo = 0isize;
        let mut hi = 0isize;
        for (&d, &s) in self.dims.iter().zip(self.strides.iter()) {
            if d > 1 {
                let end = s * (d as isize - 1);
                if end >= 0 {
                    hi += end;
                } else {
                    lo += end;
                }
            }
        }
        Some((lo, hi))
    }

    /// Validate that every addressed element stays within `[0, len)` of a
    /// buffer when the view starts at `offset`.
    pub fn validate_bounds(&self, op: &'static str, len: usize, offset: usize) -> Result<()> {
        let Some((lo, hi)) = self.offset_span() else {
            return Ok(());
        };
        let base = isize::try_from(offset).map_err(|_| NdError::OffsetOverflow { op })?;
        let min = base.checked_add(lo).ok_or(NdError::OffsetOverflow { op })?;
        let max = base.checked_add(hi).ok_or(NdError::OffsetOverflow { op })?;
        if min < 0 || max as usize >= len {
            return Err(NdError::OffsetOverflow { op });
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Metadata transforms
    // ------------------------------------------------------------------------

    /// Reorder axes: axis `i` of the result is axis `perm[i]` of `self`.
    pub fn permuted(&self, perm: &[usize]) -> Result<Self> {
        let rank = self.rank();
        if perm.len() != rank {
            return Err(NdError::RankMismatch {
                op: "permute",
                expected: rank,
                actual: perm.len(),
            });
        }
        let mut seen = vec![false; rank];
        for &p in perm {
            if p >= rank {
                return Err(NdError::invalid(
                    "permute",
                    format!("axis {p} out of range for rank {rank}"),
                ));
            }
            if seen[p] {
                return Err(NdError::invalid(
                    "permute",
                    format!("axis {p} repeated in permutation"),
                ));
            }
            seen[p] = true;
        }
        let dims: Vec<usize> = perm.iter().map(|&p| self.dims[p]).collect();
        let strides: Vec<isize> = perm.iter().map(|&p| self.strides[p]).collect();
        Self::with_strides(&dims, &strides, self.order, self.dtype)
    }

    /// Reshape without copying, `None` when the layout forbids it.
    pub fn reshaped(&self, dims: &[usize], order: Order) -> Result<Option<Self>> {
        let new_len: usize = dims.iter().product();
        if new_len != self.length() {
            return Err(NdError::shape_mismatch("reshape", self.dims(), dims));
        }
        if dims == self.dims() && order == self.order {
            return Ok(Some(self.clone()));
        }
        if self.length() <= 1 || (self.is_contiguous() && order == self.order) {
            return Self::new(dims, order, self.dtype).map(Some);
        }
        Ok(None)
    }

    /// Expand to `target` extents by giving broadcast axes stride 0.
    ///
    /// Axes are aligned from the right; each source extent must equal the
    /// target extent or be 1.
    pub fn broadcast_to(&self, target: &[usize]) -> Result<Self> {
        let rank = self.rank();
        if target.len() < rank {
            return Err(NdError::shape_mismatch("broadcast", self.dims(), target));
        }
        let lead = target.len() - rank;
        let mut strides = vec![0isize; target.len()];
        for (k, &t) in target.iter().enumerate().skip(lead) {
            let d = self.dims[k - lead];
            if d == t {
                strides[k] = self.strides[k - lead];
            } else if d != 1 {
                return Err(NdError::shape_mismatch("broadcast", self.dims(), target));
            }
        }
        Self::with_strides(target, &strides, self.order, self.dtype)
    }
}

impl fmt::Display for ShapeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:?} strides={:?} order={} ews={}",
            self.dtype,
            self.dims(),
            self.strides(),
            self.order,
            self.ews.map_or(-1, |e| e as isize)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(dims: &[usize], order: Order) -> ShapeInfo {
        ShapeInfo::new(dims, order, DataType::Float).unwrap()
    }

    #[test]
    fn test_default_strides() {
        assert_eq!(row_major_strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(col_major_strides(&[2, 3, 4]), vec![1, 2, 6]);
        assert!(row_major_strides(&[]).is_empty());
    }

    #[test]
    fn test_ews_dense_and_strided() {
        assert_eq!(shape(&[2, 3], Order::C).ews(), Some(1));
        assert_eq!(shape(&[2, 3], Order::F).ews(), Some(1));
        let every_other =
            ShapeInfo::with_strides(&[2, 3], &[6, 2], Order::C, DataType::Float).unwrap();
        assert_eq!(every_other.ews(), Some(2));
        let column =
            ShapeInfo::with_strides(&[3], &[4], Order::C, DataType::Float).unwrap();
        assert_eq!(column.ews(), Some(4));
        let transposed = shape(&[2, 3], Order::C).permuted(&[1, 0]).unwrap();
        assert_eq!(transposed.ews(), None);
        let unit_axis =
            ShapeInfo::with_strides(&[1, 3], &[99, 1], Order::C, DataType::Float).unwrap();
        assert_eq!(unit_axis.ews(), Some(1));
    }

    #[test]
    fn test_scalar_offsets_to_base() {
        let s = ShapeInfo::scalar(DataType::Double);
        assert_eq!(s.rank(), 0);
        assert_eq!(s.length(), 1);
        assert_eq!(s.offset_of(&[]), 0);
        assert_eq!(s.index_offset(0), 0);
    }

    #[test]
    fn test_index_offset_follows_ordering() {
        let c = shape(&[2, 3], Order::C);
        let f = shape(&[2, 3], Order::F);
        // element (1, 0)
        assert_eq!(c.offset_of(&[1, 0]), 3);
        assert_eq!(f.offset_of(&[1, 0]), 1);
        // logical row-major index 3 is (1, 0) in both
        assert_eq!(f.index_offset_in(3, Order::C), 1);
        assert_eq!(c.index_offset_in(3, Order::C), 3);
        // f-order linear index 1 is also (1, 0)
        assert_eq!(f.index_offset(1), 1);
    }

    #[test]
    fn test_strided_index_offset_matches_formula() {
        let t = shape(&[3, 4], Order::C).permuted(&[1, 0]).unwrap();
        for i in 0..12 {
            let coords = t.coords_of(i, Order::C);
            assert_eq!(t.index_offset(i), (coords[0] + coords[1] * 4) as isize);
        }
    }

    #[test]
    fn test_checked_offset() {
        let s = shape(&[2, 2], Order::C);
        assert_eq!(s.checked_offset("e", &[1, 1]).unwrap(), 3);
        assert!(matches!(
            s.checked_offset("e", &[2, 0]),
            Err(NdError::IndexOutOfRange { index: 2, bound: 2, .. })
        ));
        assert!(matches!(
            s.checked_offset("e", &[0]),
            Err(NdError::RankMismatch { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn test_validate_bounds() {
        let s = shape(&[2, 3], Order::C);
        assert!(s.validate_bounds("view", 6, 0).is_ok());
        assert!(s.validate_bounds("view", 6, 1).is_err());
        let rev = ShapeInfo::with_strides(&[3], &[-1], Order::C, DataType::Float).unwrap();
        assert!(rev.validate_bounds("view", 3, 2).is_ok());
        assert!(rev.validate_bounds("view", 3, 1).is_err());
    }

    #[test]
    fn test_permuted_rejects_bad_perm() {
        let s = shape(&[2, 3, 4], Order::C);
        assert!(s.permuted(&[0, 0, 1]).is_err());
        assert!(s.permuted(&[0, 1]).is_err());
        let p = s.permuted(&[2, 0, 1]).unwrap();
        assert_eq!(p.dims(), &[4, 2, 3]);
        assert_eq!(p.strides(), &[1, 12, 4]);
    }

    #[test]
    fn test_reshaped() {
        let s = shape(&[2, 6], Order::C);
        let r = s.reshaped(&[3, 4], Order::C).unwrap().unwrap();
        assert_eq!(r.strides(), &[4, 1]);
        let t = s.permuted(&[1, 0]).unwrap();
        assert!(t.reshaped(&[12], Order::C).unwrap().is_none());
        assert!(s.reshaped(&[5], Order::C).is_err());
    }

    #[test]
    fn test_broadcast_to() {
        let row = shape(&[1, 3], Order::C);
        let b = row.broadcast_to(&[4, 3]).unwrap();
        assert_eq!(b.strides(), &[0, 1]);
        assert_eq!(b.ews(), None);
        let v = shape(&[3], Order::C).broadcast_to(&[2, 3]).unwrap();
        assert_eq!(v.strides(), &[0, 1]);
        assert!(shape(&[2], Order::C).broadcast_to(&[3]).is_err());
    }

    #[test]
    fn test_order_tokens() {
        assert_eq!(Order::from_char('c').unwrap(), Order::C);
        assert_eq!(Order::from_char('F').unwrap(), Order::F);
        assert!(Order::from_char('a').is_err());
    }
}
