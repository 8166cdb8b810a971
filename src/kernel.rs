//! Strided iteration engine.
//!
//! Every element-wise kernel of the executor funnels through this module:
//!
//! 1. Order the axes by importance (smallest stride first, the destination
//!    weighted twice), dropping unit extents.
//! 2. Fuse neighbouring axes that are contiguous for every operand.
//! 3. Walk the outer axes odometer-style and hand the innermost run to the
//!    callback as `(offsets, len, inner_strides)`.
//!
//! Offsets and strides are counted in elements.

use smallvec::SmallVec;

/// Stack-allocated vector for per-axis and per-operand data.
pub(crate) type SVec<T> = SmallVec<[T; 8]>;

/// Ordered, fused iteration space shared by a fixed set of operands.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct KernelPlan {
    /// Extents, innermost first.
    pub(crate) dims: SVec<usize>,
    /// Per-operand strides, aligned with `dims`.
    pub(crate) strides: SmallVec<[SVec<isize>; 4]>,
}

impl KernelPlan {
    /// Plan the traversal of operands sharing `dims`.
    ///
    /// `dest_index` names the operand written by the kernel; its layout
    /// dominates the traversal order.
    pub(crate) fn new(dims: &[usize], strides_list: &[&[isize]], dest_index: Option<usize>) -> Self {
        let order = compute_order(dims, strides_list, dest_index);

        let mut planned_dims: SVec<usize> = order.iter().map(|&k| dims[k]).collect();
        let mut planned_strides: SmallVec<[SVec<isize>; 4]> = strides_list
            .iter()
            .map(|s| order.iter().map(|&k| s[k]).collect())
            .collect();
        fuse_ordered(&mut planned_dims, &mut planned_strides);

        Self {
            dims: planned_dims,
            strides: planned_strides,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub(crate) fn operands(&self) -> usize {
        self.strides.len()
    }
}

// ============================================================================
// Ordering and fusion
// ============================================================================

/// Rank (1-based) of every axis when strides are sorted by magnitude.
/// Ties keep the axis order.
pub(crate) fn index_order(strides: &[isize]) -> SVec<usize> {
    strides
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let s = s.unsigned_abs();
            1 + strides
                .iter()
                .enumerate()
                .filter(|&(j, t)| {
                    let t = t.unsigned_abs();
                    t < s || (t == s && j < i)
                })
                .count()
        })
        .collect()
}

/// Importance of every axis; the destination counts twice and unit
/// extents get zero.
fn compute_importance(
    dims: &[usize],
    strides_list: &[&[isize]],
    dest_index: Option<usize>,
) -> SVec<u128> {
    let n = dims.len();
    let m = strides_list.len();
    let g = u32::BITS - (m as u32 + 1).leading_zeros();

    let mut importance: SVec<u128> = SmallVec::from_elem(0, n);
    for (a, strides) in strides_list.iter().enumerate() {
        let weight: u128 = if dest_index == Some(a) { 2 } else { 1 };
        for (i, rank) in index_order(strides).into_iter().enumerate() {
            let shift = g * (n - rank) as u32;
            importance[i] =
                importance[i].saturating_add(weight * 1u128.checked_shl(shift).unwrap_or(0));
        }
    }
    for (imp, &d) in importance.iter_mut().zip(dims) {
        if d <= 1 {
            *imp = 0;
        }
    }
    importance
}

/// Axes to traverse, innermost first. Unit extents are left out.
pub(crate) fn compute_order(
    dims: &[usize],
    strides_list: &[&[isize]],
    dest_index: Option<usize>,
) -> SVec<usize> {
    let mut order: SVec<usize> = (0..dims.len()).filter(|&k| dims[k] != 1).collect();
    if strides_list.is_empty() {
        return order;
    }
    let importance = compute_importance(dims, strides_list, dest_index);
    order.sort_by(|&a, &b| importance[b].cmp(&importance[a]).then(a.cmp(&b)));
    order
}

/// Merge axis `i + 1` into axis `i` whenever every operand steps through
/// them as one contiguous run.
fn fuse_ordered(dims: &mut SVec<usize>, strides: &mut SmallVec<[SVec<isize>; 4]>) {
    let mut i = 0;
    while i + 1 < dims.len() {
        let d = dims[i] as isize;
        let fusable = strides.iter().all(|s| s[i + 1] == d * s[i]);
        if fusable {
            dims[i] *= dims[i + 1];
            dims.remove(i + 1);
            for s in strides.iter_mut() {
                s.remove(i + 1);
            }
        } else {
            i += 1;
        }
    }
}

/// Splitting cost per planned axis: twice the smallest stride, 1 for
/// broadcast axes.
pub(crate) fn compute_costs(plan: &KernelPlan) -> SVec<isize> {
    (0..plan.dims.len())
        .map(|k| {
            let min = plan
                .strides
                .iter()
                .map(|s| s[k].abs())
                .min()
                .unwrap_or(0);
            if min == 0 {
                1
            } else {
                min * 2
            }
        })
        .collect()
}

// ============================================================================
// Traversal
// ============================================================================

/// Walk the region `dims` of a plan starting at `initial_offsets`.
///
/// The callback receives the offsets of the first element of each innermost
/// run, the run length and the innermost strides.
pub(crate) fn for_each_inner_block<F>(
    dims: &[usize],
    strides: &[SVec<isize>],
    initial_offsets: &[isize],
    mut f: F,
) where
    F: FnMut(&[isize], usize, &[isize]),
{
    let num_operands = strides.len();
    let mut offsets: SVec<isize> = SmallVec::from_slice(initial_offsets);

    if dims.iter().any(|&d| d == 0) {
        return;
    }
    if dims.is_empty() {
        let zeros: SVec<isize> = SmallVec::from_elem(0, num_operands);
        f(&offsets, 1, &zeros);
        return;
    }

    let inner_len = dims[0];
    let inner_strides: SVec<isize> = strides.iter().map(|s| s[0]).collect();
    let outer = &dims[1..];
    let mut counter: SVec<usize> = SmallVec::from_elem(0, outer.len());

    loop {
        f(&offsets, inner_len, &inner_strides);

        // Advance the odometer over the outer axes.
        let mut k = 0;
        loop {
            if k == outer.len() {
                return;
            }
            counter[k] += 1;
            for (o, s) in offsets.iter_mut().zip(strides) {
                *o += s[k + 1];
            }
            if counter[k] < outer[k] {
                break;
            }
            for (o, s) in offsets.iter_mut().zip(strides) {
                *o -= outer[k] as isize * s[k + 1];
            }
            counter[k] = 0;
            k += 1;
        }
    }
}

/// Walk a whole plan sequentially.
#[inline]
pub(crate) fn run_plan<F>(plan: &KernelPlan, initial_offsets: &[isize], f: F)
where
    F: FnMut(&[isize], usize, &[isize]),
{
    for_each_inner_block(&plan.dims, &plan.strides, initial_offsets, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(plan: &KernelPlan) -> Vec<(Vec<isize>, usize)> {
        let start = vec![0isize; plan.operands()];
        let mut out = Vec::new();
        run_plan(plan, &start, |offs, len, _| out.push((offs.to_vec(), len)));
        out
    }

    #[test]
    fn test_index_order() {
        assert_eq!(index_order(&[12, 4, 1]).as_slice(), &[3, 2, 1]);
        assert_eq!(index_order(&[1, 3]).as_slice(), &[1, 2]);
        assert_eq!(index_order(&[0, 0]).as_slice(), &[1, 2]);
    }

    #[test]
    fn test_order_row_major_puts_last_axis_first() {
        let order = compute_order(&[4, 5], &[&[5, 1]], Some(0));
        assert_eq!(order.as_slice(), &[1, 0]);
    }

    #[test]
    fn test_order_follows_destination() {
        // destination column-major, source row-major
        let order = compute_order(&[4, 5], &[&[1, 4], &[5, 1]], Some(0));
        assert_eq!(order[0], 0);
    }

    #[test]
    fn test_order_skips_unit_axes() {
        let order = compute_order(&[1, 3, 1], &[&[3, 1, 1]], Some(0));
        assert_eq!(order.as_slice(), &[1]);
    }

    #[test]
    fn test_contiguous_plan_fuses_to_one_run() {
        let plan = KernelPlan::new(&[2, 3, 4], &[&[12, 4, 1], &[12, 4, 1]], Some(0));
        assert_eq!(plan.dims.as_slice(), &[24]);
        assert_eq!(collect(&plan), vec![(vec![0, 0], 24)]);
    }

    #[test]
    fn test_transposed_source_is_not_fused() {
        let plan = KernelPlan::new(&[2, 3], &[&[3, 1], &[1, 2]], Some(0));
        assert_eq!(plan.dims.as_slice(), &[3, 2]);
        let runs = collect(&plan);
        assert_eq!(runs, vec![(vec![0, 0], 3), (vec![3, 1], 3)]);
    }

    #[test]
    fn test_every_element_visited_once() {
        let dims = [3usize, 4, 5];
        let strides = [1isize, 3, 12];
        let src = [20isize, 5, 1];
        let plan = KernelPlan::new(&dims, &[&strides, &src], Some(0));
        let mut seen = vec![0u32; 60];
        run_plan(&plan, &[0, 0], |offs, len, inner| {
            for k in 0..len as isize {
                seen[(offs[0] + k * inner[0]) as usize] += 1;
            }
        });
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_empty_and_rank_zero() {
        let plan = KernelPlan::new(&[2, 0], &[&[0, 1]], Some(0));
        assert!(collect(&plan).is_empty());

        let plan = KernelPlan::new(&[], &[&[], &[]], Some(0));
        assert_eq!(collect(&plan), vec![(vec![0, 0], 1)]);
    }

    #[test]
    fn test_costs() {
        let plan = KernelPlan {
            dims: SmallVec::from_slice(&[4, 5]),
            strides: SmallVec::from_vec(vec![
                SmallVec::from_slice(&[1, 0]),
                SmallVec::from_slice(&[2, 4]),
            ]),
        };
        assert_eq!(compute_costs(&plan).as_slice(), &[2, 1]);
    }
}
