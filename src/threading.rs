//! Rayon-backed parallel drivers.
//!
//! Two strategies are used:
//!
//! - [`for_each_inner_block_threaded`] splits a [`KernelPlan`] recursively
//!   along its costliest axis with `rayon::join` until each half is below
//!   the element threshold.
//! - [`par_fold_ranges`] cuts a linear index range into chunks, folds each
//!   chunk on a worker and merges the partial results in index order.
//!
//! Without the `parallel` feature both run sequentially on the calling
//! thread.

use std::ops::Range;

use smallvec::SmallVec;

use crate::kernel::{compute_costs, for_each_inner_block, KernelPlan, SVec};
use crate::maybe_sync::{MaybeSend, MaybeSync};

/// A raw pointer wrapper that is `Send` + `Sync`.
///
/// # Safety
/// The caller must guarantee that the pointed-to data outlives the parallel
/// operation and that concurrent writers touch disjoint elements.
pub(crate) struct SendPtr<T>(pub(crate) *mut T);

impl<T> Clone for SendPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SendPtr<T> {}

unsafe impl<T> Send for SendPtr<T> {}
unsafe impl<T> Sync for SendPtr<T> {}

impl<T> SendPtr<T> {
    pub(crate) fn from_const(ptr: *const T) -> Self {
        SendPtr(ptr as *mut T)
    }

    #[inline]
    pub(crate) fn as_ptr(self) -> *mut T {
        self.0
    }

    /// Pointer to the element `offset` elements away.
    ///
    /// # Safety
    /// The resulting pointer must stay within the original allocation.
    #[inline]
    pub(crate) unsafe fn at(self, offset: isize) -> *mut T {
        self.0.offset(offset)
    }
}

#[cfg(feature = "parallel")]
fn available_threads() -> usize {
    rayon::current_num_threads()
}

#[cfg(not(feature = "parallel"))]
fn available_threads() -> usize {
    1
}

// ============================================================================
// Recursive plan splitting
// ============================================================================

/// Split the region `dims` in halves until each piece is small enough, then
/// call `leaf(dims, offsets)` for it.
#[allow(clippy::too_many_arguments)]
fn split_threaded<F>(
    dims: &[usize],
    strides: &[SVec<isize>],
    offsets: &[isize],
    costs: &[isize],
    nthreads: usize,
    min_len: usize,
    leaf: &F,
) where
    F: Fn(&[usize], &[isize]) + MaybeSync,
{
    let total: usize = dims.iter().product();
    if nthreads <= 1 || total <= min_len {
        return leaf(dims, offsets);
    }

    // Last argmax of (dims - 1) * costs.
    let (i, _) = dims.iter().zip(costs.iter()).enumerate().fold(
        (0, isize::MIN),
        |(best_i, best_v), (idx, (&d, &c))| {
            let score = (d as isize - 1) * c;
            if score >= best_v {
                (idx, score)
            } else {
                (best_i, best_v)
            }
        },
    );
    if dims.is_empty() || dims[i] <= 1 {
        return leaf(dims, offsets);
    }

    let di = dims[i];
    let ndi = di / 2;
    let nt_left = nthreads / 2;
    let nt_right = nthreads - nt_left;

    let mut left_dims: SVec<usize> = SmallVec::from_slice(dims);
    left_dims[i] = ndi;
    let mut right_dims: SVec<usize> = SmallVec::from_slice(dims);
    right_dims[i] = di - ndi;
    let mut right_offsets: SVec<isize> = SmallVec::from_slice(offsets);
    for (k, s) in strides.iter().enumerate() {
        right_offsets[k] += ndi as isize * s[i];
    }

    join(
        || split_threaded(&left_dims, strides, offsets, costs, nt_left, min_len, leaf),
        || {
            split_threaded(
                &right_dims,
                strides,
                &right_offsets,
                costs,
                nt_right,
                min_len,
                leaf,
            )
        },
    );
}

#[cfg(feature = "parallel")]
fn join<A, B>(a: A, b: B)
where
    A: FnOnce() + Send,
    B: FnOnce() + Send,
{
    rayon::join(a, b);
}

#[cfg(not(feature = "parallel"))]
fn join<A, B>(a: A, b: B)
where
    A: FnOnce(),
    B: FnOnce(),
{
    a();
    b();
}

/// Parallel counterpart of [`crate::kernel::run_plan`].
///
/// The callback may run concurrently on disjoint regions of the plan.
pub(crate) fn for_each_inner_block_threaded<F>(
    plan: &KernelPlan,
    initial_offsets: &[isize],
    min_len: usize,
    f: &F,
) where
    F: Fn(&[isize], usize, &[isize]) + MaybeSync,
{
    let costs = compute_costs(plan);
    let strides = &plan.strides;
    split_threaded(
        &plan.dims,
        strides,
        initial_offsets,
        &costs,
        available_threads(),
        min_len.max(1),
        &|dims: &[usize], offsets: &[isize]| for_each_inner_block(dims, strides, offsets, f),
    );
}

// ============================================================================
// Linear index chunks
// ============================================================================

/// Fold `0..len` chunk by chunk, merging partial results in index order.
///
/// Returns `None` when `len == 0`.
pub(crate) fn par_fold_ranges<A, Fold, Merge>(
    len: usize,
    min_chunk: usize,
    fold: Fold,
    merge: Merge,
) -> Option<A>
where
    A: MaybeSend,
    Fold: Fn(Range<usize>) -> A + MaybeSync + MaybeSend,
    Merge: Fn(A, A) -> A + MaybeSync + MaybeSend,
{
    if len == 0 {
        return None;
    }
    let chunk = chunk_len(len, min_chunk);
    let num_chunks = len.div_ceil(chunk);
    let range_of = |c: usize| c * chunk..((c + 1) * chunk).min(len);

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        (0..num_chunks)
            .into_par_iter()
            .map(|c| fold(range_of(c)))
            .reduce_with(&merge)
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..num_chunks).map(|c| fold(range_of(c))).reduce(&merge)
    }
}

/// Run `f` over disjoint chunks of `0..len`.
pub(crate) fn par_for_ranges<F>(len: usize, min_chunk: usize, f: F)
where
    F: Fn(Range<usize>) + MaybeSync + MaybeSend,
{
    par_fold_ranges(len, min_chunk, f, |(), ()| ());
}

fn chunk_len(len: usize, min_chunk: usize) -> usize {
    let per_thread = len.div_ceil(available_threads() * 4);
    per_thread.max(min_chunk).max(1)
}
