//! Offset visitors shared by every element-wise and reducing kernel.
//!
//! A visitor walks `N` operands element by element and hands the callback
//! one relative offset per operand. Operands with identical extents go
//! through the planned engine in [`crate::kernel`]; operands that only agree
//! in length are paired by linear index, enumerated in the ordering of the
//! first operand.

use std::ops::Range;

use ndexec_shape::ShapeInfo;

use crate::context::LaunchContext;
use crate::kernel::{run_plan, KernelPlan};
use crate::maybe_sync::{MaybeSend, MaybeSync};
use crate::threading::{for_each_inner_block_threaded, par_fold_ranges, par_for_ranges};

/// Smallest chunk handed to a worker by the linear drivers.
const MIN_CHUNK: usize = 1024;

fn same_dims<const N: usize>(shapes: &[&ShapeInfo; N]) -> bool {
    shapes.iter().all(|s| s.dims() == shapes[0].dims())
}

fn plan_for<const N: usize>(shapes: &[&ShapeInfo; N]) -> KernelPlan {
    let strides: [&[isize]; N] = std::array::from_fn(|a| shapes[a].strides());
    KernelPlan::new(shapes[0].dims(), &strides, Some(0))
}

/// Offsets of the `index`-th element of every operand.
#[inline]
pub(crate) fn offsets_at<const N: usize>(shapes: &[&ShapeInfo; N], index: usize) -> [isize; N] {
    let order = shapes[0].order();
    std::array::from_fn(|a| {
        if a == 0 {
            shapes[0].index_offset(index)
        } else {
            shapes[a].index_offset_in(index, order)
        }
    })
}

#[inline]
fn spread<const N: usize, F>(offs: &[isize], len: usize, inner: &[isize], f: &mut F)
where
    F: FnMut([isize; N]),
{
    let mut cur: [isize; N] = std::array::from_fn(|a| offs[a]);
    for _ in 0..len {
        f(cur);
        for a in 0..N {
            cur[a] += inner[a];
        }
    }
}

/// Visit every element position once, sequentially.
pub(crate) fn visit<const N: usize, F>(shapes: [&ShapeInfo; N], mut f: F)
where
    F: FnMut([isize; N]),
{
    if same_dims(&shapes) {
        let plan = plan_for(&shapes);
        tracing::trace!(runs = plan.dims.len(), "strided plan");
        run_plan(&plan, &[0; N], |offs, len, inner| {
            spread(offs, len, inner, &mut f)
        });
    } else {
        tracing::trace!("linear pairing");
        for i in 0..shapes[0].length() {
            f(offsets_at(&shapes, i));
        }
    }
}

/// Visit every element position once, fanning out above the element
/// threshold of `par`. The callback may run concurrently on distinct
/// positions; `None` keeps the loop on the calling thread.
pub(crate) fn visit_par<const N: usize, F>(
    par: Option<&LaunchContext>,
    shapes: [&ShapeInfo; N],
    f: F,
) where
    F: Fn([isize; N]) + MaybeSync + MaybeSend,
{
    let len = shapes[0].length();
    let Some(ctx) = par.filter(|c| c.parallel_elements(len)) else {
        return visit(shapes, f);
    };
    if same_dims(&shapes) {
        let plan = plan_for(&shapes);
        let threshold = ctx.config().elementwise_threshold;
        for_each_inner_block_threaded(
            &plan,
            &[0; N],
            threshold,
            &|offs: &[isize], len: usize, inner: &[isize]| {
                spread(offs, len, inner, &mut |o| f(o))
            },
        );
    } else {
        par_for_ranges(len, MIN_CHUNK, |range| {
            for i in range {
                f(offsets_at(&shapes, i));
            }
        });
    }
}

/// Visit positions in linear order together with their index.
pub(crate) fn visit_indexed<const N: usize, F>(shapes: [&ShapeInfo; N], range: Range<usize>, mut f: F)
where
    F: FnMut(usize, [isize; N]),
{
    for i in range {
        f(i, offsets_at(&shapes, i));
    }
}

/// Indexed visitor that fans out above the element threshold of `par`.
pub(crate) fn visit_indexed_par<const N: usize, F>(
    par: Option<&LaunchContext>,
    shapes: [&ShapeInfo; N],
    f: F,
) where
    F: Fn(usize, [isize; N]) + MaybeSync + MaybeSend,
{
    let len = shapes[0].length();
    if par.is_some_and(|c| c.parallel_elements(len)) {
        par_for_ranges(len, MIN_CHUNK, |range| visit_indexed(shapes, range, &f));
    } else {
        visit_indexed(shapes, 0..len, f);
    }
}

/// Fold over all positions in linear order.
///
/// Each chunk starts from `init()`; partial results are combined with
/// `merge` left to right, so `update` sees indices in increasing order
/// within a chunk and chunks are merged in index order.
pub(crate) fn fold<const N: usize, A, Init, Update, Merge>(
    par: Option<&LaunchContext>,
    shapes: [&ShapeInfo; N],
    init: Init,
    update: Update,
    merge: Merge,
) -> A
where
    A: MaybeSend,
    Init: Fn() -> A + MaybeSync + MaybeSend,
    Update: Fn(A, usize, [isize; N]) -> A + MaybeSync + MaybeSend,
    Merge: Fn(A, A) -> A + MaybeSync + MaybeSend,
{
    let len = shapes[0].length();
    let fold_range = |range: Range<usize>| {
        let mut acc = init();
        for i in range {
            acc = update(acc, i, offsets_at(&shapes, i));
        }
        acc
    };
    if par.is_some_and(|c| c.parallel_elements(len)) {
        par_fold_ranges(len, MIN_CHUNK, fold_range, merge).unwrap_or_else(&init)
    } else {
        fold_range(0..len)
    }
}
