//! Reduce3 family: joint reductions over element pairs of `x` and `y`.

use ndexec_shape::{Order, Result, ShapeInfo};
use ndexec_traits::{Element, TypeFamily};

use super::{
    for_each_tad, io_ptrs, log_dispatch, outer_count, require_distinct, require_len,
    require_same_dims, require_writable, tad_pack, ArrayRef,
};
use crate::buffer::LockedBuffers;
use crate::context::LaunchContext;
use crate::dispatch::{
    dispatch_float, dispatch_numeric, require_family, require_numeric, require_same, unsupported,
};
use crate::extra::ExtraArguments;
use crate::map::fold;
use crate::maybe_sync::{MaybeSend, MaybeSync};
use crate::ops::{OpCode, Reduce3Accumulator, Reduce3Op};
use crate::threading::SendPtr;

const REDUCE3: &str = "reduce3";
const REDUCE3_TAD: &str = "reduce3_tad";
const REDUCE3_ALL: &str = "reduce3_all";

fn check(op: &'static str, x: &ArrayRef<'_>, y: &ArrayRef<'_>, z: &ArrayRef<'_>) -> Result<()> {
    require_numeric(op, x.dtype())?;
    require_same(op, ("x", "y"), x.dtype(), y.dtype())?;
    require_family(op, "z", z.dtype(), TypeFamily::Float)?;
    require_writable(op, z)?;
    require_distinct(op, z, &[x, y])
}

/// Which pair of tads feeds output `p`.
struct Pairing<'s, B> {
    x_tad: &'s ShapeInfo,
    y_tad: &'s ShapeInfo,
    outputs: usize,
    bases: B,
}

#[allow(clippy::too_many_arguments)]
fn dispatch<B>(
    ctx: &LaunchContext,
    name: &'static str,
    op: Reduce3Op,
    x: ArrayRef<'_>,
    y: ArrayRef<'_>,
    z: ArrayRef<'_>,
    extra: &ExtraArguments,
    pairing: Pairing<'_, B>,
) -> Result<()>
where
    B: Fn(usize) -> (isize, isize) + MaybeSync + MaybeSend,
{
    let types = [x.dtype(), y.dtype(), z.dtype()];
    log_dispatch(OpCode::Reduce3(op), &types);
    dispatch_numeric!(types[0], Err(unsupported(name, &types)), |X| {
        dispatch_float!(types[2], Err(unsupported(name, &types)), |Z| {
            reduce3_kernel::<X, Z, B>(ctx, name, op, x, y, z, extra, &pairing)
        })
    })
}

#[allow(clippy::too_many_arguments)]
fn reduce3_kernel<X, Z, B>(
    ctx: &LaunchContext,
    name: &'static str,
    op: Reduce3Op,
    x: ArrayRef<'_>,
    y: ArrayRef<'_>,
    z: ArrayRef<'_>,
    extra: &ExtraArguments,
    pairing: &Pairing<'_, B>,
) -> Result<()>
where
    X: Element,
    Z: Element,
    B: Fn(usize) -> (isize, isize) + MaybeSync + MaybeSend,
{
    let locks = LockedBuffers::acquire(&[x.buffer, y.buffer], &[z.buffer]);
    let (xp, zp) = io_ptrs::<X, Z>(name, &locks, &x, &z)?;
    let yp = SendPtr::from_const(locks.ptr::<X>(name, y.buffer, y.offset)?);
    let (xt, yt) = (pairing.x_tad, pairing.y_tad);
    let n = xt.length();
    let zs = z.shape;
    let floating = X::DTYPE.is_float();
    for_each_tad(ctx, pairing.outputs, |p, par| {
        let (bx, by) = (pairing.bases)(p);
        let acc = fold(
            par,
            [xt, yt],
            || op.start(),
            |acc: Reduce3Accumulator, _, [ox, oy]: [isize; 2]| {
                // SAFETY: offsets stay inside the bounds-checked operands.
                let (a, b) = unsafe { (*xp.at(bx + ox), *yp.at(by + oy)) };
                op.update(acc, a.to_f64(), b.to_f64(), floating, extra)
            },
            Reduce3Accumulator::merge,
        );
        // SAFETY: `p < z.length()` and `z` is writable.
        unsafe { *zp.at(zs.index_offset_in(p, Order::C)) = Z::from_f64(op.finish(acc, n)) };
    });
    Ok(())
}

/// Reduce the whole of `x` against the whole of `y` into one element.
pub fn exec_reduce3_scalar(
    ctx: &LaunchContext,
    op: Reduce3Op,
    x: ArrayRef<'_>,
    y: ArrayRef<'_>,
    z: ArrayRef<'_>,
    extra: &ExtraArguments,
) -> Result<()> {
    check(REDUCE3, &x, &y, &z)?;
    require_len(REDUCE3, &y, x.length())?;
    require_len(REDUCE3, &z, 1)?;
    let pairing = Pairing {
        x_tad: x.shape,
        y_tad: y.shape,
        outputs: 1,
        bases: |_: usize| (0isize, 0isize),
    };
    dispatch(ctx, REDUCE3, op, x, y, z, extra, pairing)
}

/// Reduce every tad of `x` along `axes` against `y`.
///
/// `y` is either one tad worth of elements, reused for every tad, or an
/// array with the extents of `x`, in which case tads are paired. An empty
/// axis list reduces the whole array.
pub fn exec_reduce3(
    ctx: &LaunchContext,
    op: Reduce3Op,
    x: ArrayRef<'_>,
    y: ArrayRef<'_>,
    z: ArrayRef<'_>,
    axes: &[isize],
    extra: &ExtraArguments,
) -> Result<()> {
    if axes.is_empty() {
        return exec_reduce3_scalar(ctx, op, x, y, z, extra);
    }
    check(REDUCE3, &x, &y, &z)?;
    if y.shape.dims() == x.shape.dims() && x.shape.rank() > 1 {
        return exec_reduce3_tad(ctx, op, x, y, z, axes, extra);
    }
    let pack = tad_pack(ctx, &x, axes)?;
    require_len(REDUCE3, &y, pack.tad_length())?;
    let outputs = outer_count(x.shape, &pack);
    require_len(REDUCE3, &z, outputs)?;
    let starts = pack.offsets();
    let pairing = Pairing {
        x_tad: pack.tad_shape(),
        y_tad: y.shape,
        outputs,
        bases: |p: usize| (starts.get(p).copied().unwrap_or(0), 0),
    };
    dispatch(ctx, REDUCE3, op, x, y, z, extra, pairing)
}

/// Pair tad `t` of `x` with tad `t` of `y`; both have the same extents.
pub fn exec_reduce3_tad(
    ctx: &LaunchContext,
    op: Reduce3Op,
    x: ArrayRef<'_>,
    y: ArrayRef<'_>,
    z: ArrayRef<'_>,
    axes: &[isize],
    extra: &ExtraArguments,
) -> Result<()> {
    check(REDUCE3_TAD, &x, &y, &z)?;
    require_same_dims(REDUCE3_TAD, &x, &y)?;
    let xpack = tad_pack(ctx, &x, axes)?;
    let ypack = tad_pack(ctx, &y, axes)?;
    let outputs = outer_count(x.shape, &xpack);
    require_len(REDUCE3_TAD, &z, outputs)?;
    let (xo, yo) = (xpack.offsets(), ypack.offsets());
    let pairing = Pairing {
        x_tad: xpack.tad_shape(),
        y_tad: ypack.tad_shape(),
        outputs,
        bases: |p: usize| {
            (
                xo.get(p).copied().unwrap_or(0),
                yo.get(p).copied().unwrap_or(0),
            )
        },
    };
    dispatch(ctx, REDUCE3_TAD, op, x, y, z, extra, pairing)
}

/// Every tad of `x` against every tad of `y`: output `p` holds tad
/// `p / ny` of `x` against tad `p % ny` of `y`.
pub fn exec_reduce3_all(
    ctx: &LaunchContext,
    op: Reduce3Op,
    x: ArrayRef<'_>,
    y: ArrayRef<'_>,
    z: ArrayRef<'_>,
    axes: &[isize],
    extra: &ExtraArguments,
) -> Result<()> {
    check(REDUCE3_ALL, &x, &y, &z)?;
    let xpack = tad_pack(ctx, &x, axes)?;
    let ypack = tad_pack(ctx, &y, axes)?;
    if xpack.tad_length() != ypack.tad_length() {
        return Err(ndexec_shape::NdError::shape_mismatch(
            REDUCE3_ALL,
            xpack.tad_shape().dims(),
            ypack.tad_shape().dims(),
        ));
    }
    let nx = outer_count(x.shape, &xpack);
    let ny = outer_count(y.shape, &ypack);
    require_len(REDUCE3_ALL, &z, nx * ny)?;
    let (xo, yo) = (xpack.offsets(), ypack.offsets());
    let pairing = Pairing {
        x_tad: xpack.tad_shape(),
        y_tad: ypack.tad_shape(),
        outputs: nx * ny,
        bases: |p: usize| {
            (
                xo.get(p / ny).copied().unwrap_or(0),
                yo.get(p % ny).copied().unwrap_or(0),
            )
        },
    };
    dispatch(ctx, REDUCE3_ALL, op, x, y, z, extra, pairing)
}
