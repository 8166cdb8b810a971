//! Broadcast family: combine every tad of `x` with the same `y`.

use ndexec_shape::Result;
use ndexec_traits::{Element, TypeFamily};

use super::{
    for_each_tad, io_ptrs, log_dispatch, require_distinct, require_in_place, require_len,
    require_same_dims, require_writable, tad_pack, ArrayRef,
};
use crate::buffer::LockedBuffers;
use crate::context::LaunchContext;
use crate::dispatch::{dispatch_numeric, require_family, require_numeric, require_same, unsupported};
use crate::map::visit_par;
use crate::maybe_sync::{MaybeSend, MaybeSync};
use crate::ops::{OpCode, PairwiseBoolOp, PairwiseOp};
use crate::threading::SendPtr;

const BROADCAST: &str = "broadcast";
const BROADCAST_BOOL: &str = "broadcast_bool";

fn check(op: &'static str, x: &ArrayRef<'_>, y: &ArrayRef<'_>, z: &ArrayRef<'_>) -> Result<()> {
    require_numeric(op, x.dtype())?;
    require_numeric(op, y.dtype())?;
    require_numeric(op, z.dtype())?;
    require_same_dims(op, x, z)?;
    require_writable(op, z)
}

/// `z[tad t] = op(x[tad t], y)` for every tad of `x` along `axes`.
///
/// `y` must hold exactly one tad worth of elements; they are paired with
/// each tad by linear index.
pub fn exec_broadcast(
    ctx: &LaunchContext,
    op: PairwiseOp,
    x: ArrayRef<'_>,
    y: ArrayRef<'_>,
    z: ArrayRef<'_>,
    axes: &[isize],
) -> Result<()> {
    check(BROADCAST, &x, &y, &z)?;
    if op.divides() && (y.dtype().is_bool() || z.dtype().is_bool()) {
        return Err(ndexec_shape::NdError::invalid(
            BROADCAST,
            format!("{op} is not defined for bool operands"),
        ));
    }
    let types = [x.dtype(), y.dtype(), z.dtype()];
    log_dispatch(OpCode::Pairwise(op), &types);

    #[cfg(feature = "experimental")]
    {
        if ctx.config().triple_dispatch_active() {
            return dispatch_numeric!(types[0], Err(unsupported(BROADCAST, &types)), |X| {
                dispatch_numeric!(types[1], Err(unsupported(BROADCAST, &types)), |Y| {
                    dispatch_numeric!(types[2], Err(unsupported(BROADCAST, &types)), |Z| {
                        broadcast_kernel(ctx, BROADCAST, x, y, z, axes, move |a: X, b: Y| {
                            op.apply::<Z>(a.cast(), b.cast())
                        })
                    })
                })
            });
        }
    }

    require_same(BROADCAST, ("x", "y"), types[0], types[1])?;
    require_same(BROADCAST, ("x", "z"), types[0], types[2])?;
    dispatch_numeric!(types[0], Err(unsupported(BROADCAST, &types)), |T| {
        broadcast_kernel(ctx, BROADCAST, x, y, z, axes, move |a: T, b: T| op.apply(a, b))
    })
}

/// Broadcast comparison into a bool destination.
pub fn exec_broadcast_bool(
    ctx: &LaunchContext,
    op: PairwiseBoolOp,
    x: ArrayRef<'_>,
    y: ArrayRef<'_>,
    z: ArrayRef<'_>,
    axes: &[isize],
) -> Result<()> {
    check(BROADCAST_BOOL, &x, &y, &z)?;
    require_family(BROADCAST_BOOL, "z", z.dtype(), TypeFamily::Bool)?;
    require_same(BROADCAST_BOOL, ("x", "y"), x.dtype(), y.dtype())?;
    let types = [x.dtype(), y.dtype(), z.dtype()];
    log_dispatch(OpCode::PairwiseBool(op), &types);
    dispatch_numeric!(types[0], Err(unsupported(BROADCAST_BOOL, &types)), |T| {
        broadcast_kernel(ctx, BROADCAST_BOOL, x, y, z, axes, move |a: T, b: T| {
            op.apply(a, b)
        })
    })
}

fn broadcast_kernel<X, Y, Z, F>(
    ctx: &LaunchContext,
    op: &'static str,
    x: ArrayRef<'_>,
    y: ArrayRef<'_>,
    z: ArrayRef<'_>,
    axes: &[isize],
    f: F,
) -> Result<()>
where
    X: Element,
    Y: Element,
    Z: Element,
    F: Fn(X, Y) -> Z + MaybeSync + MaybeSend,
{
    let xpack = tad_pack(ctx, &x, axes)?;
    let zpack = tad_pack(ctx, &z, axes)?;
    require_len(op, &y, xpack.tad_length())?;
    require_in_place(op, &z, &[&x])?;
    require_distinct(op, &z, &[&y])?;

    let locks = LockedBuffers::acquire(&[x.buffer, y.buffer], &[z.buffer]);
    let (xp, zp) = io_ptrs::<X, Z>(op, &locks, &x, &z)?;
    let yp = SendPtr::from_const(locks.ptr::<Y>(op, y.buffer, y.offset)?);
    let (xs, zs, ys) = (xpack.tad_shape(), zpack.tad_shape(), y.shape);
    let (xo, zo) = (xpack.offsets(), zpack.offsets());
    for_each_tad(ctx, xpack.num_tads(), |t, par| {
        let (bx, bz) = (xo[t], zo[t]);
        visit_par(par, [zs, xs, ys], |[oz, ox, oy]| {
            // SAFETY: tad offsets and element offsets stay inside the
            // bounds-checked operands.
            unsafe { *zp.at(bz + oz) = f(*xp.at(bx + ox), *yp.at(oy)) }
        });
    });
    Ok(())
}
