//! Pairwise, scalar and transform families plus the generic element-wise
//! kernels they instantiate.

use ndexec_shape::{NdError, Order, Result};
use ndexec_traits::{DataType, Element, TypeFamily};

use super::{
    for_each_tad, io_ptrs, log_dispatch, require_distinct, require_in_place, require_len,
    require_same_dims, require_writable, tad_pack, ArrayRef,
};
use crate::buffer::LockedBuffers;
use crate::context::LaunchContext;
use crate::dispatch::{
    dispatch_float, dispatch_numeric, require_family, require_numeric, require_same, unsupported,
};
use crate::extra::ExtraArguments;
use crate::map::{visit_indexed_par, visit_par};
use crate::maybe_sync::{MaybeSend, MaybeSync};
use crate::ops::{
    OpCode, PairwiseBoolOp, PairwiseOp, TransformAnyOp, TransformBoolOp, TransformFloatOp,
    TransformOp, TransformSameOp, TransformStrictOp,
};
use crate::threading::{par_for_ranges, SendPtr};

// ============================================================================
// Generic kernels
// ============================================================================

/// `z[i] = f(x[i])`
pub(crate) fn unary_kernel<X, Z, F>(
    par: Option<&LaunchContext>,
    op: &'static str,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
    f: F,
) -> Result<()>
where
    X: Element,
    Z: Element,
    F: Fn(X) -> Z + MaybeSync + MaybeSend,
{
    require_in_place(op, &z, &[&x])?;
    let locks = LockedBuffers::acquire(&[x.buffer], &[z.buffer]);
    let (xp, zp) = io_ptrs::<X, Z>(op, &locks, &x, &z)?;
    visit_par(par, [z.shape, x.shape], move |[oz, ox]| {
        // SAFETY: offsets come from bounds-checked shapes of locked buffers.
        unsafe { *zp.at(oz) = f(*xp.at(ox)) }
    });
    Ok(())
}

/// `z[i] = f(i, x[i])`, `i` enumerated in the ordering of `z`.
pub(crate) fn unary_indexed_kernel<X, Z, F>(
    par: Option<&LaunchContext>,
    op: &'static str,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
    f: F,
) -> Result<()>
where
    X: Element,
    Z: Element,
    F: Fn(usize, X) -> Z + MaybeSync + MaybeSend,
{
    require_in_place(op, &z, &[&x])?;
    let locks = LockedBuffers::acquire(&[x.buffer], &[z.buffer]);
    let (xp, zp) = io_ptrs::<X, Z>(op, &locks, &x, &z)?;
    visit_indexed_par(par, [z.shape, x.shape], move |i, [oz, ox]| {
        // SAFETY: see `unary_kernel`.
        unsafe { *zp.at(oz) = f(i, *xp.at(ox)) }
    });
    Ok(())
}

/// `z[i] = f(x[i], y[i])`
pub(crate) fn binary_kernel<X, Y, Z, F>(
    par: Option<&LaunchContext>,
    op: &'static str,
    x: ArrayRef<'_>,
    y: ArrayRef<'_>,
    z: ArrayRef<'_>,
    f: F,
) -> Result<()>
where
    X: Element,
    Y: Element,
    Z: Element,
    F: Fn(X, Y) -> Z + MaybeSync + MaybeSend,
{
    require_in_place(op, &z, &[&x, &y])?;
    let locks = LockedBuffers::acquire(&[x.buffer, y.buffer], &[z.buffer]);
    let (xp, zp) = io_ptrs::<X, Z>(op, &locks, &x, &z)?;
    let yp = SendPtr::from_const(locks.ptr::<Y>(op, y.buffer, y.offset)?);
    visit_par(par, [z.shape, x.shape, y.shape], move |[oz, ox, oy]| {
        // SAFETY: see `unary_kernel`.
        unsafe { *zp.at(oz) = f(*xp.at(ox), *yp.at(oy)) }
    });
    Ok(())
}

/// `z[i] = f(i, x[i], y[i])`
pub(crate) fn binary_indexed_kernel<X, Y, Z, F>(
    par: Option<&LaunchContext>,
    op: &'static str,
    x: ArrayRef<'_>,
    y: ArrayRef<'_>,
    z: ArrayRef<'_>,
    f: F,
) -> Result<()>
where
    X: Element,
    Y: Element,
    Z: Element,
    F: Fn(usize, X, Y) -> Z + MaybeSync + MaybeSend,
{
    require_in_place(op, &z, &[&x, &y])?;
    let locks = LockedBuffers::acquire(&[x.buffer, y.buffer], &[z.buffer]);
    let (xp, zp) = io_ptrs::<X, Z>(op, &locks, &x, &z)?;
    let yp = SendPtr::from_const(locks.ptr::<Y>(op, y.buffer, y.offset)?);
    visit_indexed_par(par, [z.shape, x.shape, y.shape], move |i, [oz, ox, oy]| {
        // SAFETY: see `unary_kernel`.
        unsafe { *zp.at(oz) = f(i, *xp.at(ox), *yp.at(oy)) }
    });
    Ok(())
}

/// `z[i] = f(x[i], y[i], w[i])`
pub(crate) fn ternary_kernel<X, Y, W, Z, F>(
    par: Option<&LaunchContext>,
    op: &'static str,
    operands: [ArrayRef<'_>; 3],
    z: ArrayRef<'_>,
    f: F,
) -> Result<()>
where
    X: Element,
    Y: Element,
    W: Element,
    Z: Element,
    F: Fn(X, Y, W) -> Z + MaybeSync + MaybeSend,
{
    let [x, y, w] = operands;
    require_in_place(op, &z, &[&x, &y, &w])?;
    let locks = LockedBuffers::acquire(&[x.buffer, y.buffer, w.buffer], &[z.buffer]);
    let (xp, zp) = io_ptrs::<X, Z>(op, &locks, &x, &z)?;
    let yp = SendPtr::from_const(locks.ptr::<Y>(op, y.buffer, y.offset)?);
    let wp = SendPtr::from_const(locks.ptr::<W>(op, w.buffer, w.offset)?);
    visit_par(par, [z.shape, x.shape, y.shape, w.shape], move |[oz, ox, oy, ow]| {
        // SAFETY: see `unary_kernel`.
        unsafe { *zp.at(oz) = f(*xp.at(ox), *yp.at(oy), *wp.at(ow)) }
    });
    Ok(())
}

/// `z[i] = x[source(i)]`, `i` running over the row-major indices of `z`
/// and `source` returning an offset relative to the head of `x`.
///
/// The caller guarantees that every offset produced by `source` addresses
/// an element of `x`.
pub(crate) fn gather_kernel<X, Z, S>(
    par: Option<&LaunchContext>,
    op: &'static str,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
    source: S,
) -> Result<()>
where
    X: Element,
    Z: Element,
    S: Fn(usize) -> isize + MaybeSync + MaybeSend,
{
    require_writable(op, &z)?;
    require_distinct(op, &z, &[&x])?;
    let locks = LockedBuffers::acquire(&[x.buffer], &[z.buffer]);
    let (xp, zp) = io_ptrs::<X, Z>(op, &locks, &x, &z)?;
    let zs = z.shape;
    let len = zs.length();
    let body = move |range: std::ops::Range<usize>| {
        for i in range {
            // SAFETY: `i < z.length()` and `source` stays inside `x`.
            unsafe { *zp.at(zs.index_offset_in(i, Order::C)) = (*xp.at(source(i))).cast() }
        }
    };
    if par.is_some_and(|c| c.parallel_elements(len)) {
        par_for_ranges(len, 1024, body);
    } else {
        body(0..len);
    }
    Ok(())
}

/// Elements of `a` in row-major logical order.
pub(crate) fn read_values<T: Element>(op: &'static str, a: &ArrayRef<'_>) -> Result<Vec<T>> {
    let locks = LockedBuffers::acquire(&[a.buffer], &[]);
    let base = locks.ptr::<T>(op, a.buffer, a.offset)?;
    Ok((0..a.length())
        .map(|i| {
            // SAFETY: see `unary_kernel`.
            unsafe { *base.offset(a.shape.index_offset_in(i, Order::C)) }
        })
        .collect())
}

fn first_value<T: Element>(op: &'static str, a: &ArrayRef<'_>) -> Result<T> {
    if a.length() == 0 {
        return Err(NdError::invalid(op, "scalar operand is empty"));
    }
    let locks = LockedBuffers::acquire(&[a.buffer], &[]);
    let base = locks.ptr::<T>(op, a.buffer, a.offset)?;
    // SAFETY: see `unary_kernel`.
    Ok(unsafe { *base })
}

// ============================================================================
// Validation
// ============================================================================

fn check_unary(op: &'static str, x: &ArrayRef<'_>, z: &ArrayRef<'_>) -> Result<()> {
    require_numeric(op, x.dtype())?;
    require_numeric(op, z.dtype())?;
    require_len(op, z, x.length())?;
    require_writable(op, z)
}

fn check_binary(op: &'static str, x: &ArrayRef<'_>, y: &ArrayRef<'_>, z: &ArrayRef<'_>) -> Result<()> {
    require_numeric(op, y.dtype())?;
    require_len(op, y, x.length())?;
    check_unary(op, x, z)
}

fn check_division(op: &'static str, code: PairwiseOp, y: DataType, z: DataType) -> Result<()> {
    if code.divides() && (y.is_bool() || z.is_bool()) {
        return Err(NdError::invalid(
            op,
            format!("{code} is not defined for bool operands"),
        ));
    }
    Ok(())
}

#[cfg(feature = "experimental")]
fn triple_enabled(ctx: &LaunchContext) -> bool {
    ctx.config().triple_dispatch_active()
}

// ============================================================================
// Pairwise
// ============================================================================

const PAIRWISE: &str = "pairwise_transform";
const PAIRWISE_BOOL: &str = "pairwise_bool_transform";

/// `z = op(x, y)` element by element.
pub fn exec_pairwise_transform(
    ctx: &LaunchContext,
    op: PairwiseOp,
    x: ArrayRef<'_>,
    y: ArrayRef<'_>,
    z: ArrayRef<'_>,
) -> Result<()> {
    check_binary(PAIRWISE, &x, &y, &z)?;
    check_division(PAIRWISE, op, y.dtype(), z.dtype())?;
    let types = [x.dtype(), y.dtype(), z.dtype()];
    log_dispatch(OpCode::Pairwise(op), &types);

    #[cfg(feature = "experimental")]
    {
        if triple_enabled(ctx) {
            return dispatch_numeric!(types[0], Err(unsupported(PAIRWISE, &types)), |X| {
                dispatch_numeric!(types[1], Err(unsupported(PAIRWISE, &types)), |Y| {
                    dispatch_numeric!(types[2], Err(unsupported(PAIRWISE, &types)), |Z| {
                        binary_kernel(Some(ctx), PAIRWISE, x, y, z, move |a: X, b: Y| {
                            op.apply::<Z>(a.cast(), b.cast())
                        })
                    })
                })
            });
        }
    }

    require_same(PAIRWISE, ("x", "y"), types[0], types[1])?;
    require_same(PAIRWISE, ("x", "z"), types[0], types[2])?;
    dispatch_numeric!(types[0], Err(unsupported(PAIRWISE, &types)), |T| {
        binary_kernel(Some(ctx), PAIRWISE, x, y, z, move |a: T, b: T| op.apply(a, b))
    })
}

/// `z = op(x, y)` element by element into a bool destination.
pub fn exec_pairwise_bool_transform(
    ctx: &LaunchContext,
    op: PairwiseBoolOp,
    x: ArrayRef<'_>,
    y: ArrayRef<'_>,
    z: ArrayRef<'_>,
) -> Result<()> {
    check_binary(PAIRWISE_BOOL, &x, &y, &z)?;
    require_family(PAIRWISE_BOOL, "z", z.dtype(), TypeFamily::Bool)?;
    let types = [x.dtype(), y.dtype(), z.dtype()];
    log_dispatch(OpCode::PairwiseBool(op), &types);

    #[cfg(feature = "experimental")]
    {
        if triple_enabled(ctx) {
            return dispatch_numeric!(types[0], Err(unsupported(PAIRWISE_BOOL, &types)), |X| {
                dispatch_numeric!(types[1], Err(unsupported(PAIRWISE_BOOL, &types)), |Y| {
                    binary_kernel(Some(ctx), PAIRWISE_BOOL, x, y, z, move |a: X, b: Y| {
                        op.apply(a, b.cast::<X>())
                    })
                })
            });
        }
    }

    require_same(PAIRWISE_BOOL, ("x", "y"), types[0], types[1])?;
    dispatch_numeric!(types[0], Err(unsupported(PAIRWISE_BOOL, &types)), |T| {
        binary_kernel(Some(ctx), PAIRWISE_BOOL, x, y, z, move |a: T, b: T| op.apply(a, b))
    })
}

// ============================================================================
// Scalar
// ============================================================================

const SCALAR: &str = "scalar";
const SCALAR_BOOL: &str = "scalar_bool";
const SCALAR_TAD: &str = "scalar_tad";
const SCALAR_BOOL_TAD: &str = "scalar_bool_tad";

/// `z = op(x, s)` with `s` the first element of `scalar`.
pub fn exec_scalar(
    ctx: &LaunchContext,
    op: PairwiseOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
    scalar: ArrayRef<'_>,
) -> Result<()> {
    check_unary(SCALAR, &x, &z)?;
    require_numeric(SCALAR, scalar.dtype())?;
    check_division(SCALAR, op, scalar.dtype(), z.dtype())?;
    let types = [x.dtype(), scalar.dtype(), z.dtype()];
    log_dispatch(OpCode::Pairwise(op), &types);

    #[cfg(feature = "experimental")]
    {
        if triple_enabled(ctx) {
            return dispatch_numeric!(types[0], Err(unsupported(SCALAR, &types)), |X| {
                dispatch_numeric!(types[1], Err(unsupported(SCALAR, &types)), |Y| {
                    dispatch_numeric!(types[2], Err(unsupported(SCALAR, &types)), |Z| {
                        let s: Z = first_value::<Y>(SCALAR, &scalar)?.cast();
                        unary_kernel(Some(ctx), SCALAR, x, z, move |a: X| op.apply(a.cast(), s))
                    })
                })
            });
        }
    }

    require_same(SCALAR, ("x", "scalar"), types[0], types[1])?;
    require_same(SCALAR, ("x", "z"), types[0], types[2])?;
    dispatch_numeric!(types[0], Err(unsupported(SCALAR, &types)), |T| {
        let s: T = first_value(SCALAR, &scalar)?;
        unary_kernel(Some(ctx), SCALAR, x, z, move |a: T| op.apply(a, s))
    })
}

/// `z = op(x, s)` into a bool destination.
pub fn exec_scalar_bool(
    ctx: &LaunchContext,
    op: PairwiseBoolOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
    scalar: ArrayRef<'_>,
) -> Result<()> {
    check_unary(SCALAR_BOOL, &x, &z)?;
    require_numeric(SCALAR_BOOL, scalar.dtype())?;
    require_family(SCALAR_BOOL, "z", z.dtype(), TypeFamily::Bool)?;
    require_same(SCALAR_BOOL, ("x", "scalar"), x.dtype(), scalar.dtype())?;
    let types = [x.dtype(), scalar.dtype(), z.dtype()];
    log_dispatch(OpCode::PairwiseBool(op), &types);
    dispatch_numeric!(types[0], Err(unsupported(SCALAR_BOOL, &types)), |T| {
        let s: T = first_value(SCALAR_BOOL, &scalar)?;
        unary_kernel(Some(ctx), SCALAR_BOOL, x, z, move |a: T| op.apply(a, s))
    })
}

/// Apply one scalar per tad: tad `t` of `x` is combined with element `t`
/// of `scalars`.
pub fn exec_scalar_tad(
    ctx: &LaunchContext,
    op: PairwiseOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
    scalars: ArrayRef<'_>,
    axes: &[isize],
) -> Result<()> {
    check_unary(SCALAR_TAD, &x, &z)?;
    require_same_dims(SCALAR_TAD, &x, &z)?;
    require_numeric(SCALAR_TAD, scalars.dtype())?;
    check_division(SCALAR_TAD, op, scalars.dtype(), z.dtype())?;
    require_same(SCALAR_TAD, ("x", "scalars"), x.dtype(), scalars.dtype())?;
    require_same(SCALAR_TAD, ("x", "z"), x.dtype(), z.dtype())?;
    let types = [x.dtype(), scalars.dtype(), z.dtype()];
    log_dispatch(OpCode::Pairwise(op), &types);
    dispatch_numeric!(types[0], Err(unsupported(SCALAR_TAD, &types)), |T| {
        scalar_tad_kernel::<T, T, _>(ctx, SCALAR_TAD, x, z, scalars, axes, move |a, s| {
            op.apply(a, s)
        })
    })
}

/// Per-tad scalar comparison into a bool destination.
pub fn exec_scalar_bool_tad(
    ctx: &LaunchContext,
    op: PairwiseBoolOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
    scalars: ArrayRef<'_>,
    axes: &[isize],
) -> Result<()> {
    check_unary(SCALAR_BOOL_TAD, &x, &z)?;
    require_same_dims(SCALAR_BOOL_TAD, &x, &z)?;
    require_numeric(SCALAR_BOOL_TAD, scalars.dtype())?;
    require_family(SCALAR_BOOL_TAD, "z", z.dtype(), TypeFamily::Bool)?;
    require_same(SCALAR_BOOL_TAD, ("x", "scalars"), x.dtype(), scalars.dtype())?;
    let types = [x.dtype(), scalars.dtype(), z.dtype()];
    log_dispatch(OpCode::PairwiseBool(op), &types);
    dispatch_numeric!(types[0], Err(unsupported(SCALAR_BOOL_TAD, &types)), |T| {
        scalar_tad_kernel::<T, bool, _>(ctx, SCALAR_BOOL_TAD, x, z, scalars, axes, move |a, s| {
            op.apply(a, s)
        })
    })
}

fn scalar_tad_kernel<T, Z, F>(
    ctx: &LaunchContext,
    op: &'static str,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
    scalars: ArrayRef<'_>,
    axes: &[isize],
    f: F,
) -> Result<()>
where
    T: Element,
    Z: Element,
    F: Fn(T, T) -> Z + MaybeSync + MaybeSend,
{
    let xpack = tad_pack(ctx, &x, axes)?;
    let zpack = tad_pack(ctx, &z, axes)?;
    require_len(op, &scalars, xpack.num_tads())?;
    let values = read_values::<T>(op, &scalars)?;
    require_in_place(op, &z, &[&x])?;

    let locks = LockedBuffers::acquire(&[x.buffer], &[z.buffer]);
    let (xp, zp) = io_ptrs::<T, Z>(op, &locks, &x, &z)?;
    let (xs, zs) = (xpack.tad_shape(), zpack.tad_shape());
    let (xo, zo) = (xpack.offsets(), zpack.offsets());
    for_each_tad(ctx, xpack.num_tads(), |t, par| {
        let s = values[t];
        let (bx, bz) = (xo[t], zo[t]);
        visit_par(par, [zs, xs], |[oz, ox]| {
            // SAFETY: tad offsets and element offsets stay inside the
            // bounds-checked operands.
            unsafe { *zp.at(bz + oz) = f(*xp.at(bx + ox), s) }
        });
    });
    Ok(())
}

// ============================================================================
// Transforms
// ============================================================================

const TRANSFORM_FLOAT: &str = "transform_float";
const TRANSFORM_SAME: &str = "transform_same";
const TRANSFORM_BOOL: &str = "transform_bool";
const TRANSFORM_ANY: &str = "transform_any";
const TRANSFORM_STRICT: &str = "transform_strict";

/// Dispatch a transform of any family.
pub fn exec_transform(
    ctx: &LaunchContext,
    op: TransformOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
    extra: &ExtraArguments,
) -> Result<()> {
    match op {
        TransformOp::Float(op) => exec_transform_float(ctx, op, x, z),
        TransformOp::Same(op) => exec_transform_same(ctx, op, x, z),
        TransformOp::Bool(op) => exec_transform_bool(ctx, op, x, z),
        TransformOp::Any(op) => exec_transform_any(ctx, op, x, z),
        TransformOp::Strict(op) => exec_transform_strict(ctx, op, x, z, extra),
    }
}

/// Numeric input, floating output.
pub fn exec_transform_float(
    ctx: &LaunchContext,
    op: TransformFloatOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
) -> Result<()> {
    check_unary(TRANSFORM_FLOAT, &x, &z)?;
    require_family(TRANSFORM_FLOAT, "z", z.dtype(), TypeFamily::Float)?;
    let types = [x.dtype(), z.dtype()];
    log_dispatch(OpCode::Transform(op.into()), &types);
    dispatch_numeric!(types[0], Err(unsupported(TRANSFORM_FLOAT, &types)), |X| {
        dispatch_float!(types[1], Err(unsupported(TRANSFORM_FLOAT, &types)), |Z| {
            unary_kernel(Some(ctx), TRANSFORM_FLOAT, x, z, move |a: X| {
                Z::from_f64(op.apply(a.to_f64()))
            })
        })
    })
}

/// Output type equals input type.
pub fn exec_transform_same(
    ctx: &LaunchContext,
    op: TransformSameOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
) -> Result<()> {
    check_unary(TRANSFORM_SAME, &x, &z)?;
    require_same(TRANSFORM_SAME, ("x", "z"), x.dtype(), z.dtype())?;
    let types = [x.dtype(), z.dtype()];
    log_dispatch(OpCode::Transform(op.into()), &types);
    dispatch_numeric!(types[0], Err(unsupported(TRANSFORM_SAME, &types)), |T| {
        unary_kernel(Some(ctx), TRANSFORM_SAME, x, z, move |a: T| op.apply(a))
    })
}

/// Numeric input, bool output.
pub fn exec_transform_bool(
    ctx: &LaunchContext,
    op: TransformBoolOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
) -> Result<()> {
    check_unary(TRANSFORM_BOOL, &x, &z)?;
    require_family(TRANSFORM_BOOL, "z", z.dtype(), TypeFamily::Bool)?;
    let types = [x.dtype(), z.dtype()];
    log_dispatch(OpCode::Transform(op.into()), &types);
    dispatch_numeric!(types[0], Err(unsupported(TRANSFORM_BOOL, &types)), |X| {
        unary_kernel(Some(ctx), TRANSFORM_BOOL, x, z, move |a: X| op.apply(a))
    })
}

/// Any numeric input and output type.
pub fn exec_transform_any(
    ctx: &LaunchContext,
    op: TransformAnyOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
) -> Result<()> {
    check_unary(TRANSFORM_ANY, &x, &z)?;
    let types = [x.dtype(), z.dtype()];
    log_dispatch(OpCode::Transform(op.into()), &types);
    dispatch_numeric!(types[0], Err(unsupported(TRANSFORM_ANY, &types)), |X| {
        dispatch_numeric!(types[1], Err(unsupported(TRANSFORM_ANY, &types)), |Z| {
            unary_kernel(Some(ctx), TRANSFORM_ANY, x, z, move |a: X| op.apply::<X, Z>(a))
        })
    })
}

/// Floating input and output of the same type.
pub fn exec_transform_strict(
    ctx: &LaunchContext,
    op: TransformStrictOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
    extra: &ExtraArguments,
) -> Result<()> {
    check_unary(TRANSFORM_STRICT, &x, &z)?;
    require_family(TRANSFORM_STRICT, "x", x.dtype(), TypeFamily::Float)?;
    require_same(TRANSFORM_STRICT, ("x", "z"), x.dtype(), z.dtype())?;
    let types = [x.dtype(), z.dtype()];
    log_dispatch(OpCode::Transform(op.into()), &types);
    dispatch_float!(types[0], Err(unsupported(TRANSFORM_STRICT, &types)), |T| {
        unary_kernel(Some(ctx), TRANSFORM_STRICT, x, z, move |a: T| {
            T::from_f64(op.apply(a.to_f64(), extra))
        })
    })
}
