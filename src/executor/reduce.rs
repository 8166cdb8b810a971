//! Reduction, index-reduction and summary-statistics families.
//!
//! Every entry point takes an axis list; an empty list reduces the whole
//! array into a single element. Otherwise `x` is split into tads along the
//! axes and tad `t` lands at row-major linear index `t` of `z`.

use ndexec_shape::{NdError, Order, Result};
use ndexec_traits::{DataType, Element, TypeFamily};

use super::{
    for_each_tad, io_ptrs, log_dispatch, outer_count, require_distinct, require_len,
    require_writable, tad_pack, ArrayRef,
};
use crate::buffer::LockedBuffers;
use crate::context::LaunchContext;
use crate::dispatch::{
    dispatch_float, dispatch_numeric, require_family, require_numeric, require_same, unsupported,
};
use crate::map::fold;
use crate::maybe_sync::{MaybeSend, MaybeSync};
use crate::ops::{
    IndexReduceOp, Moments, OpCode, ReduceBoolOp, ReduceFloatOp, ReduceLongOp, ReduceOp,
    ReduceSameOp, SummaryStatsOp,
};

const REDUCE_FLOAT: &str = "reduce_float";
const REDUCE_SAME: &str = "reduce_same";
const REDUCE_BOOL: &str = "reduce_bool";
const REDUCE_LONG: &str = "reduce_long";
const INDEX_REDUCE: &str = "index_reduce";
const SUMMARY_STATS: &str = "summary_stats";

/// Shared driver: fold `x` (whole or per tad) with `init`/`update`/`merge`
/// and store `finish(acc, n)` into `z`.
#[allow(clippy::too_many_arguments)]
fn reduce_kernel<X, Z, A, I, U, M, Fin>(
    ctx: &LaunchContext,
    op: &'static str,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
    axes: &[isize],
    init: I,
    update: U,
    merge: M,
    finish: Fin,
) -> Result<()>
where
    X: Element,
    Z: Element,
    A: MaybeSend,
    I: Fn() -> A + MaybeSync + MaybeSend,
    U: Fn(A, X, usize) -> A + MaybeSync + MaybeSend,
    M: Fn(A, A) -> A + MaybeSync + MaybeSend,
    Fin: Fn(A, usize) -> Z + MaybeSync + MaybeSend,
{
    if axes.is_empty() {
        require_len(op, &z, 1)?;
        let locks = LockedBuffers::acquire(&[x.buffer], &[z.buffer]);
        let (xp, zp) = io_ptrs::<X, Z>(op, &locks, &x, &z)?;
        let acc = fold(
            Some(ctx),
            [x.shape],
            &init,
            |acc, i, [o]: [isize; 1]| {
                // SAFETY: offsets come from the bounds-checked source shape.
                update(acc, unsafe { *xp.at(o) }, i)
            },
            &merge,
        );
        // SAFETY: `z` holds exactly one element at its head offset.
        unsafe { *zp.at(0) = finish(acc, x.length()) };
        return Ok(());
    }

    let pack = tad_pack(ctx, &x, axes)?;
    let outer = outer_count(x.shape, &pack);
    require_len(op, &z, outer)?;

    let locks = LockedBuffers::acquire(&[x.buffer], &[z.buffer]);
    let (xp, zp) = io_ptrs::<X, Z>(op, &locks, &x, &z)?;
    let zs = z.shape;

    if pack.num_tads() == 0 {
        // reducing over an empty extent: every output is the empty result
        for t in 0..outer {
            // SAFETY: `t < z.length()`.
            unsafe { *zp.at(zs.index_offset_in(t, Order::C)) = finish(init(), 0) };
        }
        return Ok(());
    }

    let (ts, starts) = (pack.tad_shape(), pack.offsets());
    let n = pack.tad_length();
    for_each_tad(ctx, pack.num_tads(), |t, par| {
        let base = starts[t];
        let acc = fold(
            par,
            [ts],
            &init,
            |acc, i, [o]: [isize; 1]| {
                // SAFETY: tad offsets stay inside the bounds-checked source.
                update(acc, unsafe { *xp.at(base + o) }, i)
            },
            &merge,
        );
        // SAFETY: distinct tads write distinct positions of a writable `z`.
        unsafe { *zp.at(zs.index_offset_in(t, Order::C)) = finish(acc, n) };
    });
    Ok(())
}

fn check(op: &'static str, x: &ArrayRef<'_>, z: &ArrayRef<'_>) -> Result<()> {
    require_numeric(op, x.dtype())?;
    require_numeric(op, z.dtype())?;
    require_writable(op, z)?;
    require_distinct(op, z, &[x])
}

fn require_dtype(op: &'static str, role: &str, actual: DataType, expected: DataType) -> Result<()> {
    if actual != expected {
        return Err(NdError::type_mismatch(
            op,
            format!("{role} must be {expected}, got {actual}"),
        ));
    }
    Ok(())
}

/// Reduce with any family's opcode.
pub fn exec_reduce(
    ctx: &LaunchContext,
    op: ReduceOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
    axes: &[isize],
) -> Result<()> {
    match op {
        ReduceOp::Float(op) => exec_reduce_float(ctx, op, x, z, axes),
        ReduceOp::Same(op) => exec_reduce_same(ctx, op, x, z, axes),
        ReduceOp::Bool(op) => exec_reduce_bool(ctx, op, x, z, axes),
        ReduceOp::Long(op) => exec_reduce_long(ctx, op, x, z, axes),
    }
}

/// Numeric input, floating output accumulated in `f64`.
pub fn exec_reduce_float(
    ctx: &LaunchContext,
    op: ReduceFloatOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
    axes: &[isize],
) -> Result<()> {
    check(REDUCE_FLOAT, &x, &z)?;
    require_family(REDUCE_FLOAT, "z", z.dtype(), TypeFamily::Float)?;
    let types = [x.dtype(), z.dtype()];
    log_dispatch(OpCode::Reduce(op.into()), &types);
    dispatch_numeric!(types[0], Err(unsupported(REDUCE_FLOAT, &types)), |X| {
        dispatch_float!(types[1], Err(unsupported(REDUCE_FLOAT, &types)), |Z| {
            reduce_kernel(
                ctx,
                REDUCE_FLOAT,
                x,
                z,
                axes,
                || op.start(),
                |acc, v: X, _| op.update(acc, v.to_f64()),
                |a, b| op.merge(a, b),
                |acc, n| Z::from_f64(op.finish(acc, n)),
            )
        })
    })
}

pub fn exec_reduce_float_scalar(
    ctx: &LaunchContext,
    op: ReduceFloatOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
) -> Result<()> {
    exec_reduce_float(ctx, op, x, z, &[])
}

/// Output type equals input type.
pub fn exec_reduce_same(
    ctx: &LaunchContext,
    op: ReduceSameOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
    axes: &[isize],
) -> Result<()> {
    check(REDUCE_SAME, &x, &z)?;
    require_same(REDUCE_SAME, ("x", "z"), x.dtype(), z.dtype())?;
    let types = [x.dtype(), z.dtype()];
    log_dispatch(OpCode::Reduce(op.into()), &types);
    dispatch_numeric!(types[0], Err(unsupported(REDUCE_SAME, &types)), |T| {
        reduce_kernel(
            ctx,
            REDUCE_SAME,
            x,
            z,
            axes,
            || op.start::<T>(),
            |acc: T, v: T, _| op.update(acc, v),
            |a: T, b: T| op.merge(a, b),
            |acc: T, _| acc,
        )
    })
}

pub fn exec_reduce_same_scalar(
    ctx: &LaunchContext,
    op: ReduceSameOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
) -> Result<()> {
    exec_reduce_same(ctx, op, x, z, &[])
}

/// Numeric input, bool output.
pub fn exec_reduce_bool(
    ctx: &LaunchContext,
    op: ReduceBoolOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
    axes: &[isize],
) -> Result<()> {
    check(REDUCE_BOOL, &x, &z)?;
    require_family(REDUCE_BOOL, "z", z.dtype(), TypeFamily::Bool)?;
    let types = [x.dtype(), z.dtype()];
    log_dispatch(OpCode::Reduce(op.into()), &types);
    dispatch_numeric!(types[0], Err(unsupported(REDUCE_BOOL, &types)), |X| {
        reduce_kernel(
            ctx,
            REDUCE_BOOL,
            x,
            z,
            axes,
            || op.start(),
            |acc, v: X, _| op.update(acc, v),
            |a, b| op.merge(a, b),
            |acc: bool, _| acc,
        )
    })
}

pub fn exec_reduce_bool_scalar(
    ctx: &LaunchContext,
    op: ReduceBoolOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
) -> Result<()> {
    exec_reduce_bool(ctx, op, x, z, &[])
}

/// Numeric input, `Int64` count output.
pub fn exec_reduce_long(
    ctx: &LaunchContext,
    op: ReduceLongOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
    axes: &[isize],
) -> Result<()> {
    check(REDUCE_LONG, &x, &z)?;
    require_dtype(REDUCE_LONG, "z", z.dtype(), DataType::Int64)?;
    let types = [x.dtype(), z.dtype()];
    log_dispatch(OpCode::Reduce(op.into()), &types);
    dispatch_numeric!(types[0], Err(unsupported(REDUCE_LONG, &types)), |X| {
        reduce_kernel(
            ctx,
            REDUCE_LONG,
            x,
            z,
            axes,
            || op.start(),
            |acc, v: X, _| op.update(acc, v),
            |a, b| op.merge(a, b),
            |acc: i64, _| acc,
        )
    })
}

pub fn exec_reduce_long_scalar(
    ctx: &LaunchContext,
    op: ReduceLongOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
) -> Result<()> {
    exec_reduce_long(ctx, op, x, z, &[])
}

/// Position of the selected element within each tad, `-1` for empty tads.
pub fn exec_index_reduce(
    ctx: &LaunchContext,
    op: IndexReduceOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
    axes: &[isize],
) -> Result<()> {
    check(INDEX_REDUCE, &x, &z)?;
    require_dtype(INDEX_REDUCE, "z", z.dtype(), DataType::Int64)?;
    let types = [x.dtype(), z.dtype()];
    log_dispatch(OpCode::IndexReduce(op), &types);
    dispatch_numeric!(types[0], Err(unsupported(INDEX_REDUCE, &types)), |X| {
        reduce_kernel(
            ctx,
            INDEX_REDUCE,
            x,
            z,
            axes,
            || None,
            |best, v: X, i| op.update(best, v.to_f64(), i),
            |l, r| op.merge(l, r),
            |best, _| IndexReduceOp::finish(best),
        )
    })
}

pub fn exec_index_reduce_scalar(
    ctx: &LaunchContext,
    op: IndexReduceOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
) -> Result<()> {
    exec_index_reduce(ctx, op, x, z, &[])
}

/// Variance or standard deviation; `bias_corrected` divides by `n - 1`.
pub fn exec_summary_stats(
    ctx: &LaunchContext,
    op: SummaryStatsOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
    axes: &[isize],
    bias_corrected: bool,
) -> Result<()> {
    check(SUMMARY_STATS, &x, &z)?;
    require_family(SUMMARY_STATS, "z", z.dtype(), TypeFamily::Float)?;
    let types = [x.dtype(), z.dtype()];
    log_dispatch(OpCode::SummaryStats(op), &types);
    dispatch_numeric!(types[0], Err(unsupported(SUMMARY_STATS, &types)), |X| {
        dispatch_float!(types[1], Err(unsupported(SUMMARY_STATS, &types)), |Z| {
            reduce_kernel(
                ctx,
                SUMMARY_STATS,
                x,
                z,
                axes,
                Moments::default,
                |m: Moments, v: X, _| m.push(v.to_f64()),
                |a: Moments, b| a.merge(b),
                |m, _| Z::from_f64(op.finish(&m, bias_corrected)),
            )
        })
    })
}

pub fn exec_summary_stats_scalar(
    ctx: &LaunchContext,
    op: SummaryStatsOp,
    x: ArrayRef<'_>,
    z: ArrayRef<'_>,
    bias_corrected: bool,
) -> Result<()> {
    exec_summary_stats(ctx, op, x, z, &[], bias_corrected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::DataBuffer;
    use crate::config::ExecConfig;
    use approx::assert_relative_eq;
    use ndexec_shape::ShapeInfo;

    fn shape(dims: &[usize], dtype: DataType) -> ShapeInfo {
        ShapeInfo::new(dims, Order::C, dtype).unwrap()
    }

    #[test]
    fn test_sum_along_rows_and_columns() {
        let ctx = LaunchContext::default();
        let xb = DataBuffer::from_vec(vec![1i32, 2, 3, 4, 5, 6]).unwrap();
        let xs = shape(&[2, 3], DataType::Int32);
        let x = ArrayRef::new(&xb, 0, &xs).unwrap();

        let rows = DataBuffer::zeros(DataType::Int32, 2);
        let rs = shape(&[2], DataType::Int32);
        let z = ArrayRef::new(&rows, 0, &rs).unwrap();
        exec_reduce_same(&ctx, ReduceSameOp::Sum, x, z, &[1]).unwrap();
        assert_eq!(rows.to_vec::<i32>().unwrap(), vec![6, 15]);

        let cols = DataBuffer::zeros(DataType::Int32, 3);
        let cs = shape(&[3], DataType::Int32);
        let z = ArrayRef::new(&cols, 0, &cs).unwrap();
        exec_reduce_same(&ctx, ReduceSameOp::Max, x, z, &[0]).unwrap();
        assert_eq!(cols.to_vec::<i32>().unwrap(), vec![4, 5, 6]);
    }

    #[test]
    fn test_mean_scalar_into_double() {
        let ctx = LaunchContext::default();
        let xb = DataBuffer::from_vec(vec![1u8, 2, 3, 6]).unwrap();
        let xs = shape(&[4], DataType::UInt8);
        let zb = DataBuffer::zeros(DataType::Double, 1);
        let zs = ShapeInfo::scalar(DataType::Double);
        let x = ArrayRef::new(&xb, 0, &xs).unwrap();
        let z = ArrayRef::new(&zb, 0, &zs).unwrap();
        exec_reduce_float_scalar(&ctx, ReduceFloatOp::Mean, x, z).unwrap();
        assert_relative_eq!(zb.to_vec::<f64>().unwrap()[0], 3.0);
    }

    #[test]
    fn test_parallel_sum_matches_sequential() {
        let ctx = LaunchContext::new(ExecConfig::default().with_elementwise_threshold(64));
        let data: Vec<i64> = (0..10_000).collect();
        let xb = DataBuffer::from_vec(data).unwrap();
        let xs = shape(&[10_000], DataType::Int64);
        let zb = DataBuffer::zeros(DataType::Int64, 1);
        let zs = ShapeInfo::scalar(DataType::Int64);
        let x = ArrayRef::new(&xb, 0, &xs).unwrap();
        let z = ArrayRef::new(&zb, 0, &zs).unwrap();
        exec_reduce_same_scalar(&ctx, ReduceSameOp::Sum, x, z).unwrap();
        assert_eq!(zb.to_vec::<i64>().unwrap(), vec![49_995_000]);
    }

    #[test]
    fn test_index_max_per_row() {
        let ctx = LaunchContext::default();
        let xb = DataBuffer::from_vec(vec![1.0f32, 9.0, 9.0, -4.0, 2.0, -8.0]).unwrap();
        let xs = shape(&[2, 3], DataType::Float);
        let zb = DataBuffer::zeros(DataType::Int64, 2);
        let zs = shape(&[2], DataType::Int64);
        let x = ArrayRef::new(&xb, 0, &xs).unwrap();
        let z = ArrayRef::new(&zb, 0, &zs).unwrap();
        exec_index_reduce(&ctx, IndexReduceOp::IndexMax, x, z, &[1]).unwrap();
        assert_eq!(zb.to_vec::<i64>().unwrap(), vec![1, 1]);
        exec_index_reduce(&ctx, IndexReduceOp::IndexAbsMax, x, z, &[1]).unwrap();
        assert_eq!(zb.to_vec::<i64>().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_empty_tads_yield_empty_results() {
        let ctx = LaunchContext::default();
        let xb = DataBuffer::zeros(DataType::Float, 0);
        let xs = shape(&[0, 3], DataType::Float);
        let x = ArrayRef::new(&xb, 0, &xs).unwrap();

        let zb = DataBuffer::from_vec(vec![7.0f32; 3]).unwrap();
        let zs = shape(&[3], DataType::Float);
        let z = ArrayRef::new(&zb, 0, &zs).unwrap();
        exec_reduce_same(&ctx, ReduceSameOp::Sum, x, z, &[0]).unwrap();
        assert_eq!(zb.to_vec::<f32>().unwrap(), vec![0.0; 3]);

        let ib = DataBuffer::zeros(DataType::Int64, 3);
        let is = shape(&[3], DataType::Int64);
        let z = ArrayRef::new(&ib, 0, &is).unwrap();
        exec_index_reduce(&ctx, IndexReduceOp::IndexMin, x, z, &[0]).unwrap();
        assert_eq!(ib.to_vec::<i64>().unwrap(), vec![-1; 3]);
    }

    #[test]
    fn test_variance_along_axis() {
        let ctx = LaunchContext::default();
        let xb = DataBuffer::from_vec(vec![1.0f64, 2.0, 3.0, 4.0, 4.0, 4.0]).unwrap();
        let xs = shape(&[2, 3], DataType::Double);
        let zb = DataBuffer::zeros(DataType::Double, 2);
        let zs = shape(&[2], DataType::Double);
        let x = ArrayRef::new(&xb, 0, &xs).unwrap();
        let z = ArrayRef::new(&zb, 0, &zs).unwrap();
        exec_summary_stats(&ctx, SummaryStatsOp::Variance, x, z, &[1], true).unwrap();
        let out = zb.to_vec::<f64>().unwrap();
        assert_relative_eq!(out[0], 1.0);
        assert_relative_eq!(out[1], 0.0);
    }

    #[test]
    fn test_count_and_any() {
        let ctx = LaunchContext::default();
        let xb = DataBuffer::from_vec(vec![0i16, 3, 0, 0]).unwrap();
        let xs = shape(&[2, 2], DataType::Int16);
        let x = ArrayRef::new(&xb, 0, &xs).unwrap();

        let cb = DataBuffer::zeros(DataType::Int64, 1);
        let cs = ShapeInfo::scalar(DataType::Int64);
        let z = ArrayRef::new(&cb, 0, &cs).unwrap();
        exec_reduce_long_scalar(&ctx, ReduceLongOp::CountZero, x, z).unwrap();
        assert_eq!(cb.to_vec::<i64>().unwrap(), vec![3]);

        let bb = DataBuffer::zeros(DataType::Bool, 2);
        let bs = shape(&[2], DataType::Bool);
        let z = ArrayRef::new(&bb, 0, &bs).unwrap();
        exec_reduce(&ctx, ReduceBoolOp::Any.into(), x, z, &[1]).unwrap();
        assert_eq!(bb.to_vec::<bool>().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_destination_aliasing_source_rejected() {
        let ctx = LaunchContext::default();
        let xb = DataBuffer::from_vec(vec![1.0f32, 2.0]).unwrap();
        let xs = shape(&[2], DataType::Float);
        let zs = ShapeInfo::scalar(DataType::Float);
        let x = ArrayRef::new(&xb, 0, &xs).unwrap();
        let z = ArrayRef::new(&xb, 0, &zs).unwrap();
        assert!(matches!(
            exec_reduce_same_scalar(&ctx, ReduceSameOp::Sum, x, z),
            Err(NdError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_wrong_output_type_rejected() {
        let ctx = LaunchContext::default();
        let xb = DataBuffer::from_vec(vec![1.0f32, 2.0]).unwrap();
        let xs = shape(&[2], DataType::Float);
        let zb = DataBuffer::zeros(DataType::Int32, 1);
        let zs = ShapeInfo::scalar(DataType::Int32);
        let x = ArrayRef::new(&xb, 0, &xs).unwrap();
        let z = ArrayRef::new(&zb, 0, &zs).unwrap();
        assert!(matches!(
            exec_index_reduce_scalar(&ctx, IndexReduceOp::IndexMax, x, z),
            Err(NdError::DataTypeMismatch { .. })
        ));
    }
}
