//! Random family: fill `z` from a seeded generator, optionally mixing in
//! source arrays.

use ndexec_shape::{NdError, Order, Result};
use ndexec_traits::{Element, TypeFamily};

use super::elementwise::read_values;
use super::{log_dispatch, require_len, require_writable, ArrayRef};
use crate::buffer::LockedBuffers;
use crate::context::LaunchContext;
use crate::dispatch::{dispatch_float, dispatch_numeric, require_family, unsupported};
use crate::extra::ExtraArguments;
use crate::ops::{OpCode, RandomGenerator, RandomOp};

const RANDOM: &str = "random";

/// Fill `z` with samples of `op`, drawing from `rng` in row-major order.
///
/// `sources` must hold exactly `op.arity()` arrays, each as long as `z`.
/// Generation is sequential, so equal seeds give equal results regardless
/// of the context thresholds.
pub fn exec_random(
    _ctx: &LaunchContext,
    rng: &mut RandomGenerator,
    op: RandomOp,
    sources: &[ArrayRef<'_>],
    z: ArrayRef<'_>,
    extra: &ExtraArguments,
) -> Result<()> {
    if sources.len() != op.arity() {
        return Err(NdError::invalid(
            RANDOM,
            format!("{op} takes {} source arrays, got {}", op.arity(), sources.len()),
        ));
    }
    require_family(RANDOM, "z", z.dtype(), TypeFamily::Float)?;
    require_writable(RANDOM, &z)?;
    for s in sources {
        require_len(RANDOM, s, z.length())?;
    }
    let mut types = vec![z.dtype()];
    types.extend(sources.iter().map(|s| s.dtype()));
    log_dispatch(OpCode::Random(op), &types);

    let inputs = sources
        .iter()
        .map(source_values)
        .collect::<Result<Vec<_>>>()?;

    dispatch_float!(z.dtype(), Err(unsupported(RANDOM, &types)), |Z| {
        fill::<Z>(rng, op, &inputs, z, extra)
    })
}

/// Source elements as `f64`, read in row-major order before `z` is locked.
fn source_values(s: &ArrayRef<'_>) -> Result<Vec<f64>> {
    dispatch_numeric!(s.dtype(), Err(NdError::UnsupportedOnStringArray { op: RANDOM }), |T| {
        read_values::<T>(RANDOM, s)
            .map(|v| v.into_iter().map(Element::to_f64).collect())
    })
}

fn fill<Z: Element>(
    rng: &mut RandomGenerator,
    op: RandomOp,
    inputs: &[Vec<f64>],
    z: ArrayRef<'_>,
    extra: &ExtraArguments,
) -> Result<()> {
    let locks = LockedBuffers::acquire(&[], &[z.buffer]);
    let base = locks.ptr_mut::<Z>(RANDOM, z.buffer, z.offset)?;
    let mut row = vec![0.0; inputs.len()];
    for i in 0..z.length() {
        for (slot, src) in row.iter_mut().zip(inputs) {
            *slot = src[i];
        }
        let value = op.sample(rng, &row, extra);
        // SAFETY: `i < z.length()` addresses the bounds-checked destination.
        unsafe { *base.offset(z.shape.index_offset_in(i, Order::C)) = Z::from_f64(value) };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::DataBuffer;
    use ndexec_shape::ShapeInfo;
    use ndexec_traits::DataType;

    #[test]
    fn test_same_seed_same_fill() {
        let ctx = LaunchContext::default();
        let zs = ShapeInfo::new(&[4, 5], Order::C, DataType::Double).unwrap();
        let a = DataBuffer::zeros(DataType::Double, 20);
        let b = DataBuffer::zeros(DataType::Double, 20);
        let extra = ExtraArguments::from([-1.0, 1.0]);
        for buf in [&a, &b] {
            let mut rng = RandomGenerator::new(11);
            let z = ArrayRef::new(buf, 0, &zs).unwrap();
            exec_random(&ctx, &mut rng, RandomOp::Uniform, &[], z, &extra).unwrap();
        }
        let va = a.to_vec::<f64>().unwrap();
        assert_eq!(va, b.to_vec::<f64>().unwrap());
        assert!(va.iter().all(|v| (-1.0..1.0).contains(v)));
    }

    #[test]
    fn test_dropout_keeps_or_zeroes_source() {
        let ctx = LaunchContext::default();
        let shape = ShapeInfo::new(&[100], Order::C, DataType::Float).unwrap();
        let xb = DataBuffer::from_vec(vec![2.0f32; 100]).unwrap();
        let zb = DataBuffer::zeros(DataType::Float, 100);
        let x = ArrayRef::new(&xb, 0, &shape).unwrap();
        let z = ArrayRef::new(&zb, 0, &shape).unwrap();
        let mut rng = RandomGenerator::new(5);
        exec_random(&ctx, &mut rng, RandomOp::DropOut, &[x], z, &[0.5].into()).unwrap();
        let out = zb.to_vec::<f32>().unwrap();
        assert!(out.iter().all(|&v| v == 0.0 || v == 2.0));
        assert!(out.iter().any(|&v| v == 2.0));
    }

    #[test]
    fn test_arity_and_type_checked() {
        let ctx = LaunchContext::default();
        let shape = ShapeInfo::new(&[3], Order::C, DataType::Int32).unwrap();
        let zb = DataBuffer::zeros(DataType::Int32, 3);
        let z = ArrayRef::new(&zb, 0, &shape).unwrap();
        let mut rng = RandomGenerator::new(1);
        let none = ExtraArguments::new();
        assert!(matches!(
            exec_random(&ctx, &mut rng, RandomOp::Gaussian, &[], z, &none),
            Err(NdError::DataTypeMismatch { .. })
        ));
        assert!(matches!(
            exec_random(&ctx, &mut rng, RandomOp::DropOut, &[], z, &none),
            Err(NdError::InvalidArgument { .. })
        ));
    }
}
