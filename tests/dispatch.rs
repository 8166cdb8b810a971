//! Every declared-legal type combination reaches a kernel.

use ndexec::{
    exec_reduce3_scalar, exec_transform_float, DataType, ExtraArguments, IndexReduceOp,
    LaunchContext, NdArray, NdError, Order, PairwiseBoolOp, PairwiseOp, Reduce3Op, ReduceBoolOp,
    ReduceLongOp, ReduceSameOp, SummaryStatsOp, TransformFloatOp, TransformSameOp,
};

const DIMS: [usize; 2] = [3, 4];

fn filled(dtype: DataType, value: f64) -> NdArray {
    let a = NdArray::new(&DIMS, Order::C, dtype).unwrap();
    a.fill(value).unwrap();
    a
}

fn empty(dtype: DataType) -> NdArray {
    NdArray::new(&DIMS, Order::F, dtype).unwrap()
}

#[test]
fn test_same_type_families() {
    let none = ExtraArguments::new();
    for &t in DataType::NUMERIC.iter() {
        let x = filled(t, 1.0);
        let z = empty(t);
        x.apply_transform(TransformSameOp::Abs, &z, &none)
            .unwrap_or_else(|e| panic!("abs {t}: {e}"));
        x.apply_pairwise_transform(PairwiseOp::Add, &x, &z)
            .unwrap_or_else(|e| panic!("add {t}: {e}"));
        x.apply_scalar(PairwiseOp::Max, 0, &z)
            .unwrap_or_else(|e| panic!("scalar max {t}: {e}"));
        x.reduce_along_dimension(ReduceSameOp::Sum, &[0], false)
            .unwrap_or_else(|e| panic!("sum {t}: {e}"));
        let any = x.reduce_number(ReduceBoolOp::Any).unwrap();
        assert!(any.e::<bool>(0).unwrap(), "{t}");
        let count = x.reduce_number(ReduceLongOp::CountNonZero).unwrap();
        assert_eq!(count.e::<i64>(0).unwrap(), 12, "{t}");
        let idx = x.apply_index_reduce(IndexReduceOp::IndexMax, &[1]).unwrap();
        assert_eq!(idx.to_vec::<i64>().unwrap(), vec![0, 0, 0], "{t}");
        let flags = NdArray::new(&DIMS, Order::C, DataType::Bool).unwrap();
        x.apply_pairwise_bool_transform(PairwiseBoolOp::EqualTo, &x, &flags)
            .unwrap_or_else(|e| panic!("equal {t}: {e}"));
        assert_eq!(flags.to_vec::<bool>().unwrap(), vec![true; 12], "{t}");
    }
}

#[test]
fn test_float_output_families() {
    let ctx = LaunchContext::default();
    let none = ExtraArguments::new();
    for &x_type in DataType::NUMERIC.iter() {
        let x = filled(x_type, 1.0);
        for &z_type in DataType::FLOAT.iter() {
            let z = empty(z_type);
            exec_transform_float(&ctx, TransformFloatOp::Sqrt, x.operand().unwrap(), z.operand().unwrap())
                .unwrap_or_else(|e| panic!("sqrt {x_type}->{z_type}: {e}"));
            assert_eq!(z.e::<f64>(0).unwrap(), 1.0);

            let s = NdArray::new(&[], Order::C, z_type).unwrap();
            exec_reduce3_scalar(
                &ctx,
                Reduce3Op::Dot,
                x.operand().unwrap(),
                x.operand().unwrap(),
                s.operand().unwrap(),
                &none,
            )
            .unwrap_or_else(|e| panic!("dot {x_type}->{z_type}: {e}"));
            assert_eq!(s.e::<f64>(0).unwrap(), 12.0);
        }
        let v = x.variance_number(SummaryStatsOp::Variance, true).unwrap();
        assert_eq!(v.e::<f64>(0).unwrap(), 0.0, "{x_type}");
    }
}

#[test]
fn test_assign_converts_between_every_pair() {
    for &from in DataType::NUMERIC.iter() {
        let x = filled(from, 1.0);
        for &to in DataType::NUMERIC.iter() {
            let z = empty(to);
            z.assign(&x)
                .unwrap_or_else(|e| panic!("assign {from}->{to}: {e}"));
            assert_eq!(z.to_vec::<f64>().unwrap(), vec![1.0; 12], "{from}->{to}");
        }
    }
}

#[test]
fn test_mixed_pairwise_types_rejected() {
    let x = filled(DataType::Int32, 1.0);
    let y = filled(DataType::Float, 1.0);
    let z = empty(DataType::Float);
    let err = x.apply_pairwise_transform(PairwiseOp::Add, &y, &z).unwrap_err();
    assert!(matches!(err, NdError::DataTypeMismatch { .. }));
}

#[test]
fn test_constrained_outputs_rejected() {
    let none = ExtraArguments::new();
    let x = filled(DataType::Int32, 4.0);
    let z = empty(DataType::Int64);
    assert!(matches!(
        x.apply_transform(TransformFloatOp::Sqrt, &z, &none),
        Err(NdError::DataTypeMismatch { .. })
    ));
    assert!(matches!(
        x.apply_transform(TransformSameOp::Abs, &z, &none),
        Err(NdError::DataTypeMismatch { .. })
    ));
}
