//! Caller-supplied element functions.
//!
//! Every operand must hold exactly the closure's element type `T`, and all
//! operands must share one set of extents. The executor's planned iteration
//! takes the linear path when the layouts are contiguous and compatible and
//! recomputes offsets otherwise.

use ndexec_shape::{NdError, Result};
use ndexec_traits::Element;

use super::NdArray;
use crate::executor::{
    binary_indexed_kernel, binary_kernel, ternary_kernel, unary_indexed_kernel, unary_kernel,
};
use crate::maybe_sync::{MaybeSend, MaybeSync};

const LAMBDA: &str = "apply_lambda";
const INDEXED_LAMBDA: &str = "apply_indexed_lambda";
const PAIRWISE_LAMBDA: &str = "apply_pairwise_lambda";
const INDEXED_PAIRWISE_LAMBDA: &str = "apply_indexed_pairwise_lambda";
const TRIPLEWISE_LAMBDA: &str = "apply_triplewise_lambda";

fn check_operands<T: Element>(op: &'static str, operands: &[&NdArray]) -> Result<()> {
    for a in operands {
        a.require_numeric(op)?;
        if a.dtype() != T::DTYPE {
            return Err(NdError::type_mismatch(
                op,
                format!("function takes {}, array holds {}", T::DTYPE, a.dtype()),
            ));
        }
    }
    let first = operands[0];
    for a in &operands[1..] {
        if a.dims() != first.dims() {
            return Err(NdError::shape_mismatch(op, first.dims(), a.dims()));
        }
    }
    Ok(())
}

impl NdArray {
    /// `target[i] = f(self[i])`
    pub fn apply_lambda<T, F>(&self, f: F, target: &NdArray) -> Result<()>
    where
        T: Element,
        F: Fn(T) -> T + MaybeSync + MaybeSend,
    {
        check_operands::<T>(LAMBDA, &[self, target])?;
        unary_kernel(
            Some(&self.context),
            LAMBDA,
            self.operand()?,
            target.operand()?,
            f,
        )
    }

    /// `target[i] = f(i, self[i])`, `i` counted in the target's ordering.
    pub fn apply_indexed_lambda<T, F>(&self, f: F, target: &NdArray) -> Result<()>
    where
        T: Element,
        F: Fn(usize, T) -> T + MaybeSync + MaybeSend,
    {
        check_operands::<T>(INDEXED_LAMBDA, &[self, target])?;
        unary_indexed_kernel(
            Some(&self.context),
            INDEXED_LAMBDA,
            self.operand()?,
            target.operand()?,
            f,
        )
    }

    /// `target[i] = f(self[i], other[i])`
    pub fn apply_pairwise_lambda<T, F>(&self, other: &NdArray, f: F, target: &NdArray) -> Result<()>
    where
        T: Element,
        F: Fn(T, T) -> T + MaybeSync + MaybeSend,
    {
        check_operands::<T>(PAIRWISE_LAMBDA, &[self, other, target])?;
        binary_kernel(
            Some(&self.context),
            PAIRWISE_LAMBDA,
            self.operand()?,
            other.operand()?,
            target.operand()?,
            f,
        )
    }

    /// `target[i] = f(i, self[i], other[i])`
    pub fn apply_indexed_pairwise_lambda<T, F>(
        &self,
        other: &NdArray,
        f: F,
        target: &NdArray,
    ) -> Result<()>
    where
        T: Element,
        F: Fn(usize, T, T) -> T + MaybeSync + MaybeSend,
    {
        check_operands::<T>(INDEXED_PAIRWISE_LAMBDA, &[self, other, target])?;
        binary_indexed_kernel(
            Some(&self.context),
            INDEXED_PAIRWISE_LAMBDA,
            self.operand()?,
            other.operand()?,
            target.operand()?,
            f,
        )
    }

    /// `target[i] = f(self[i], second[i], third[i])`
    pub fn apply_triplewise_lambda<T, F>(
        &self,
        second: &NdArray,
        third: &NdArray,
        f: F,
        target: &NdArray,
    ) -> Result<()>
    where
        T: Element,
        F: Fn(T, T, T) -> T + MaybeSync + MaybeSend,
    {
        check_operands::<T>(TRIPLEWISE_LAMBDA, &[self, second, third, target])?;
        ternary_kernel(
            Some(&self.context),
            TRIPLEWISE_LAMBDA,
            [self.operand()?, second.operand()?, third.operand()?],
            target.operand()?,
            f,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndexec_shape::Order;
    use ndexec_traits::DataType;

    #[test]
    fn test_lambda_in_place() {
        let a = NdArray::from_vec(vec![1i32, 2, 3, 4], &[2, 2], Order::C).unwrap();
        a.apply_lambda(|x: i32| x * 10, &a).unwrap();
        assert_eq!(a.to_vec::<i32>().unwrap(), vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_lambda_over_own_transpose_rejected() {
        let a = NdArray::from_vec(vec![1i32, 2, 3, 4], &[2, 2], Order::C).unwrap();
        let t = a.transpose().unwrap();
        assert!(matches!(
            t.apply_lambda(|x: i32| x, &a),
            Err(NdError::InvalidArgument { .. })
        ));
        assert!(matches!(
            a.apply_pairwise_lambda(&t, |x: i32, y: i32| x + y, &a),
            Err(NdError::InvalidArgument { .. })
        ));
        assert_eq!(a.to_vec::<i32>().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_lambda_type_must_match() {
        let a = NdArray::new(&[3], Order::C, DataType::Float).unwrap();
        let err = a.apply_lambda(|x: f64| x, &a).unwrap_err();
        assert!(matches!(err, NdError::DataTypeMismatch { .. }));
    }

    #[test]
    fn test_indexed_lambda_counts_in_target_order() {
        let a = NdArray::new(&[2, 2], Order::C, DataType::Int64).unwrap();
        let t = NdArray::new(&[2, 2], Order::F, DataType::Int64).unwrap();
        a.apply_indexed_lambda(|i, x: i64| x + i as i64, &t).unwrap();
        assert_eq!(t.buffer().to_vec::<i64>().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_pairwise_lambda_over_views() {
        let a = NdArray::from_vec(vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], Order::C).unwrap();
        let b = NdArray::from_vec(vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2], Order::C).unwrap();
        let bt = b.transpose().unwrap();
        let out = NdArray::new(&[2, 3], Order::C, DataType::Double).unwrap();
        a.apply_pairwise_lambda(&bt, |x: f64, y: f64| x - y, &out)
            .unwrap();
        // bt = [[1, 3, 5], [2, 4, 6]]
        assert_eq!(
            out.to_vec::<f64>().unwrap(),
            vec![0.0, -1.0, -2.0, 2.0, 1.0, 0.0]
        );
        assert!(matches!(
            a.apply_pairwise_lambda(&b, |x: f64, y: f64| x + y, &out),
            Err(NdError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_indexed_pairwise_and_triplewise() {
        let a = NdArray::from_vec(vec![1u8, 2, 3], &[3], Order::C).unwrap();
        let b = NdArray::from_vec(vec![10u8, 20, 30], &[3], Order::C).unwrap();
        let out = NdArray::new(&[3], Order::C, DataType::UInt8).unwrap();
        a.apply_indexed_pairwise_lambda(&b, |i, x: u8, y: u8| x + y + i as u8, &out)
            .unwrap();
        assert_eq!(out.to_vec::<u8>().unwrap(), vec![11, 23, 35]);
        a.apply_triplewise_lambda(&b, &out, |x: u8, y: u8, z: u8| z - y - x, &out)
            .unwrap();
        assert_eq!(out.to_vec::<u8>().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_strings_rejected() {
        let s = NdArray::from_strings(vec!["a".into()], &[1], Order::C).unwrap();
        assert!(matches!(
            s.apply_lambda(|x: f32| x, &s),
            Err(NdError::UnsupportedOnStringArray { .. })
        ));
    }
}
