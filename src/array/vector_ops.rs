//! Row and column vector broadcasts over matrices.

use ndexec_shape::{NdError, Result};

use super::NdArray;
use crate::executor::exec_broadcast;
use crate::ops::PairwiseOp;

#[derive(Clone, Copy)]
enum Along {
    Row,
    Column,
}

impl NdArray {
    fn vector_op(
        &self,
        op_name: &'static str,
        op: PairwiseOp,
        along: Along,
        vector: &NdArray,
        target: &NdArray,
    ) -> Result<()> {
        for a in [self, vector, target] {
            a.require_numeric(op_name)?;
        }
        for a in [self, target] {
            if a.rank() != 2 {
                return Err(NdError::RankMismatch {
                    op: op_name,
                    expected: 2,
                    actual: a.rank(),
                });
            }
        }
        if self.dims() != target.dims() {
            return Err(NdError::shape_mismatch(op_name, self.dims(), target.dims()));
        }
        let (fits, extent, axis) = match along {
            Along::Row => (vector.shape.is_row_vector(), self.dims()[1], 1),
            Along::Column => (vector.shape.is_column_vector(), self.dims()[0], 0),
        };
        if !fits || vector.length() != extent {
            return Err(NdError::shape_mismatch(op_name, self.dims(), vector.dims()));
        }
        exec_broadcast(
            &self.context,
            op,
            self.operand()?,
            vector.operand()?,
            target.operand()?,
            &[axis],
        )
    }

    /// `target[i, j] = self[i, j] + row[j]`
    pub fn add_row_vector(&self, row: &NdArray, target: &NdArray) -> Result<()> {
        self.vector_op("add_row_vector", PairwiseOp::Add, Along::Row, row, target)
    }

    pub fn addi_row_vector(&self, row: &NdArray) -> Result<()> {
        self.vector_op("addi_row_vector", PairwiseOp::Add, Along::Row, row, self)
    }

    pub fn sub_row_vector(&self, row: &NdArray, target: &NdArray) -> Result<()> {
        self.vector_op("sub_row_vector", PairwiseOp::Subtract, Along::Row, row, target)
    }

    pub fn mul_row_vector(&self, row: &NdArray, target: &NdArray) -> Result<()> {
        self.vector_op("mul_row_vector", PairwiseOp::Multiply, Along::Row, row, target)
    }

    /// Fails with [`NdError::InvalidArgument`] for bool operands.
    pub fn div_row_vector(&self, row: &NdArray, target: &NdArray) -> Result<()> {
        self.vector_op("div_row_vector", PairwiseOp::Divide, Along::Row, row, target)
    }

    /// `target[i, j] = self[i, j] + column[i]`
    pub fn add_column_vector(&self, column: &NdArray, target: &NdArray) -> Result<()> {
        self.vector_op("add_column_vector", PairwiseOp::Add, Along::Column, column, target)
    }

    pub fn addi_column_vector(&self, column: &NdArray) -> Result<()> {
        self.vector_op("addi_column_vector", PairwiseOp::Add, Along::Column, column, self)
    }

    pub fn muli_column_vector(&self, column: &NdArray) -> Result<()> {
        self.vector_op("muli_column_vector", PairwiseOp::Multiply, Along::Column, column, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndexec_shape::Order;
    use ndexec_traits::DataType;

    fn matrix() -> NdArray {
        NdArray::from_vec(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], Order::C).unwrap()
    }

    #[test]
    fn test_add_row_vector() {
        let m = matrix();
        let row = NdArray::from_vec(vec![1.0f32, 1.0, 1.0], &[3], Order::C).unwrap();
        let out = NdArray::new(&[2, 3], Order::C, DataType::Float).unwrap();
        m.add_row_vector(&row, &out).unwrap();
        assert_eq!(out.to_vec::<f32>().unwrap(), vec![2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_in_place_row_and_column() {
        let m = matrix();
        let row = NdArray::from_vec(vec![10.0f32, 20.0, 30.0], &[1, 3], Order::C).unwrap();
        m.addi_row_vector(&row).unwrap();
        assert_eq!(
            m.to_vec::<f32>().unwrap(),
            vec![11.0, 22.0, 33.0, 14.0, 25.0, 36.0]
        );
        let col = NdArray::from_vec(vec![1.0f32, -1.0], &[2, 1], Order::C).unwrap();
        m.muli_column_vector(&col).unwrap();
        assert_eq!(
            m.to_vec::<f32>().unwrap(),
            vec![11.0, 22.0, 33.0, -14.0, -25.0, -36.0]
        );
    }

    #[test]
    fn test_column_vector_into_f_order_target() {
        let m = matrix();
        let col = NdArray::from_vec(vec![100.0f32, 200.0], &[2, 1], Order::C).unwrap();
        let out = NdArray::new(&[2, 3], Order::F, DataType::Float).unwrap();
        m.add_column_vector(&col, &out).unwrap();
        assert_eq!(
            out.to_vec::<f32>().unwrap(),
            vec![101.0, 102.0, 103.0, 204.0, 205.0, 206.0]
        );
    }

    #[test]
    fn test_vector_shape_checked() {
        let m = matrix();
        let out = NdArray::new(&[2, 3], Order::C, DataType::Float).unwrap();
        let col = NdArray::new(&[2, 1], Order::C, DataType::Float).unwrap();
        assert!(matches!(
            m.add_row_vector(&col, &out),
            Err(NdError::ShapeMismatch { .. })
        ));
        let short = NdArray::new(&[2], Order::C, DataType::Float).unwrap();
        assert!(matches!(
            m.sub_row_vector(&short, &out),
            Err(NdError::ShapeMismatch { .. })
        ));
        let cube = NdArray::new(&[2, 3, 1], Order::C, DataType::Float).unwrap();
        assert!(matches!(
            cube.addi_row_vector(&short),
            Err(NdError::RankMismatch { .. })
        ));
    }

    #[test]
    fn test_div_row_vector_rejects_bool() {
        let m = NdArray::from_vec(vec![true, false, true, true], &[2, 2], Order::C).unwrap();
        let row = NdArray::from_vec(vec![true, true], &[2], Order::C).unwrap();
        let out = NdArray::new(&[2, 2], Order::C, DataType::Bool).unwrap();
        assert!(matches!(
            m.div_row_vector(&row, &out),
            Err(NdError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_row_vector_viewing_target_rejected() {
        let m = NdArray::from_vec(vec![1.0f64, 2.0, 3.0, 4.0], &[2, 2], Order::C).unwrap();
        let first = m.tensor_along_dimension(0, &[1]).unwrap();
        assert!(matches!(
            m.addi_row_vector(&first),
            Err(NdError::InvalidArgument { .. })
        ));
        assert_eq!(m.to_vec::<f64>().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }
}
