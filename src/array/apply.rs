//! Array-level entry points onto the executor families.
//!
//! Methods named `apply_*` write into a caller-provided target; the others
//! allocate their result on the array's context. Result element types
//! follow the family rules: float-valued results of non-float inputs use the
//! context's default float type.

use ndexec_shape::{
    broadcast_shape, normalize_axes, reduced_shape, NdError, Order, Result, ShapeInfo,
};
use ndexec_traits::{DataType, Element};

use super::NdArray;
use crate::executor::{
    exec_broadcast, exec_broadcast_bool, exec_index_reduce, exec_pairwise_bool_transform,
    exec_pairwise_transform, exec_reduce, exec_reduce3, exec_reduce3_all, exec_reduce3_scalar,
    exec_scalar, exec_scalar_bool, exec_summary_stats, exec_transform, ArrayRef,
};
use crate::extra::ExtraArguments;
use crate::ops::{
    IndexReduceOp, PairwiseBoolOp, PairwiseOp, Reduce3Op, ReduceOp, SummaryStatsOp, TransformOp,
};

impl NdArray {
    fn float_type(&self) -> DataType {
        self.dtype().floating_or(self.context.config().default_float)
    }

    /// Fresh destination for a reduction of this array over `axes`.
    fn reduced(
        &self,
        op: &'static str,
        axes: &[isize],
        keep_dims: bool,
        dtype: DataType,
    ) -> Result<NdArray> {
        let axes = normalize_axes(op, self.rank(), axes)?;
        Ok(self.allocate(reduced_shape(&self.shape, &axes, keep_dims, dtype)?))
    }

    // ------------------------------------------------------------------------
    // Transforms
    // ------------------------------------------------------------------------

    /// `target = op(self)` element-wise.
    pub fn apply_transform(
        &self,
        op: impl Into<TransformOp>,
        target: &NdArray,
        extra: &ExtraArguments,
    ) -> Result<()> {
        exec_transform(&self.context, op.into(), self.operand()?, target.operand()?, extra)
    }

    /// `op(self)` into a new array of the family's result type.
    pub fn transform(&self, op: impl Into<TransformOp>, extra: &ExtraArguments) -> Result<NdArray> {
        let op = op.into();
        self.require_numeric("transform")?;
        let dtype = match op {
            TransformOp::Float(_) => self.float_type(),
            TransformOp::Bool(_) => DataType::Bool,
            TransformOp::Same(_) | TransformOp::Any(_) | TransformOp::Strict(_) => self.dtype(),
        };
        let out = self.allocate(ShapeInfo::new(self.dims(), self.ordering(), dtype)?);
        self.apply_transform(op, &out, extra)?;
        Ok(out)
    }

    /// `target = op(self, other)` element-wise.
    pub fn apply_pairwise_transform(
        &self,
        op: PairwiseOp,
        other: &NdArray,
        target: &NdArray,
    ) -> Result<()> {
        exec_pairwise_transform(
            &self.context,
            op,
            self.operand()?,
            other.operand()?,
            target.operand()?,
        )
    }

    /// Element-wise comparison into a bool target.
    pub fn apply_pairwise_bool_transform(
        &self,
        op: PairwiseBoolOp,
        other: &NdArray,
        target: &NdArray,
    ) -> Result<()> {
        exec_pairwise_bool_transform(
            &self.context,
            op,
            self.operand()?,
            other.operand()?,
            target.operand()?,
        )
    }

    // ------------------------------------------------------------------------
    // Scalar
    // ------------------------------------------------------------------------

    /// Single-element array of this array's type holding `value`.
    fn scalar_of<T: Element>(&self, op: &'static str, value: T) -> Result<NdArray> {
        self.require_numeric(op)?;
        let s = self.allocate(ShapeInfo::scalar(self.dtype()));
        s.p(0, value)?;
        Ok(s)
    }

    /// `target = op(self, scalar)`, the scalar converted to this array's
    /// type first.
    pub fn apply_scalar<T: Element>(&self, op: PairwiseOp, scalar: T, target: &NdArray) -> Result<()> {
        let s = self.scalar_of("apply_scalar", scalar)?;
        self.apply_scalar_arr(op, &s, target)
    }

    /// `target = op(self, scalar)` with a single-element scalar array.
    pub fn apply_scalar_arr(&self, op: PairwiseOp, scalar: &NdArray, target: &NdArray) -> Result<()> {
        require_single("apply_scalar", scalar)?;
        exec_scalar(
            &self.context,
            op,
            self.operand()?,
            target.operand()?,
            scalar.operand()?,
        )
    }

    /// Comparison against a scalar into a bool target.
    pub fn apply_scalar_bool<T: Element>(
        &self,
        op: PairwiseBoolOp,
        scalar: T,
        target: &NdArray,
    ) -> Result<()> {
        let s = self.scalar_of("apply_scalar_bool", scalar)?;
        exec_scalar_bool(
            &self.context,
            op,
            self.operand()?,
            target.operand()?,
            s.operand()?,
        )
    }

    // ------------------------------------------------------------------------
    // Broadcast
    // ------------------------------------------------------------------------

    /// `target[tad t] = op(self[tad t], other)` for every tad along `axes`.
    pub fn apply_broadcast(
        &self,
        op: PairwiseOp,
        axes: &[isize],
        other: &NdArray,
        target: &NdArray,
    ) -> Result<()> {
        exec_broadcast(
            &self.context,
            op,
            self.operand()?,
            other.operand()?,
            target.operand()?,
            axes,
        )
    }

    /// Tad-wise comparison into a bool target.
    pub fn apply_bool_broadcast(
        &self,
        op: PairwiseBoolOp,
        axes: &[isize],
        other: &NdArray,
        target: &NdArray,
    ) -> Result<()> {
        exec_broadcast_bool(
            &self.context,
            op,
            self.operand()?,
            other.operand()?,
            target.operand()?,
            axes,
        )
    }

    /// `op(self, other)` with both operands stretched to their common
    /// broadcast extents.
    pub fn apply_true_broadcast(&self, op: PairwiseOp, other: &NdArray) -> Result<NdArray> {
        self.require_numeric("apply_true_broadcast")?;
        other.require_numeric("apply_true_broadcast")?;
        let dims = broadcast_shape(self.dims(), other.dims())?;
        let dtype = self.dtype().pairwise_result(other.dtype());
        let out = self.allocate(ShapeInfo::new(&dims, self.ordering(), dtype)?);
        self.apply_true_broadcast_into(op, other, &out)?;
        Ok(out)
    }

    /// Broadcasting pairwise operation into `target`, whose extents must be
    /// the broadcast extents.
    pub fn apply_true_broadcast_into(
        &self,
        op: PairwiseOp,
        other: &NdArray,
        target: &NdArray,
    ) -> Result<()> {
        const OP: &str = "apply_true_broadcast";
        let dims = broadcast_shape(self.dims(), other.dims())?;
        if target.dims() != dims.as_slice() {
            return Err(NdError::shape_mismatch(OP, &dims, target.dims()));
        }
        let xs = self.shape.broadcast_to(&dims)?;
        let ys = other.shape.broadcast_to(&dims)?;
        exec_pairwise_transform(
            &self.context,
            op,
            ArrayRef::new(&self.buffer, self.offset, &xs)?,
            ArrayRef::new(&other.buffer, other.offset, &ys)?,
            target.operand()?,
        )
    }

    // ------------------------------------------------------------------------
    // Reductions
    // ------------------------------------------------------------------------

    /// Reduce over `axes` (all axes when empty) into a new array.
    pub fn reduce_along_dimension(
        &self,
        op: impl Into<ReduceOp>,
        axes: &[isize],
        keep_dims: bool,
    ) -> Result<NdArray> {
        const OP: &str = "reduce_along_dimension";
        let op = op.into();
        self.require_numeric(OP)?;
        let dtype = match op {
            ReduceOp::Float(_) => self.float_type(),
            ReduceOp::Same(_) => self.dtype(),
            ReduceOp::Bool(_) => DataType::Bool,
            ReduceOp::Long(_) => DataType::Int64,
        };
        let out = self.reduced(OP, axes, keep_dims, dtype)?;
        self.reduce_along_dimension_into(op, &out, axes)?;
        Ok(out)
    }

    /// Reduce over `axes` into `target`, one element per tad.
    pub fn reduce_along_dimension_into(
        &self,
        op: impl Into<ReduceOp>,
        target: &NdArray,
        axes: &[isize],
    ) -> Result<()> {
        exec_reduce(
            &self.context,
            op.into(),
            self.operand()?,
            target.operand()?,
            axes,
        )
    }

    /// Reduce every element into a scalar.
    pub fn reduce_number(&self, op: impl Into<ReduceOp>) -> Result<NdArray> {
        self.reduce_along_dimension(op, &[], false)
    }

    /// Position of the selected element of each tad along `axes`, as
    /// `Int64`.
    pub fn apply_index_reduce(&self, op: IndexReduceOp, axes: &[isize]) -> Result<NdArray> {
        const OP: &str = "apply_index_reduce";
        self.require_numeric(OP)?;
        let out = self.reduced(OP, axes, false, DataType::Int64)?;
        self.apply_index_reduce_into(op, &out, axes)?;
        Ok(out)
    }

    pub fn apply_index_reduce_into(
        &self,
        op: IndexReduceOp,
        target: &NdArray,
        axes: &[isize],
    ) -> Result<()> {
        exec_index_reduce(
            &self.context,
            op,
            self.operand()?,
            target.operand()?,
            axes,
        )
    }

    /// Variance or standard deviation of all elements.
    pub fn variance_number(&self, op: SummaryStatsOp, bias_corrected: bool) -> Result<NdArray> {
        self.variance_along_dimension(op, bias_corrected, &[])
    }

    /// Variance or standard deviation of each tad along `axes`.
    pub fn variance_along_dimension(
        &self,
        op: SummaryStatsOp,
        bias_corrected: bool,
        axes: &[isize],
    ) -> Result<NdArray> {
        const OP: &str = "variance_along_dimension";
        self.require_numeric(OP)?;
        let out = self.reduced(OP, axes, false, self.float_type())?;
        exec_summary_stats(
            &self.context,
            op,
            self.operand()?,
            out.operand()?,
            axes,
            bias_corrected,
        )?;
        Ok(out)
    }

    // ------------------------------------------------------------------------
    // Reduce3
    // ------------------------------------------------------------------------

    fn check_reduce3(&self, op: &'static str, other: &NdArray) -> Result<()> {
        self.require_numeric(op)?;
        other.require_numeric(op)?;
        if self.dtype() != other.dtype() {
            return Err(NdError::type_mismatch(
                op,
                format!("operands hold {} and {}", self.dtype(), other.dtype()),
            ));
        }
        Ok(())
    }

    /// Joint reduction of two arrays of equal shape into a scalar.
    pub fn apply_reduce3(
        &self,
        op: Reduce3Op,
        other: &NdArray,
        extra: &ExtraArguments,
    ) -> Result<NdArray> {
        const OP: &str = "apply_reduce3";
        self.check_reduce3(OP, other)?;
        if !self.shape.equals_soft(&other.shape) {
            return Err(NdError::shape_mismatch(OP, self.dims(), other.dims()));
        }
        let out = self.allocate(ShapeInfo::scalar(self.float_type()));
        exec_reduce3_scalar(
            &self.context,
            op,
            self.operand()?,
            other.operand()?,
            out.operand()?,
            extra,
        )?;
        Ok(out)
    }

    /// Joint reduction of matching tads along `axes`.
    pub fn apply_reduce3_along(
        &self,
        op: Reduce3Op,
        other: &NdArray,
        axes: &[isize],
        extra: &ExtraArguments,
    ) -> Result<NdArray> {
        const OP: &str = "apply_reduce3_along";
        self.check_reduce3(OP, other)?;
        let out = self.reduced(OP, axes, false, self.float_type())?;
        exec_reduce3(
            &self.context,
            op,
            self.operand()?,
            other.operand()?,
            out.operand()?,
            axes,
            extra,
        )?;
        Ok(out)
    }

    /// Joint reduction of every tad of `self` against every tad of `other`;
    /// the result is `[tads of self, tads of other]`.
    pub fn apply_all_reduce3(
        &self,
        op: Reduce3Op,
        other: &NdArray,
        axes: &[isize],
        extra: &ExtraArguments,
    ) -> Result<NdArray> {
        const OP: &str = "apply_all_reduce3";
        self.check_reduce3(OP, other)?;
        let xp = self.context.tad_pack(&self.shape, axes)?;
        let yp = self.context.tad_pack(&other.shape, axes)?;
        if !xp.tad_shape().equals_soft(yp.tad_shape()) {
            return Err(NdError::shape_mismatch(
                OP,
                xp.tad_shape().dims(),
                yp.tad_shape().dims(),
            ));
        }
        let dims = [xp.num_tads(), yp.num_tads()];
        let out = self.allocate(ShapeInfo::new(&dims, Order::C, self.float_type())?);
        exec_reduce3_all(
            &self.context,
            op,
            self.operand()?,
            other.operand()?,
            out.operand()?,
            axes,
            extra,
        )?;
        Ok(out)
    }

    // ------------------------------------------------------------------------
    // Equality
    // ------------------------------------------------------------------------

    /// Whether both arrays hold the same type, extents and values. Elements
    /// match when they differ by at most `eps`; floating elements also match
    /// when they differ by at most `eps` times the larger magnitude.
    ///
    /// A rank-1 array and a rank-2 array of equal length are compared
    /// element by element in row-major order without checking extents.
    pub fn equals_to(&self, other: &NdArray, eps: f64) -> Result<bool> {
        if self.dtype() != other.dtype() || self.length() != other.length() {
            return Ok(false);
        }
        let mixed_vector = matches!((self.rank(), other.rank()), (1, 2) | (2, 1));
        if mixed_vector {
            tracing::debug!(
                left = ?self.dims(),
                right = ?other.dims(),
                "equals_to compares rank 1 and rank 2 linearly"
            );
        } else if !self.shape.equals_soft(&other.shape) {
            return Ok(false);
        }
        if self.dtype().is_string() {
            return Ok(self.to_strings()? == other.to_strings()?);
        }
        let count = self.allocate(ShapeInfo::scalar(DataType::Float));
        exec_reduce3_scalar(
            &self.context,
            Reduce3Op::EqualsWithEps,
            self.operand()?,
            other.operand()?,
            count.operand()?,
            &ExtraArguments::from([eps]),
        )?;
        Ok(count.e::<f64>(0)? == 0.0)
    }
}

fn require_single(op: &'static str, scalar: &NdArray) -> Result<()> {
    if scalar.length() != 1 {
        return Err(NdError::shape_mismatch(op, scalar.dims(), &[1]));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{
        ReduceFloatOp, ReduceLongOp, ReduceSameOp, TransformBoolOp, TransformFloatOp,
        TransformSameOp,
    };
    use approx::assert_relative_eq;

    fn matrix() -> NdArray {
        NdArray::from_vec(vec![1.0f32, -2.0, 3.0, -4.0, 5.0, -6.0], &[2, 3], Order::C).unwrap()
    }

    #[test]
    fn test_transform_picks_result_type() {
        let a = NdArray::from_vec(vec![1i32, 4, 9], &[3], Order::C).unwrap();
        let r = a.transform(TransformFloatOp::Sqrt, &ExtraArguments::new()).unwrap();
        assert_eq!(r.dtype(), DataType::Float);
        assert_eq!(r.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0]);
        let b = matrix().transform(TransformBoolOp::IsPositive, &ExtraArguments::new()).unwrap();
        assert_eq!(b.dtype(), DataType::Bool);
        assert_eq!(
            b.to_vec::<bool>().unwrap(),
            vec![true, false, true, false, true, false]
        );
    }

    #[test]
    fn test_apply_transform_in_place() {
        let m = matrix();
        m.apply_transform(TransformSameOp::Abs, &m, &ExtraArguments::new())
            .unwrap();
        assert_eq!(m.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_scalar_ops() {
        let m = matrix();
        let out = NdArray::new(&[2, 3], Order::C, DataType::Float).unwrap();
        m.apply_scalar(PairwiseOp::Multiply, 2i32, &out).unwrap();
        assert_eq!(
            out.to_vec::<f32>().unwrap(),
            vec![2.0, -4.0, 6.0, -8.0, 10.0, -12.0]
        );
        let flags = NdArray::new(&[2, 3], Order::C, DataType::Bool).unwrap();
        m.apply_scalar_bool(PairwiseBoolOp::GreaterThan, 2.5f64, &flags)
            .unwrap();
        assert_eq!(
            flags.to_vec::<bool>().unwrap(),
            vec![false, false, true, false, true, false]
        );
        let not_scalar = NdArray::new(&[2], Order::C, DataType::Float).unwrap();
        assert!(m.apply_scalar_arr(PairwiseOp::Add, &not_scalar, &out).is_err());
    }

    #[test]
    fn test_true_broadcast() {
        let col = NdArray::from_vec(vec![10i64, 20], &[2, 1], Order::C).unwrap();
        let row = NdArray::from_vec(vec![1i64, 2, 3], &[3], Order::C).unwrap();
        let out = col.apply_true_broadcast(PairwiseOp::Add, &row).unwrap();
        assert_eq!(out.dims(), &[2, 3]);
        assert_eq!(out.to_vec::<i64>().unwrap(), vec![11, 12, 13, 21, 22, 23]);
        let bad = NdArray::new(&[3, 2], Order::C, DataType::Int64).unwrap();
        assert!(matches!(
            col.apply_true_broadcast(PairwiseOp::Add, &bad),
            Err(NdError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_reductions() {
        let m = matrix();
        let sums = m.reduce_along_dimension(ReduceSameOp::Sum, &[1], false).unwrap();
        assert_eq!(sums.dims(), &[2]);
        assert_eq!(sums.to_vec::<f32>().unwrap(), vec![2.0, -5.0]);

        let kept = m.reduce_along_dimension(ReduceSameOp::Max, &[0], true).unwrap();
        assert_eq!(kept.dims(), &[1, 3]);
        assert_eq!(kept.to_vec::<f32>().unwrap(), vec![1.0, 5.0, 3.0]);

        let mean = m.reduce_number(ReduceFloatOp::Mean).unwrap();
        assert_eq!(mean.rank(), 0);
        assert_relative_eq!(mean.e::<f64>(0).unwrap(), -0.5);

        let n = m.reduce_number(ReduceLongOp::CountNonZero).unwrap();
        assert_eq!(n.dtype(), DataType::Int64);
        assert_eq!(n.e::<i64>(0).unwrap(), 6);
    }

    #[test]
    fn test_index_reduce() {
        let m = matrix();
        let idx = m.apply_index_reduce(IndexReduceOp::IndexMax, &[1]).unwrap();
        assert_eq!(idx.to_vec::<i64>().unwrap(), vec![2, 1]);
        let all = m.apply_index_reduce(IndexReduceOp::IndexAbsMax, &[]).unwrap();
        assert_eq!(all.e::<i64>(0).unwrap(), 5);
    }

    #[test]
    fn test_variance() {
        let a = NdArray::from_vec(vec![2.0f64, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], &[8], Order::C)
            .unwrap();
        let v = a.variance_number(SummaryStatsOp::Variance, false).unwrap();
        assert_relative_eq!(v.e::<f64>(0).unwrap(), 4.0);
        let s = a.variance_number(SummaryStatsOp::StandardDeviation, false).unwrap();
        assert_relative_eq!(s.e::<f64>(0).unwrap(), 2.0);
    }

    #[test]
    fn test_reduce3_forms() {
        let a = NdArray::from_vec(vec![1.0f64, 2.0, 3.0, 4.0], &[2, 2], Order::C).unwrap();
        let b = NdArray::from_vec(vec![1.0f64, 0.0, 0.0, 1.0], &[2, 2], Order::C).unwrap();
        let none = ExtraArguments::new();
        let dot = a.apply_reduce3(Reduce3Op::Dot, &b, &none).unwrap();
        assert_relative_eq!(dot.e::<f64>(0).unwrap(), 5.0);

        let rows = a.apply_reduce3_along(Reduce3Op::Dot, &b, &[1], &none).unwrap();
        assert_eq!(rows.to_vec::<f64>().unwrap(), vec![1.0, 4.0]);

        let all = a.apply_all_reduce3(Reduce3Op::Dot, &b, &[1], &none).unwrap();
        assert_eq!(all.dims(), &[2, 2]);
        // rows of a against rows of b
        assert_eq!(all.to_vec::<f64>().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);

        let c = NdArray::new(&[2, 2], Order::C, DataType::Float).unwrap();
        assert!(matches!(
            a.apply_reduce3(Reduce3Op::Dot, &c, &none),
            Err(NdError::DataTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_equals_to() {
        let m = matrix();
        assert!(m.equals_to(&m.dup().unwrap(), 0.0).unwrap());
        let other = matrix();
        other.p(0, 1.1f32).unwrap();
        assert!(!m.equals_to(&other, 1e-5).unwrap());
        assert!(m.equals_to(&other, 0.5).unwrap());

        let row = NdArray::from_vec(vec![1.0f32, 2.0, 3.0], &[1, 3], Order::C).unwrap();
        let flat = NdArray::from_vec(vec![1.0f32, 2.0, 3.0], &[3], Order::C).unwrap();
        assert!(row.equals_to(&flat, 1e-5).unwrap());

        let reshaped = m.reshape(&[3, 2], Order::C).unwrap();
        assert!(!m.equals_to(&reshaped, 1e-5).unwrap());
        let ints = NdArray::new(&[2, 3], Order::C, DataType::Int32).unwrap();
        assert!(!m.equals_to(&ints, 1e-5).unwrap());
    }

    #[test]
    fn test_equals_to_integers_use_absolute_tolerance() {
        let a = NdArray::from_vec(vec![1_000_000i64, 5], &[2], Order::C).unwrap();
        let b = NdArray::from_vec(vec![1_000_001i64, 5], &[2], Order::C).unwrap();
        assert!(!a.equals_to(&b, 1e-5).unwrap());
        assert!(a.equals_to(&b, 1.0).unwrap());

        let x = NdArray::from_vec(vec![1_000_000.0f64, 5.0], &[2], Order::C).unwrap();
        let y = NdArray::from_vec(vec![1_000_001.0f64, 5.0], &[2], Order::C).unwrap();
        assert!(x.equals_to(&y, 1e-5).unwrap());
    }
}
