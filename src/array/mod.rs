//! The [`NdArray`] entity: a typed buffer handle plus its shape descriptor.
//!
//! An array reaches its elements through an `Arc<DataBuffer>`. Views made
//! by [`NdArray::view`], [`NdArray::permute`],
//! [`NdArray::tensor_along_dimension`] or [`NdArray::from_buffer`] share the
//! buffer of their parent and keep it alive; writes through a view are
//! visible in the parent.
//!
//! Operations that write take `&self`: the buffer is locked for the
//! duration of each executor call, so one array may be both a source and
//! the target of the same call (in-place operations).

use std::fmt;
use std::sync::Arc;

use ndexec_shape::{NdError, Order, Result, ShapeInfo};
use ndexec_traits::{DataType, Element};

use crate::buffer::DataBuffer;
use crate::context::LaunchContext;
use crate::dispatch::dispatch_numeric;
use crate::executor::{read_values, ArrayRef};

mod access;
mod apply;
mod lambda;
mod shape_ops;
mod vector_ops;

/// Typed, strided multi-dimensional array.
pub struct NdArray {
    buffer: Arc<DataBuffer>,
    /// Head offset of the view inside `buffer`, in elements.
    offset: usize,
    shape: ShapeInfo,
    is_view: bool,
    context: Arc<LaunchContext>,
}

// ============================================================================
// Construction
// ============================================================================

impl NdArray {
    /// Zero-filled array (empty strings for `Utf8`) on the default context.
    pub fn new(dims: &[usize], order: Order, dtype: DataType) -> Result<Self> {
        let shape = ShapeInfo::new(dims, order, dtype)?;
        let buffer = DataBuffer::zeros(dtype, shape.length());
        Ok(Self::owned(buffer, shape, LaunchContext::default_context()))
    }

    /// Array over `data`, which is laid out in `order`.
    pub fn from_vec<T: Element>(data: Vec<T>, dims: &[usize], order: Order) -> Result<Self> {
        let shape = ShapeInfo::new(dims, order, T::DTYPE)?;
        if data.len() != shape.length() {
            return Err(NdError::shape_mismatch("from_vec", &[data.len()], dims));
        }
        let buffer = DataBuffer::from_vec(data)?;
        Ok(Self::owned(buffer, shape, LaunchContext::default_context()))
    }

    /// Array whose element at each multi-index is `f(index)`.
    pub fn from_fn<T, F>(dims: &[usize], order: Order, mut f: F) -> Result<Self>
    where
        T: Element,
        F: FnMut(&[usize]) -> T,
    {
        let shape = ShapeInfo::new(dims, order, T::DTYPE)?;
        // dense layout: buffer position `i` holds the `i`-th index in `order`
        let data: Vec<T> = (0..shape.length())
            .map(|i| f(&shape.coords_of(i, order)))
            .collect();
        let buffer = DataBuffer::from_vec(data)?;
        Ok(Self::owned(buffer, shape, LaunchContext::default_context()))
    }

    /// Rank-0 array holding `value`.
    pub fn scalar<T: Element>(value: T) -> Result<Self> {
        let buffer = DataBuffer::from_vec(vec![value])?;
        Ok(Self::owned(
            buffer,
            ShapeInfo::scalar(T::DTYPE),
            LaunchContext::default_context(),
        ))
    }

    /// String array; `data` is laid out in `order`.
    pub fn from_strings(data: Vec<String>, dims: &[usize], order: Order) -> Result<Self> {
        let shape = ShapeInfo::new(dims, order, DataType::Utf8)?;
        if data.len() != shape.length() {
            return Err(NdError::shape_mismatch("from_strings", &[data.len()], dims));
        }
        let buffer = DataBuffer::from_strings(data);
        Ok(Self::owned(buffer, shape, LaunchContext::default_context()))
    }

    /// View over a shared buffer starting at element `offset`.
    ///
    /// Fails when the shape's type differs from the buffer's or when any
    /// addressed element falls outside the buffer.
    pub fn from_buffer(buffer: Arc<DataBuffer>, offset: usize, shape: ShapeInfo) -> Result<Self> {
        ArrayRef::new(&buffer, offset, &shape)?;
        Ok(Self {
            buffer,
            offset,
            shape,
            is_view: true,
            context: LaunchContext::default_context(),
        })
    }

    /// Run every operation of this array on `context`.
    pub fn with_context(mut self, context: Arc<LaunchContext>) -> Self {
        self.context = context;
        self
    }

    fn owned(buffer: DataBuffer, shape: ShapeInfo, context: Arc<LaunchContext>) -> Self {
        Self {
            buffer: Arc::new(buffer),
            offset: 0,
            shape,
            is_view: false,
            context,
        }
    }

    /// Another handle on the same elements.
    pub fn view(&self) -> NdArray {
        self.view_of(self.offset, self.shape.clone())
    }

    /// View sharing this array's buffer and context.
    pub(crate) fn view_of(&self, offset: usize, shape: ShapeInfo) -> NdArray {
        NdArray {
            buffer: Arc::clone(&self.buffer),
            offset,
            shape,
            is_view: true,
            context: Arc::clone(&self.context),
        }
    }

    /// Fresh zero-filled array on this array's context. `shape` must be dense.
    pub(crate) fn allocate(&self, shape: ShapeInfo) -> NdArray {
        let buffer = DataBuffer::zeros(shape.dtype(), shape.length());
        Self::owned(buffer, shape, Arc::clone(&self.context))
    }
}

// ============================================================================
// Queries
// ============================================================================

impl NdArray {
    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        self.shape.strides()
    }

    #[inline]
    pub fn ordering(&self) -> Order {
        self.shape.order()
    }

    #[inline]
    pub fn dtype(&self) -> DataType {
        self.shape.dtype()
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.shape.length()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }

    /// A single element, whatever the rank.
    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.shape.is_scalar()
    }

    /// Whether the buffer is shared with the array this one was made from.
    #[inline]
    pub fn is_view(&self) -> bool {
        self.is_view
    }

    #[inline]
    pub fn ews(&self) -> Option<usize> {
        self.shape.ews()
    }

    pub fn size_at(&self, axis: isize) -> Result<usize> {
        self.shape.size_at(axis)
    }

    #[inline]
    pub fn shape_info(&self) -> &ShapeInfo {
        &self.shape
    }

    #[inline]
    pub fn buffer(&self) -> &Arc<DataBuffer> {
        &self.buffer
    }

    /// Head offset inside [`NdArray::buffer`], in elements.
    #[inline]
    pub fn buffer_offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn context(&self) -> &Arc<LaunchContext> {
        &self.context
    }

    /// Borrowed operand for the executor.
    pub fn operand(&self) -> Result<ArrayRef<'_>> {
        ArrayRef::new(&self.buffer, self.offset, &self.shape)
    }

    pub(crate) fn require_numeric(&self, op: &'static str) -> Result<()> {
        if self.dtype().is_string() {
            return Err(NdError::UnsupportedOnStringArray { op });
        }
        Ok(())
    }

    /// Elements in row-major logical order, converted to `T`.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        const OP: &str = "to_vec";
        let a = self.operand()?;
        dispatch_numeric!(
            self.dtype(),
            Err(NdError::UnsupportedOnStringArray { op: OP }),
            |S| Ok(read_values::<S>(OP, &a)?
                .into_iter()
                .map(|v| v.cast::<T>())
                .collect())
        )
    }
}

impl fmt::Debug for NdArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NdArray")
            .field("shape", &self.shape)
            .field("offset", &self.offset)
            .field("is_view", &self.is_view)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_reads_back_row_major() {
        let a = NdArray::from_vec(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], Order::F).unwrap();
        // column-major buffer: [[1, 3, 5], [2, 4, 6]]
        assert_eq!(a.to_vec::<f32>().unwrap(), vec![1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
        assert_eq!(a.to_vec::<i64>().unwrap(), vec![1, 3, 5, 2, 4, 6]);
        assert!(!a.is_view());
    }

    #[test]
    fn test_from_vec_length_checked() {
        assert!(matches!(
            NdArray::from_vec(vec![1i32, 2, 3], &[2, 2], Order::C),
            Err(NdError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_from_fn_by_multi_index() {
        let a = NdArray::from_fn(&[2, 3], Order::F, |ix| (10 * ix[0] + ix[1]) as i32).unwrap();
        assert_eq!(a.to_vec::<i32>().unwrap(), vec![0, 1, 2, 10, 11, 12]);
    }

    #[test]
    fn test_from_buffer_is_bounds_checked_view() {
        let buffer = Arc::new(DataBuffer::from_vec(vec![0u8; 6]).unwrap());
        let shape = ShapeInfo::new(&[2, 2], Order::C, DataType::UInt8).unwrap();
        let v = NdArray::from_buffer(Arc::clone(&buffer), 2, shape.clone()).unwrap();
        assert!(v.is_view());
        assert!(matches!(
            NdArray::from_buffer(buffer, 3, shape),
            Err(NdError::OffsetOverflow { .. })
        ));
    }

    #[test]
    fn test_string_array_rejects_numeric_readout() {
        let s = NdArray::from_strings(vec!["a".into(), "b".into()], &[2], Order::C).unwrap();
        assert_eq!(s.dtype(), DataType::Utf8);
        assert_eq!(s.length(), 2);
        assert!(matches!(
            s.to_vec::<f32>(),
            Err(NdError::UnsupportedOnStringArray { .. })
        ));
    }
}
