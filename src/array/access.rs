//! Element access and in-place fills.

use ndexec_shape::{NdError, Order, Result, ShapeInfo};
use ndexec_traits::{DataType, Element};

use super::NdArray;
use crate::dispatch::dispatch_numeric;

const GET: &str = "e";
const PUT: &str = "p";

impl NdArray {
    /// Element `i` in the array's own ordering, converted to `T`.
    pub fn e<T: Element>(&self, i: usize) -> Result<T> {
        let rel = self.linear_offset(GET, i)?;
        self.read_at(GET, rel)
    }

    pub fn e2<T: Element>(&self, i: usize, j: usize) -> Result<T> {
        self.read_at(GET, self.shape.checked_offset(GET, &[i, j])?)
    }

    pub fn e3<T: Element>(&self, i: usize, j: usize, k: usize) -> Result<T> {
        self.read_at(GET, self.shape.checked_offset(GET, &[i, j, k])?)
    }

    pub fn e4<T: Element>(&self, i: usize, j: usize, k: usize, l: usize) -> Result<T> {
        self.read_at(GET, self.shape.checked_offset(GET, &[i, j, k, l])?)
    }

    /// Store `value` at linear index `i`, converted to the stored type.
    pub fn p<T: Element>(&self, i: usize, value: T) -> Result<()> {
        let rel = self.linear_offset(PUT, i)?;
        self.write_at(PUT, rel, value)
    }

    pub fn p2<T: Element>(&self, i: usize, j: usize, value: T) -> Result<()> {
        self.write_at(PUT, self.shape.checked_offset(PUT, &[i, j])?, value)
    }

    pub fn p3<T: Element>(&self, i: usize, j: usize, k: usize, value: T) -> Result<()> {
        self.write_at(PUT, self.shape.checked_offset(PUT, &[i, j, k])?, value)
    }

    pub fn p4<T: Element>(&self, i: usize, j: usize, k: usize, l: usize, value: T) -> Result<()> {
        self.write_at(PUT, self.shape.checked_offset(PUT, &[i, j, k, l])?, value)
    }

    /// String at linear index `i` of a `Utf8` array.
    pub fn e_string(&self, i: usize) -> Result<String> {
        const OP: &str = "e_string";
        self.require_strings(OP)?;
        let index = self.physical(OP, self.linear_offset(OP, i)?)?;
        let storage = self.buffer.read();
        storage
            .strings()
            .and_then(|s| s.get(index))
            .cloned()
            .ok_or(NdError::OffsetOverflow { op: OP })
    }

    /// Replace the string at linear index `i` of a `Utf8` array.
    pub fn p_string(&self, i: usize, value: impl Into<String>) -> Result<()> {
        const OP: &str = "p_string";
        self.require_strings(OP)?;
        let index = self.physical(OP, self.linear_offset(OP, i)?)?;
        let mut storage = self.buffer.write();
        let slot = storage
            .strings_mut()
            .and_then(|s| s.get_mut(index))
            .ok_or(NdError::OffsetOverflow { op: OP })?;
        *slot = value.into();
        Ok(())
    }

    /// Strings in row-major logical order.
    pub fn to_strings(&self) -> Result<Vec<String>> {
        const OP: &str = "to_strings";
        self.require_strings(OP)?;
        let indices = (0..self.length())
            .map(|i| self.physical(OP, self.shape.index_offset_in(i, Order::C)))
            .collect::<Result<Vec<_>>>()?;
        let storage = self.buffer.read();
        let strings = storage.strings().ok_or(NdError::OffsetOverflow { op: OP })?;
        indices
            .into_iter()
            .map(|k| strings.get(k).cloned().ok_or(NdError::OffsetOverflow { op: OP }))
            .collect()
    }

    // ------------------------------------------------------------------------
    // Fills
    // ------------------------------------------------------------------------

    /// Zero every element, then write one along the main diagonal.
    ///
    /// The diagonal step is the sum of all strides, so any rank works; the
    /// diagonal runs for the smallest extent.
    pub fn set_identity(&self) -> Result<()> {
        const OP: &str = "set_identity";
        self.require_numeric(OP)?;
        self.fill(0.0)?;
        let step: isize = self.strides().iter().sum();
        let steps = self.dims().iter().copied().min().unwrap_or(1);
        for i in 0..steps {
            self.write_at(OP, i as isize * step, 1.0f64)?;
        }
        Ok(())
    }

    /// Set the upper (`'u'`) or lower (`'l'`) triangle of a matrix to
    /// `value`, relative to diagonal `diag`.
    ///
    /// Upper selects `(i, j)` with `i + diag <= j`, lower those with
    /// `i + diag >= j`.
    pub fn set_value_in_diag_matrix<T: Element>(
        &self,
        value: T,
        diag: isize,
        direction: char,
    ) -> Result<()> {
        const OP: &str = "set_value_in_diag_matrix";
        self.require_numeric(OP)?;
        if self.rank() != 2 {
            return Err(NdError::RankMismatch {
                op: OP,
                expected: 2,
                actual: self.rank(),
            });
        }
        let upper = match direction {
            'u' => true,
            'l' => false,
            other => {
                return Err(NdError::invalid(
                    OP,
                    format!("direction must be 'u' or 'l', got {other:?}"),
                ))
            }
        };
        let (rows, cols) = (self.dims()[0], self.dims()[1]);
        for i in 0..rows {
            for j in 0..cols {
                let (from, to) = (i as isize + diag, j as isize);
                if (upper && from <= to) || (!upper && from >= to) {
                    self.write_at(OP, self.shape.offset_of(&[i, j]), value)?;
                }
            }
        }
        Ok(())
    }

    /// Set every element to `value`, converted to the stored type.
    pub fn fill<T: Element>(&self, value: T) -> Result<()> {
        self.require_numeric("fill")?;
        let source = self.allocate(ShapeInfo::scalar(self.dtype()));
        source.p(0, value)?;
        self.assign(&source)
    }

    // ------------------------------------------------------------------------
    // Raw reads and writes
    // ------------------------------------------------------------------------

    /// Relative offset of linear index `i`, validated against the length.
    pub(crate) fn linear_offset(&self, op: &'static str, i: usize) -> Result<isize> {
        if i >= self.length() {
            return Err(NdError::IndexOutOfRange {
                op,
                index: i,
                bound: self.length(),
            });
        }
        Ok(self.shape.index_offset(i))
    }

    fn physical(&self, op: &'static str, rel: isize) -> Result<usize> {
        usize::try_from(self.offset as isize + rel).map_err(|_| NdError::OffsetOverflow { op })
    }

    pub(crate) fn read_at<T: Element>(&self, op: &'static str, rel: isize) -> Result<T> {
        let index = self.physical(op, rel)?;
        let storage = self.buffer.read();
        dispatch_numeric!(
            self.dtype(),
            Err(NdError::UnsupportedOnStringArray { op }),
            |S| storage
                .as_slice::<S>()
                .and_then(|s| s.get(index))
                .map(|&v| v.cast::<T>())
                .ok_or(NdError::OffsetOverflow { op })
        )
    }

    pub(crate) fn write_at<T: Element>(&self, op: &'static str, rel: isize, value: T) -> Result<()> {
        let index = self.physical(op, rel)?;
        let mut storage = self.buffer.write();
        dispatch_numeric!(
            self.dtype(),
            Err(NdError::UnsupportedOnStringArray { op }),
            |S| {
                let slot = storage
                    .as_mut_slice::<S>()
                    .and_then(|s| s.get_mut(index))
                    .ok_or(NdError::OffsetOverflow { op })?;
                *slot = value.cast::<S>();
                Ok(())
            }
        )
    }

    fn require_strings(&self, op: &'static str) -> Result<()> {
        if self.dtype() != DataType::Utf8 {
            return Err(NdError::type_mismatch(
                op,
                format!("array holds {}, not strings", self.dtype()),
            ));
        }
        Ok(())
    }
}
