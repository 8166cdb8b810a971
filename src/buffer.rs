//! Typed element storage shared between arrays and their views.
//!
//! A [`DataBuffer`] owns one typed vector behind a read/write lock. Arrays
//! and views hold it through an `Arc`, so the buffer lives as long as its
//! longest holder. Executor calls lock every distinct buffer they touch for
//! the duration of the call (shared for sources, exclusive for the
//! destination) and then work on raw element pointers.

use std::any::Any;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use half::{bf16, f16};
use ndexec_shape::{NdError, Result};
use ndexec_traits::{DataType, Element};
use smallvec::SmallVec;

/// One typed vector per catalog entry.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Storage {
    Bool(Vec<bool>),
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Half(Vec<f16>),
    BFloat16(Vec<bf16>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Utf8(Vec<String>),
}

/// Expand `$body` once per numeric variant with `$v` bound to the vector.
macro_rules! each_numeric_storage {
    ($storage:expr, $v:ident => $body:expr, $strings:ident => $string_body:expr) => {
        match $storage {
            Storage::Bool($v) => $body,
            Storage::Int8($v) => $body,
            Storage::UInt8($v) => $body,
            Storage::Int16($v) => $body,
            Storage::Int32($v) => $body,
            Storage::Int64($v) => $body,
            Storage::Half($v) => $body,
            Storage::BFloat16($v) => $body,
            Storage::Float($v) => $body,
            Storage::Double($v) => $body,
            Storage::Utf8($strings) => $string_body,
        }
    };
}

impl Storage {
    fn zeros(dtype: DataType, len: usize) -> Self {
        match dtype {
            DataType::Bool => Storage::Bool(vec![false; len]),
            DataType::Int8 => Storage::Int8(vec![0; len]),
            DataType::UInt8 => Storage::UInt8(vec![0; len]),
            DataType::Int16 => Storage::Int16(vec![0; len]),
            DataType::Int32 => Storage::Int32(vec![0; len]),
            DataType::Int64 => Storage::Int64(vec![0; len]),
            DataType::Half => Storage::Half(vec![f16::ZERO; len]),
            DataType::BFloat16 => Storage::BFloat16(vec![bf16::ZERO; len]),
            DataType::Float => Storage::Float(vec![0.0; len]),
            DataType::Double => Storage::Double(vec![0.0; len]),
            DataType::Utf8 => Storage::Utf8(vec![String::new(); len]),
        }
    }

    fn from_vec<T: Element>(data: Vec<T>) -> Result<Self> {
        let mut slot = Some(data);
        let any: &mut dyn Any = &mut slot;
        macro_rules! take {
            ($($variant:ident => $t:ty),*) => {
                $(
                    if let Some(v) = any.downcast_mut::<Option<Vec<$t>>>() {
                        return Ok(Storage::$variant(v.take().unwrap_or_default()));
                    }
                )*
            };
        }
        take!(
            Bool => bool, Int8 => i8, UInt8 => u8, Int16 => i16, Int32 => i32,
            Int64 => i64, Half => f16, BFloat16 => bf16, Float => f32, Double => f64
        );
        Err(NdError::UnsupportedTypeCombination {
            op: "buffer",
            types: vec![T::DTYPE],
        })
    }

    pub(crate) fn dtype(&self) -> DataType {
        match self {
            Storage::Bool(_) => DataType::Bool,
            Storage::Int8(_) => DataType::Int8,
            Storage::UInt8(_) => DataType::UInt8,
            Storage::Int16(_) => DataType::Int16,
            Storage::Int32(_) => DataType::Int32,
            Storage::Int64(_) => DataType::Int64,
            Storage::Half(_) => DataType::Half,
            Storage::BFloat16(_) => DataType::BFloat16,
            Storage::Float(_) => DataType::Float,
            Storage::Double(_) => DataType::Double,
            Storage::Utf8(_) => DataType::Utf8,
        }
    }

    pub(crate) fn len(&self) -> usize {
        each_numeric_storage!(self, v => v.len(), s => s.len())
    }

    pub(crate) fn as_slice<T: Element>(&self) -> Option<&[T]> {
        let any: &dyn Any = each_numeric_storage!(self, v => v, s => s);
        any.downcast_ref::<Vec<T>>().map(Vec::as_slice)
    }

    pub(crate) fn as_mut_slice<T: Element>(&mut self) -> Option<&mut [T]> {
        let any: &mut dyn Any = each_numeric_storage!(self, v => v, s => s);
        any.downcast_mut::<Vec<T>>().map(Vec::as_mut_slice)
    }

    pub(crate) fn strings(&self) -> Option<&[String]> {
        match self {
            Storage::Utf8(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn strings_mut(&mut self) -> Option<&mut [String]> {
        match self {
            Storage::Utf8(s) => Some(s),
            _ => None,
        }
    }

    fn base_ptr(&self) -> *mut u8 {
        each_numeric_storage!(self, v => v.as_ptr() as *mut u8, s => s.as_ptr() as *mut u8)
    }

    fn base_ptr_mut(&mut self) -> *mut u8 {
        each_numeric_storage!(self, v => v.as_mut_ptr() as *mut u8, s => s.as_mut_ptr() as *mut u8)
    }
}

// ============================================================================
// DataBuffer
// ============================================================================

/// Element storage of fixed type and length.
#[derive(Debug)]
pub struct DataBuffer {
    storage: RwLock<Storage>,
    dtype: DataType,
    len: usize,
}

impl DataBuffer {
    /// Zero-filled buffer (empty strings for `Utf8`).
    pub fn zeros(dtype: DataType, len: usize) -> Self {
        Self {
            storage: RwLock::new(Storage::zeros(dtype, len)),
            dtype,
            len,
        }
    }

    pub fn from_vec<T: Element>(data: Vec<T>) -> Result<Self> {
        let len = data.len();
        Ok(Self {
            storage: RwLock::new(Storage::from_vec(data)?),
            dtype: T::DTYPE,
            len,
        })
    }

    pub fn from_strings(data: Vec<String>) -> Self {
        let len = data.len();
        Self {
            storage: RwLock::new(Storage::Utf8(data)),
            dtype: DataType::Utf8,
            len,
        }
    }

    #[inline]
    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy of the raw element vector.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        self.read()
            .as_slice::<T>()
            .map(<[T]>::to_vec)
            .ok_or_else(|| {
                NdError::type_mismatch(
                    "buffer",
                    format!("buffer holds {}, requested {}", self.dtype, T::DTYPE),
                )
            })
    }

    // Lock poisoning only records that a writer panicked; element data is
    // plain values, so the guard is recovered.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Storage> {
        self.storage.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Storage> {
        self.storage.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn key(&self) -> usize {
        self as *const DataBuffer as usize
    }
}

// ============================================================================
// Multi-buffer locking
// ============================================================================

enum Guard<'a> {
    Read(#[allow(dead_code)] RwLockReadGuard<'a, Storage>),
    Write(#[allow(dead_code)] RwLockWriteGuard<'a, Storage>),
}

struct Slot<'a> {
    key: usize,
    base: *mut u8,
    dtype: DataType,
    writable: bool,
    _guard: Guard<'a>,
}

/// Locks held on every buffer taking part in one executor call.
///
/// Buffers are locked once each, in address order, so two calls touching
/// the same buffers cannot deadlock. A buffer that is both read and written
/// gets a single exclusive lock and its source and destination pointers
/// alias.
pub(crate) struct LockedBuffers<'a> {
    slots: SmallVec<[Slot<'a>; 4]>,
}

impl<'a> LockedBuffers<'a> {
    pub(crate) fn acquire(reads: &[&'a DataBuffer], writes: &[&'a DataBuffer]) -> Self {
        let mut wanted: SmallVec<[(&'a DataBuffer, bool); 4]> = SmallVec::new();
        for &buf in writes {
            if !wanted.iter().any(|(b, _)| b.key() == buf.key()) {
                wanted.push((buf, true));
            }
        }
        for &buf in reads {
            if !wanted.iter().any(|(b, _)| b.key() == buf.key()) {
                wanted.push((buf, false));
            }
        }
        wanted.sort_by_key(|(b, _)| b.key());

        let slots = wanted
            .into_iter()
            .map(|(buf, writable)| {
                if writable {
                    let mut guard = buf.write();
                    let base = guard.base_ptr_mut();
                    Slot {
                        key: buf.key(),
                        base,
                        dtype: buf.dtype,
                        writable,
                        _guard: Guard::Write(guard),
                    }
                } else {
                    let guard = buf.read();
                    let base = guard.base_ptr();
                    Slot {
                        key: buf.key(),
                        base,
                        dtype: buf.dtype,
                        writable,
                        _guard: Guard::Read(guard),
                    }
                }
            })
            .collect();
        Self { slots }
    }

    fn slot(&self, op: &'static str, buf: &DataBuffer) -> Result<&Slot<'a>> {
        self.slots
            .iter()
            .find(|s| s.key == buf.key())
            .ok_or_else(|| NdError::invalid(op, "buffer was not locked for this call"))
    }

    fn typed_base<T: Element>(&self, op: &'static str, buf: &DataBuffer) -> Result<*mut T> {
        let slot = self.slot(op, buf)?;
        if slot.dtype != T::DTYPE {
            return Err(NdError::type_mismatch(
                op,
                format!("buffer holds {}, kernel expects {}", slot.dtype, T::DTYPE),
            ));
        }
        Ok(slot.base as *mut T)
    }

    /// Typed read pointer to element `offset` of `buf`.
    pub(crate) fn ptr<T: Element>(
        &self,
        op: &'static str,
        buf: &DataBuffer,
        offset: usize,
    ) -> Result<*const T> {
        let base = self.typed_base::<T>(op, buf)?;
        // SAFETY: `offset` was bounds-checked against the buffer when the
        // operand was built.
        Ok(unsafe { base.add(offset) } as *const T)
    }

    /// Typed write pointer to element `offset` of `buf`.
    pub(crate) fn ptr_mut<T: Element>(
        &self,
        op: &'static str,
        buf: &DataBuffer,
        offset: usize,
    ) -> Result<*mut T> {
        if !self.slot(op, buf)?.writable {
            return Err(NdError::invalid(op, "buffer is locked read-only"));
        }
        let base = self.typed_base::<T>(op, buf)?;
        // SAFETY: see `ptr`.
        Ok(unsafe { base.add(offset) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros_and_dtype() {
        let b = DataBuffer::zeros(DataType::Half, 4);
        assert_eq!(b.dtype(), DataType::Half);
        assert_eq!(b.len(), 4);
        assert_eq!(b.read().dtype(), DataType::Half);
        assert_eq!(b.to_vec::<f16>().unwrap(), vec![f16::ZERO; 4]);
        assert!(b.to_vec::<f32>().is_err());
    }

    #[test]
    fn test_from_vec_picks_variant() {
        let b = DataBuffer::from_vec(vec![1i64, 2, 3]).unwrap();
        assert_eq!(b.dtype(), DataType::Int64);
        assert_eq!(b.read().as_slice::<i64>(), Some(&[1i64, 2, 3][..]));
        assert!(b.read().as_slice::<i32>().is_none());
    }

    #[test]
    fn test_strings() {
        let b = DataBuffer::from_strings(vec!["a".into(), "bc".into()]);
        assert_eq!(b.dtype(), DataType::Utf8);
        assert_eq!(b.read().strings().map(|s| s.len()), Some(2));
        assert!(b.read().as_slice::<u8>().is_none());
    }

    #[test]
    fn test_aliasing_buffer_locked_once() {
        let a = DataBuffer::from_vec(vec![1.0f32, 2.0]).unwrap();
        let locks = LockedBuffers::acquire(&[&a, &a], &[&a]);
        let src = locks.ptr::<f32>("test", &a, 1).unwrap();
        let dst = locks.ptr_mut::<f32>("test", &a, 1).unwrap();
        assert_eq!(src, dst as *const f32);
        unsafe { *dst = *src * 4.0 };
        drop(locks);
        assert_eq!(a.to_vec::<f32>().unwrap(), vec![1.0, 8.0]);
    }

    #[test]
    fn test_read_only_slot_rejects_write_pointer() {
        let a = DataBuffer::from_vec(vec![1u8]).unwrap();
        let b = DataBuffer::from_vec(vec![2u8]).unwrap();
        let locks = LockedBuffers::acquire(&[&a], &[&b]);
        assert!(locks.ptr_mut::<u8>("test", &a, 0).is_err());
        assert!(locks.ptr::<i8>("test", &b, 0).is_err());
    }
}
