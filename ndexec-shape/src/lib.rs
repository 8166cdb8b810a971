//! Shape descriptors and element addressing for ndexec arrays.
//!
//! This crate holds everything that operates on array metadata only and never
//! touches element data:
//!
//! - [`ShapeInfo`]: extents, strides, ordering, element-wise stride and type tag
//! - Addressing: linear and multi-index to physical element offsets
//! - Shape construction: reduce / tile / repeat / broadcast / permute results
//! - [`TadPack`] / [`TadCache`]: tensor-along-dimension decomposition tables
//!
//! # Addressing model
//!
//! A multi-index `(i_0, .., i_{r-1})` addresses element
//! `offset + sum(i_k * strides[k])` of the underlying buffer, with strides
//! counted in elements. A linear index is first expanded into a multi-index in
//! the array's own ordering.

pub mod helpers;
pub mod shape_info;
pub mod tad;
pub mod tad_cache;

pub use helpers::{
    broadcast_shape, normalize_axes, reduced_shape, repeat_shape, sub_array_offset, tile_shape,
};
pub use shape_info::{
    col_major_strides, default_strides, row_major_strides, Coords, Order, ShapeInfo, MAX_RANK,
};
pub use tad::TadPack;
pub use tad_cache::{TadCache, TadCacheStats};

pub use ndexec_traits::{DataType, TypeFamily};

// ============================================================================
// Error types
// ============================================================================

/// Errors raised by array metadata and execution routines.
///
/// Every variant names the operation that detected the violation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NdError {
    /// A rank, axis, index, repetition count or direction token is invalid.
    #[error("{op}: invalid argument: {msg}")]
    InvalidArgument { op: &'static str, msg: String },

    /// Operand types violate the operation's compatibility rule.
    #[error("{op}: data type mismatch: {msg}")]
    DataTypeMismatch { op: &'static str, msg: String },

    /// The dispatch tables hold no kernel for this type tuple.
    #[error("{op}: unsupported type combination {types:?}")]
    UnsupportedTypeCombination {
        op: &'static str,
        types: Vec<DataType>,
    },

    /// The opcode is not part of the operation family.
    #[error("{family}: unsupported operation code {code}")]
    UnsupportedOperation { family: &'static str, code: i32 },

    /// Extents or lengths are incompatible.
    #[error("{op}: shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch {
        op: &'static str,
        left: Vec<usize>,
        right: Vec<usize>,
    },

    /// A flat or multi-index exceeds its bound.
    #[error("{op}: index {index} out of range (bound {bound})")]
    IndexOutOfRange {
        op: &'static str,
        index: usize,
        bound: usize,
    },

    /// A numeric-only operation was invoked on a string array.
    #[error("{op}: not supported on string arrays")]
    UnsupportedOnStringArray { op: &'static str },

    /// The operand rank differs from the one required.
    #[error("{op}: rank mismatch: expected {expected}, got {actual}")]
    RankMismatch {
        op: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A view addresses memory outside its buffer.
    #[error("{op}: addressed span exceeds the buffer")]
    OffsetOverflow { op: &'static str },
}

impl NdError {
    pub fn invalid(op: &'static str, msg: impl Into<String>) -> Self {
        NdError::InvalidArgument {
            op,
            msg: msg.into(),
        }
    }

    pub fn type_mismatch(op: &'static str, msg: impl Into<String>) -> Self {
        NdError::DataTypeMismatch {
            op,
            msg: msg.into(),
        }
    }

    pub fn shape_mismatch(op: &'static str, left: &[usize], right: &[usize]) -> Self {
        NdError::ShapeMismatch {
            op,
            left: left.to_vec(),
            right: right.to_vec(),
        }
    }
}

/// Result type for ndexec operations.
pub type Result<T> = std::result::Result<T, NdError>;
