//! Typed strided N-dimensional arrays with runtime type-dispatched kernels.
//!
//! An [`NdArray`] couples a shared, type-tagged [`DataBuffer`] with a
//! [`ShapeInfo`] (extents, strides, ordering, element type). Operations are
//! named by a family and an opcode ([`PairwiseOp`], [`ReduceSameOp`], ...);
//! the executor validates the operands, resolves the runtime element types
//! into one statically typed kernel instantiation and runs it over the
//! strided layout.
//!
//! # Families
//!
//! - Element-wise: transforms ([`exec_transform`]), pairwise
//!   ([`exec_pairwise_transform`]) and scalar ([`exec_scalar`]) operations,
//!   plus caller-supplied closures ([`NdArray::apply_lambda`]).
//! - Broadcast: one operand combined with every tad (sub-array along a set
//!   of axes) of another ([`exec_broadcast`]), or true shape broadcasting
//!   ([`NdArray::apply_true_broadcast`]).
//! - Reductions: float, same, bool and long variants ([`exec_reduce`]),
//!   index reductions, summary statistics and joint reductions of two
//!   arrays ([`exec_reduce3`]).
//! - Random generation into an array ([`exec_random`]).
//!
//! # Example
//!
//! ```rust
//! use ndexec::{NdArray, Order, ReduceSameOp};
//!
//! let m = NdArray::from_vec(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], Order::C).unwrap();
//! let row = NdArray::from_vec(vec![1.0f32, 1.0, 1.0], &[3], Order::C).unwrap();
//! m.addi_row_vector(&row).unwrap();
//! assert_eq!(m.to_vec::<f32>().unwrap(), vec![2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
//!
//! let sums = m.reduce_along_dimension(ReduceSameOp::Sum, &[1], false).unwrap();
//! assert_eq!(sums.to_vec::<f32>().unwrap(), vec![9.0, 18.0]);
//! ```
//!
//! # Parallelism
//!
//! With the default `parallel` feature, element loops above
//! [`ExecConfig::elementwise_threshold`] elements and tad loops above
//! [`ExecConfig::tad_threshold`] tads run on rayon. Results do not depend
//! on the thread count except for the summation order of floating-point
//! reductions.

mod array;
mod buffer;
pub mod config;
mod context;
mod dispatch;
mod executor;
mod extra;
mod kernel;
mod map;
mod maybe_sync;
pub mod ops;
mod threading;

// ============================================================================
// Element types and errors
// ============================================================================
pub use ndexec_shape::{NdError, Result};
pub use ndexec_traits::{bf16, f16, DataType, Element, TypeFamily};

// ============================================================================
// Shape descriptors
// ============================================================================
pub use ndexec_shape::{
    broadcast_shape, normalize_axes, reduced_shape, repeat_shape, sub_array_offset, tile_shape,
    Order, ShapeInfo, TadCache, TadCacheStats, TadPack, MAX_RANK,
};

// ============================================================================
// Arrays, buffers and execution context
// ============================================================================
pub use array::NdArray;
pub use buffer::DataBuffer;
pub use config::ExecConfig;
pub use context::LaunchContext;
pub use executor::ArrayRef;
pub use extra::ExtraArguments;
pub use maybe_sync::{MaybeSend, MaybeSync};

// ============================================================================
// Opcodes
// ============================================================================
pub use ops::{
    IndexReduceOp, OpCode, PairwiseBoolOp, PairwiseOp, RandomGenerator, RandomOp, Reduce3Op,
    ReduceBoolOp, ReduceFloatOp, ReduceLongOp, ReduceOp, ReduceSameOp, SummaryStatsOp,
    TransformAnyOp, TransformBoolOp, TransformFloatOp, TransformOp, TransformSameOp,
    TransformStrictOp,
};

// ============================================================================
// Executor entry points
// ============================================================================
pub use executor::{
    exec_broadcast, exec_broadcast_bool, exec_index_reduce, exec_index_reduce_scalar,
    exec_pairwise_bool_transform, exec_pairwise_transform, exec_random, exec_reduce,
    exec_reduce3, exec_reduce3_all, exec_reduce3_scalar, exec_reduce3_tad, exec_reduce_bool,
    exec_reduce_bool_scalar, exec_reduce_float, exec_reduce_float_scalar, exec_reduce_long,
    exec_reduce_long_scalar, exec_reduce_same, exec_reduce_same_scalar, exec_scalar,
    exec_scalar_bool, exec_scalar_bool_tad, exec_scalar_tad, exec_summary_stats,
    exec_summary_stats_scalar, exec_transform, exec_transform_any, exec_transform_bool,
    exec_transform_float, exec_transform_same, exec_transform_strict,
};
