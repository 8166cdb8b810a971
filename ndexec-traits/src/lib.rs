//! Element type catalog shared by the ndexec crates.
//!
//! This crate provides the closed set of element kinds an array may store
//! ([`DataType`]), the restricted families operations constrain their outputs
//! to ([`TypeFamily`]), and the sealed [`Element`] trait implemented by the ten
//! concrete numeric Rust types that back those kinds.
//!
//! `ndexec-shape` and `ndexec` depend on this crate; kernels are written
//! generically over `T: Element` and instantiated once per catalog entry.

pub mod dtype;
pub mod element;

pub use dtype::{DataType, TypeFamily};
pub use element::Element;

pub use half::{bf16, f16};
