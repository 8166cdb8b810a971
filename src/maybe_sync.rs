//! Thread-safety bounds that relax when the `parallel` feature is off.
//!
//! Kernel closures handed to the parallel drivers must be shareable across
//! rayon workers. Without `parallel` nothing crosses a thread boundary, so
//! [`MaybeSync`] and [`MaybeSend`] hold for every type and callers can
//! capture `Rc` or `Cell` state.

#[cfg(feature = "parallel")]
mod imp {
    pub trait MaybeSend: Send {}
    impl<T: Send + ?Sized> MaybeSend for T {}

    pub trait MaybeSync: Sync {}
    impl<T: Sync + ?Sized> MaybeSync for T {}
}

#[cfg(not(feature = "parallel"))]
mod imp {
    pub trait MaybeSend {}
    impl<T: ?Sized> MaybeSend for T {}

    pub trait MaybeSync {}
    impl<T: ?Sized> MaybeSync for T {}
}

pub use imp::{MaybeSend, MaybeSync};
