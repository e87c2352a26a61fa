//! Rayon compatibility layer.
//!
//! With the default `parallel` feature this re-exports rayon's parallel
//! iterator traits. Without it (single-threaded hosts, WASM) it supplies a
//! sequential stand-in with the same method names, so algorithm code writes
//! `into_par_iter()` unconditionally.

#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
mod sequential {
    /// Sequential replacement for `rayon::prelude::IntoParallelIterator`.
    ///
    /// `into_par_iter()` degrades to `into_iter()`, and the rest of the
    /// chain (`map`, `flat_map`, `collect`, …) resolves to the standard
    /// `Iterator` methods.
    pub trait IntoParallelIterator {
        type Iter;
        type Item;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        type Item = I::Item;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}

#[cfg(not(feature = "parallel"))]
pub use sequential::*;
