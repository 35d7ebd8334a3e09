//! ember_tensor provides the N-dimensional arrays, commonly referred to as
//! _tensors_, used by the ember neural network library.
//!
//! # Storage and layout
//!
//! A [Tensor] owns a flat buffer of elements in row-major (C) order together
//! with a [Layout], which records the size of each dimension and the stride
//! used to step along it. The last dimension is contiguous. Every tensor has
//! at least one dimension; a scalar is a tensor of shape `[1]`.
//!
//! ```
//! use ember_tensor::Tensor;
//!
//! let x = Tensor::from([[1, 2, 3], [4, 5, 6]]);
//! assert_eq!(x.shape(), &[2, 3]);
//! assert_eq!(x[[1, -1]], 6);
//! ```
//!
//! # Indexing and slicing
//!
//! Single elements are accessed with [Tensor::get] and [Tensor::set], or with
//! `[]`, using arrays, slices or vectors of indices. Negative indices count
//! back from the end of their axis. Sub-tensors are copied out with
//! [Tensor::index], which accepts integer, range and ellipsis terms, or
//! NumPy-style strings via [Tensor::index_str]:
//!
//! ```
//! use ember_tensor::Tensor;
//!
//! let x = Tensor::from_data(&[2, 3, 4], (0..24).collect()).unwrap();
//! let y = x.index_str("..., 1:3").unwrap();
//! assert_eq!(y.shape(), &[2, 3, 2]);
//! ```
//!
//! Views of all elements at a fixed position along one axis are available
//! through [Tensor::slice_along], [Tensor::row] and [Tensor::col].
//!
//! # Serialization
//!
//! Tensors can be serialized and deserialized using [serde](https://serde.rs)
//! if the `serde` feature is enabled. The serialized form has `shape` and
//! `data` fields, with elements in row-major order.

mod element;
pub mod errors;
mod index_iterator;
pub mod layout;
mod ops;
pub mod slice_range;
mod tensor;
mod view;

mod impl_debug;
#[cfg(feature = "serde")]
mod impl_serialize;

/// Trait for sources of random data for tensors, for use with [`Tensor::rand`].
pub trait RandomSource<T> {
    /// Generate the next random value.
    fn next(&mut self) -> T;
}

// Re-exports for convenience.
pub use element::Element;
pub use errors::{IndexError, ShapeError};
pub use index_iterator::Indices;
pub use layout::{is_valid_permutation, normalize_index, offset_of, unravel_index, Layout};
pub use ops::ReduceOp;
pub use slice_range::{IndexItem, IndexRange, SliceRange};
pub use tensor::{Tensor, TensorIndex};
pub use view::{AxisView, AxisViewMut};

// These modules are public for use by other crates in this repo, but
// currently considered internal to the project.
#[doc(hidden)]
pub mod rng;
#[doc(hidden)]
pub mod test_util;
