//! Error types that are reported by tensor operations.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors caused by tensor shapes that are not valid for an operation.
#[derive(Clone, Debug, PartialEq)]
pub enum ShapeError {
    /// Operands of an elementwise operation have different shapes.
    Mismatch {
        left: Vec<usize>,
        right: Vec<usize>,
    },

    /// The inner dimensions of a matrix multiplication differ.
    InnerDimMismatch { left: usize, right: usize },

    /// The operation does not support tensors of this rank.
    InvalidRank {
        expected: &'static str,
        actual: usize,
    },

    /// The element count does not equal the product of the shape.
    LengthMismatch { expected: usize, actual: usize },

    /// A tensor must have at least one dimension.
    EmptyShape,

    /// The axis order is not a permutation of `0..ndim`.
    InvalidPermutation,

    /// An axis is out of range for the tensor's rank.
    InvalidAxis { axis: isize, ndim: usize },

    /// Rows of a nested input have different lengths.
    Ragged,
}

impl Display for ShapeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ShapeError::Mismatch { left, right } => {
                write!(f, "shapes {:?} and {:?} do not match", left, right)
            }
            ShapeError::InnerDimMismatch { left, right } => {
                write!(f, "matmul inner dims differ ({} vs {})", left, right)
            }
            ShapeError::InvalidRank { expected, actual } => {
                write!(f, "expected rank {} but tensor has rank {}", expected, actual)
            }
            ShapeError::LengthMismatch { expected, actual } => {
                write!(f, "expected {} elements but got {}", expected, actual)
            }
            ShapeError::EmptyShape => write!(f, "tensor shape must have at least one dim"),
            ShapeError::InvalidPermutation => write!(f, "permutation is invalid"),
            ShapeError::InvalidAxis { axis, ndim } => {
                write!(f, "axis {} is invalid for tensor of rank {}", axis, ndim)
            }
            ShapeError::Ragged => write!(f, "nested rows have different lengths"),
        }
    }
}

impl Error for ShapeError {}

/// Errors that can occur when indexing or slicing a tensor.
#[derive(Clone, Debug, PartialEq)]
pub enum IndexError {
    /// An index is outside `[-size, size)` for its axis.
    OutOfRange {
        axis: usize,
        index: isize,
        size: usize,
    },

    /// The number of index terms does not match the tensor rank.
    WrongLength { expected: usize, actual: usize },

    /// An index list contains more than one ellipsis.
    MultipleEllipsis,

    /// A slice range endpoint is out of bounds for its axis.
    InvalidRange { axis: usize },

    /// The step in a slice range is zero or negative.
    InvalidStep,

    /// A slice string could not be parsed.
    Parse(String),
}

impl Display for IndexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexError::OutOfRange { axis, index, size } => write!(
                f,
                "index {} is out of range for axis {} of size {}",
                index, axis, size
            ),
            IndexError::WrongLength { expected, actual } => {
                write!(f, "expected {} index terms but got {}", expected, actual)
            }
            IndexError::MultipleEllipsis => write!(f, "index has more than one ellipsis"),
            IndexError::InvalidRange { axis } => {
                write!(f, "slice range is invalid for axis {}", axis)
            }
            IndexError::InvalidStep => write!(f, "slice step is invalid"),
            IndexError::Parse(spec) => write!(f, "cannot parse slice \"{}\"", spec),
        }
    }
}

impl Error for IndexError {}
