use smallvec::SmallVec;

use crate::errors::{IndexError, ShapeError};

/// Dynamically sized list of dimension sizes, strides or indices. Tensors in
/// this library rarely exceed rank 4 so these normally live on the stack.
pub type DimList = SmallVec<[usize; 4]>;

/// Return true if `permutation` is a valid permutation of dimensions for
/// a tensor of rank `ndim`.
pub fn is_valid_permutation(ndim: usize, permutation: &[usize]) -> bool {
    permutation.len() == ndim
        && (0..ndim).all(|dim| permutation.iter().filter(|d| **d == dim).count() == 1)
}

/// Resolve an index in `[-size, size)` to a position in `[0, size)`.
///
/// Negative values count back from the end. Returns `None` if the index is
/// out of range after adjustment.
pub fn normalize_index(index: isize, size: usize) -> Option<usize> {
    let size = size as isize;
    let index = if index < 0 { index + size } else { index };
    (0..size).contains(&index).then_some(index as usize)
}

/// Resolve an axis given as a value in `[-ndim, ndim-1]` to the zero-based
/// dimension of a tensor with `ndim` dimensions.
pub fn resolve_axis(ndim: usize, axis: isize) -> Result<usize, ShapeError> {
    normalize_index(axis, ndim).ok_or(ShapeError::InvalidAxis { axis, ndim })
}

/// Compute row-major strides for `shape`. The last dimension has stride 1.
pub fn row_major_strides(shape: &[usize]) -> DimList {
    let mut strides: DimList = SmallVec::from_elem(1, shape.len());
    for dim in (0..shape.len().saturating_sub(1)).rev() {
        strides[dim] = strides[dim + 1] * shape[dim + 1];
    }
    strides
}

/// Return the offset of `index` in a row-major buffer with the given shape.
///
/// The index must have one entry per dimension and each entry must be in
/// bounds.
pub fn offset_of(shape: &[usize], index: &[usize]) -> Result<usize, IndexError> {
    if index.len() != shape.len() {
        return Err(IndexError::WrongLength {
            expected: shape.len(),
            actual: index.len(),
        });
    }
    let mut offset = 0;
    let mut stride = 1;
    for (axis, (&idx, &size)) in index.iter().zip(shape).enumerate().rev() {
        if idx >= size {
            return Err(IndexError::OutOfRange {
                axis,
                index: idx as isize,
                size,
            });
        }
        offset += idx * stride;
        stride *= size;
    }
    Ok(offset)
}

/// Convert an offset into a row-major buffer into an N-dimensional index.
///
/// This is the inverse of [`offset_of`].
pub fn unravel_index(shape: &[usize], offset: usize) -> DimList {
    let mut index: DimList = SmallVec::from_elem(0, shape.len());
    let mut remainder = offset;
    for (dim, &size) in shape.iter().enumerate().rev() {
        if size == 0 {
            continue;
        }
        index[dim] = remainder % size;
        remainder /= size;
    }
    index
}

/// Shape and strides of a contiguous, row-major tensor.
///
/// A layout always has at least one dimension. Scalars are represented as
/// tensors of shape `[1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Layout {
    shape: DimList,
    strides: DimList,
}

impl Layout {
    /// Create a layout for a tensor with a given shape.
    pub fn try_from_shape(shape: &[usize]) -> Result<Layout, ShapeError> {
        if shape.is_empty() {
            return Err(ShapeError::EmptyShape);
        }
        Ok(Layout {
            shape: SmallVec::from_slice(shape),
            strides: row_major_strides(shape),
        })
    }

    /// Create a layout for a tensor with a given shape.
    ///
    /// Panics if `shape` is empty.
    pub fn from_shape(shape: &[usize]) -> Layout {
        Self::try_from_shape(shape).expect("tensor shape must have at least one dim")
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Return the number of elements in the tensor.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the size of dimension `dim`.
    ///
    /// Panics if `dim` is out of range.
    pub fn size(&self, dim: usize) -> usize {
        self.shape[dim]
    }

    /// Return the offset of an unsigned index, checking each entry against
    /// its dimension.
    pub fn offset(&self, index: &[usize]) -> Result<usize, IndexError> {
        offset_of(&self.shape, index)
    }

    /// Return the offset of a signed index. Negative entries count back from
    /// the end of their dimension.
    pub fn signed_offset(&self, index: &[isize]) -> Result<usize, IndexError> {
        if index.len() != self.ndim() {
            return Err(IndexError::WrongLength {
                expected: self.ndim(),
                actual: index.len(),
            });
        }
        let mut offset = 0;
        for (axis, ((&idx, &size), &stride)) in index
            .iter()
            .zip(self.shape.iter())
            .zip(self.strides.iter())
            .enumerate()
        {
            let idx = normalize_index(idx, size).ok_or(IndexError::OutOfRange {
                axis,
                index: idx,
                size,
            })?;
            offset += idx * stride;
        }
        Ok(offset)
    }

    /// Return the offset of an index without bounds checks on individual
    /// entries.
    ///
    /// The result is only meaningful if every entry is in bounds.
    #[inline]
    pub fn offset_unchecked(&self, index: &[usize]) -> usize {
        index
            .iter()
            .zip(self.strides.iter())
            .map(|(idx, stride)| idx * stride)
            .sum()
    }
}
