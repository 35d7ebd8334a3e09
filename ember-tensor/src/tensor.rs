use std::ops::{Index, IndexMut};

use smallvec::SmallVec;

use crate::element::Element;
use crate::errors::{IndexError, ShapeError};
use crate::index_iterator::Indices;
use crate::layout::{is_valid_permutation, normalize_index, resolve_axis, DimList, Layout};
use crate::slice_range::IndexItem;
use crate::view::{AxisView, AxisViewMut};
use crate::RandomSource;

/// An N-dimensional array with contiguous, row-major storage.
///
/// A tensor owns a flat `Vec<T>` together with a [`Layout`] describing its
/// shape. The buffer length always equals the product of the shape and a
/// tensor always has at least one dimension. Cloning a tensor copies its
/// data. Shared access to part of a tensor is available through
/// [`AxisView`] and [`AxisViewMut`], which borrow the tensor.
#[derive(Clone, PartialEq)]
pub struct Tensor<T = f32> {
    data: Vec<T>,
    layout: Layout,
}

/// Types that can be used to index a single element of a tensor.
///
/// This is implemented for fixed-size arrays (eg. `[0, 1]` or `[-1, 2]`),
/// slices and vectors of indices. Signed indices count back from the end of
/// their axis if negative.
pub trait TensorIndex {
    /// Return the offset of the element in a buffer with the given layout.
    fn offset_in(&self, layout: &Layout) -> Result<usize, IndexError>;
}

impl<const N: usize> TensorIndex for [usize; N] {
    fn offset_in(&self, layout: &Layout) -> Result<usize, IndexError> {
        layout.offset(self)
    }
}

impl<const N: usize> TensorIndex for [isize; N] {
    fn offset_in(&self, layout: &Layout) -> Result<usize, IndexError> {
        layout.signed_offset(self)
    }
}

impl<const N: usize> TensorIndex for [i32; N] {
    fn offset_in(&self, layout: &Layout) -> Result<usize, IndexError> {
        let index: SmallVec<[isize; 4]> = self.iter().map(|&i| i as isize).collect();
        layout.signed_offset(&index)
    }
}

impl TensorIndex for &[usize] {
    fn offset_in(&self, layout: &Layout) -> Result<usize, IndexError> {
        layout.offset(self)
    }
}

impl TensorIndex for &[isize] {
    fn offset_in(&self, layout: &Layout) -> Result<usize, IndexError> {
        layout.signed_offset(self)
    }
}

impl TensorIndex for Vec<usize> {
    fn offset_in(&self, layout: &Layout) -> Result<usize, IndexError> {
        layout.offset(self)
    }
}

impl TensorIndex for Vec<isize> {
    fn offset_in(&self, layout: &Layout) -> Result<usize, IndexError> {
        layout.signed_offset(self)
    }
}

impl<T> Tensor<T> {
    /// Create a tensor from a shape and a buffer of elements in row-major
    /// order.
    pub fn from_data(shape: &[usize], data: Vec<T>) -> Result<Tensor<T>, ShapeError> {
        let layout = Layout::try_from_shape(shape)?;
        if layout.len() != data.len() {
            return Err(ShapeError::LengthMismatch {
                expected: layout.len(),
                actual: data.len(),
            });
        }
        Ok(Tensor { data, layout })
    }

    /// Create a tensor from a vector of rows. All rows must have the same
    /// length.
    pub fn from_nested(rows: Vec<Vec<T>>) -> Result<Tensor<T>, ShapeError> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.iter().any(|r| r.len() != n_cols) {
            return Err(ShapeError::Ragged);
        }
        let data = rows.into_iter().flatten().collect();
        Tensor::from_data(&[n_rows, n_cols], data)
    }

    /// Create a rank-3 tensor from nested vectors. All sub-vectors at the
    /// same depth must have the same length.
    pub fn from_nested3(mats: Vec<Vec<Vec<T>>>) -> Result<Tensor<T>, ShapeError> {
        let n_mats = mats.len();
        let n_rows = mats.first().map(|m| m.len()).unwrap_or(0);
        let n_cols = mats
            .first()
            .and_then(|m| m.first())
            .map(|r| r.len())
            .unwrap_or(0);
        let ragged = mats
            .iter()
            .any(|m| m.len() != n_rows || m.iter().any(|r| r.len() != n_cols));
        if ragged {
            return Err(ShapeError::Ragged);
        }
        let data = mats.into_iter().flatten().flatten().collect();
        Tensor::from_data(&[n_mats, n_rows, n_cols], data)
    }

    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    pub fn strides(&self) -> &[usize] {
        self.layout.strides()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    /// Return the total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Return the size of dimension `dim`.
    ///
    /// Panics if `dim` is out of range.
    pub fn size(&self, dim: usize) -> usize {
        self.layout.size(dim)
    }

    /// Return the elements in row-major order.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.data.iter_mut()
    }

    /// Return the element at `index`, or an error if any entry is out of
    /// bounds.
    pub fn get<I: TensorIndex>(&self, index: I) -> Result<&T, IndexError> {
        let offset = index.offset_in(&self.layout)?;
        Ok(&self.data[offset])
    }

    pub fn get_mut<I: TensorIndex>(&mut self, index: I) -> Result<&mut T, IndexError> {
        let offset = index.offset_in(&self.layout)?;
        Ok(&mut self.data[offset])
    }

    /// Replace the element at `index`.
    pub fn set<I: TensorIndex>(&mut self, index: I, value: T) -> Result<(), IndexError> {
        *self.get_mut(index)? = value;
        Ok(())
    }

    /// Change the shape of this tensor without moving any elements.
    ///
    /// The new shape must have the same number of elements.
    pub fn reshape(&mut self, shape: &[usize]) -> Result<(), ShapeError> {
        let layout = Layout::try_from_shape(shape)?;
        if layout.len() != self.len() {
            return Err(ShapeError::LengthMismatch {
                expected: self.len(),
                actual: layout.len(),
            });
        }
        self.layout = layout;
        Ok(())
    }

    /// Consume this tensor and return it with a new shape.
    pub fn into_shape(mut self, shape: &[usize]) -> Result<Tensor<T>, ShapeError> {
        self.reshape(shape)?;
        Ok(self)
    }

    /// Reshape this tensor to a single dimension.
    pub fn flatten(&mut self) {
        self.layout = Layout::from_shape(&[self.len()]);
    }

    /// Merge the dimensions from `start` to `end` (inclusive) into one.
    ///
    /// Negative values count back from the last dimension.
    pub fn flatten_axes(&mut self, start: isize, end: isize) -> Result<(), ShapeError> {
        let ndim = self.ndim();
        let start = resolve_axis(ndim, start)?;
        let end = resolve_axis(ndim, end)?;
        if start > end {
            return Err(ShapeError::InvalidAxis {
                axis: start as isize,
                ndim,
            });
        }
        let shape = self.shape();
        let mut new_shape: DimList = shape[..start].iter().copied().collect();
        new_shape.push(shape[start..=end].iter().product());
        new_shape.extend_from_slice(&shape[end + 1..]);
        self.reshape(&new_shape)
    }

    /// Return an immutable view of the elements where axis `axis` equals
    /// `index`.
    pub fn slice_along(&self, axis: usize, index: usize) -> Result<AxisView<'_, T>, IndexError> {
        AxisView::new(&self.data, &self.layout, axis, index)
    }

    /// Return a mutable view of the elements where axis `axis` equals
    /// `index`. Writes through the view update this tensor.
    pub fn slice_along_mut(
        &mut self,
        axis: usize,
        index: usize,
    ) -> Result<AxisViewMut<'_, T>, IndexError> {
        AxisViewMut::new(&mut self.data, &self.layout, axis, index)
    }

    pub fn row(&self, index: usize) -> Result<AxisView<'_, T>, IndexError> {
        self.slice_along(0, index)
    }

    pub fn row_mut(&mut self, index: usize) -> Result<AxisViewMut<'_, T>, IndexError> {
        self.slice_along_mut(0, index)
    }

    pub fn col(&self, index: usize) -> Result<AxisView<'_, T>, IndexError> {
        self.slice_along(1, index)
    }

    pub fn col_mut(&mut self, index: usize) -> Result<AxisViewMut<'_, T>, IndexError> {
        self.slice_along_mut(1, index)
    }
}

impl<T: Clone> Tensor<T> {
    /// Create a tensor with every element set to `value`.
    ///
    /// Panics if `shape` is empty.
    pub fn full(shape: &[usize], value: T) -> Tensor<T> {
        let layout = Layout::from_shape(shape);
        Tensor {
            data: vec![value; layout.len()],
            layout,
        }
    }

    /// Create a rank-1 tensor with a single element.
    pub fn scalar(value: T) -> Tensor<T> {
        Tensor::full(&[1], value)
    }

    /// Return a copy of this tensor with a different shape.
    pub fn reshaped(&self, shape: &[usize]) -> Result<Tensor<T>, ShapeError> {
        self.clone().into_shape(shape)
    }

    /// Transpose a tensor of rank 1 or 2.
    ///
    /// A vector of length `n` becomes a column of shape `(n, 1)`. A matrix
    /// has its two axes swapped.
    pub fn transpose(&self) -> Result<Tensor<T>, ShapeError> {
        match self.ndim() {
            1 => self.reshaped(&[self.len(), 1]),
            2 => self.permute(&[1, 0]),
            n => Err(ShapeError::InvalidRank {
                expected: "1 or 2",
                actual: n,
            }),
        }
    }

    /// Reorder the axes of this tensor, copying the elements into their new
    /// positions.
    ///
    /// Axis `i` of the result is axis `order[i]` of `self`.
    pub fn permute(&self, order: &[usize]) -> Result<Tensor<T>, ShapeError> {
        if !is_valid_permutation(self.ndim(), order) {
            return Err(ShapeError::InvalidPermutation);
        }
        let shape: DimList = order.iter().map(|&d| self.size(d)).collect();
        let src_strides: DimList = order.iter().map(|&d| self.strides()[d]).collect();

        let data = Indices::from_shape(&shape)
            .map(|index| {
                let offset: usize = index
                    .iter()
                    .zip(src_strides.iter())
                    .map(|(i, s)| i * s)
                    .sum();
                self.data[offset].clone()
            })
            .collect();

        Ok(Tensor {
            data,
            layout: Layout::from_shape(&shape),
        })
    }

    /// Select a sub-tensor using a list of per-axis index terms.
    ///
    /// Each term is an integer, which selects one position and removes the
    /// axis from the result, a stepped range, which keeps the axis, or an
    /// ellipsis, which expands to full ranges over as many axes as are not
    /// covered by the other terms. If every axis is indexed by an integer
    /// the result has shape `[1]`.
    pub fn index(&self, items: &[IndexItem]) -> Result<Tensor<T>, IndexError> {
        let ellipsis_count = items
            .iter()
            .filter(|item| matches!(item, IndexItem::Ellipsis))
            .count();
        if ellipsis_count > 1 {
            return Err(IndexError::MultipleEllipsis);
        }

        let explicit = items.len() - ellipsis_count;
        if explicit > self.ndim() || (ellipsis_count == 0 && explicit != self.ndim()) {
            return Err(IndexError::WrongLength {
                expected: self.ndim(),
                actual: explicit,
            });
        }

        // Resolve every axis to the list of positions it selects.
        let mut positions: Vec<Vec<usize>> = Vec::with_capacity(self.ndim());
        let mut out_shape: DimList = SmallVec::new();
        for item in items {
            match item {
                IndexItem::Ellipsis => {
                    for _ in 0..self.ndim() - explicit {
                        let size = self.size(positions.len());
                        positions.push((0..size).collect());
                        out_shape.push(size);
                    }
                }
                IndexItem::Index(idx) => {
                    let axis = positions.len();
                    let size = self.size(axis);
                    let pos = normalize_index(*idx, size).ok_or(IndexError::OutOfRange {
                        axis,
                        index: *idx,
                        size,
                    })?;
                    positions.push(vec![pos]);
                }
                IndexItem::Slice(range) => {
                    let axis = positions.len();
                    let selected: Vec<usize> =
                        range.resolve(axis, self.size(axis))?.into_iter().collect();
                    out_shape.push(selected.len());
                    positions.push(selected);
                }
            }
        }
        if out_shape.is_empty() {
            out_shape.push(1);
        }

        let data = Indices::from_lists(&positions)
            .map(|index| self.data[self.layout.offset_unchecked(&index)].clone())
            .collect();

        Ok(Tensor {
            data,
            layout: Layout::from_shape(&out_shape),
        })
    }

    /// Select a sub-tensor using a comma-separated index string, such as
    /// `"0, 1:3, ..."`. See [`index`](Tensor::index).
    pub fn index_str(&self, spec: &str) -> Result<Tensor<T>, IndexError> {
        let items = spec
            .split(',')
            .map(|term| term.parse())
            .collect::<Result<Vec<IndexItem>, _>>()?;
        self.index(&items)
    }
}

impl<T: Element> Tensor<T> {
    /// Create a tensor filled with zeros.
    pub fn zeros(shape: &[usize]) -> Tensor<T> {
        Tensor::full(shape, T::ZERO)
    }

    /// Create a tensor filled with ones.
    pub fn ones(shape: &[usize]) -> Tensor<T> {
        Tensor::full(shape, T::ONE)
    }

    /// Create a vector containing `0, 1, ... n - 1`.
    pub fn arange(n: usize) -> Tensor<T> {
        let data = (0..n).map(T::from_usize).collect();
        Tensor {
            data,
            layout: Layout::from_shape(&[n]),
        }
    }

    /// Create a tensor filled with values from a random source.
    pub fn rand<R: RandomSource<T>>(shape: &[usize], rand_src: &mut R) -> Tensor<T> {
        let layout = Layout::from_shape(shape);
        let data = std::iter::from_fn(|| Some(rand_src.next()))
            .take(layout.len())
            .collect();
        Tensor { data, layout }
    }
}

impl<I: TensorIndex, T> Index<I> for Tensor<T> {
    type Output = T;

    /// Return the element at `index`.
    ///
    /// Panics if the index is invalid. Use [`Tensor::get`] to handle
    /// invalid indices.
    fn index(&self, index: I) -> &T {
        match self.get(index) {
            Ok(elem) => elem,
            Err(err) => panic!("{}", err),
        }
    }
}

impl<I: TensorIndex, T> IndexMut<I> for Tensor<T> {
    fn index_mut(&mut self, index: I) -> &mut T {
        match self.get_mut(index) {
            Ok(elem) => elem,
            Err(err) => panic!("{}", err),
        }
    }
}

impl<T> From<Vec<T>> for Tensor<T> {
    /// Create a vector from a `Vec`.
    fn from(data: Vec<T>) -> Tensor<T> {
        let layout = Layout::from_shape(&[data.len()]);
        Tensor { data, layout }
    }
}

// The `T: Element` bound stops `T` from matching an array type, which would
// make `Tensor::from` ambiguous for nested array literals.

impl<T: Element, const N: usize> From<[T; N]> for Tensor<T> {
    fn from(value: [T; N]) -> Tensor<T> {
        Tensor::from(Vec::from(value))
    }
}

impl<T: Element, const N: usize, const M: usize> From<[[T; M]; N]> for Tensor<T> {
    fn from(value: [[T; M]; N]) -> Tensor<T> {
        let data: Vec<T> = value.into_iter().flatten().collect();
        Tensor {
            data,
            layout: Layout::from_shape(&[N, M]),
        }
    }
}

impl<T: Element, const N: usize, const M: usize, const L: usize> From<[[[T; L]; M]; N]> for Tensor<T> {
    fn from(value: [[[T; L]; M]; N]) -> Tensor<T> {
        let data: Vec<T> = value.into_iter().flatten().flatten().collect();
        Tensor {
            data,
            layout: Layout::from_shape(&[N, M, L]),
        }
    }
}

impl<T> FromIterator<T> for Tensor<T> {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Tensor::from(iter.into_iter().collect::<Vec<_>>())
    }
}
