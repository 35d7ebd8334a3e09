//! Views of a tensor with one axis held at a fixed position.

use crate::errors::IndexError;
use crate::layout::{row_major_strides, DimList, Layout};
use crate::Tensor;

/// Geometry shared by [`AxisView`] and [`AxisViewMut`].
#[derive(Clone, Debug)]
struct AxisSlice {
    /// Axis that is held fixed.
    axis: usize,

    /// Position along `axis`.
    fixed: usize,

    /// Shape of the parent with `axis` removed.
    shape: DimList,

    /// Row-major strides over `shape`, used to split a view position into
    /// indices along the remaining axes.
    view_strides: DimList,

    /// Strides of the parent tensor.
    parent_strides: DimList,

    /// Size of the parent along `axis`.
    axis_size: usize,
}

impl AxisSlice {
    fn new(layout: &Layout, axis: usize, fixed: usize) -> Result<AxisSlice, IndexError> {
        if axis >= layout.ndim() {
            return Err(IndexError::WrongLength {
                expected: layout.ndim(),
                actual: axis + 1,
            });
        }
        let axis_size = layout.size(axis);
        if fixed >= axis_size {
            return Err(IndexError::OutOfRange {
                axis,
                index: fixed as isize,
                size: axis_size,
            });
        }
        let shape: DimList = layout
            .shape()
            .iter()
            .enumerate()
            .filter(|(dim, _)| *dim != axis)
            .map(|(_, size)| *size)
            .collect();
        Ok(AxisSlice {
            axis,
            fixed,
            view_strides: row_major_strides(&shape),
            shape,
            parent_strides: layout.strides().iter().copied().collect(),
            axis_size,
        })
    }

    fn len(&self) -> usize {
        self.shape.iter().product()
    }

    /// Map a position within the view to an offset in the parent buffer.
    fn offset(&self, pos: usize) -> Result<usize, IndexError> {
        if pos >= self.len() {
            return Err(IndexError::OutOfRange {
                axis: 0,
                index: pos as isize,
                size: self.len(),
            });
        }

        let mut remaining = pos;
        let mut offset = self.fixed * self.parent_strides[self.axis];
        let mut view_dim = 0;
        for dim in 0..self.parent_strides.len() {
            if dim == self.axis {
                continue;
            }
            let stride = self.view_strides[view_dim];
            offset += (remaining / stride) * self.parent_strides[dim];
            remaining %= stride;
            view_dim += 1;
        }
        Ok(offset)
    }

    /// Return true if the parent offset `offset` belongs to this view.
    fn contains(&self, offset: usize) -> bool {
        (offset / self.parent_strides[self.axis]) % self.axis_size == self.fixed
    }
}

/// Immutable view of the elements of a tensor which have a fixed position
/// along one axis. Created by [`Tensor::slice_along`], [`Tensor::row`] or
/// [`Tensor::col`].
///
/// Positions in the view are numbered in row-major order over the remaining
/// axes.
pub struct AxisView<'a, T> {
    data: &'a [T],
    slice: AxisSlice,
}

impl<'a, T> AxisView<'a, T> {
    pub(crate) fn new(
        data: &'a [T],
        layout: &Layout,
        axis: usize,
        fixed: usize,
    ) -> Result<Self, IndexError> {
        Ok(AxisView {
            data,
            slice: AxisSlice::new(layout, axis, fixed)?,
        })
    }

    pub fn len(&self) -> usize {
        self.slice.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the shape of the parent tensor with the fixed axis removed.
    pub fn shape(&self) -> &[usize] {
        &self.slice.shape
    }

    pub fn get(&self, pos: usize) -> Result<&'a T, IndexError> {
        let offset = self.slice.offset(pos)?;
        Ok(&self.data[offset])
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a T> + '_ {
        let data = self.data;
        data.iter()
            .enumerate()
            .filter_map(|(offset, x)| self.slice.contains(offset).then_some(x))
    }
}

impl<T: Clone> AxisView<'_, T> {
    /// Copy the elements of this view into a new tensor.
    ///
    /// The result has the parent's shape with the fixed axis removed, or
    /// shape `[1]` if the parent was a vector.
    pub fn to_tensor(&self) -> Tensor<T> {
        let shape: &[usize] = if self.slice.shape.is_empty() {
            &[1]
        } else {
            &self.slice.shape
        };
        let data: Vec<T> = self.iter().cloned().collect();
        Tensor::from(data)
            .into_shape(shape)
            .expect("view length matches its shape")
    }
}

/// Mutable view of the elements of a tensor which have a fixed position
/// along one axis. Writes go directly to the parent tensor.
pub struct AxisViewMut<'a, T> {
    data: &'a mut [T],
    slice: AxisSlice,
}

impl<'a, T> AxisViewMut<'a, T> {
    pub(crate) fn new(
        data: &'a mut [T],
        layout: &Layout,
        axis: usize,
        fixed: usize,
    ) -> Result<Self, IndexError> {
        Ok(AxisViewMut {
            data,
            slice: AxisSlice::new(layout, axis, fixed)?,
        })
    }

    pub fn len(&self) -> usize {
        self.slice.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> &[usize] {
        &self.slice.shape
    }

    pub fn get(&self, pos: usize) -> Result<&T, IndexError> {
        let offset = self.slice.offset(pos)?;
        Ok(&self.data[offset])
    }

    pub fn get_mut(&mut self, pos: usize) -> Result<&mut T, IndexError> {
        let offset = self.slice.offset(pos)?;
        Ok(&mut self.data[offset])
    }

    pub fn set(&mut self, pos: usize, value: T) -> Result<(), IndexError> {
        *self.get_mut(pos)? = value;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.data
            .iter()
            .enumerate()
            .filter_map(|(offset, x)| self.slice.contains(offset).then_some(x))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        let slice = &self.slice;
        self.data
            .iter_mut()
            .enumerate()
            .filter_map(move |(offset, x)| slice.contains(offset).then_some(x))
    }

    /// Set every element of the view to `value`.
    pub fn fill(&mut self, value: T)
    where
        T: Clone,
    {
        for x in self.iter_mut() {
            *x = value.clone();
        }
    }
}
