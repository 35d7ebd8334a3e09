//! Arithmetic, linear algebra and reduction operations on tensors.

use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Sub, SubAssign};

use crate::element::Element;
use crate::errors::ShapeError;
use crate::Tensor;

/// Reduction applied by [`Tensor::reduce`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReduceOp {
    Max,
    Min,
    ArgMax,
    ArgMin,
}

fn check_same_shape<T, U>(a: &Tensor<T>, b: &Tensor<U>) -> Result<(), ShapeError> {
    if a.shape() != b.shape() {
        return Err(ShapeError::Mismatch {
            left: a.shape().to_vec(),
            right: b.shape().to_vec(),
        });
    }
    Ok(())
}

/// Return the position and value of the element which wins according to
/// `better`. Ties keep the earliest position.
fn select_by<T: Copy>(values: &[T], better: impl Fn(T, T) -> bool) -> (usize, T) {
    let mut best = (0, values[0]);
    for (i, &x) in values.iter().enumerate().skip(1) {
        if better(x, best.1) {
            best = (i, x);
        }
    }
    best
}

impl<T: Copy> Tensor<T> {
    /// Apply `f` to every element, returning a tensor with the same shape.
    pub fn map<U, F: Fn(T) -> U>(&self, f: F) -> Tensor<U> {
        let data = self.iter().map(|&x| f(x)).collect();
        Tensor::from_data(self.shape(), data).expect("shape is unchanged")
    }

    /// Apply `f` to every element in place.
    pub fn apply<F: Fn(T) -> T>(&mut self, f: F) {
        for x in self.iter_mut() {
            *x = f(*x);
        }
    }

    /// Combine corresponding elements of two tensors with the same shape.
    pub fn zip_map<U: Copy, V, F: Fn(T, U) -> V>(
        &self,
        other: &Tensor<U>,
        f: F,
    ) -> Result<Tensor<V>, ShapeError> {
        check_same_shape(self, other)?;
        let data = self
            .iter()
            .zip(other.iter())
            .map(|(&x, &y)| f(x, y))
            .collect();
        Tensor::from_data(self.shape(), data)
    }

    /// Replace every element of `self` with `f(self_elem, other_elem)`.
    ///
    /// `self` is left unchanged if the shapes differ.
    pub fn zip_apply<U: Copy, F: Fn(T, U) -> T>(
        &mut self,
        other: &Tensor<U>,
        f: F,
    ) -> Result<(), ShapeError> {
        check_same_shape(self, other)?;
        for (x, &y) in self.iter_mut().zip(other.iter()) {
            *x = f(*x, y);
        }
        Ok(())
    }

    pub fn fill(&mut self, value: T) {
        self.iter_mut().for_each(|x| *x = value);
    }
}

impl<T: Element> Tensor<T> {
    pub fn add(&self, other: &Tensor<T>) -> Result<Tensor<T>, ShapeError> {
        self.zip_map(other, |x, y| x + y)
    }

    pub fn sub(&self, other: &Tensor<T>) -> Result<Tensor<T>, ShapeError> {
        self.zip_map(other, |x, y| x - y)
    }

    /// Elementwise (Hadamard) product.
    pub fn mul(&self, other: &Tensor<T>) -> Result<Tensor<T>, ShapeError> {
        self.zip_map(other, |x, y| x * y)
    }

    pub fn div(&self, other: &Tensor<T>) -> Result<Tensor<T>, ShapeError> {
        self.zip_map(other, |x, y| x / y)
    }

    pub fn add_in_place(&mut self, other: &Tensor<T>) -> Result<(), ShapeError> {
        self.zip_apply(other, |x, y| x + y)
    }

    pub fn sub_in_place(&mut self, other: &Tensor<T>) -> Result<(), ShapeError> {
        self.zip_apply(other, |x, y| x - y)
    }

    pub fn mul_in_place(&mut self, other: &Tensor<T>) -> Result<(), ShapeError> {
        self.zip_apply(other, |x, y| x * y)
    }

    /// Multiply every element by `k`.
    pub fn scale(&self, k: T) -> Tensor<T> {
        self.map(|x| x * k)
    }

    pub fn add_scalar(&self, k: T) -> Tensor<T> {
        self.map(|x| x + k)
    }

    /// Matrix product of two rank-2 tensors, `(n, m) x (m, p) -> (n, p)`.
    ///
    /// Each output element is accumulated in `f32` and then converted back to
    /// the element type.
    pub fn matmul(&self, other: &Tensor<T>) -> Result<Tensor<T>, ShapeError> {
        for t in [self, other] {
            if t.ndim() != 2 {
                return Err(ShapeError::InvalidRank {
                    expected: "2",
                    actual: t.ndim(),
                });
            }
        }
        let [n, m] = [self.size(0), self.size(1)];
        let [k, p] = [other.size(0), other.size(1)];
        if m != k {
            return Err(ShapeError::InnerDimMismatch { left: m, right: k });
        }

        let a = self.data();
        let b = other.data();
        let mut out = Vec::with_capacity(n * p);
        for i in 0..n {
            for j in 0..p {
                let mut acc = 0f32;
                for t in 0..m {
                    acc += a[i * m + t].to_f32() * b[t * p + j].to_f32();
                }
                out.push(T::from_f32(acc));
            }
        }
        Tensor::from_data(&[n, p], out)
    }

    /// Reduce a vector to a single value, or each row of a matrix to one
    /// value per row.
    ///
    /// For [`ReduceOp::ArgMax`] and [`ReduceOp::ArgMin`] the result holds the
    /// winning position converted to the element type. Ties are resolved in
    /// favor of the earliest position.
    pub fn reduce(&self, op: ReduceOp) -> Result<Tensor<T>, ShapeError> {
        self.reduce_rows(|row| match op {
            ReduceOp::Max => select_by(row, |x, best| x > best).1,
            ReduceOp::Min => select_by(row, |x, best| x < best).1,
            ReduceOp::ArgMax => T::from_usize(select_by(row, |x, best| x > best).0),
            ReduceOp::ArgMin => T::from_usize(select_by(row, |x, best| x < best).0),
        })
    }

    /// Return the position of the largest element of a vector, or of each
    /// row of a matrix.
    pub fn argmax(&self) -> Result<Tensor<usize>, ShapeError> {
        self.reduce_rows(|row| select_by(row, |x, best| x > best).0)
    }

    /// Return the position of the smallest element of a vector, or of each
    /// row of a matrix.
    pub fn argmin(&self) -> Result<Tensor<usize>, ShapeError> {
        self.reduce_rows(|row| select_by(row, |x, best| x < best).0)
    }

    fn reduce_rows<U>(&self, f: impl Fn(&[T]) -> U) -> Result<Tensor<U>, ShapeError> {
        match self.ndim() {
            1 if !self.is_empty() => Ok(Tensor::from(vec![f(self.data())])),
            2 if self.size(1) > 0 => Ok(self.data().chunks(self.size(1)).map(f).collect()),
            1 | 2 => Err(ShapeError::LengthMismatch {
                expected: 1,
                actual: 0,
            }),
            n => Err(ShapeError::InvalidRank {
                expected: "1 or 2",
                actual: n,
            }),
        }
    }

    /// Return the sum of all elements.
    pub fn sum(&self) -> T {
        self.iter().fold(T::ZERO, |acc, &x| acc + x)
    }

    /// Return the mean of all elements as an `f32`.
    pub fn mean(&self) -> f32 {
        if self.is_empty() {
            return 0.;
        }
        self.iter().map(|x| x.to_f32()).sum::<f32>() / self.len() as f32
    }

    /// Sum the rows of a matrix, producing a vector with one entry per
    /// column.
    pub fn sum_rows(&self) -> Result<Tensor<T>, ShapeError> {
        if self.ndim() != 2 {
            return Err(ShapeError::InvalidRank {
                expected: "2",
                actual: self.ndim(),
            });
        }
        let cols = self.size(1);
        let mut out = vec![T::ZERO; cols];
        for row in self.data().chunks(cols.max(1)) {
            for (acc, &x) in out.iter_mut().zip(row) {
                *acc = *acc + x;
            }
        }
        Ok(Tensor::from(out))
    }

    /// Set elements for which `predicate` returns false to zero. The shape
    /// is unchanged.
    pub fn filter<F: Fn(T) -> bool>(&self, predicate: F) -> Tensor<T> {
        self.map(|x| if predicate(x) { x } else { T::ZERO })
    }

    /// Compare elementwise, returning 1 where elements are equal and 0
    /// elsewhere.
    pub fn equal(&self, other: &Tensor<T>) -> Result<Tensor<i32>, ShapeError> {
        self.zip_map(other, |x, y| (x == y) as i32)
    }

    /// Return true if both tensors have the same shape and exactly equal
    /// elements.
    pub fn compare(&self, other: &Tensor<T>) -> bool {
        self == other
    }

    /// Convert every element to another element type.
    pub fn cast<U: Element>(&self) -> Tensor<U> {
        self.map(|x| U::from_f32(x.to_f32()))
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $fn:ident, $method:ident) => {
        impl<T: Element> $trait<&Tensor<T>> for &Tensor<T> {
            type Output = Tensor<T>;

            /// Panics if the shapes differ.
            fn $fn(self, rhs: &Tensor<T>) -> Tensor<T> {
                match Tensor::$method(self, rhs) {
                    Ok(out) => out,
                    Err(err) => panic!("{}", err),
                }
            }
        }
    };
}

impl_binary_op!(Add, add, add);
impl_binary_op!(Sub, sub, sub);
impl_binary_op!(Mul, mul, mul);
impl_binary_op!(Div, div, div);

macro_rules! impl_assign_op {
    ($trait:ident, $fn:ident, $method:ident) => {
        impl<T: Element> $trait<&Tensor<T>> for Tensor<T> {
            /// Panics if the shapes differ.
            fn $fn(&mut self, rhs: &Tensor<T>) {
                if let Err(err) = self.$method(rhs) {
                    panic!("{}", err);
                }
            }
        }
    };
}

impl_assign_op!(AddAssign, add_assign, add_in_place);
impl_assign_op!(SubAssign, sub_assign, sub_in_place);
impl_assign_op!(MulAssign, mul_assign, mul_in_place);

impl Mul<f32> for &Tensor<f32> {
    type Output = Tensor<f32>;

    fn mul(self, rhs: f32) -> Tensor<f32> {
        self.scale(rhs)
    }
}

impl MulAssign<f32> for Tensor<f32> {
    fn mul_assign(&mut self, rhs: f32) {
        self.apply(|x| x * rhs);
    }
}
