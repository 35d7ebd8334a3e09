use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::iter::zip;

use crate::layout::unravel_index;
use crate::Tensor;

/// Trait that tests whether two values are approximately equal.
///
/// The comparison takes into account both the absolute difference of the values
/// and the relative difference, like NumPy's `np.allclose`.
pub trait ApproxEq: Sized {
    /// Return the default absolute tolerance value.
    fn default_abs_tolerance() -> Self;

    /// Return the default relative tolerance value.
    fn default_rel_tolerance() -> Self;

    /// Test whether `self` is "close" to `other` according to the formula:
    ///
    /// ```text
    /// (self - other).abs() <= atol + rtol * other.abs()
    /// ```
    fn approx_eq_with_atol_rtol(&self, other: &Self, atol: Self, rtol: Self) -> bool;

    /// Test if `other` is approximately equal to `self` with the default
    /// tolerances for this type.
    fn approx_eq(&self, other: &Self) -> bool {
        self.approx_eq_with_atol_rtol(
            other,
            Self::default_abs_tolerance(),
            Self::default_rel_tolerance(),
        )
    }
}

macro_rules! impl_approx_eq_float {
    ($ty:ty) => {
        impl ApproxEq for $ty {
            #[inline]
            fn default_abs_tolerance() -> $ty {
                1e-8
            }

            #[inline]
            fn default_rel_tolerance() -> $ty {
                1e-5
            }

            #[inline]
            fn approx_eq_with_atol_rtol(&self, other: &$ty, atol: $ty, rtol: $ty) -> bool {
                (self - other).abs() <= atol + rtol * other.abs()
            }
        }
    };
}

impl_approx_eq_float!(f32);
impl_approx_eq_float!(f64);

impl ApproxEq for i32 {
    #[inline]
    fn default_abs_tolerance() -> i32 {
        0
    }

    #[inline]
    fn default_rel_tolerance() -> i32 {
        0
    }

    #[inline]
    fn approx_eq_with_atol_rtol(&self, other: &i32, atol: i32, rtol: i32) -> bool {
        (self - other).abs() <= atol + rtol * other.abs()
    }
}

#[derive(Debug)]
pub enum ExpectEqualError {
    ShapeMismatch(String),
    ValueMismatch(String),
}

impl Display for ExpectEqualError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpectEqualError::ShapeMismatch(details) => write!(f, "{}", details),
            ExpectEqualError::ValueMismatch(details) => write!(f, "{}", details),
        }
    }
}

impl Error for ExpectEqualError {}

/// Check that the shapes of two tensors are equal and that their contents
/// are approximately equal.
///
/// If there are mismatches, this returns an `Err` with a message indicating
/// the count of mismatches and details of the first few.
pub fn expect_equal<T>(x: &Tensor<T>, y: &Tensor<T>) -> Result<(), ExpectEqualError>
where
    T: Copy + Debug + ApproxEq,
{
    expect_equal_with_tolerance(x, y, T::default_abs_tolerance(), T::default_rel_tolerance())
}

/// Variant of [`expect_equal`] with custom tolerances.
pub fn expect_equal_with_tolerance<T>(
    x: &Tensor<T>,
    y: &Tensor<T>,
    atol: T,
    rtol: T,
) -> Result<(), ExpectEqualError>
where
    T: Copy + Debug + ApproxEq,
{
    if x.shape() != y.shape() {
        return Err(ExpectEqualError::ShapeMismatch(format!(
            "Tensors have different shapes. {:?} vs. {:?}",
            x.shape(),
            y.shape()
        )));
    }

    let mismatches: Vec<_> = zip(x.iter(), y.iter())
        .enumerate()
        .filter(|(_, (xi, yi))| !xi.approx_eq_with_atol_rtol(yi, atol, rtol))
        .map(|(i, (xi, yi))| (unravel_index(x.shape(), i).to_vec(), *xi, *yi))
        .collect();

    if mismatches.is_empty() {
        return Ok(());
    }

    let max_examples = 16;
    Err(ExpectEqualError::ValueMismatch(format!(
        "Tensor values differ at {} of {} indexes: {:?}{}",
        mismatches.len(),
        x.len(),
        &mismatches[..mismatches.len().min(max_examples)],
        if mismatches.len() > max_examples {
            "..."
        } else {
            ""
        }
    )))
}

#[cfg(test)]
mod tests {
    use super::{expect_equal, expect_equal_with_tolerance, ApproxEq, ExpectEqualError};
    use crate::Tensor;

    #[test]
    fn test_approx_eq() {
        assert!(1.0f32.approx_eq(&1.000001));
        assert!(!1.0f32.approx_eq(&1.01));
        assert!(3i32.approx_eq(&3));
    }

    #[test]
    fn test_expect_equal() {
        let a = Tensor::from([1.0f32, 2.0]);
        let b = Tensor::from([1.0f32, 2.5]);
        assert!(expect_equal(&a, &a).is_ok());
        assert!(matches!(
            expect_equal(&a, &b),
            Err(ExpectEqualError::ValueMismatch(_))
        ));
        assert!(expect_equal_with_tolerance(&a, &b, 0.6, 0.).is_ok());

        let c = Tensor::from([[1.0f32, 2.0]]);
        assert!(matches!(
            expect_equal(&a, &c),
            Err(ExpectEqualError::ShapeMismatch(_))
        ));
    }
}
