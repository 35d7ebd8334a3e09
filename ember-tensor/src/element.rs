use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Sub};

/// Numeric element types that can be stored in a [`Tensor`](crate::Tensor).
///
/// Arithmetic that accumulates (eg. matrix multiplication) goes through
/// `f32` via [`to_f32`](Element::to_f32) and [`from_f32`](Element::from_f32),
/// so integer tensors truncate when the result is cast back.
pub trait Element:
    Copy
    + Debug
    + Default
    + PartialEq
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
{
    const ZERO: Self;
    const ONE: Self;

    fn to_f32(self) -> f32;
    fn from_f32(val: f32) -> Self;
    fn from_usize(val: usize) -> Self;
}

macro_rules! impl_element {
    ($ty:ty, $zero:expr, $one:expr) => {
        impl Element for $ty {
            const ZERO: Self = $zero;
            const ONE: Self = $one;

            #[inline]
            fn to_f32(self) -> f32 {
                self as f32
            }

            #[inline]
            fn from_f32(val: f32) -> Self {
                val as $ty
            }

            #[inline]
            fn from_usize(val: usize) -> Self {
                val as $ty
            }
        }
    };
}

impl_element!(f32, 0., 1.);
impl_element!(f64, 0., 1.);
impl_element!(i32, 0, 1);
impl_element!(i64, 0, 1);
impl_element!(usize, 0, 1);
