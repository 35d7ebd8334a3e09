//! Internal testing utilities for the ember crates.

use std::fmt::Debug;
use std::panic::{catch_unwind, RefUnwindSafe, UnwindSafe};

/// Utility for creating parametrized (aka. table-driven) tests.
///
/// Create a `Debug` struct, conventionally named `Case`, holding the data
/// for one case, collect the cases into an array or `Vec` and call
/// `test_each` with the test body. Every case is run even if earlier ones
/// fail. If any case panics, `test_each` panics afterwards with the number
/// of failures and their debug representations.
///
/// ```
/// use ember_testing::TestCases;
///
/// #[derive(Debug)]
/// struct Case {
///   a: i32,
///   b: i32,
///   expected: i32,
/// }
///
/// let cases = [
///   Case { a: 3, b: 5, expected: 15 },
/// ];
///
/// cases.test_each(|&Case { a, b, expected }| {
///   assert_eq!(a * b, expected);
/// });
/// ```
///
/// Cases and values captured by the test closure must be unwind safe. Types
/// with interior mutability can be wrapped in
/// [`AssertUnwindSafe`](std::panic::AssertUnwindSafe) or created inside the
/// test body instead.
pub trait TestCases {
    /// The data for a single test case.
    type Case;

    /// Call `test` with a reference to each case.
    fn test_each(self, test: impl Fn(&Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe;

    /// Call `test` with a clone of each case. The original is kept for
    /// reporting failures.
    fn test_each_clone(self, test: impl Fn(Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + Clone + UnwindSafe;

    /// Call `test` with each case by value. Cases are formatted before the
    /// call so failures can still be reported.
    fn test_each_value(self, test: impl Fn(Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe;
}

/// Panic if any cases failed, listing them.
fn report_failures<D: Debug>(failures: Vec<D>) {
    assert!(
        failures.is_empty(),
        "{} test cases failed: {:?}",
        failures.len(),
        failures
    );
}

impl<I: IntoIterator> TestCases for I {
    type Case = I::Item;

    fn test_each(self, test: impl Fn(&I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe,
    {
        let failures: Vec<_> = self
            .into_iter()
            .filter(|case| catch_unwind(|| test(case)).is_err())
            .collect();
        report_failures(failures);
    }

    fn test_each_clone(self, test: impl Fn(I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + Clone + UnwindSafe,
    {
        let test = &test;
        let failures: Vec<_> = self
            .into_iter()
            .filter(|case| {
                let value = case.clone();
                catch_unwind(move || test(value)).is_err()
            })
            .collect();
        report_failures(failures);
    }

    fn test_each_value(self, test: impl Fn(I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe,
    {
        let test = &test;
        let failures: Vec<String> = self
            .into_iter()
            .filter_map(|case| {
                let label = format!("{:?}", case);
                catch_unwind(move || test(case)).is_err().then_some(label)
            })
            .collect();
        report_failures(failures);
    }
}

/// Estimate the derivative of `f` at `x` using a central difference,
/// `(f(x + eps) - f(x - eps)) / 2eps`.
pub fn central_difference(mut f: impl FnMut(f32) -> f32, x: f32, eps: f32) -> f32 {
    (f(x + eps) - f(x - eps)) / (2. * eps)
}

/// Assert that two floats differ by no more than `tolerance`.
#[track_caller]
pub fn assert_close(actual: f32, expected: f32, tolerance: f32) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "{} is not within {} of {}",
        actual,
        tolerance,
        expected
    );
}
