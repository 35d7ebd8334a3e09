use std::fmt::{Debug, Display, Error, Formatter};

use crate::Tensor;

/// Configuration for formatting of a tensor.
struct FormatOptions {
    /// Maximum number of entries to print along an axis before eliding.
    max_entries: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions { max_entries: 10 }
    }
}

/// Wrapper around a tensor reference which prints its elements as nested
/// lists, eliding the middle of long axes with `...`.
struct FormatTensor<'a, T> {
    tensor: &'a Tensor<T>,
    opts: FormatOptions,
}

impl<'a, T: Debug> FormatTensor<'a, T> {
    fn new(tensor: &'a Tensor<T>, opts: FormatOptions) -> Self {
        Self { tensor, opts }
    }

    /// Return the positions to print along an axis of size `size`, with
    /// `None` marking the elided gap.
    fn positions(&self, size: usize) -> Vec<Option<usize>> {
        let max = self.opts.max_entries;
        if size <= max {
            return (0..size).map(Some).collect();
        }
        let half = max / 2;
        (0..half)
            .map(Some)
            .chain(std::iter::once(None))
            .chain((size - half..size).map(Some))
            .collect()
    }

    fn write_axis(&self, f: &mut Formatter<'_>, dim: usize, offset: usize) -> Result<(), Error> {
        let shape = self.tensor.shape();
        let stride = self.tensor.strides()[dim];
        let last = dim + 1 == shape.len();
        let separator = if last {
            ", ".to_string()
        } else {
            format!(",\n{}", " ".repeat(dim + 1))
        };

        write!(f, "[")?;
        for (i, pos) in self.positions(shape[dim]).into_iter().enumerate() {
            if i > 0 {
                write!(f, "{}", separator)?;
            }
            match pos {
                None => write!(f, "...")?,
                Some(pos) if last => write!(f, "{:?}", self.tensor.data()[offset + pos])?,
                Some(pos) => self.write_axis(f, dim + 1, offset + pos * stride)?,
            }
        }
        write!(f, "]")
    }
}

impl<T: Debug> Debug for FormatTensor<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        self.write_axis(f, 0, 0)
    }
}

impl<T: Debug> Debug for Tensor<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        let fmt = FormatTensor::new(self, FormatOptions::default());
        write!(f, "{:?}, shape={:?}", fmt, self.shape())
    }
}

impl<T: Debug> Display for Tensor<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        FormatTensor::new(self, FormatOptions::default()).fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use crate::Tensor;

    #[test]
    fn test_display() {
        let x = Tensor::from([1, 2, 3]);
        assert_eq!(x.to_string(), "[1, 2, 3]");

        let x = Tensor::from([[1, 2], [3, 4]]);
        assert_eq!(x.to_string(), "[[1, 2],\n [3, 4]]");

        let x = Tensor::from([[[1, 2]], [[3, 4]]]);
        assert_eq!(x.to_string(), "[[[1, 2]],\n [[3, 4]]]");
    }

    #[test]
    fn test_debug_includes_shape() {
        let x = Tensor::from([[0.5f32], [1.0]]);
        assert_eq!(format!("{:?}", x), "[[0.5],\n [1.0]], shape=[2, 1]");
    }

    #[test]
    fn test_elide_long_axis() {
        let x = Tensor::<i32>::arange(20);
        assert_eq!(
            x.to_string(),
            "[0, 1, 2, 3, 4, ..., 15, 16, 17, 18, 19]"
        );
    }
}
