use std::fmt;
use std::str::FromStr;

use ember_tensor::{Indices, ShapeError, Tensor};

use crate::error::ConfigError;
use crate::ops::Dims2;

/// How the border added around a convolution input is filled.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PaddingMode {
    /// Fill with zeros.
    #[default]
    Zeros,

    /// Mirror the input about its edge. Not implemented.
    Reflect,

    /// Repeat the edge value. Not implemented.
    Replicate,
}

impl PaddingMode {
    /// Return an error if this mode cannot be used yet.
    pub fn check_supported(self) -> Result<(), ConfigError> {
        match self {
            PaddingMode::Zeros => Ok(()),
            mode => Err(ConfigError::UnsupportedPaddingMode(mode)),
        }
    }
}

impl FromStr for PaddingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zeros" => Ok(PaddingMode::Zeros),
            "reflect" => Ok(PaddingMode::Reflect),
            "replicate" => Ok(PaddingMode::Replicate),
            other => Err(ConfigError::UnknownPaddingMode(other.to_string())),
        }
    }
}

impl fmt::Display for PaddingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaddingMode::Zeros => "zeros",
            PaddingMode::Reflect => "reflect",
            PaddingMode::Replicate => "replicate",
        };
        write!(f, "{}", name)
    }
}

/// Pad every dimension of `input` with `const_val`.
///
/// `pads` has one `(before, after)` pair per dimension.
pub fn pad<T: Copy>(
    input: &Tensor<T>,
    pads: &[(usize, usize)],
    const_val: T,
) -> Result<Tensor<T>, ShapeError> {
    if pads.len() != input.ndim() {
        return Err(ShapeError::InvalidRank {
            expected: "one pad pair per dim",
            actual: pads.len(),
        });
    }

    let out_shape: Vec<usize> = input
        .shape()
        .iter()
        .zip(pads)
        .map(|(size, (before, after))| before + size + after)
        .collect();
    let mut output = Tensor::full(&out_shape, const_val);
    let mut out_index = vec![0; out_shape.len()];

    for (in_index, &x) in Indices::from_shape(input.shape()).zip(input.iter()) {
        for (out_i, (in_i, (before, _))) in out_index.iter_mut().zip(in_index.iter().zip(pads)) {
            *out_i = in_i + before;
        }
        output[&out_index[..]] = x;
    }

    Ok(output)
}

/// Zero-pad the two spatial dimensions of an NCHW tensor by `padding` on
/// each side.
pub fn zero_pad(input: &Tensor, padding: Dims2) -> Result<Tensor, ShapeError> {
    if input.ndim() != 4 {
        return Err(ShapeError::InvalidRank {
            expected: "4 (NCHW)",
            actual: input.ndim(),
        });
    }
    if padding.h == 0 && padding.w == 0 {
        return Ok(input.clone());
    }
    pad(
        input,
        &[(0, 0), (0, 0), (padding.h, padding.h), (padding.w, padding.w)],
        0.,
    )
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use ember_tensor::test_util::expect_equal;
    use ember_tensor::{ShapeError, Tensor};
    use ember_testing::TestCases;

    use super::{pad, zero_pad, PaddingMode};
    use crate::error::ConfigError;
    use crate::ops::Dims2;

    #[test]
    fn test_pad() -> Result<(), Box<dyn Error>> {
        // Same padding around each edge.
        let input = Tensor::from([[1.0, 2.0], [3.0, 4.0]]);
        let expected = Tensor::from([
            [0.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 2.0, 0.0],
            [0.0, 3.0, 4.0, 0.0],
            [0.0, 0.0, 0.0, 0.0],
        ]);
        let result = pad(&input, &[(1, 1), (1, 1)], 0.0)?;
        expect_equal(&result, &expected)?;

        // Zero padding (no-op)
        let result = pad(&input, &[(0, 0), (0, 0)], 0.0)?;
        expect_equal(&result, &input)?;

        // Un-even padding with a constant.
        let input = Tensor::from([[[1, 2], [3, 4]]]);
        let result = pad(&input, &[(0, 0), (0, 1), (1, 0)], 9)?;
        assert_eq!(result.shape(), &[1, 3, 3]);
        assert_eq!(result.data(), &[9, 1, 2, 9, 3, 4, 9, 9, 9]);

        Ok(())
    }

    #[test]
    fn test_pad_wrong_length() {
        let input = Tensor::from([1, 2, 3]);
        assert!(matches!(
            pad(&input, &[(1, 1), (1, 1)], 0),
            Err(ShapeError::InvalidRank { .. })
        ));
    }

    #[test]
    fn test_zero_pad() -> Result<(), Box<dyn Error>> {
        let input = Tensor::from_data(&[1, 1, 2, 2], vec![1., 2., 3., 4.])?;
        let result = zero_pad(&input, Dims2::new(1, 2))?;
        assert_eq!(result.shape(), &[1, 1, 4, 6]);
        assert_eq!(
            result.data(),
            &[
                0., 0., 0., 0., 0., 0., //
                0., 0., 1., 2., 0., 0., //
                0., 0., 3., 4., 0., 0., //
                0., 0., 0., 0., 0., 0., //
            ]
        );

        let unpadded = zero_pad(&input, Dims2::from(0))?;
        assert_eq!(unpadded, input);

        assert!(zero_pad(&Tensor::<f32>::zeros(&[2, 2]), Dims2::from(1)).is_err());
        Ok(())
    }

    #[test]
    fn test_parse_padding_mode() {
        #[derive(Debug)]
        struct Case<'a> {
            name: &'a str,
            expected: Result<PaddingMode, ConfigError>,
        }

        let cases = [
            Case {
                name: "zeros",
                expected: Ok(PaddingMode::Zeros),
            },
            Case {
                name: "reflect",
                expected: Ok(PaddingMode::Reflect),
            },
            Case {
                name: "replicate",
                expected: Ok(PaddingMode::Replicate),
            },
            Case {
                name: "circular",
                expected: Err(ConfigError::UnknownPaddingMode("circular".into())),
            },
        ];

        cases.test_each(|case| {
            assert_eq!(case.name.parse::<PaddingMode>(), case.expected);
        });

        assert!(PaddingMode::Zeros.check_supported().is_ok());
        assert_eq!(
            PaddingMode::Reflect.check_supported(),
            Err(ConfigError::UnsupportedPaddingMode(PaddingMode::Reflect))
        );
    }
}
