use ember_tensor::{ShapeError, Tensor};

pub fn relu(x: &Tensor) -> Tensor {
    x.map(|e| e.max(0f32))
}

pub fn relu_in_place(x: &mut Tensor) {
    x.apply(|e| e.max(0f32));
}

/// Return 1 where `x > 0` and 0 elsewhere.
pub fn relu_mask(x: &Tensor) -> Tensor {
    x.map(|e| if e > 0. { 1. } else { 0. })
}

/// Return the number of columns of a softmax input, treating a vector as a
/// single row.
fn row_len(x: &Tensor) -> Result<usize, ShapeError> {
    match x.ndim() {
        1 => Ok(x.len()),
        2 => Ok(x.size(1)),
        n => Err(ShapeError::InvalidRank {
            expected: "1 or 2",
            actual: n,
        }),
    }
}

fn softmax_row(row: &mut [f32]) {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.;
    for x in row.iter_mut() {
        *x = (*x - max).exp();
        sum += *x;
    }
    for x in row.iter_mut() {
        *x /= sum;
    }
}

/// Softmax over the last axis of a vector or matrix.
///
/// The row maximum is subtracted before exponentiating, so large logits do
/// not overflow.
pub fn softmax(x: &Tensor) -> Result<Tensor, ShapeError> {
    let cols = row_len(x)?;
    let mut output = x.clone();
    if cols > 0 {
        output.data_mut().chunks_mut(cols).for_each(softmax_row);
    }
    Ok(output)
}

/// Natural log of [`softmax`], computed as `x - max - ln(sum(exp(x - max)))`.
pub fn log_softmax(x: &Tensor) -> Result<Tensor, ShapeError> {
    let cols = row_len(x)?;
    let mut output = x.clone();
    if cols > 0 {
        for row in output.data_mut().chunks_mut(cols) {
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let log_sum = row.iter().map(|x| (x - max).exp()).sum::<f32>().ln();
            for x in row.iter_mut() {
                *x = *x - max - log_sum;
            }
        }
    }
    Ok(output)
}

/// Propagate `grad` back through a softmax whose output was `output`.
///
/// Per row this is `dx_i = y_i * (g_i - sum_j g_j * y_j)`.
pub fn softmax_backward(output: &Tensor, grad: &Tensor) -> Result<Tensor, ShapeError> {
    if output.shape() != grad.shape() {
        return Err(ShapeError::Mismatch {
            left: output.shape().to_vec(),
            right: grad.shape().to_vec(),
        });
    }
    let cols = row_len(output)?;
    let mut input_grad = grad.clone();
    if cols > 0 {
        for (dx, y) in input_grad
            .data_mut()
            .chunks_mut(cols)
            .zip(output.data().chunks(cols))
        {
            let dot: f32 = dx.iter().zip(y).map(|(g, y)| g * y).sum();
            for (g, y) in dx.iter_mut().zip(y) {
                *g = y * (*g - dot);
            }
        }
    }
    Ok(input_grad)
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use ember_tensor::test_util::{expect_equal, expect_equal_with_tolerance};
    use ember_tensor::Tensor;
    use ember_testing::{assert_close, central_difference};

    use super::{log_softmax, relu, relu_in_place, relu_mask, softmax, softmax_backward};

    #[test]
    fn test_relu() -> Result<(), Box<dyn Error>> {
        let input = Tensor::from_data(&[2, 2, 1], vec![-0.5, 0.5, 3.0, -5.5])?;
        let expected = Tensor::from_data(&[2, 2, 1], vec![0.0, 0.5, 3.0, 0.0])?;

        let result = relu(&input);
        expect_equal(&result, &expected)?;

        let mut result = input.clone();
        relu_in_place(&mut result);
        expect_equal(&result, &expected)?;

        let mask = relu_mask(&input);
        assert_eq!(mask.data(), &[0., 1., 1., 0.]);

        Ok(())
    }

    #[test]
    fn test_softmax() -> Result<(), Box<dyn Error>> {
        let input = Tensor::from([[0.1634, 0.8647, 0.6401, 0.8265, 0.0560]]);
        let expected = Tensor::from([[0.13394, 0.27007, 0.21574, 0.25995, 0.1203]]);
        expect_equal_with_tolerance(&softmax(&input)?, &expected, 1e-4, 0.)?;

        // Rows are independent, and shifting a row does not change it.
        let input = Tensor::from([[1., 2., 3.], [1001., 1002., 1003.]]);
        let result = softmax(&input)?;
        for row in 0..2 {
            let sum: f32 = (0..3).map(|col| result[[row, col]]).sum();
            assert_close(sum, 1., 1e-6);
        }
        assert_close(result[[0, 2]], result[[1, 2]], 1e-6);

        // Vectors are treated as one row.
        let result = softmax(&Tensor::from([0., 0.]))?;
        assert_eq!(result.data(), &[0.5, 0.5]);

        assert!(softmax(&Tensor::zeros(&[1, 2, 3])).is_err());
        Ok(())
    }

    #[test]
    fn test_log_softmax() -> Result<(), Box<dyn Error>> {
        let input = Tensor::from([[0.5, -1., 2.], [1000., 0., -1000.]]);
        let expected = softmax(&input)?.map(f32::ln);
        let result = log_softmax(&input)?;
        expect_equal_with_tolerance(
            &result.row(0)?.to_tensor(),
            &expected.row(0)?.to_tensor(),
            1e-5,
            1e-4,
        )?;
        assert_close(result[[1, 0]], 0., 1e-6);
        assert!(result.iter().all(|x| x.is_finite()));
        Ok(())
    }

    #[test]
    fn test_softmax_backward() -> Result<(), Box<dyn Error>> {
        let mut input = Tensor::from([[0.2, -0.4, 1.3], [0.0, 2.0, -1.0]]);
        let upstream = Tensor::from([[0.5, -1.0, 0.25], [1.0, 0.0, -2.0]]);
        let loss = |x: &Tensor| -> f32 {
            let y = softmax(x).unwrap();
            y.iter().zip(upstream.iter()).map(|(y, g)| y * g).sum()
        };

        let output = softmax(&input)?;
        let grad = softmax_backward(&output, &upstream)?;

        for i in 0..input.len() {
            let orig = input.data()[i];
            let numeric = central_difference(
                |v| {
                    input.data_mut()[i] = v;
                    loss(&input)
                },
                orig,
                1e-3,
            );
            input.data_mut()[i] = orig;
            assert_close(grad.data()[i], numeric, 1e-3);
        }
        Ok(())
    }
}
