//! Direct (non-im2col) 2D correlation over NCHW tensors and the gradients of
//! a zero-padded, strided and dilated correlation.

use ember_tensor::{ShapeError, Tensor};

use crate::error::{ConfigError, LayerError};
use crate::ops::pad::{pad, zero_pad};

/// A pair of sizes for the height and width axes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Dims2 {
    pub h: usize,
    pub w: usize,
}

impl Dims2 {
    pub const fn new(h: usize, w: usize) -> Dims2 {
        Dims2 { h, w }
    }

    /// Return the trailing two dims of an NCHW shape.
    pub fn spatial(shape: &[usize]) -> Dims2 {
        match shape {
            [.., h, w] => Dims2::new(*h, *w),
            _ => Dims2::default(),
        }
    }

    fn any_zero(&self) -> bool {
        self.h == 0 || self.w == 0
    }
}

impl From<usize> for Dims2 {
    fn from(size: usize) -> Dims2 {
        Dims2::new(size, size)
    }
}

impl From<(usize, usize)> for Dims2 {
    fn from((h, w): (usize, usize)) -> Dims2 {
        Dims2::new(h, w)
    }
}

impl From<[usize; 2]> for Dims2 {
    fn from([h, w]: [usize; 2]) -> Dims2 {
        Dims2::new(h, w)
    }
}

/// Stride, zero-padding and dilation of a 2D convolution.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConvGeometry {
    pub stride: Dims2,
    pub padding: Dims2,
    pub dilation: Dims2,
}

impl Default for ConvGeometry {
    fn default() -> ConvGeometry {
        ConvGeometry {
            stride: Dims2::from(1),
            padding: Dims2::from(0),
            dilation: Dims2::from(1),
        }
    }
}

impl ConvGeometry {
    pub fn new(
        stride: impl Into<Dims2>,
        padding: impl Into<Dims2>,
        dilation: impl Into<Dims2>,
    ) -> Result<ConvGeometry, ConfigError> {
        let geom = ConvGeometry {
            stride: stride.into(),
            padding: padding.into(),
            dilation: dilation.into(),
        };
        if geom.stride.any_zero() {
            return Err(ConfigError::ZeroSize("stride"));
        }
        if geom.dilation.any_zero() {
            return Err(ConfigError::ZeroSize("dilation"));
        }
        Ok(geom)
    }

    /// Compute the spatial output size for an input and kernel size.
    ///
    /// Along each axis this is `floor((H + 2P - D(K - 1) - 1) / S) + 1`.
    pub fn output_size(&self, input: Dims2, kernel: Dims2) -> Result<Dims2, ConfigError> {
        if kernel.any_zero() {
            return Err(ConfigError::ZeroSize("kernel size"));
        }
        if self.stride.any_zero() {
            return Err(ConfigError::ZeroSize("stride"));
        }
        if self.dilation.any_zero() {
            return Err(ConfigError::ZeroSize("dilation"));
        }

        let axis_size = |size: usize, k: usize, s: usize, p: usize, d: usize| -> isize {
            let span = (size + 2 * p) as isize - (d * (k - 1)) as isize - 1;
            if span < 0 {
                // Kernel does not fit at all.
                0
            } else {
                span / s as isize + 1
            }
        };
        let height = axis_size(
            input.h,
            kernel.h,
            self.stride.h,
            self.padding.h,
            self.dilation.h,
        );
        let width = axis_size(
            input.w,
            kernel.w,
            self.stride.w,
            self.padding.w,
            self.dilation.w,
        );

        if height <= 0 || width <= 0 {
            return Err(ConfigError::NonPositiveOutput { height, width });
        }
        Ok(Dims2::new(height as usize, width as usize))
    }
}

fn check_rank4(t: &Tensor) -> Result<[usize; 4], ShapeError> {
    match *t.shape() {
        [a, b, c, d] => Ok([a, b, c, d]),
        _ => Err(ShapeError::InvalidRank {
            expected: "4 (NCHW)",
            actual: t.ndim(),
        }),
    }
}

/// Compute the `(N, C_out, H_out, W_out)` output shape of a convolution of
/// an `(N, C_in, H, W)` input with an `(C_out, C_in, K_h, K_w)` weight.
pub fn conv_output_shape(
    input_shape: &[usize],
    weight_shape: &[usize],
    geom: &ConvGeometry,
) -> Result<[usize; 4], LayerError> {
    for shape in [input_shape, weight_shape] {
        if shape.len() != 4 {
            return Err(ShapeError::InvalidRank {
                expected: "4 (NCHW)",
                actual: shape.len(),
            }
            .into());
        }
    }
    let (batch, in_c) = (input_shape[0], input_shape[1]);
    let (out_c, k_in_c) = (weight_shape[0], weight_shape[1]);
    if in_c != k_in_c {
        return Err(ShapeError::Mismatch {
            left: input_shape.to_vec(),
            right: weight_shape.to_vec(),
        }
        .into());
    }
    let out = geom.output_size(Dims2::spatial(input_shape), Dims2::spatial(weight_shape))?;
    Ok([batch, out_c, out.h, out.w])
}

/// Correlate an `(N, C, H, W)` input with an `(O, C, K_h, K_w)` kernel.
///
/// Output element `[n, o, y, x]` is the sum over `c, ky, kx` of
/// `input[n, c, y * S_h + ky * D_h, x * S_w + kx * D_w] * kernel[o, c, ky, kx]`,
/// plus `bias[o]`. Taps which fall outside the input contribute nothing.
/// Products are accumulated in `f32`.
pub fn correlate(
    input: &Tensor,
    kernel: &Tensor,
    bias: Option<&Tensor>,
    stride: Dims2,
    dilation: Dims2,
    out_size: Dims2,
) -> Result<Tensor, ShapeError> {
    let [batch, in_c, in_h, in_w] = check_rank4(input)?;
    let [out_c, k_in_c, k_h, k_w] = check_rank4(kernel)?;
    if in_c != k_in_c {
        return Err(ShapeError::Mismatch {
            left: input.shape().to_vec(),
            right: kernel.shape().to_vec(),
        });
    }
    if let Some(bias) = bias {
        if bias.shape() != [out_c] {
            return Err(ShapeError::Mismatch {
                left: bias.shape().to_vec(),
                right: vec![out_c],
            });
        }
    }

    let Dims2 { h: out_h, w: out_w } = out_size;
    let in_data = input.data();
    let k_data = kernel.data();
    let mut out = Vec::with_capacity(batch * out_c * out_h * out_w);

    for n in 0..batch {
        for o in 0..out_c {
            let init = bias.map(|b| b.data()[o]).unwrap_or(0.);
            for oy in 0..out_h {
                for ox in 0..out_w {
                    let mut acc = init;
                    for c in 0..in_c {
                        let in_chan = &in_data[(n * in_c + c) * in_h * in_w..][..in_h * in_w];
                        let k_chan = &k_data[(o * in_c + c) * k_h * k_w..][..k_h * k_w];
                        for ky in 0..k_h {
                            let y = oy * stride.h + ky * dilation.h;
                            if y >= in_h {
                                break;
                            }
                            for kx in 0..k_w {
                                let x = ox * stride.w + kx * dilation.w;
                                if x >= in_w {
                                    break;
                                }
                                acc += in_chan[y * in_w + x] * k_chan[ky * k_w + kx];
                            }
                        }
                    }
                    out.push(acc);
                }
            }
        }
    }

    Tensor::from_data(&[batch, out_c, out_h, out_w], out)
}

/// Zero-pad `input`, then correlate it with `weight`.
pub fn conv2d(
    input: &Tensor,
    weight: &Tensor,
    bias: Option<&Tensor>,
    geom: &ConvGeometry,
) -> Result<Tensor, LayerError> {
    let [_, _, out_h, out_w] = conv_output_shape(input.shape(), weight.shape(), geom)?;
    let padded = zero_pad(input, geom.padding)?;
    let output = correlate(
        &padded,
        weight,
        bias,
        geom.stride,
        geom.dilation,
        Dims2::new(out_h, out_w),
    )?;
    Ok(output)
}

/// Rotate each `(K_h, K_w)` plane of a rank-4 kernel by 180 degrees.
pub fn flip_kernel(kernel: &Tensor) -> Result<Tensor, ShapeError> {
    let [out_c, in_c, k_h, k_w] = check_rank4(kernel)?;
    let plane = k_h * k_w;
    let mut flipped = Vec::with_capacity(kernel.len());
    for chunk in kernel.data().chunks(plane.max(1)).take(out_c * in_c) {
        flipped.extend(chunk.iter().rev());
    }
    Tensor::from_data(kernel.shape(), flipped)
}

/// Insert `stride - 1` zeros between neighboring spatial elements of an
/// NCHW tensor, so a size `H` axis becomes `(H - 1) * S + 1`.
pub fn dilate(input: &Tensor, stride: Dims2) -> Result<Tensor, ShapeError> {
    let [batch, chans, in_h, in_w] = check_rank4(input)?;
    if stride == Dims2::from(1) {
        return Ok(input.clone());
    }
    let out_h = in_h.saturating_sub(1) * stride.h + usize::from(in_h > 0);
    let out_w = in_w.saturating_sub(1) * stride.w + usize::from(in_w > 0);

    let mut out = Tensor::zeros(&[batch, chans, out_h, out_w]);
    let out_data = out.data_mut();
    for (plane, in_plane) in input.data().chunks((in_h * in_w).max(1)).enumerate() {
        let out_plane = &mut out_data[plane * out_h * out_w..][..out_h * out_w];
        for y in 0..in_h {
            for x in 0..in_w {
                out_plane[y * stride.h * out_w + x * stride.w] = in_plane[y * in_w + x];
            }
        }
    }
    Ok(out)
}

/// Gradient of a convolution's loss with respect to its weight.
///
/// `padded_input` is the zero-padded input seen by the forward pass and
/// `grad` the `(N, C_out, H_out, W_out)` gradient of its output. The roles
/// of stride and dilation are swapped relative to the forward pass.
pub fn conv2d_weight_grad(
    padded_input: &Tensor,
    grad: &Tensor,
    kernel_size: Dims2,
    geom: &ConvGeometry,
) -> Result<Tensor, ShapeError> {
    let [batch, ..] = check_rank4(padded_input)?;
    let [grad_batch, ..] = check_rank4(grad)?;
    if batch != grad_batch {
        return Err(ShapeError::Mismatch {
            left: padded_input.shape().to_vec(),
            right: grad.shape().to_vec(),
        });
    }

    // Channels take the role of the batch axis in both operands.
    let input_t = padded_input.permute(&[1, 0, 2, 3])?;
    let grad_t = grad.permute(&[1, 0, 2, 3])?;
    let weight_grad_t = correlate(
        &input_t,
        &grad_t,
        None,
        geom.dilation,
        geom.stride,
        kernel_size,
    )?;
    weight_grad_t.permute(&[1, 0, 2, 3])
}

/// Gradient of a convolution's loss with respect to its bias. This sums
/// `grad` over the batch and spatial axes.
pub fn conv2d_bias_grad(grad: &Tensor) -> Result<Tensor, ShapeError> {
    let [batch, out_c, out_h, out_w] = check_rank4(grad)?;
    let plane = out_h * out_w;
    let mut sums = vec![0.; out_c];
    for n in 0..batch {
        for (o, sum) in sums.iter_mut().enumerate() {
            *sum += grad.data()[(n * out_c + o) * plane..][..plane]
                .iter()
                .sum::<f32>();
        }
    }
    Ok(Tensor::from(sums))
}

/// Amounts by which the dilated gradient and the flipped kernel are padded
/// along one axis for the full convolution that computes the input gradient.
///
/// The correlation needs the gradient shifted right by `(K - 1) * D - P`.
/// When that is negative the shift is applied by prepending whole zero taps
/// to the kernel and padding the gradient by the remainder.
fn full_conv_pads(kernel: usize, padding: usize, dilation: usize) -> (usize, usize) {
    let shift = ((kernel - 1) * dilation) as isize - padding as isize;
    if shift >= 0 {
        (shift as usize, 0)
    } else {
        let excess = shift.unsigned_abs();
        let taps = excess.div_ceil(dilation);
        (taps * dilation - excess, taps)
    }
}

/// Gradient of a convolution's loss with respect to its unpadded input.
///
/// `weight` is the `(C_out, C_in, K_h, K_w)` forward kernel and `input_size`
/// the spatial size of the forward input before padding. The result has
/// shape `(N, C_in, H, W)`.
pub fn conv2d_input_grad(
    grad: &Tensor,
    weight: &Tensor,
    input_size: Dims2,
    geom: &ConvGeometry,
) -> Result<Tensor, ShapeError> {
    let [_, grad_c, ..] = check_rank4(grad)?;
    let [out_c, _, k_h, k_w] = check_rank4(weight)?;
    if grad_c != out_c {
        return Err(ShapeError::Mismatch {
            left: grad.shape().to_vec(),
            right: weight.shape().to_vec(),
        });
    }

    let (grad_pad_h, kernel_pad_h) = full_conv_pads(k_h, geom.padding.h, geom.dilation.h);
    let (grad_pad_w, kernel_pad_w) = full_conv_pads(k_w, geom.padding.w, geom.dilation.w);

    let dilated = dilate(grad, geom.stride)?;
    let padded_grad = pad(
        &dilated,
        &[
            (0, 0),
            (0, 0),
            (grad_pad_h, grad_pad_h),
            (grad_pad_w, grad_pad_w),
        ],
        0.,
    )?;

    let mut kernel = flip_kernel(weight)?.permute(&[1, 0, 2, 3])?;
    if kernel_pad_h > 0 || kernel_pad_w > 0 {
        kernel = pad(
            &kernel,
            &[
                (0, 0),
                (0, 0),
                (kernel_pad_h, kernel_pad_h),
                (kernel_pad_w, kernel_pad_w),
            ],
            0.,
        )?;
    }

    correlate(
        &padded_grad,
        &kernel,
        None,
        Dims2::from(1),
        geom.dilation,
        input_size,
    )
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use ember_tensor::rng::XorShiftRng;
    use ember_tensor::test_util::{expect_equal, expect_equal_with_tolerance};
    use ember_tensor::{ShapeError, Tensor};
    use ember_testing::{assert_close, central_difference, TestCases};

    use super::{
        conv2d, conv2d_bias_grad, conv2d_input_grad, conv2d_weight_grad, conv_output_shape,
        correlate, dilate, flip_kernel, ConvGeometry, Dims2,
    };
    use crate::error::{ConfigError, LayerError};
    use crate::ops::zero_pad;

    /// Un-optimized convolution which checks bounds against the unpadded
    /// input instead of padding it first.
    fn reference_conv(
        input: &Tensor,
        kernel: &Tensor,
        bias: Option<&Tensor>,
        geom: &ConvGeometry,
    ) -> Tensor {
        let [batch, in_c, in_h, in_w]: [usize; 4] = input.shape().try_into().unwrap();
        let [out_c, _, k_h, k_w]: [usize; 4] = kernel.shape().try_into().unwrap();
        let out = geom
            .output_size(Dims2::new(in_h, in_w), Dims2::new(k_h, k_w))
            .unwrap();

        let mut output = Tensor::zeros(&[batch, out_c, out.h, out.w]);
        for n in 0..batch {
            for o in 0..out_c {
                for oy in 0..out.h {
                    for ox in 0..out.w {
                        let mut acc = bias.map(|b| b[[o]]).unwrap_or(0.);
                        for c in 0..in_c {
                            for ky in 0..k_h {
                                for kx in 0..k_w {
                                    let y = (oy * geom.stride.h + ky * geom.dilation.h) as isize
                                        - geom.padding.h as isize;
                                    let x = (ox * geom.stride.w + kx * geom.dilation.w) as isize
                                        - geom.padding.w as isize;
                                    if y < 0 || x < 0 || y >= in_h as isize || x >= in_w as isize
                                    {
                                        continue;
                                    }
                                    acc += input[[n, c, y as usize, x as usize]]
                                        * kernel[[o, c, ky, kx]];
                                }
                            }
                        }
                        output[[n, o, oy, ox]] = acc;
                    }
                }
            }
        }
        output
    }

    #[test]
    fn test_output_size() {
        #[derive(Debug)]
        struct Case {
            input: Dims2,
            kernel: Dims2,
            geom: ConvGeometry,
            expected: Result<Dims2, ConfigError>,
        }

        let geom = |s: usize, p: usize, d: usize| ConvGeometry::new(s, p, d).unwrap();

        let cases = [
            Case {
                input: Dims2::from(15),
                kernel: Dims2::from(3),
                geom: geom(2, 3, 2),
                expected: Ok(Dims2::from(9)),
            },
            Case {
                input: Dims2::from(28),
                kernel: Dims2::from(3),
                geom: geom(2, 1, 1),
                expected: Ok(Dims2::from(14)),
            },
            Case {
                input: Dims2::new(5, 7),
                kernel: Dims2::new(1, 3),
                geom: geom(1, 0, 1),
                expected: Ok(Dims2::new(5, 5)),
            },
            Case {
                input: Dims2::from(2),
                kernel: Dims2::from(3),
                geom: geom(1, 0, 1),
                expected: Err(ConfigError::NonPositiveOutput {
                    height: 0,
                    width: 0,
                }),
            },
            Case {
                input: Dims2::from(4),
                kernel: Dims2::new(0, 3),
                geom: geom(1, 0, 1),
                expected: Err(ConfigError::ZeroSize("kernel size")),
            },
        ];

        cases.test_each(|case| {
            assert_eq!(
                case.geom.output_size(case.input, case.kernel),
                case.expected
            );
        })
    }

    #[test]
    fn test_geometry_rejects_zero_sizes() {
        assert_eq!(
            ConvGeometry::new(0, 0, 1),
            Err(ConfigError::ZeroSize("stride"))
        );
        assert_eq!(
            ConvGeometry::new(1, 0, (1, 0)),
            Err(ConfigError::ZeroSize("dilation"))
        );
    }

    #[test]
    fn test_conv_output_shape() {
        let geom = ConvGeometry::new(2, 3, 2).unwrap();
        assert_eq!(
            conv_output_shape(&[1, 4, 15, 15], &[6, 4, 3, 3], &geom),
            Ok([1, 6, 9, 9])
        );

        assert!(matches!(
            conv_output_shape(&[1, 3, 15, 15], &[6, 4, 3, 3], &geom),
            Err(LayerError::Shape(ShapeError::Mismatch { .. }))
        ));
        assert!(matches!(
            conv_output_shape(&[4, 15, 15], &[6, 4, 3, 3], &geom),
            Err(LayerError::Shape(ShapeError::InvalidRank { actual: 3, .. }))
        ));
    }

    #[test]
    fn test_conv() -> Result<(), Box<dyn Error>> {
        let kernel = Tensor::from_data(
            &[1, 1, 3, 3],
            vec![
                0.3230, 0.7632, 0.4616, 0.8837, 0.5898, 0.3424, 0.2101, 0.7821, 0.6861,
            ],
        )?;
        let input = Tensor::from_data(
            &[1, 1, 3, 3],
            vec![
                0.5946, 0.8249, 0.0448, 0.9552, 0.2041, 0.2501, 0.2693, 0.1007, 0.8862,
            ],
        )?;

        let same = ConvGeometry::new(1, 1, 1)?;
        let expected = Tensor::from_data(
            &[1, 1, 3, 3],
            vec![
                1.520236, 1.559221, 0.993872, 1.747543, 2.635781, 1.34276, 1.016534, 1.180553,
                0.86847,
            ],
        )?;
        let result = conv2d(&input, &kernel, None, &same)?;
        expect_equal_with_tolerance(&result, &expected, 1e-5, 0.)?;
        expect_equal(&result, &reference_conv(&input, &kernel, None, &same))?;

        let valid = ConvGeometry::default();
        let bias = Tensor::from([0.5]);
        let result = conv2d(&input, &kernel, Some(&bias), &valid)?;
        let expected = Tensor::from_data(&[1, 1, 1, 1], vec![3.135781])?;
        expect_equal_with_tolerance(&result, &expected, 1e-5, 0.)?;

        Ok(())
    }

    #[test]
    fn test_conv_matches_reference() -> Result<(), Box<dyn Error>> {
        #[derive(Debug)]
        struct Case {
            input_shape: [usize; 4],
            kernel_shape: [usize; 4],
            geom: ConvGeometry,
        }

        let geom = |s: (usize, usize), p: (usize, usize), d: (usize, usize)| {
            ConvGeometry::new(s, p, d).unwrap()
        };

        let cases = [
            Case {
                input_shape: [2, 3, 7, 7],
                kernel_shape: [4, 3, 3, 3],
                geom: geom((1, 1), (1, 1), (1, 1)),
            },
            Case {
                input_shape: [1, 2, 9, 8],
                kernel_shape: [3, 2, 3, 2],
                geom: geom((2, 3), (1, 0), (1, 2)),
            },
            Case {
                input_shape: [1, 4, 15, 15],
                kernel_shape: [2, 4, 3, 3],
                geom: geom((2, 2), (3, 3), (2, 2)),
            },
            Case {
                input_shape: [3, 1, 5, 5],
                kernel_shape: [2, 1, 1, 1],
                geom: geom((2, 2), (2, 2), (1, 1)),
            },
        ];

        cases.test_each(|case| {
            let mut rng = XorShiftRng::new(5678);
            let input = Tensor::rand(&case.input_shape, &mut rng);
            let kernel = Tensor::rand(&case.kernel_shape, &mut rng);
            let bias = Tensor::rand(&[case.kernel_shape[0]], &mut rng);

            let result = conv2d(&input, &kernel, Some(&bias), &case.geom).unwrap();
            let expected = reference_conv(&input, &kernel, Some(&bias), &case.geom);
            expect_equal(&result, &expected).unwrap();
        });

        Ok(())
    }

    #[test]
    fn test_correlate_invalid() {
        let input = Tensor::zeros(&[1, 2, 4, 4]);
        let out = Dims2::from(2);
        let one = Dims2::from(1);

        assert!(matches!(
            correlate(&input, &Tensor::zeros(&[1, 3, 3, 3]), None, one, one, out),
            Err(ShapeError::Mismatch { .. })
        ));
        assert!(matches!(
            correlate(&input, &Tensor::zeros(&[2, 3, 3]), None, one, one, out),
            Err(ShapeError::InvalidRank { .. })
        ));
        assert!(matches!(
            correlate(
                &input,
                &Tensor::zeros(&[1, 2, 3, 3]),
                Some(&Tensor::zeros(&[2])),
                one,
                one,
                out
            ),
            Err(ShapeError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_flip_kernel() -> Result<(), Box<dyn Error>> {
        let kernel = Tensor::from_data(&[2, 1, 2, 2], (0..8).map(|x| x as f32).collect())?;
        let flipped = flip_kernel(&kernel)?;
        assert_eq!(flipped.data(), &[3., 2., 1., 0., 7., 6., 5., 4.]);
        assert_eq!(flip_kernel(&flipped)?, kernel);
        Ok(())
    }

    #[test]
    fn test_dilate() -> Result<(), Box<dyn Error>> {
        let grad = Tensor::from_data(&[1, 1, 2, 2], vec![1., 2., 3., 4.])?;

        let dilated = dilate(&grad, Dims2::new(2, 3))?;
        assert_eq!(dilated.shape(), &[1, 1, 3, 4]);
        assert_eq!(
            dilated.data(),
            &[
                1., 0., 0., 2., //
                0., 0., 0., 0., //
                3., 0., 0., 4., //
            ]
        );

        assert_eq!(dilate(&grad, Dims2::from(1))?, grad);
        Ok(())
    }

    /// Loss used for gradient checks: a fixed weighted sum of the outputs,
    /// so that `dL/d(output)` is the weights.
    ///
    /// The loss is linear in every input and parameter, so the central
    /// difference is exact for any step and a large step keeps rounding
    /// error small.
    fn weighted_sum(output: &Tensor, weights: &Tensor) -> f32 {
        output.iter().zip(weights.iter()).map(|(x, w)| x * w).sum()
    }

    #[derive(Debug)]
    struct GradCase {
        input_shape: [usize; 4],
        kernel_shape: [usize; 4],
        geom: ConvGeometry,
    }

    fn grad_cases() -> Vec<GradCase> {
        let geom = |s: usize, p: usize, d: usize| ConvGeometry::new(s, p, d).unwrap();
        vec![
            GradCase {
                input_shape: [2, 2, 4, 4],
                kernel_shape: [3, 2, 3, 3],
                geom: geom(1, 1, 1),
            },
            // Stride and dilation > 1.
            GradCase {
                input_shape: [1, 2, 7, 6],
                kernel_shape: [2, 2, 3, 2],
                geom: geom(2, 1, 2),
            },
            // Padding larger than the kernel's reach.
            GradCase {
                input_shape: [1, 1, 4, 4],
                kernel_shape: [2, 1, 2, 2],
                geom: geom(1, 3, 1),
            },
            GradCase {
                input_shape: [1, 2, 6, 6],
                kernel_shape: [1, 2, 3, 3],
                geom: ConvGeometry::new((2, 1), (0, 3), (1, 2)).unwrap(),
            },
        ]
    }

    #[test]
    fn test_weight_and_bias_grad() {
        grad_cases().test_each(|case| {
            let mut rng = XorShiftRng::new(1234);
            let input = Tensor::rand(&case.input_shape, &mut rng);
            let mut weight = Tensor::rand(&case.kernel_shape, &mut rng);
            let mut bias = Tensor::rand(&[case.kernel_shape[0]], &mut rng);

            let output = conv2d(&input, &weight, Some(&bias), &case.geom).unwrap();
            let loss_weights = Tensor::rand(output.shape(), &mut rng);

            let padded = zero_pad(&input, case.geom.padding).unwrap();
            let kernel_size = Dims2::spatial(weight.shape());
            let weight_grad =
                conv2d_weight_grad(&padded, &loss_weights, kernel_size, &case.geom).unwrap();
            let bias_grad = conv2d_bias_grad(&loss_weights).unwrap();
            assert_eq!(weight_grad.shape(), weight.shape());
            assert_eq!(bias_grad.shape(), bias.shape());

            for i in 0..weight.len() {
                let orig = weight.data()[i];
                let numeric = central_difference(
                    |w| {
                        weight.data_mut()[i] = w;
                        let out = conv2d(&input, &weight, Some(&bias), &case.geom).unwrap();
                        weighted_sum(&out, &loss_weights)
                    },
                    orig,
                    0.5,
                );
                weight.data_mut()[i] = orig;
                assert_close(weight_grad.data()[i], numeric, 1e-3);
            }

            for i in 0..bias.len() {
                let orig = bias.data()[i];
                let numeric = central_difference(
                    |b| {
                        bias.data_mut()[i] = b;
                        let out = conv2d(&input, &weight, Some(&bias), &case.geom).unwrap();
                        weighted_sum(&out, &loss_weights)
                    },
                    orig,
                    0.5,
                );
                bias.data_mut()[i] = orig;
                assert_close(bias_grad.data()[i], numeric, 1e-3);
            }
        })
    }

    #[test]
    fn test_input_grad() {
        grad_cases().test_each(|case| {
            let mut rng = XorShiftRng::new(4321);
            let mut input = Tensor::rand(&case.input_shape, &mut rng);
            let weight = Tensor::rand(&case.kernel_shape, &mut rng);

            let output = conv2d(&input, &weight, None, &case.geom).unwrap();
            let loss_weights = Tensor::rand(output.shape(), &mut rng);

            let input_size = Dims2::spatial(input.shape());
            let input_grad =
                conv2d_input_grad(&loss_weights, &weight, input_size, &case.geom).unwrap();
            assert_eq!(input_grad.shape(), input.shape());

            for i in 0..input.len() {
                let orig = input.data()[i];
                let numeric = central_difference(
                    |x| {
                        input.data_mut()[i] = x;
                        let out = conv2d(&input, &weight, None, &case.geom).unwrap();
                        weighted_sum(&out, &loss_weights)
                    },
                    orig,
                    0.5,
                );
                input.data_mut()[i] = orig;
                assert_close(input_grad.data()[i], numeric, 1e-3);
            }
        })
    }

    #[test]
    fn test_input_grad_shape() -> Result<(), Box<dyn Error>> {
        // Rows and columns which no output reads from have zero gradient.
        let geom = ConvGeometry::new(2, 0, 1)?;
        let weight = Tensor::ones(&[1, 1, 2, 2]);
        let grad = Tensor::ones(&[1, 1, 2, 2]);
        let input_grad = conv2d_input_grad(&grad, &weight, Dims2::from(5), &geom)?;
        assert_eq!(input_grad.shape(), &[1, 1, 5, 5]);
        let last_row: Vec<f32> = (0..5).map(|x| input_grad[[0, 0, 4, x]]).collect();
        assert_eq!(last_row, [0.; 5]);
        assert_eq!(input_grad.sum(), 16.);
        Ok(())
    }
}
