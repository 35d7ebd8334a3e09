use ember_tensor::{ShapeError, Tensor};
use log::debug;

use crate::error::{ConfigError, LayerError};
use crate::init::{make_rng, uniform};
use crate::module::{Module, Param, Parameter};
use crate::ops::{
    conv2d_bias_grad, conv2d_input_grad, conv2d_weight_grad, conv_output_shape, correlate,
    zero_pad, ConvGeometry, Dims2, PaddingMode,
};

/// Hyper-parameters of a [`Conv2d`] layer other than the channel counts and
/// kernel size.
#[derive(Clone, Debug, PartialEq)]
pub struct Conv2dOptions {
    pub stride: Dims2,
    pub padding: Dims2,
    pub dilation: Dims2,

    /// Whether the layer adds a per-channel bias.
    pub bias: bool,

    pub padding_mode: PaddingMode,

    /// Seed for weight initialization. `None` seeds from the system.
    pub seed: Option<u64>,
}

impl Default for Conv2dOptions {
    fn default() -> Conv2dOptions {
        Conv2dOptions {
            stride: Dims2::from(1),
            padding: Dims2::from(0),
            dilation: Dims2::from(1),
            bias: true,
            padding_mode: PaddingMode::Zeros,
            seed: None,
        }
    }
}

/// Values cached by the forward pass for use in backward.
#[derive(Debug)]
struct ForwardCache {
    /// Input after zero-padding.
    padded_input: Tensor,

    /// Spatial size of the input before padding.
    input_size: Dims2,

    output_shape: [usize; 4],
}

/// 2D convolution (cross-correlation) over `(N, C_in, H, W)` inputs.
///
/// The weight has shape `(C_out, C_in, K_h, K_w)` and the bias `(C_out)`.
#[derive(Debug)]
pub struct Conv2d {
    in_channels: usize,
    out_channels: usize,
    kernel_size: Dims2,
    geom: ConvGeometry,
    weight: Param,
    bias: Option<Param>,
    cache: Option<ForwardCache>,
}

impl Conv2d {
    /// Create a layer with weights drawn from `U(-1/√fan_in, 1/√fan_in)`,
    /// where `fan_in = C_in * K_h * K_w`.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: impl Into<Dims2>,
        opts: Conv2dOptions,
    ) -> Result<Conv2d, ConfigError> {
        let kernel_size = kernel_size.into();
        if in_channels == 0 {
            return Err(ConfigError::ZeroSize("in_channels"));
        }
        if out_channels == 0 {
            return Err(ConfigError::ZeroSize("out_channels"));
        }
        if kernel_size.h == 0 || kernel_size.w == 0 {
            return Err(ConfigError::ZeroSize("kernel size"));
        }
        opts.padding_mode.check_supported()?;
        let geom = ConvGeometry::new(opts.stride, opts.padding, opts.dilation)?;

        let fan_in = in_channels * kernel_size.h * kernel_size.w;
        let limit = 1. / (fan_in as f32).sqrt();
        let mut rng = make_rng(opts.seed);
        let weight = uniform(
            &[out_channels, in_channels, kernel_size.h, kernel_size.w],
            limit,
            &mut rng,
        );
        let bias = opts
            .bias
            .then(|| Param::new(uniform(&[out_channels], limit, &mut rng)));

        Ok(Conv2d {
            in_channels,
            out_channels,
            kernel_size,
            geom,
            weight: Param::new(weight),
            bias,
            cache: None,
        })
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn kernel_size(&self) -> Dims2 {
        self.kernel_size
    }

    pub fn geometry(&self) -> &ConvGeometry {
        &self.geom
    }

    pub fn weight(&self) -> &Param {
        &self.weight
    }

    pub fn bias(&self) -> Option<&Param> {
        self.bias.as_ref()
    }

    /// Return the output shape for an input of the given shape.
    pub fn output_shape(&self, input_shape: &[usize]) -> Result<[usize; 4], LayerError> {
        conv_output_shape(input_shape, self.weight.value.shape(), &self.geom)
    }

    pub fn set_weight(&mut self, weight: Tensor) -> Result<(), ShapeError> {
        if weight.shape() != self.weight.value.shape() {
            return Err(ShapeError::Mismatch {
                left: weight.shape().to_vec(),
                right: self.weight.value.shape().to_vec(),
            });
        }
        self.weight.set_value(weight);
        Ok(())
    }

    pub fn set_bias(&mut self, bias: Tensor) -> Result<(), ShapeError> {
        let Some(param) = self.bias.as_mut() else {
            return Ok(());
        };
        if bias.shape() != param.value.shape() {
            return Err(ShapeError::Mismatch {
                left: bias.shape().to_vec(),
                right: param.value.shape().to_vec(),
            });
        }
        param.set_value(bias);
        Ok(())
    }
}

impl Module for Conv2d {
    fn name(&self) -> &str {
        "Conv2d"
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
        let output_shape = self.output_shape(input.shape())?;
        let [_, _, out_h, out_w] = output_shape;
        let padded_input = zero_pad(input, self.geom.padding)?;
        let output = correlate(
            &padded_input,
            &self.weight.value,
            self.bias.as_ref().map(|b| &b.value),
            self.geom.stride,
            self.geom.dilation,
            Dims2::new(out_h, out_w),
        )?;
        debug!(
            "Conv2d forward {:?} -> {:?}",
            input.shape(),
            output.shape()
        );

        self.cache = Some(ForwardCache {
            padded_input,
            input_size: Dims2::spatial(input.shape()),
            output_shape,
        });
        Ok(output)
    }

    fn backward(&mut self, grad: &Tensor) -> Result<Tensor, LayerError> {
        let cache = self
            .cache
            .as_ref()
            .ok_or(LayerError::NoForwardPass("Conv2d"))?;

        if grad.shape() != cache.output_shape {
            return Err(ShapeError::Mismatch {
                left: grad.shape().to_vec(),
                right: cache.output_shape.to_vec(),
            }
            .into());
        }

        // Compute every gradient before storing any, so a failure leaves the
        // parameters untouched.
        let weight_grad =
            conv2d_weight_grad(&cache.padded_input, grad, self.kernel_size, &self.geom)?;
        let bias_grad = match self.bias {
            Some(_) => Some(conv2d_bias_grad(grad)?),
            None => None,
        };
        let input_grad = conv2d_input_grad(grad, &self.weight.value, cache.input_size, &self.geom)?;

        self.weight.grad = weight_grad;
        if let (Some(bias), Some(bias_grad)) = (self.bias.as_mut(), bias_grad) {
            bias.grad = bias_grad;
        }

        debug!(
            "Conv2d backward {:?} -> {:?}",
            grad.shape(),
            input_grad.shape()
        );
        Ok(input_grad)
    }

    fn register_parameters<'a>(&'a mut self, prefix: &str, params: &mut Vec<Parameter<'a>>) {
        self.weight.register(prefix, "weight", params);
        if let Some(bias) = self.bias.as_mut() {
            bias.register(prefix, "bias", params);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use ember_tensor::rng::XorShiftRng;
    use ember_tensor::{ShapeError, Tensor};
    use ember_testing::{assert_close, central_difference, TestCases};

    use super::{Conv2d, Conv2dOptions};
    use crate::error::{ConfigError, LayerError};
    use crate::module::Module;
    use crate::ops::{Dims2, PaddingMode};

    #[test]
    fn test_conv2d_rejects_invalid_config() {
        #[derive(Debug)]
        struct Case {
            kernel: Dims2,
            opts: Conv2dOptions,
            expected: ConfigError,
        }

        let cases = [
            Case {
                kernel: Dims2::from(0),
                opts: Conv2dOptions::default(),
                expected: ConfigError::ZeroSize("kernel size"),
            },
            Case {
                kernel: Dims2::from(3),
                opts: Conv2dOptions {
                    stride: Dims2::new(1, 0),
                    ..Default::default()
                },
                expected: ConfigError::ZeroSize("stride"),
            },
            Case {
                kernel: Dims2::from(3),
                opts: Conv2dOptions {
                    dilation: Dims2::from(0),
                    ..Default::default()
                },
                expected: ConfigError::ZeroSize("dilation"),
            },
            Case {
                kernel: Dims2::from(3),
                opts: Conv2dOptions {
                    padding_mode: PaddingMode::Reflect,
                    ..Default::default()
                },
                expected: ConfigError::UnsupportedPaddingMode(PaddingMode::Reflect),
            },
        ];

        cases.test_each(|case| {
            let result = Conv2d::new(2, 3, case.kernel, case.opts.clone());
            assert_eq!(result.err(), Some(case.expected.clone()));
        })
    }

    #[test]
    fn test_conv2d_output_shape() -> Result<(), Box<dyn Error>> {
        let mut layer = Conv2d::new(
            4,
            6,
            3,
            Conv2dOptions {
                stride: Dims2::from(2),
                padding: Dims2::from(3),
                dilation: Dims2::from(2),
                seed: Some(1),
                ..Default::default()
            },
        )?;
        let input = Tensor::zeros(&[1, 4, 15, 15]);
        let output = layer.forward(&input)?;
        assert_eq!(output.shape(), &[1, 6, 9, 9]);

        // Input too small for the kernel.
        let mut layer = Conv2d::new(1, 1, 5, Conv2dOptions::default())?;
        assert!(matches!(
            layer.forward(&Tensor::zeros(&[1, 1, 3, 3])),
            Err(LayerError::Config(ConfigError::NonPositiveOutput { .. }))
        ));
        Ok(())
    }

    #[test]
    fn test_conv2d_init() -> Result<(), Box<dyn Error>> {
        let opts = Conv2dOptions {
            seed: Some(9),
            ..Default::default()
        };
        let a = Conv2d::new(2, 3, (3, 2), opts.clone())?;
        let b = Conv2d::new(2, 3, (3, 2), opts)?;
        assert_eq!(a.weight().value, b.weight().value);
        assert_eq!(a.weight().value.shape(), &[3, 2, 3, 2]);
        assert_eq!(a.bias().unwrap().value.shape(), &[3]);

        let limit = 1. / (12f32).sqrt();
        assert!(a.weight().value.iter().all(|w| w.abs() <= limit));

        let no_bias = Conv2d::new(
            2,
            3,
            3,
            Conv2dOptions {
                bias: false,
                ..Default::default()
            },
        )?;
        assert!(no_bias.bias().is_none());
        Ok(())
    }

    /// Numerically check one weight gradient and the input gradient shape
    /// for strided and dilated configurations.
    #[test]
    fn test_conv2d_backward() -> Result<(), Box<dyn Error>> {
        #[derive(Clone, Debug)]
        struct Case {
            input_shape: [usize; 4],
            kernel: usize,
            stride: usize,
            padding: usize,
            dilation: usize,
        }

        let cases = [
            Case {
                input_shape: [2, 3, 6, 6],
                kernel: 3,
                stride: 1,
                padding: 1,
                dilation: 1,
            },
            Case {
                input_shape: [1, 2, 9, 9],
                kernel: 3,
                stride: 2,
                padding: 1,
                dilation: 1,
            },
            Case {
                input_shape: [1, 2, 9, 8],
                kernel: 2,
                stride: 3,
                padding: 2,
                dilation: 2,
            },
        ];

        cases.test_each_clone(|case| {
            let opts = Conv2dOptions {
                stride: Dims2::from(case.stride),
                padding: Dims2::from(case.padding),
                dilation: Dims2::from(case.dilation),
                seed: Some(17),
                ..Default::default()
            };
            let mut layer = Conv2d::new(case.input_shape[1], 2, case.kernel, opts.clone()).unwrap();

            let mut rng = XorShiftRng::new(99);
            let input = Tensor::rand(&case.input_shape, &mut rng);
            let output = layer.forward(&input).unwrap();
            let upstream = Tensor::rand(output.shape(), &mut rng);

            let input_grad = layer.backward(&upstream).unwrap();
            assert_eq!(input_grad.shape(), input.shape());

            let weight = layer.weight().value.clone();
            let bias = layer.bias().unwrap().value.clone();
            let index = weight.len() / 2;
            let numeric = central_difference(
                |w| {
                    let mut perturbed = Conv2d::new(case.input_shape[1], 2, case.kernel, opts.clone())
                        .unwrap();
                    let mut w_mod = weight.clone();
                    w_mod.data_mut()[index] = w;
                    perturbed.set_weight(w_mod).unwrap();
                    perturbed.set_bias(bias.clone()).unwrap();
                    let out = perturbed.forward(&input).unwrap();
                    out.iter().zip(upstream.iter()).map(|(o, g)| o * g).sum()
                },
                weight.data()[index],
                0.5,
            );
            assert_close(layer.weight().grad.data()[index], numeric, 1e-3);

            let bias_grad = layer.bias().unwrap().grad.clone();
            for o in 0..2 {
                let view = upstream.slice_along(1, o).unwrap();
                assert_close(bias_grad[[o]], view.iter().sum(), 1e-4);
            }
        });

        Ok(())
    }

    #[test]
    fn test_conv2d_backward_rejects_wrong_grad_shape() -> Result<(), Box<dyn Error>> {
        let opts = Conv2dOptions {
            seed: Some(5),
            ..Default::default()
        };
        let mut layer = Conv2d::new(1, 2, 3, opts)?;
        let output = layer.forward(&Tensor::ones(&[1, 1, 5, 5]))?;
        assert_eq!(output.shape(), &[1, 2, 3, 3]);

        let zero_weight_grad = layer.weight().grad.clone();
        let zero_bias_grad = layer.bias().unwrap().grad.clone();

        for shape in [[1, 3, 3, 3], [1, 2, 1, 1], [2, 2, 3, 3]] {
            assert_eq!(
                layer.backward(&Tensor::ones(&shape)),
                Err(LayerError::Shape(ShapeError::Mismatch {
                    left: shape.to_vec(),
                    right: vec![1, 2, 3, 3],
                }))
            );
            assert_eq!(layer.weight().grad, zero_weight_grad);
            assert_eq!(layer.bias().unwrap().grad, zero_bias_grad);
        }

        // The layer is still usable after the rejected calls.
        layer.backward(&Tensor::ones(&[1, 2, 3, 3]))?;
        layer.update_params(0.1)?;
        Ok(())
    }

    #[test]
    fn test_conv2d_backward_before_forward() -> Result<(), Box<dyn Error>> {
        let mut layer = Conv2d::new(1, 1, 3, Conv2dOptions::default())?;
        assert_eq!(
            layer.backward(&Tensor::zeros(&[1, 1, 2, 2])),
            Err(LayerError::NoForwardPass("Conv2d"))
        );
        Ok(())
    }
}
