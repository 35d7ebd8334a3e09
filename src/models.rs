//! Ready-made networks for MNIST-sized inputs.

use ember_tensor::Tensor;

use crate::error::{ConfigError, LayerError};
use crate::layers::{Conv2d, Conv2dOptions, Dropout, Flatten, Linear, ReLU, Sequential};
use crate::module::{Module, Parameter};
use crate::ops::Dims2;

/// Derive the seed for the `index`th randomly initialized layer of a model.
fn layer_seed(seed: Option<u64>, index: usize) -> Option<u64> {
    seed.map(|s| s.wrapping_add(index as u64))
}

/// Implement [`Module`] for a model by delegating to its `net` field.
macro_rules! impl_module_via_net {
    ($model:ident) => {
        impl Module for $model {
            fn name(&self) -> &str {
                stringify!($model)
            }

            fn forward(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
                self.net.forward(input)
            }

            fn backward(&mut self, grad: &Tensor) -> Result<Tensor, LayerError> {
                self.net.backward(grad)
            }

            fn register_parameters<'a>(
                &'a mut self,
                prefix: &str,
                params: &mut Vec<Parameter<'a>>,
            ) {
                self.net.register_parameters(prefix, params);
            }

            fn set_training(&mut self, training: bool) {
                self.net.set_training(training);
            }

            fn is_training(&self) -> bool {
                self.net.is_training()
            }
        }
    };
}

/// Multi-layer perceptron.
///
/// Each hidden layer is a `Linear` followed by `ReLU` and, if a dropout
/// probability is given, `Dropout`. The output layer is a `Linear` with no
/// activation.
#[derive(Debug)]
pub struct Mlp {
    net: Sequential,
}

impl Mlp {
    pub fn new(
        in_features: usize,
        hidden: &[usize],
        out_features: usize,
        bias: bool,
        dropout: Option<f32>,
        seed: Option<u64>,
    ) -> Result<Mlp, ConfigError> {
        let mut net = Sequential::default();
        let mut features = in_features;
        let mut seed_index = 0;
        let mut next_seed = || {
            seed_index += 1;
            layer_seed(seed, seed_index)
        };

        for &width in hidden {
            net.push(Linear::new(features, width, bias, next_seed()));
            net.push(ReLU::new());
            if let Some(p) = dropout {
                net.push(Dropout::new(p, next_seed())?);
            }
            features = width;
        }
        net.push(Linear::new(features, out_features, bias, next_seed()));

        Ok(Mlp { net })
    }

    /// Return the underlying layer stack.
    pub fn layers(&self) -> &Sequential {
        &self.net
    }
}

impl_module_via_net!(Mlp);

/// Small convolutional classifier for `(B, 1, 28, 28)` images.
///
/// `Conv2d(1 → 4, k=3, s=2, p=1) → ReLU → Flatten → Linear(4·14·14 → 10)`.
#[derive(Debug)]
pub struct SimpleCnn {
    net: Sequential,
}

impl SimpleCnn {
    pub const CHANNELS: usize = 4;
    pub const CLASSES: usize = 10;

    pub fn new(seed: Option<u64>) -> Result<SimpleCnn, ConfigError> {
        let conv = Conv2d::new(
            1,
            Self::CHANNELS,
            3,
            Conv2dOptions {
                stride: Dims2::from(2),
                padding: Dims2::from(1),
                seed: layer_seed(seed, 1),
                ..Default::default()
            },
        )?;

        // 28x28 inputs give 14x14 feature maps.
        let features = Self::CHANNELS * 14 * 14;
        let net = Sequential::default()
            .with(conv)
            .with(ReLU::new())
            .with(Flatten::new())
            .with(Linear::new(
                features,
                Self::CLASSES,
                true,
                layer_seed(seed, 2),
            ));

        Ok(SimpleCnn { net })
    }

    pub fn layers(&self) -> &Sequential {
        &self.net
    }
}

impl_module_via_net!(SimpleCnn);

#[cfg(test)]
mod tests {
    use std::error::Error;

    use ember_tensor::Tensor;
    use ember_testing::TestCases;

    use super::{Mlp, SimpleCnn};
    use crate::error::ConfigError;
    use crate::module::{collect_parameters, parameter_count, Module};

    #[test]
    fn test_mlp_structure() {
        #[derive(Debug)]
        struct Case {
            hidden: Vec<usize>,
            bias: bool,
            dropout: Option<f32>,
            layer_names: Vec<&'static str>,
            param_count: usize,
        }

        let cases = [
            Case {
                hidden: vec![],
                bias: true,
                dropout: None,
                layer_names: vec!["Linear"],
                param_count: 3 * 2 + 2,
            },
            Case {
                hidden: vec![8, 4],
                bias: true,
                dropout: None,
                layer_names: vec!["Linear", "ReLU", "Linear", "ReLU", "Linear"],
                param_count: (3 * 8 + 8) + (8 * 4 + 4) + (4 * 2 + 2),
            },
            Case {
                hidden: vec![5],
                bias: false,
                dropout: Some(0.25),
                layer_names: vec!["Linear", "ReLU", "Dropout", "Linear"],
                param_count: 3 * 5 + 5 * 2,
            },
        ];

        cases.test_each(|case| {
            let mut mlp = Mlp::new(3, &case.hidden, 2, case.bias, case.dropout, Some(1)).unwrap();
            let layers = mlp.layers();
            let names: Vec<_> = (0..layers.len())
                .map(|i| layers.get(i).unwrap().name())
                .collect();
            assert_eq!(names, case.layer_names);
            assert_eq!(parameter_count(&mut mlp), case.param_count);
        })
    }

    #[test]
    fn test_mlp_forward_backward() -> Result<(), Box<dyn Error>> {
        let mut mlp = Mlp::new(3, &[6], 2, true, None, Some(4))?;
        let input = Tensor::from([[0.5, -1., 2.], [1., 1., 1.], [0., 0., 0.], [3., 2., 1.]]);
        let output = mlp.forward(&input)?;
        assert_eq!(output.shape(), &[4, 2]);

        let grad = mlp.backward(&Tensor::ones(&[4, 2]))?;
        assert_eq!(grad.shape(), &[4, 3]);

        let names: Vec<_> = collect_parameters(&mut mlp)
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(
            names,
            ["layer0.weight", "layer0.bias", "layer2.weight", "layer2.bias"]
        );
        Ok(())
    }

    #[test]
    fn test_mlp_seeded_init_is_deterministic() -> Result<(), Box<dyn Error>> {
        let input = Tensor::from([[0.5, -1., 2.]]);
        let a = Mlp::new(3, &[4], 2, true, None, Some(9))?.forward(&input)?;
        let b = Mlp::new(3, &[4], 2, true, None, Some(9))?.forward(&input)?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn test_mlp_invalid_dropout() {
        let result = Mlp::new(3, &[4], 2, true, Some(1.5), None);
        assert_eq!(result.err(), Some(ConfigError::InvalidProbability(1.5)));
    }

    #[test]
    fn test_mlp_eval_propagates() -> Result<(), Box<dyn Error>> {
        let mut mlp = Mlp::new(3, &[4], 2, true, Some(0.5), Some(2))?;
        mlp.eval();
        assert!(!mlp.is_training());
        assert!(!mlp.layers().get(2).unwrap().is_training());

        // Without dropout the output is deterministic.
        let input = Tensor::from([[0.5, -1., 2.]]);
        let a = mlp.forward(&input)?;
        let b = mlp.forward(&input)?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn test_simple_cnn() -> Result<(), Box<dyn Error>> {
        let mut cnn = SimpleCnn::new(Some(5))?;
        assert_eq!(cnn.name(), "SimpleCnn");
        assert_eq!(parameter_count(&mut cnn), (4 * 9 + 4) + (784 * 10 + 10));

        let input = Tensor::full(&[2, 1, 28, 28], 0.5);
        let output = cnn.forward(&input)?;
        assert_eq!(output.shape(), &[2, 10]);

        let grad = cnn.backward(&Tensor::ones(&[2, 10]))?;
        assert_eq!(grad.shape(), &[2, 1, 28, 28]);

        // Inputs of the wrong size are rejected by the final linear layer.
        assert!(cnn.forward(&Tensor::zeros(&[1, 1, 20, 20])).is_err());
        Ok(())
    }
}
