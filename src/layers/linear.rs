use ember_tensor::{ShapeError, Tensor};
use log::debug;

use crate::error::LayerError;
use crate::init::{make_rng, xavier_uniform};
use crate::module::{Module, Param, Parameter};

/// Fully connected layer computing `X·W + b`.
///
/// The weight has shape `(in_features, out_features)` and the input
/// `(batch, in_features)`.
#[derive(Debug)]
pub struct Linear {
    weight: Param,
    bias: Option<Param>,
    cache: Option<ForwardCache>,
}

#[derive(Debug)]
struct ForwardCache {
    input: Tensor,
    output_shape: Vec<usize>,
}

impl Linear {
    /// Create a layer with Xavier-uniform weights and a zero bias.
    pub fn new(in_features: usize, out_features: usize, bias: bool, seed: Option<u64>) -> Linear {
        let mut rng = make_rng(seed);
        Linear {
            weight: Param::new(xavier_uniform(in_features, out_features, &mut rng)),
            bias: bias.then(|| Param::new(Tensor::zeros(&[out_features]))),
            cache: None,
        }
    }

    pub fn in_features(&self) -> usize {
        self.weight.value.size(0)
    }

    pub fn out_features(&self) -> usize {
        self.weight.value.size(1)
    }

    pub fn weight(&self) -> &Param {
        &self.weight
    }

    pub fn bias(&self) -> Option<&Param> {
        self.bias.as_ref()
    }

    /// Replace the weight. It must keep the `(in_features, out_features)`
    /// shape.
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

    /// Replace the bias. Does nothing if the layer has no bias.
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

/// Add `row` to every row of the matrix `x`.
fn add_to_rows(x: &mut Tensor, row: &Tensor) {
    let cols = row.len().max(1);
    for x_row in x.data_mut().chunks_mut(cols) {
        for (x, b) in x_row.iter_mut().zip(row.iter()) {
            *x += b;
        }
    }
}

impl Module for Linear {
    fn name(&self) -> &str {
        "Linear"
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
        let mut output = input.matmul(&self.weight.value)?;
        if let Some(bias) = &self.bias {
            add_to_rows(&mut output, &bias.value);
        }
        debug!(
            "Linear forward {:?} -> {:?}",
            input.shape(),
            output.shape()
        );
        self.cache = Some(ForwardCache {
            input: input.clone(),
            output_shape: output.shape().to_vec(),
        });
        Ok(output)
    }

    fn backward(&mut self, grad: &Tensor) -> Result<Tensor, LayerError> {
        let cache = self
            .cache
            .as_ref()
            .ok_or(LayerError::NoForwardPass("Linear"))?;
        if grad.shape() != cache.output_shape {
            return Err(ShapeError::Mismatch {
                left: grad.shape().to_vec(),
                right: cache.output_shape.clone(),
            }
            .into());
        }

        // dW = Xᵀ·G, db = column sums of G, dX = G·Wᵀ
        let weight_grad = cache.input.transpose()?.matmul(grad)?;
        let bias_grad = match self.bias {
            Some(_) => Some(grad.sum_rows()?),
            None => None,
        };
        let input_grad = grad.matmul(&self.weight.value.transpose()?)?;

        self.weight.grad = weight_grad;
        if let (Some(bias), Some(bias_grad)) = (self.bias.as_mut(), bias_grad) {
            bias.grad = bias_grad;
        }

        debug!(
            "Linear backward {:?} -> {:?}",
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
