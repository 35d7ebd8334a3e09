use ember_tensor::Tensor;
use log::debug;

use crate::error::LayerError;
use crate::module::Module;
use crate::ops::{relu, relu_mask, softmax, softmax_backward};

/// Rectified linear unit, `max(x, 0)`.
#[derive(Debug, Default)]
pub struct ReLU {
    /// 1 where the last input was positive, 0 elsewhere.
    mask: Option<Tensor>,
}

impl ReLU {
    pub fn new() -> ReLU {
        ReLU::default()
    }
}

impl Module for ReLU {
    fn name(&self) -> &str {
        "ReLU"
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
        self.mask = Some(relu_mask(input));
        Ok(relu(input))
    }

    fn backward(&mut self, grad: &Tensor) -> Result<Tensor, LayerError> {
        let mask = self.mask.as_ref().ok_or(LayerError::NoForwardPass("ReLU"))?;
        Ok(grad.mul(mask)?)
    }
}

/// Softmax over the last axis of a `(batch, classes)` input. A vector is
/// treated as a single row.
#[derive(Debug, Default)]
pub struct Softmax {
    output: Option<Tensor>,
}

impl Softmax {
    pub fn new() -> Softmax {
        Softmax::default()
    }
}

impl Module for Softmax {
    fn name(&self) -> &str {
        "Softmax"
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
        let output = softmax(input)?;
        debug!("Softmax forward {:?}", output.shape());
        self.output = Some(output.clone());
        Ok(output)
    }

    fn backward(&mut self, grad: &Tensor) -> Result<Tensor, LayerError> {
        let output = self
            .output
            .as_ref()
            .ok_or(LayerError::NoForwardPass("Softmax"))?;
        Ok(softmax_backward(output, grad)?)
    }
}
