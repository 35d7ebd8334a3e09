use ember_tensor::Tensor;
use log::debug;

use crate::error::LayerError;
use crate::module::Module;

/// Merge the axes `start_dim..=end_dim` of the input into one.
///
/// Negative axes count back from the last axis.
#[derive(Debug)]
pub struct Flatten {
    start_dim: isize,
    end_dim: isize,
    input_shape: Option<Vec<usize>>,
}

impl Flatten {
    /// Flatten everything except the batch axis.
    pub fn new() -> Flatten {
        Flatten::with_dims(1, -1)
    }

    pub fn with_dims(start_dim: isize, end_dim: isize) -> Flatten {
        Flatten {
            start_dim,
            end_dim,
            input_shape: None,
        }
    }
}

impl Default for Flatten {
    fn default() -> Flatten {
        Flatten::new()
    }
}

impl Module for Flatten {
    fn name(&self) -> &str {
        "Flatten"
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
        let mut output = input.clone();
        output.flatten_axes(self.start_dim, self.end_dim)?;
        debug!(
            "Flatten forward {:?} -> {:?}",
            input.shape(),
            output.shape()
        );
        self.input_shape = Some(input.shape().to_vec());
        Ok(output)
    }

    fn backward(&mut self, grad: &Tensor) -> Result<Tensor, LayerError> {
        let shape = self
            .input_shape
            .as_ref()
            .ok_or(LayerError::NoForwardPass("Flatten"))?;
        Ok(grad.reshaped(shape)?)
    }
}
