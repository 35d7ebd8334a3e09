use ember_tensor::Tensor;
use log::debug;

use crate::error::LayerError;
use crate::module::{join_name, Module, Parameter};

/// Chain of layers applied one after another.
///
/// Parameters of the `i`th layer are registered under the prefix
/// `layer{i}`.
#[derive(Debug)]
pub struct Sequential {
    layers: Vec<Box<dyn Module>>,
    training: bool,
}

impl Sequential {
    pub fn new(layers: Vec<Box<dyn Module>>) -> Sequential {
        Sequential {
            layers,
            training: true,
        }
    }

    /// Append a layer.
    pub fn push(&mut self, layer: impl Module + 'static) -> &mut Sequential {
        self.layers.push(Box::new(layer));
        self
    }

    /// Builder form of [`push`](Sequential::push).
    pub fn with(mut self, layer: impl Module + 'static) -> Sequential {
        self.layers.push(Box::new(layer));
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&dyn Module> {
        self.layers.get(index).map(|layer| layer.as_ref())
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut (dyn Module + 'static)> {
        self.layers.get_mut(index).map(|layer| layer.as_mut())
    }
}

impl Default for Sequential {
    fn default() -> Sequential {
        Sequential::new(Vec::new())
    }
}

impl Module for Sequential {
    fn name(&self) -> &str {
        "Sequential"
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
        let mut x = input.clone();
        for layer in self.layers.iter_mut() {
            x = layer.forward(&x)?;
        }
        Ok(x)
    }

    fn backward(&mut self, grad: &Tensor) -> Result<Tensor, LayerError> {
        let mut grad = grad.clone();
        for (i, layer) in self.layers.iter_mut().enumerate().rev() {
            debug!("backward through layer {} ({})", i, layer.name());
            grad = layer.backward(&grad)?;
        }
        Ok(grad)
    }

    fn register_parameters<'a>(&'a mut self, prefix: &str, params: &mut Vec<Parameter<'a>>) {
        for (i, layer) in self.layers.iter_mut().enumerate() {
            let layer_prefix = join_name(prefix, &format!("layer{}", i));
            layer.register_parameters(&layer_prefix, params);
        }
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
        for layer in self.layers.iter_mut() {
            layer.set_training(training);
        }
    }

    fn is_training(&self) -> bool {
        self.training
    }
}
