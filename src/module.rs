use std::fmt::Debug;

use ember_tensor::Tensor;

use crate::error::LayerError;

/// Mutable access to a trainable tensor and its gradient, as handed to an
/// optimizer.
#[derive(Debug)]
pub struct Parameter<'a> {
    /// Dot-separated path of the parameter, eg. `layer0.weight`.
    pub name: String,
    pub value: &'a mut Tensor,
    pub grad: &'a mut Tensor,
}

/// A trainable tensor together with its accumulated gradient.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub value: Tensor,
    pub grad: Tensor,
}

impl Param {
    /// Create a parameter with a zero gradient of the same shape as `value`.
    pub fn new(value: Tensor) -> Param {
        let grad = Tensor::zeros(value.shape());
        Param { value, grad }
    }

    /// Replace the value, resetting the gradient if the shape changed.
    pub fn set_value(&mut self, value: Tensor) {
        if value.shape() != self.value.shape() {
            self.grad = Tensor::zeros(value.shape());
        }
        self.value = value;
    }

    pub fn register<'a>(&'a mut self, prefix: &str, name: &str, params: &mut Vec<Parameter<'a>>) {
        params.push(Parameter {
            name: join_name(prefix, name),
            value: &mut self.value,
            grad: &mut self.grad,
        });
    }
}

/// Join a parameter path prefix and a name with a `.`.
pub fn join_name(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// A layer or composition of layers with a hand-derived backward pass.
///
/// `forward` caches whatever `backward` needs. `backward` receives the
/// gradient of the loss with respect to the output of the most recent
/// `forward` call, stores gradients for any parameters and returns the
/// gradient with respect to the input.
pub trait Module: Debug {
    /// Return a display name for the layer.
    fn name(&self) -> &str;

    fn forward(&mut self, input: &Tensor) -> Result<Tensor, LayerError>;

    /// Back-propagate `grad`.
    ///
    /// Returns [`LayerError::NoForwardPass`] if `forward` has not been
    /// called.
    fn backward(&mut self, grad: &Tensor) -> Result<Tensor, LayerError>;

    /// Append the trainable parameters of this layer to `params`, with names
    /// prefixed by `prefix`.
    fn register_parameters<'a>(&'a mut self, _prefix: &str, _params: &mut Vec<Parameter<'a>>) {}

    /// Apply one step of plain gradient descent, `p -= lr * grad`, to every
    /// parameter.
    fn update_params(&mut self, lr: f32) -> Result<(), LayerError> {
        let mut params = Vec::new();
        self.register_parameters("", &mut params);
        for param in params {
            param.value.zip_apply(param.grad, |x, g| x - lr * g)?;
        }
        Ok(())
    }

    /// Reset the gradients of all parameters to zero.
    fn zero_grad(&mut self) {
        let mut params = Vec::new();
        self.register_parameters("", &mut params);
        for param in params {
            param.grad.fill(0.);
        }
    }

    /// Switch between training and inference behavior. Only layers such as
    /// dropout behave differently.
    fn set_training(&mut self, _training: bool) {}

    fn is_training(&self) -> bool {
        true
    }

    fn train(&mut self) {
        self.set_training(true);
    }

    fn eval(&mut self) {
        self.set_training(false);
    }
}

/// Collect the parameters of `module` with their full names.
pub fn collect_parameters(module: &mut dyn Module) -> Vec<Parameter<'_>> {
    let mut params = Vec::new();
    module.register_parameters("", &mut params);
    params
}

/// Return the total number of trainable scalars in `module`.
pub fn parameter_count(module: &mut dyn Module) -> usize {
    collect_parameters(module)
        .iter()
        .map(|p| p.value.len())
        .sum()
}
