//! Optimizers which update a module's parameters from their gradients.
//!
//! Per-parameter state is keyed by the parameter's registered name, so one
//! optimizer must always be used with the same module.

use ember_tensor::{ShapeError, Tensor};
use log::trace;
use rustc_hash::FxHashMap;

use crate::error::LayerError;
use crate::module::{collect_parameters, Module, Parameter};

pub trait Optimizer {
    /// Update every parameter of `model` using its current gradient.
    fn step(&mut self, model: &mut dyn Module) -> Result<(), LayerError>;

    /// Reset the gradients of every parameter of `model` to zero.
    fn zero_grad(&mut self, model: &mut dyn Module) {
        model.zero_grad();
    }
}

fn check_grad(param: &Parameter) -> Result<(), ShapeError> {
    if param.value.shape() != param.grad.shape() {
        return Err(ShapeError::Mismatch {
            left: param.value.shape().to_vec(),
            right: param.grad.shape().to_vec(),
        });
    }
    Ok(())
}

/// Return the state tensor for `name`, creating a zero tensor shaped like
/// `value` if there is none or its shape is stale.
fn state_for<'a>(
    state: &'a mut FxHashMap<String, Tensor>,
    name: &str,
    value: &Tensor,
) -> &'a mut Tensor {
    let entry = state
        .entry(name.to_string())
        .or_insert_with(|| Tensor::zeros(value.shape()));
    if entry.shape() != value.shape() {
        *entry = Tensor::zeros(value.shape());
    }
    entry
}

#[derive(Clone, Debug, PartialEq)]
pub struct SgdOptions {
    pub lr: f32,

    /// Momentum factor `m`. With momentum the update direction is
    /// `v = m·v + (1 - m)·g`.
    pub momentum: f32,

    /// L2 penalty added to the gradient as `wd·p`.
    pub weight_decay: f32,
}

impl Default for SgdOptions {
    fn default() -> SgdOptions {
        SgdOptions {
            lr: 0.01,
            momentum: 0.,
            weight_decay: 0.,
        }
    }
}

/// Stochastic gradient descent with optional momentum and weight decay.
#[derive(Debug)]
pub struct Sgd {
    opts: SgdOptions,
    velocity: FxHashMap<String, Tensor>,
}

impl Sgd {
    pub fn new(opts: SgdOptions) -> Sgd {
        Sgd {
            opts,
            velocity: FxHashMap::default(),
        }
    }

    /// Create an optimizer with the given learning rate and no momentum or
    /// weight decay.
    pub fn with_lr(lr: f32) -> Sgd {
        Sgd::new(SgdOptions {
            lr,
            ..Default::default()
        })
    }

    pub fn options(&self) -> &SgdOptions {
        &self.opts
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, model: &mut dyn Module) -> Result<(), LayerError> {
        let SgdOptions {
            lr,
            momentum,
            weight_decay,
        } = self.opts;

        for param in collect_parameters(model) {
            check_grad(&param)?;
            let mut grad = param.grad.clone();
            if weight_decay > 0. {
                grad.zip_apply(param.value, |g, p| g + weight_decay * p)?;
            }

            let update = if momentum > 0. {
                let v = state_for(&mut self.velocity, &param.name, param.value);
                v.zip_apply(&grad, |v, g| momentum * v + (1. - momentum) * g)?;
                v.clone()
            } else {
                grad
            };

            param.value.zip_apply(&update, |p, u| p - lr * u)?;
            trace!("SGD step for {}", param.name);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AdamOptions {
    pub lr: f32,
    pub beta1: f32,
    pub beta2: f32,

    /// Added to `√v̂` to avoid division by zero.
    pub eps: f32,
    pub weight_decay: f32,
}

impl Default for AdamOptions {
    fn default() -> AdamOptions {
        AdamOptions {
            lr: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            weight_decay: 0.,
        }
    }
}

/// Adam optimizer with bias-corrected moment estimates.
#[derive(Debug)]
pub struct Adam {
    opts: AdamOptions,

    /// Number of steps taken.
    t: i32,
    m: FxHashMap<String, Tensor>,
    v: FxHashMap<String, Tensor>,
}

impl Adam {
    pub fn new(opts: AdamOptions) -> Adam {
        Adam {
            opts,
            t: 0,
            m: FxHashMap::default(),
            v: FxHashMap::default(),
        }
    }

    pub fn with_lr(lr: f32) -> Adam {
        Adam::new(AdamOptions {
            lr,
            ..Default::default()
        })
    }

    pub fn options(&self) -> &AdamOptions {
        &self.opts
    }

    /// Return the number of steps taken so far.
    pub fn steps(&self) -> i32 {
        self.t
    }
}

impl Optimizer for Adam {
    fn step(&mut self, model: &mut dyn Module) -> Result<(), LayerError> {
        let AdamOptions {
            lr,
            beta1,
            beta2,
            eps,
            weight_decay,
        } = self.opts;

        self.t += 1;
        let bc1 = 1. - beta1.powi(self.t);
        let bc2 = 1. - beta2.powi(self.t);

        for param in collect_parameters(model) {
            check_grad(&param)?;
            let mut grad = param.grad.clone();
            if weight_decay > 0. {
                grad.zip_apply(param.value, |g, p| g + weight_decay * p)?;
            }

            let m = state_for(&mut self.m, &param.name, param.value);
            m.zip_apply(&grad, |m, g| beta1 * m + (1. - beta1) * g)?;
            let m = m.clone();

            let v = state_for(&mut self.v, &param.name, param.value);
            v.zip_apply(&grad, |v, g| beta2 * v + (1. - beta2) * g * g)?;

            let update = m.zip_map(v, |m, v| (m / bc1) / ((v / bc2).sqrt() + eps))?;
            param.value.zip_apply(&update, |p, u| p - lr * u)?;
        }
        trace!("Adam step {}", self.t);
        Ok(())
    }
}
