//! ember is a small neural network library with hand-derived backward passes.
//!
//! # Layers and models
//!
//! Every layer implements [`Module`], which has a `forward` method that
//! caches what it needs and a `backward` method that receives the gradient
//! of the loss with respect to the layer's output, stores gradients for the
//! layer's parameters and returns the gradient with respect to its input.
//! Layers are composed with [`layers::Sequential`], and [`models`] contains
//! ready-made networks built that way.
//!
//! # Training
//!
//! A training step runs the model forward, computes a [`loss::Loss`], runs
//! the model backward from the loss gradient and then updates the parameters
//! using an [`optim::Optimizer`]:
//!
//! ```
//! use ember::layers::{Linear, ReLU, Sequential};
//! use ember::loss::{CrossEntropyLoss, Loss};
//! use ember::optim::{Optimizer, Sgd};
//! use ember::{Module, Tensor};
//!
//! let mut model = Sequential::default()
//!     .with(Linear::new(2, 4, true, Some(1)))
//!     .with(ReLU::new())
//!     .with(Linear::new(4, 2, true, Some(2)));
//! let mut loss_fn = CrossEntropyLoss::new();
//! let mut optimizer = Sgd::with_lr(0.1);
//!
//! let x = Tensor::from([[0., 1.], [1., 0.]]);
//! let y = Tensor::from([1., 0.]);
//!
//! optimizer.zero_grad(&mut model);
//! let logits = model.forward(&x).unwrap();
//! let loss = loss_fn.forward(&logits, &y).unwrap();
//! model.backward(&loss_fn.backward().unwrap()).unwrap();
//! optimizer.step(&mut model).unwrap();
//! assert!(loss > 0.);
//! ```
//!
//! # Convolution
//!
//! The [`ops`] module contains the 2D convolution engine used by
//! [`layers::Conv2d`]. Convolution inputs are `(N, C, H, W)` and weights
//! `(C_out, C_in, K_h, K_w)`, with stride, padding and dilation described by
//! [`ops::ConvGeometry`]. The gradients with respect to the input and weight
//! are computed as further convolutions over dilated and padded tensors.
//!
//! # Logging
//!
//! ember logs through the [log](https://docs.rs/log) facade. Install a logger
//! such as `env_logger` in the application to see shape traces and dataset
//! loading messages.

pub mod error;
pub mod init;
pub mod layers;
pub mod loss;
pub mod metrics;
pub mod mnist;
pub mod models;
pub mod module;
pub mod ops;
pub mod optim;

pub use ember_tensor::Tensor;
pub use error::{ConfigError, LayerError};
pub use module::{Module, Param, Parameter};
