//! Layers with hand-derived backward passes.

mod activations;
mod conv2d;
mod dropout;
mod flatten;
mod linear;
mod sequential;

pub use activations::{ReLU, Softmax};
pub use conv2d::{Conv2d, Conv2dOptions};
pub use dropout::Dropout;
pub use flatten::Flatten;
pub use linear::Linear;
pub use sequential::Sequential;
