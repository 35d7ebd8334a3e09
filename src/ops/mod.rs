//! Tensor operations used by the layers: padding, 2D convolution and
//! activation functions.

mod activations;
mod conv;
mod pad;

pub use activations::{log_softmax, relu, relu_in_place, relu_mask, softmax, softmax_backward};
pub use conv::{
    conv2d, conv2d_bias_grad, conv2d_input_grad, conv2d_weight_grad, conv_output_shape,
    correlate, dilate, flip_kernel, ConvGeometry, Dims2,
};
pub use pad::{pad, zero_pad, PaddingMode};
