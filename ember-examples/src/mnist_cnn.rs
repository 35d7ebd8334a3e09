//! Train a small convolutional network to classify MNIST digits.
//!
//! ```text
//! RUST_LOG=info cargo run --release -p ember-examples --bin mnist_cnn -- data/mnist
//! ```

mod common;

use std::error::Error;

use ember::mnist::{Mnist, IMAGE_COLS, IMAGE_ROWS};
use ember::models::SimpleCnn;
use ember::module::parameter_count;
use ember_tensor::{ShapeError, Tensor};
use log::info;

/// Reshape flattened images into single-channel `(B, 1, H, W)` images.
fn to_nchw(images: Tensor) -> Result<Tensor, ShapeError> {
    let batch = images.size(0);
    images.into_shape(&[batch, 1, IMAGE_ROWS, IMAGE_COLS])
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args = common::parse_args("Train a convolutional network on MNIST.")?;
    let data = Mnist::load(&args.data_dir)?;

    let mut model = SimpleCnn::new(args.seed)?;
    info!("model has {} parameters", parameter_count(&mut model));

    common::train(&mut model, &data, &args, to_nchw)
}
