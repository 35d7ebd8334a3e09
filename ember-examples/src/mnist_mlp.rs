//! Train a multi-layer perceptron to classify MNIST digits.
//!
//! ```text
//! RUST_LOG=info cargo run --release -p ember-examples --bin mnist_mlp -- data/mnist
//! ```

mod common;

use std::error::Error;

use ember::mnist::{Mnist, CLASSES, IMAGE_COLS, IMAGE_ROWS};
use ember::models::Mlp;
use ember::module::parameter_count;
use log::info;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args = common::parse_args("Train a multi-layer perceptron on MNIST.")?;
    let data = Mnist::load(&args.data_dir)?;

    let mut model = Mlp::new(
        IMAGE_ROWS * IMAGE_COLS,
        &[128, 64],
        CLASSES,
        true,
        None,
        args.seed,
    )?;
    info!("model has {} parameters", parameter_count(&mut model));

    common::train(&mut model, &data, &args, Ok)
}
