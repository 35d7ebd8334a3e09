//! Argument parsing and the training loop shared by the MNIST examples.

use std::error::Error;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use ember::loss::{CrossEntropyLoss, Loss};
use ember::metrics::accuracy;
use ember::mnist::{Batches, Mnist};
use ember::optim::{Adam, AdamOptions, Optimizer, Sgd, SgdOptions};
use ember::Module;
use ember_tensor::{ShapeError, Tensor};
use log::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OptimizerKind {
    Sgd,
    Adam,
}

impl OptimizerKind {
    fn default_lr(self) -> f32 {
        match self {
            OptimizerKind::Sgd => 0.05,
            OptimizerKind::Adam => 0.001,
        }
    }
}

#[derive(Debug)]
pub struct UnknownOptimizer(String);

impl fmt::Display for UnknownOptimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown optimizer \"{}\" (expected sgd or adam)", self.0)
    }
}

impl Error for UnknownOptimizer {}

impl FromStr for OptimizerKind {
    type Err = UnknownOptimizer;

    fn from_str(s: &str) -> Result<OptimizerKind, UnknownOptimizer> {
        match s {
            "sgd" => Ok(OptimizerKind::Sgd),
            "adam" => Ok(OptimizerKind::Adam),
            _ => Err(UnknownOptimizer(s.to_string())),
        }
    }
}

pub struct Args {
    /// Directory containing the uncompressed MNIST files.
    pub data_dir: String,

    pub epochs: usize,
    pub batch_size: usize,
    pub lr: f32,
    pub optimizer: OptimizerKind,

    /// Seed for weight initialization. If not set the weights differ on
    /// each run.
    pub seed: Option<u64>,
}

/// Parse command line arguments. `about` is the first line of the help text.
pub fn parse_args(about: &str) -> Result<Args, lexopt::Error> {
    use lexopt::prelude::*;

    let mut data_dir = None;
    let mut epochs = 5;
    let mut batch_size = 64;
    let mut lr = None;
    let mut optimizer = OptimizerKind::Sgd;
    let mut seed = None;

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Value(val) if data_dir.is_none() => data_dir = Some(val.string()?),
            Short('e') | Long("epochs") => epochs = parser.value()?.parse()?,
            Short('b') | Long("batch-size") => batch_size = parser.value()?.parse()?,
            Long("lr") => lr = Some(parser.value()?.parse()?),
            Short('o') | Long("optimizer") => optimizer = parser.value()?.parse()?,
            Short('s') | Long("seed") => seed = Some(parser.value()?.parse()?),
            Short('h') | Long("help") => {
                println!(
                    "{about}

Usage: {bin_name} [OPTIONS] <data_dir>

Args:

  <data_dir>
    Directory containing the uncompressed MNIST files
    (train-images-idx3-ubyte etc.)

Options:

  -e, --epochs <n>         Number of passes over the training set [default: 5]
  -b, --batch-size <n>     Samples per mini-batch [default: 64]
  --lr <rate>              Learning rate [default: 0.05 for sgd, 0.001 for adam]
  -o, --optimizer <name>   sgd or adam [default: sgd]
  -s, --seed <n>           Seed for weight initialization
  -h, --help               Print help

Set RUST_LOG=info to see progress.
",
                    bin_name = parser.bin_name().unwrap_or("mnist")
                );
                std::process::exit(0);
            }
            _ => return Err(arg.unexpected()),
        }
    }

    let data_dir = data_dir.ok_or("missing `<data_dir>` arg")?;
    if batch_size == 0 {
        return Err("batch size must be > 0".into());
    }

    Ok(Args {
        data_dir,
        epochs,
        batch_size,
        lr: lr.unwrap_or(optimizer.default_lr()),
        optimizer,
        seed,
    })
}

fn make_optimizer(args: &Args) -> Box<dyn Optimizer> {
    match args.optimizer {
        OptimizerKind::Sgd => Box::new(Sgd::new(SgdOptions {
            lr: args.lr,
            momentum: 0.9,
            ..Default::default()
        })),
        OptimizerKind::Adam => Box::new(Adam::new(AdamOptions {
            lr: args.lr,
            ..Default::default()
        })),
    }
}

/// Converts a batch of flattened `(B, 784)` images into the model's input
/// layout.
pub type Prepare = fn(Tensor) -> Result<Tensor, ShapeError>;

/// Return the accuracy of `model` over all batches.
fn evaluate(
    model: &mut dyn Module,
    batches: Batches<'_>,
    prepare: Prepare,
) -> Result<f32, Box<dyn Error>> {
    model.eval();
    let mut correct = 0.;
    let mut total = 0;
    for batch in batches {
        let (images, labels) = batch?;
        let logits = model.forward(&prepare(images)?)?;
        correct += accuracy(&logits, &labels)? * labels.len() as f32;
        total += labels.len();
    }
    Ok(correct / total.max(1) as f32)
}

/// Train `model` on the training split and report test accuracy after each
/// epoch.
pub fn train(
    model: &mut dyn Module,
    data: &Mnist,
    args: &Args,
    prepare: Prepare,
) -> Result<(), Box<dyn Error>> {
    let mut optimizer = make_optimizer(args);
    let mut loss_fn = CrossEntropyLoss::new();

    info!(
        "training for {} epochs with {:?}, lr {}, batch size {}",
        args.epochs, args.optimizer, args.lr, args.batch_size
    );

    for epoch in 1..=args.epochs {
        model.train();
        let start = Instant::now();
        let mut total_loss = 0.;
        let mut n_batches = 0;

        for batch in data.batches(args.batch_size) {
            let (images, labels) = batch?;
            let images = prepare(images)?;

            optimizer.zero_grad(model);
            let logits = model.forward(&images)?;
            let loss = loss_fn.forward(&logits, &labels)?;
            model.backward(&loss_fn.backward()?)?;
            optimizer.step(model)?;

            total_loss += loss;
            n_batches += 1;
            if n_batches % 100 == 0 {
                debug!("epoch {} batch {} loss {:.4}", epoch, n_batches, loss);
            }
        }

        let mean_loss = total_loss / n_batches.max(1) as f32;
        info!(
            "epoch {} mean loss {:.4} in {:.1}s",
            epoch,
            mean_loss,
            start.elapsed().as_secs_f32()
        );

        let test_accuracy = evaluate(model, data.test_batches(args.batch_size), prepare)?;
        info!("epoch {} test accuracy {:.2}%", epoch, test_accuracy * 100.);
    }

    Ok(())
}
