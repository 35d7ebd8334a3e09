//! Loss functions.

use ember_tensor::{ShapeError, Tensor};
use log::trace;

use crate::error::LayerError;
use crate::ops::{log_softmax, softmax};

/// A loss that compares predictions with targets and produces the gradient
/// with respect to the predictions.
pub trait Loss {
    /// Compute the mean loss over a batch, caching what `backward` needs.
    fn forward(&mut self, pred: &Tensor, target: &Tensor) -> Result<f32, LayerError>;

    /// Return the gradient of the last computed loss with respect to `pred`.
    fn backward(&mut self) -> Result<Tensor, LayerError>;
}

/// Mean squared error, `sum((ŷ - y)²) / (B·M)`.
#[derive(Debug, Default)]
pub struct MeanSquaredError {
    diff: Option<Tensor>,
}

impl MeanSquaredError {
    pub fn new() -> MeanSquaredError {
        MeanSquaredError::default()
    }
}

impl Loss for MeanSquaredError {
    fn forward(&mut self, pred: &Tensor, target: &Tensor) -> Result<f32, LayerError> {
        let diff = pred.sub(target)?;
        let loss = diff.iter().map(|d| d * d).sum::<f32>() / diff.len().max(1) as f32;
        trace!("MSE loss {}", loss);
        self.diff = Some(diff);
        Ok(loss)
    }

    fn backward(&mut self) -> Result<Tensor, LayerError> {
        let diff = self
            .diff
            .as_ref()
            .ok_or(LayerError::NoForwardPass("MeanSquaredError"))?;
        let scale = 2. / diff.len().max(1) as f32;
        Ok(diff.scale(scale))
    }
}

/// Convert targets to one class index per row of a `(batch, classes)`
/// prediction.
///
/// `target` is either a vector of class indices stored as floats or a
/// `(batch, classes)` one-hot matrix, in which case the position of the
/// largest element in each row is used.
pub(crate) fn class_indices(target: &Tensor, batch: usize, classes: usize) -> Result<Vec<usize>, LayerError> {
    let indices: Vec<usize> = match target.ndim() {
        1 => target
            .iter()
            .map(|&label| {
                if label < 0. || label.fract() != 0. || label as usize >= classes {
                    Err(LayerError::InvalidValue("label is not a valid class index"))
                } else {
                    Ok(label as usize)
                }
            })
            .collect::<Result<_, _>>()?,
        2 => {
            if target.size(1) != classes {
                return Err(ShapeError::Mismatch {
                    left: target.shape().to_vec(),
                    right: vec![batch, classes],
                }
                .into());
            }
            target.argmax()?.into_data()
        }
        n => {
            return Err(ShapeError::InvalidRank {
                expected: "1 or 2",
                actual: n,
            }
            .into())
        }
    };
    if indices.len() != batch {
        return Err(ShapeError::LengthMismatch {
            expected: batch,
            actual: indices.len(),
        }
        .into());
    }
    Ok(indices)
}

fn check_logits(pred: &Tensor) -> Result<[usize; 2], ShapeError> {
    match *pred.shape() {
        [batch, classes] => Ok([batch, classes]),
        _ => Err(ShapeError::InvalidRank {
            expected: "2",
            actual: pred.ndim(),
        }),
    }
}

/// Softmax cross-entropy over raw logits.
///
/// The loss is `-mean(log softmax(ŷ)[label])` and its gradient
/// `(softmax(ŷ) - onehot(label)) / B`.
#[derive(Debug, Default)]
pub struct CrossEntropyLoss {
    /// Softmax of the last logits and the target class of each row.
    cache: Option<(Tensor, Vec<usize>)>,
}

impl CrossEntropyLoss {
    pub fn new() -> CrossEntropyLoss {
        CrossEntropyLoss::default()
    }
}

impl Loss for CrossEntropyLoss {
    fn forward(&mut self, pred: &Tensor, target: &Tensor) -> Result<f32, LayerError> {
        let [batch, classes] = check_logits(pred)?;
        let labels = class_indices(target, batch, classes)?;

        let log_probs = log_softmax(pred)?;
        let total: f32 = labels
            .iter()
            .enumerate()
            .map(|(row, &label)| log_probs.data()[row * classes + label])
            .sum();
        let loss = -total / batch.max(1) as f32;
        trace!("cross-entropy loss {}", loss);

        self.cache = Some((softmax(pred)?, labels));
        Ok(loss)
    }

    fn backward(&mut self) -> Result<Tensor, LayerError> {
        let (probs, labels) = self
            .cache
            .as_ref()
            .ok_or(LayerError::NoForwardPass("CrossEntropyLoss"))?;
        let batch = labels.len();
        let classes = probs.size(1);

        let mut grad = probs.clone();
        for (row, &label) in labels.iter().enumerate() {
            grad.data_mut()[row * classes + label] -= 1.;
        }
        grad *= 1. / batch.max(1) as f32;
        Ok(grad)
    }
}
