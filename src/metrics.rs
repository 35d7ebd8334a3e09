use ember_tensor::{ShapeError, Tensor};

use crate::error::LayerError;
use crate::loss::class_indices;

/// Return the fraction of rows of `pred` whose largest element is at the
/// target class.
///
/// `target` holds class indices `(batch,)` or one-hot rows
/// `(batch, classes)`.
pub fn accuracy(pred: &Tensor, target: &Tensor) -> Result<f32, LayerError> {
    let [batch, classes] = match *pred.shape() {
        [batch, classes] => [batch, classes],
        _ => {
            return Err(ShapeError::InvalidRank {
                expected: "2",
                actual: pred.ndim(),
            }
            .into())
        }
    };
    if batch == 0 {
        return Ok(0.);
    }

    let predicted = pred.argmax()?;
    let expected = Tensor::from(class_indices(target, batch, classes)?);
    let correct = predicted.equal(&expected)?.sum();
    Ok(correct as f32 / batch as f32)
}
