use ember_tensor::Tensor;
use fastrand::Rng;

use crate::error::{ConfigError, LayerError};
use crate::init::{dropout_mask, make_rng};
use crate::module::Module;

/// Inverted dropout.
///
/// In training mode each element is zeroed with probability `p` and the
/// survivors are scaled by `1 / (1 - p)`, so inference needs no rescaling.
/// In evaluation mode the layer is the identity.
#[derive(Debug)]
pub struct Dropout {
    p: f32,
    training: bool,
    rng: Rng,
    mask: Option<Tensor>,
}

impl Dropout {
    pub fn new(p: f32, seed: Option<u64>) -> Result<Dropout, ConfigError> {
        if !(0. ..1.).contains(&p) {
            return Err(ConfigError::InvalidProbability(p));
        }
        Ok(Dropout {
            p,
            training: true,
            rng: make_rng(seed),
            mask: None,
        })
    }

    pub fn p(&self) -> f32 {
        self.p
    }
}

impl Module for Dropout {
    fn name(&self) -> &str {
        "Dropout"
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
        if !self.training {
            self.mask = None;
            return Ok(input.clone());
        }
        let mask = dropout_mask(input.shape(), self.p, &mut self.rng);
        let output = input.mul(&mask)?;
        self.mask = Some(mask);
        Ok(output)
    }

    fn backward(&mut self, grad: &Tensor) -> Result<Tensor, LayerError> {
        if !self.training {
            return Ok(grad.clone());
        }
        let mask = self
            .mask
            .as_ref()
            .ok_or(LayerError::NoForwardPass("Dropout"))?;
        Ok(grad.mul(mask)?)
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn is_training(&self) -> bool {
        self.training
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use ember_tensor::Tensor;

    use super::Dropout;
    use crate::error::ConfigError;
    use crate::module::Module;

    #[test]
    fn test_dropout_probability() {
        assert!(Dropout::new(0., None).is_ok());
        assert!(Dropout::new(0.5, None).is_ok());
        assert_eq!(
            Dropout::new(1., None).err(),
            Some(ConfigError::InvalidProbability(1.))
        );
        assert_eq!(
            Dropout::new(-0.1, None).err(),
            Some(ConfigError::InvalidProbability(-0.1))
        );
    }

    #[test]
    fn test_dropout_train() -> Result<(), Box<dyn Error>> {
        let mut layer = Dropout::new(0.5, Some(11))?;
        let input = Tensor::full(&[8, 16], 3.);
        let output = layer.forward(&input)?;

        // Survivors are scaled by 1 / (1 - p).
        assert!(output.iter().all(|&x| x == 0. || x == 6.));
        assert!(output.iter().any(|&x| x == 0.));
        assert!(output.iter().any(|&x| x == 6.));

        // Backward drops the same elements.
        let grad = layer.backward(&Tensor::ones(&[8, 16]))?;
        for (g, y) in grad.iter().zip(output.iter()) {
            assert_eq!(*g == 0., *y == 0.);
        }
        Ok(())
    }

    #[test]
    fn test_dropout_eval() -> Result<(), Box<dyn Error>> {
        let mut layer = Dropout::new(0.9, Some(1))?;
        layer.eval();
        assert!(!layer.is_training());

        let input = Tensor::from([[1., 2.], [3., 4.]]);
        assert_eq!(layer.forward(&input)?, input);
        assert_eq!(layer.backward(&input)?, input);

        layer.train();
        assert!(layer.is_training());
        Ok(())
    }
}
