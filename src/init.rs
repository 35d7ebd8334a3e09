//! Random initialization of layer parameters.

use ember_tensor::{RandomSource, Tensor};
use fastrand::Rng;

/// Create a generator from `seed`, or a non-deterministically seeded one if
/// `seed` is `None`.
pub fn make_rng(seed: Option<u64>) -> Rng {
    match seed {
        Some(seed) => Rng::with_seed(seed),
        None => Rng::new(),
    }
}

/// Source of uniformly distributed values in `[low, high)` for
/// [`Tensor::rand`].
pub struct Uniform<'a> {
    rng: &'a mut Rng,
    low: f32,
    high: f32,
}

impl<'a> Uniform<'a> {
    pub fn new(rng: &'a mut Rng, low: f32, high: f32) -> Uniform<'a> {
        Uniform { rng, low, high }
    }
}

impl RandomSource<f32> for Uniform<'_> {
    fn next(&mut self) -> f32 {
        self.low + self.rng.f32() * (self.high - self.low)
    }
}

/// Fill a tensor of the given shape with values from `U(-limit, limit)`.
pub fn uniform(shape: &[usize], limit: f32, rng: &mut Rng) -> Tensor {
    Tensor::rand(shape, &mut Uniform::new(rng, -limit, limit))
}

/// Glorot/Xavier uniform init for a `(fan_in, fan_out)` weight matrix.
pub fn xavier_uniform(fan_in: usize, fan_out: usize, rng: &mut Rng) -> Tensor {
    let limit = (6. / (fan_in + fan_out) as f32).sqrt();
    uniform(&[fan_in, fan_out], limit, rng)
}

/// Return a mask with the given shape whose elements are 0 with
/// probability `p` and `1 / (1 - p)` otherwise.
pub fn dropout_mask(shape: &[usize], p: f32, rng: &mut Rng) -> Tensor {
    let scale = 1. / (1. - p);
    let mut mask = Tensor::zeros(shape);
    for x in mask.iter_mut() {
        *x = if rng.f32() < p { 0. } else { scale };
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::{dropout_mask, make_rng, uniform, xavier_uniform};

    #[test]
    fn test_seeded_init_is_reproducible() {
        let a = uniform(&[4, 5], 0.5, &mut make_rng(Some(42)));
        let b = uniform(&[4, 5], 0.5, &mut make_rng(Some(42)));
        let c = uniform(&[4, 5], 0.5, &mut make_rng(Some(43)));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.iter().all(|x| (-0.5..0.5).contains(x)));
    }

    #[test]
    fn test_xavier_uniform() {
        let mut rng = make_rng(Some(1));
        let w = xavier_uniform(30, 10, &mut rng);
        assert_eq!(w.shape(), &[30, 10]);
        let limit = (6f32 / 40.).sqrt();
        assert!(w.iter().all(|x| x.abs() <= limit));
    }

    #[test]
    fn test_dropout_mask() {
        let mut rng = make_rng(Some(7));
        let mask = dropout_mask(&[100, 100], 0.25, &mut rng);
        let kept = mask.iter().filter(|&&x| x != 0.).count();
        assert!(mask.iter().all(|&x| x == 0. || x == 1. / 0.75));

        let kept_frac = kept as f32 / mask.len() as f32;
        assert!((kept_frac - 0.75).abs() < 0.05, "kept {}", kept_frac);

        let all_kept = dropout_mask(&[3, 3], 0., &mut rng);
        assert!(all_kept.iter().all(|&x| x == 1.));
    }
}
