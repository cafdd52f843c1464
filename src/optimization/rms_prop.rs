use ndarray::Zip;

use super::{Optimizer, StepStats};
use crate::{configs::RnnConfig, matrix::Matrix};

/// RMSProp with elementwise gradient clipping and weight decay.
///
/// The squared gradient average is fed the raw gradient, only the step itself uses the clipped
/// value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RmsProp {
    decay_rate: f32,
    smooth_eps: f32,
    regc: f32,
    clipval: f32,
}

impl RmsProp {
    /// Creates a new `RmsProp` optimizer.
    ///
    /// # Arguments
    /// * `decay_rate` - The decay of the squared gradient average.
    /// * `smooth_eps` - Added to the average before taking its square root.
    /// * `regc` - The weight decay coefficient.
    /// * `clipval` - Gradients are clipped to `[-clipval, clipval]`.
    pub fn new(decay_rate: f32, smooth_eps: f32, regc: f32, clipval: f32) -> Self {
        Self {
            decay_rate,
            smooth_eps,
            regc,
            clipval,
        }
    }
}

impl From<&RnnConfig> for RmsProp {
    fn from(config: &RnnConfig) -> Self {
        Self::new(
            config.decay_rate,
            config.smooth_eps,
            config.regc,
            config.clipval,
        )
    }
}

impl Optimizer for RmsProp {
    fn update(&mut self, learning_rate: f32, matrix: &mut Matrix) -> StepStats {
        let Self {
            decay_rate: decay,
            smooth_eps: eps,
            regc,
            clipval,
        } = *self;

        let (weights, gradients, cache) = matrix.update_parts();
        let mut clipped = 0;

        Zip::from(weights)
            .and(gradients)
            .and(cache)
            .for_each(|w, &g, c| {
                *c = *c * decay + (1. - decay) * g * g;

                if g.abs() > clipval {
                    clipped += 1;
                }
                let g = g.clamp(-clipval, clipval);

                *w += -learning_rate * g / (*c + eps).sqrt() - regc * *w;
            });

        StepStats::new(clipped, matrix.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_gradients_are_clipped_to_clipval() {
        let mut optimizer = RmsProp::new(0.5, 1e-8, 0., 5.);
        let mut matrix = Matrix::zeros(1, 4);
        matrix
            .gradients_mut()
            .iter_mut()
            .zip([10., 1., -2., 0.])
            .for_each(|(g, v)| *g = v);

        let stats = optimizer.update(1., &mut matrix);

        assert_eq!(stats, StepStats::new(1, 4));
        assert_eq!(stats.ratio(), 0.25);

        // cache = 0.5 * 100, step = -5 / sqrt(50 + 1e-8)
        let expected = -5. / (50_f32 + 1e-8).sqrt();
        assert!((matrix.weights()[[0, 0]] - expected).abs() < 1e-6);
        assert_eq!(matrix.cache().unwrap()[[0, 0]], 50.);
        assert_eq!(matrix.weights()[[0, 3]], 0.);
    }

    #[test]
    fn negative_gradients_keep_their_sign_when_clipped() {
        let mut optimizer = RmsProp::new(0., 1e-8, 0., 5.);
        let mut matrix = Matrix::zeros(1, 1);
        matrix.gradients_mut().fill(-20.);

        let stats = optimizer.update(1., &mut matrix);

        // cache = 400, step = 5 / 20
        assert_eq!(stats.clipped(), 1);
        assert!((matrix.weights()[[0, 0]] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn regc_decays_the_weights() {
        let mut optimizer = RmsProp::new(0.999, 1e-8, 0.5, 5.);
        let mut matrix = Matrix::from_weights(1, 2, vec![2., -4.]).unwrap();

        optimizer.update(0.01, &mut matrix);

        assert_eq!(matrix.to_weights_vec(), [1., -2.]);
    }
}
