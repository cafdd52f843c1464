use super::StepStats;
use crate::matrix::Matrix;

/// Defines the strategy for updating a parameter matrix from its accumulated gradients.
pub trait Optimizer {
    /// Updates the weights of `matrix` in place.
    ///
    /// # Arguments
    /// * `learning_rate` - The coefficient that modulates the size of the update.
    /// * `matrix` - The parameter to update, its gradients are left untouched.
    ///
    /// # Returns
    /// The clipping statistics of this update.
    fn update(&mut self, learning_rate: f32, matrix: &mut Matrix) -> StepStats;
}
