use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, Uniform};

use super::Matrix;
use crate::Result;

/// A matrix generator that samples every weight from a probabilistic distribution.
#[derive(Debug, Clone)]
pub struct RandMatrixGen<D: Distribution<f32>> {
    distribution: D,
}

impl<D: Distribution<f32>> RandMatrixGen<D> {
    /// Creates a new `RandMatrixGen` matrix generator.
    ///
    /// # Arguments
    /// * `distribution` - The distribution to sample the weights from.
    pub fn new(distribution: D) -> Self {
        Self { distribution }
    }

    /// Samples a new matrix.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `rows` - The amount of rows.
    /// * `columns` - The amount of columns.
    ///
    /// # Returns
    /// A new `Matrix` with random weights and zeroed gradients.
    pub fn matrix<R: Rng + ?Sized>(&self, rng: &mut R, rows: usize, columns: usize) -> Matrix {
        let weights = Array2::from_shape_fn((rows, columns), |_| self.distribution.sample(rng));
        Matrix::from_array(weights)
    }
}

impl RandMatrixGen<Uniform<f32>> {
    /// Creates a new `RandMatrixGen` matrix generator with a uniform distribution.
    ///
    /// # Arguments
    /// * `low` - The inclusive lower limit.
    /// * `high` - The exclusive upper limit.
    ///
    /// # Returns
    /// An error if the range is invalid (low >= high).
    pub fn uniform(low: f32, high: f32) -> Result<Self> {
        Ok(Self::new(Uniform::new(low, high)?))
    }

    /// Creates a new `RandMatrixGen` matrix generator sampling uniformly from `[-range, range)`.
    ///
    /// # Returns
    /// An error if `range` is not strictly positive.
    pub fn symmetric(range: f32) -> Result<Self> {
        Self::uniform(-range, range)
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn samples_within_the_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let weight_gen = RandMatrixGen::symmetric(0.08).unwrap();
        let m = weight_gen.matrix(&mut rng, 4, 3);

        assert_eq!(m.shape(), (4, 3));
        assert!(m.weights().iter().all(|w| (-0.08..0.08).contains(w)));
        assert!(m.gradients().iter().all(|&g| g == 0.));
    }

    #[test]
    fn invalid_range_fails() {
        assert!(RandMatrixGen::symmetric(0.).is_err());
        assert!(RandMatrixGen::uniform(1., -1.).is_err());
    }
}
