mod arena;
mod init;

pub use arena::{Arena, MatrixId};
pub use init::RandMatrixGen;

use ndarray::{Array2, ArrayView2, ArrayViewMut2};

use crate::{Result, RnnErr};

/// A dense matrix holding its weights together with a gradient buffer of the exact same shape.
///
/// The shape is fixed at creation, both buffers are mutated in place. Parameter matrices also carry
/// the optimizer's running cache, which is created the first time the matrix gets updated.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    weights: Array2<f32>,
    gradients: Array2<f32>,
    cache: Option<Array2<f32>>,
}

impl Matrix {
    /// Creates a new `Matrix` filled with zeros.
    ///
    /// # Arguments
    /// * `rows` - The amount of rows.
    /// * `columns` - The amount of columns.
    ///
    /// # Returns
    /// A new `Matrix` instance.
    pub fn zeros(rows: usize, columns: usize) -> Self {
        Self::from_array(Array2::zeros((rows, columns)))
    }

    /// Creates a new `Matrix` from a row-major weight buffer.
    ///
    /// # Arguments
    /// * `rows` - The amount of rows.
    /// * `columns` - The amount of columns.
    /// * `weights` - The flat weights, `rows * columns` long.
    ///
    /// # Returns
    /// A new `Matrix` or an error if the buffer length doesn't match the shape.
    pub fn from_weights(rows: usize, columns: usize, weights: Vec<f32>) -> Result<Self> {
        let len = weights.len();
        let weights = Array2::from_shape_vec((rows, columns), weights).map_err(|_| {
            RnnErr::ShapeMismatch {
                op: "from_weights",
                left: (rows, columns),
                right: (1, len),
            }
        })?;

        Ok(Self::from_array(weights))
    }

    pub(crate) fn from_array(weights: Array2<f32>) -> Self {
        let gradients = Array2::zeros(weights.raw_dim());

        Self {
            weights,
            gradients,
            cache: None,
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.weights.nrows()
    }

    #[inline]
    pub fn columns(&self) -> usize {
        self.weights.ncols()
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.weights.dim()
    }

    /// Returns the amount of elements in the matrix.
    #[inline]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weights(&self) -> ArrayView2<'_, f32> {
        self.weights.view()
    }

    pub fn weights_mut(&mut self) -> ArrayViewMut2<'_, f32> {
        self.weights.view_mut()
    }

    pub fn gradients(&self) -> ArrayView2<'_, f32> {
        self.gradients.view()
    }

    pub fn gradients_mut(&mut self) -> ArrayViewMut2<'_, f32> {
        self.gradients.view_mut()
    }

    /// Returns the optimizer cache, if this matrix was ever updated.
    pub fn cache(&self) -> Option<ArrayView2<'_, f32>> {
        self.cache.as_ref().map(|c| c.view())
    }

    /// Copies the weights out in row-major order.
    pub fn to_weights_vec(&self) -> Vec<f32> {
        self.weights.iter().copied().collect()
    }

    /// Writes `values` into the weights in row-major order.
    ///
    /// # Returns
    /// An error if `values` has a different amount of elements than the matrix.
    pub fn set_weights(&mut self, values: &[f32]) -> Result<()> {
        if values.len() != self.len() {
            return Err(RnnErr::ShapeMismatch {
                op: "set_weights",
                left: self.shape(),
                right: (1, values.len()),
            });
        }

        self.weights
            .iter_mut()
            .zip(values)
            .for_each(|(w, &v)| *w = v);

        Ok(())
    }

    /// Resets the gradient buffer to zero.
    pub fn zero_grad(&mut self) {
        self.gradients.fill(0.);
    }

    /// Splits the matrix into the pieces an optimizer needs to update it in place, creating the
    /// cache on first use.
    ///
    /// # Returns
    /// A tuple containing the weights, gradients and cache.
    pub fn update_parts(
        &mut self,
    ) -> (
        ArrayViewMut2<'_, f32>,
        ArrayView2<'_, f32>,
        ArrayViewMut2<'_, f32>,
    ) {
        let dim = self.weights.raw_dim();
        let cache = self.cache.get_or_insert_with(|| Array2::zeros(dim));
        (self.weights.view_mut(), self.gradients.view(), cache.view_mut())
    }
}
