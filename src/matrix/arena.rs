use serde::{Deserialize, Serialize};

use super::Matrix;
use crate::{Result, RnnErr};

/// Index of a matrix inside an `Arena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatrixId(usize);

impl MatrixId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Flat storage for every matrix of a model.
///
/// Matrices are only ever appended, a `MatrixId` stays valid until the arena is truncated below it.
/// Products are always pushed after their operands, so an operation's product id is strictly
/// greater than the ids of its operands.
#[derive(Debug, Clone, Default)]
pub struct Arena {
    matrices: Vec<Matrix>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a matrix.
    ///
    /// # Arguments
    /// * `matrix` - The matrix to store.
    ///
    /// # Returns
    /// The id the matrix can be found with.
    pub fn push(&mut self, matrix: Matrix) -> MatrixId {
        self.matrices.push(matrix);
        MatrixId(self.matrices.len() - 1)
    }

    pub fn get(&self, id: MatrixId) -> Result<&Matrix> {
        self.matrices
            .get(id.0)
            .ok_or(RnnErr::UnknownMatrix(id.0))
    }

    pub fn get_mut(&mut self, id: MatrixId) -> Result<&mut Matrix> {
        self.matrices
            .get_mut(id.0)
            .ok_or(RnnErr::UnknownMatrix(id.0))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    /// Drops every matrix stored from `len` onwards.
    pub fn truncate(&mut self, len: usize) {
        self.matrices.truncate(len);
    }

    /// Resets the gradients of every stored matrix.
    pub fn zero_grad(&mut self) {
        self.matrices.iter_mut().for_each(Matrix::zero_grad);
    }

    /// Borrows the operands of an operation immutably and its product mutably.
    ///
    /// # Arguments
    /// * `left` - The left operand.
    /// * `right` - The optional right operand, may be the same as `left`.
    /// * `product` - The product, must come after both operands.
    ///
    /// # Returns
    /// The borrowed matrices or an error if an id is out of bounds or not ordered.
    pub fn split(
        &mut self,
        left: MatrixId,
        right: Option<MatrixId>,
        product: MatrixId,
    ) -> Result<(&Matrix, Option<&Matrix>, &mut Matrix)> {
        let (operands, rest) = self.split_at_product(left, right, product)?;
        let left = &operands[left.0];
        let right = right.map(|r| &operands[r.0]);
        Ok((left, right, &mut rest[0]))
    }

    /// Borrows the operands of an operation mutably and its product immutably, used when pushing
    /// gradients back through the operation.
    pub fn split_back(
        &mut self,
        left: MatrixId,
        right: Option<MatrixId>,
        product: MatrixId,
    ) -> Result<(&mut [Matrix], &Matrix)> {
        let (operands, rest) = self.split_at_product(left, right, product)?;
        Ok((operands, &rest[0]))
    }

    fn split_at_product(
        &mut self,
        left: MatrixId,
        right: Option<MatrixId>,
        product: MatrixId,
    ) -> Result<(&mut [Matrix], &mut [Matrix])> {
        if product.0 >= self.matrices.len() {
            return Err(RnnErr::UnknownMatrix(product.0));
        }

        for operand in std::iter::once(left).chain(right) {
            if operand >= product {
                return Err(RnnErr::UnknownMatrix(operand.0));
            }
        }

        Ok(self.matrices.split_at_mut(product.0))
    }
}
