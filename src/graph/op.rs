use ndarray::{ArrayView2, ArrayViewMut2, Zip, linalg};

use crate::{
    Result, RnnErr,
    arch::activations::ActFn,
    matrix::{Arena, Matrix, MatrixId},
};

/// The kind of a recorded operation.
///
/// Each kind selects the forward and backward routines used to replay a `State`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpKind {
    /// Copies the caller's value into the graph's input slot.
    Input,
    /// Matrix product `left × right`.
    Multiply,
    /// Elementwise `left + right`.
    Add,
    /// Elementwise nonlinearity over `left`.
    Activation(ActFn),
}

impl OpKind {
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Input => "input",
            OpKind::Multiply => "multiply",
            OpKind::Add => "add",
            OpKind::Activation(_) => "activation",
        }
    }

    /// Computes the shape of the product for the given operand shapes.
    ///
    /// # Returns
    /// The product's shape or an error if the operands are not compatible.
    pub fn product_shape(
        &self,
        left: (usize, usize),
        right: Option<(usize, usize)>,
    ) -> Result<(usize, usize)> {
        let mismatch = |right: (usize, usize)| RnnErr::ShapeMismatch {
            op: self.name(),
            left,
            right,
        };

        match (self, right) {
            (OpKind::Input | OpKind::Activation(_), None) => Ok(left),
            (OpKind::Multiply, Some(right)) if left.1 == right.0 => Ok((left.0, right.1)),
            (OpKind::Add, Some(right)) if left == right => Ok(left),
            (_, Some(right)) => Err(mismatch(right)),
            (_, None) => Err(mismatch((0, 0))),
        }
    }

    /// Writes the forward values of the operation into `product`.
    ///
    /// Shapes are expected to have been validated with `product_shape`.
    pub fn forward(
        &self,
        left: ArrayView2<f32>,
        right: Option<ArrayView2<f32>>,
        mut product: ArrayViewMut2<f32>,
    ) -> Result<()> {
        match (self, right) {
            (OpKind::Input, _) => product.assign(&left),
            (OpKind::Multiply, Some(right)) => {
                linalg::general_mat_mul(1.0, &left, &right, 0.0, &mut product)
            }
            (OpKind::Add, Some(right)) => {
                Zip::from(&mut product)
                    .and(&left)
                    .and(&right)
                    .for_each(|p, &l, &r| *p = l + r);
            }
            (OpKind::Activation(act_fn), _) => {
                product.zip_mut_with(&left, |p, &z| *p = act_fn.f(z));
            }
            (_, None) => {
                return Err(RnnErr::ShapeMismatch {
                    op: self.name(),
                    left: left.dim(),
                    right: (0, 0),
                });
            }
        }

        Ok(())
    }

    /// Accumulates the gradients of the operation's product into its operands.
    ///
    /// # Arguments
    /// * `operands` - Every matrix preceding the product, indexed by `MatrixId`.
    /// * `left` - The left operand.
    /// * `right` - The right operand, if any.
    /// * `product` - The product whose gradients were already computed.
    pub fn backward(
        &self,
        operands: &mut [Matrix],
        left: MatrixId,
        right: Option<MatrixId>,
        product: &Matrix,
    ) -> Result<()> {
        let d = product.gradients();

        match (self, right) {
            (OpKind::Input, _) => {}
            (OpKind::Multiply, Some(right)) => {
                let dl = d.dot(&operands[right.index()].weights().t());
                let dr = operands[left.index()].weights().t().dot(&d);

                let mut l_grad = operands[left.index()].gradients_mut();
                l_grad += &dl;
                let mut r_grad = operands[right.index()].gradients_mut();
                r_grad += &dr;
            }
            (OpKind::Add, Some(right)) => {
                let mut l_grad = operands[left.index()].gradients_mut();
                l_grad += &d;
                let mut r_grad = operands[right.index()].gradients_mut();
                r_grad += &d;
            }
            (OpKind::Activation(act_fn), _) => {
                let z = operands[left.index()].weights();
                let dl = Zip::from(&z).and(&d).map_collect(|&z, &d| act_fn.df(z) * d);

                let mut l_grad = operands[left.index()].gradients_mut();
                l_grad += &dl;
            }
            (_, None) => {
                return Err(RnnErr::ShapeMismatch {
                    op: self.name(),
                    left: operands[left.index()].shape(),
                    right: (0, 0),
                });
            }
        }

        Ok(())
    }
}

/// A single recorded operation of an `Equation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct State {
    pub kind: OpKind,
    pub left: MatrixId,
    pub right: Option<MatrixId>,
    pub product: MatrixId,
}

impl State {
    /// Replays the operation forward.
    ///
    /// # Arguments
    /// * `arena` - The arena holding the operands and product.
    /// * `input` - The value of the graph's input slot, only read by `OpKind::Input`.
    pub fn forward(&self, arena: &mut Arena, input: &[f32]) -> Result<()> {
        if let OpKind::Input = self.kind {
            let slot = arena.get_mut(self.product)?;

            if slot.len() != input.len() {
                return Err(RnnErr::ShapeMismatch {
                    op: self.kind.name(),
                    left: slot.shape(),
                    right: (input.len(), 1),
                });
            }

            return slot.set_weights(input);
        }

        let (left, right, product) = arena.split(self.left, self.right, self.product)?;
        self.kind
            .forward(left.weights(), right.map(Matrix::weights), product.weights_mut())
    }

    /// Replays the operation backward, accumulating into the operands' gradients.
    pub fn backward(&self, arena: &mut Arena) -> Result<()> {
        if let OpKind::Input = self.kind {
            return Ok(());
        }

        let (operands, product) = arena.split_back(self.left, self.right, self.product)?;
        self.kind.backward(operands, self.left, self.right, product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_shapes() {
        assert_eq!(
            OpKind::Multiply.product_shape((2, 3), Some((3, 4))).unwrap(),
            (2, 4)
        );
        assert_eq!(OpKind::Add.product_shape((2, 1), Some((2, 1))).unwrap(), (2, 1));
        assert_eq!(
            OpKind::Activation(ActFn::tanh())
                .product_shape((5, 1), None)
                .unwrap(),
            (5, 1)
        );
    }

    #[test]
    fn incompatible_shapes_fail() {
        assert!(matches!(
            OpKind::Multiply.product_shape((2, 3), Some((2, 3))),
            Err(RnnErr::ShapeMismatch { op: "multiply", .. })
        ));
        assert!(matches!(
            OpKind::Add.product_shape((2, 1), Some((1, 2))),
            Err(RnnErr::ShapeMismatch { op: "add", .. })
        ));
        assert!(OpKind::Add.product_shape((2, 1), None).is_err());
    }

    #[test]
    fn add_backward_accumulates_into_both_operands() {
        let mut arena = Arena::new();
        let a = arena.push(Matrix::zeros(2, 1));
        let b = arena.push(Matrix::zeros(2, 1));
        let p = arena.push(Matrix::zeros(2, 1));
        arena.get_mut(p).unwrap().gradients_mut().fill(1.5);

        let state = State {
            kind: OpKind::Add,
            left: a,
            right: Some(b),
            product: p,
        };
        state.backward(&mut arena).unwrap();
        state.backward(&mut arena).unwrap();

        assert!(arena.get(a).unwrap().gradients().iter().all(|&g| g == 3.));
        assert!(arena.get(b).unwrap().gradients().iter().all(|&g| g == 3.));
    }
}
