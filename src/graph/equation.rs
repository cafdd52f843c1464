use super::{OpKind, State};
use crate::{
    Result, RnnErr,
    arch::activations::ActFn,
    matrix::{Arena, Matrix, MatrixId},
};

/// An ordered log of operations over the matrices of an `Arena`.
///
/// Running the equation forward replays the states in insertion order, running it backward replays
/// them in the exact reverse order. The equation never owns matrices, it only refers to them by id,
/// so parameters shared with other equations accumulate gradients from all of them.
#[derive(Debug, Clone, Default)]
pub struct Equation {
    states: Vec<State>,
}

impl Equation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `slot` as the input of this equation, `run_input` will write into it.
    ///
    /// # Returns
    /// The same `slot`, for chaining.
    pub fn input(&mut self, slot: MatrixId) -> MatrixId {
        self.states.push(State {
            kind: OpKind::Input,
            left: slot,
            right: None,
            product: slot,
        });
        slot
    }

    /// Records `left × right`.
    pub fn multiply(
        &mut self,
        arena: &mut Arena,
        left: MatrixId,
        right: MatrixId,
    ) -> Result<MatrixId> {
        self.record(arena, OpKind::Multiply, left, Some(right))
    }

    /// Records `left + right`.
    pub fn add(&mut self, arena: &mut Arena, left: MatrixId, right: MatrixId) -> Result<MatrixId> {
        self.record(arena, OpKind::Add, left, Some(right))
    }

    /// Records the elementwise nonlinearity `act_fn(left)`.
    pub fn activate(
        &mut self,
        arena: &mut Arena,
        act_fn: ActFn,
        left: MatrixId,
    ) -> Result<MatrixId> {
        self.record(arena, OpKind::Activation(act_fn), left, None)
    }

    /// Validates the operands, allocates the product and computes its forward value once.
    fn record(
        &mut self,
        arena: &mut Arena,
        kind: OpKind,
        left: MatrixId,
        right: Option<MatrixId>,
    ) -> Result<MatrixId> {
        let left_shape = arena.get(left)?.shape();
        let right_shape = match right {
            Some(right) => Some(arena.get(right)?.shape()),
            None => None,
        };

        let (rows, columns) = kind.product_shape(left_shape, right_shape)?;
        let product = arena.push(Matrix::zeros(rows, columns));

        let state = State {
            kind,
            left,
            right,
            product,
        };
        state.forward(arena, &[])?;
        self.states.push(state);

        Ok(product)
    }

    /// Runs every state forward in insertion order.
    ///
    /// # Arguments
    /// * `arena` - The arena the equation was recorded over.
    /// * `input` - The value for the input slot, must have as many elements as the slot.
    ///
    /// # Returns
    /// The id of the final product.
    pub fn run_input(&self, arena: &mut Arena, input: &[f32]) -> Result<MatrixId> {
        for state in &self.states {
            state.forward(arena, input)?;
        }

        self.output()
            .ok_or_else(|| RnnErr::Configuration("the equation has no states".into()))
    }

    /// Runs every state backward in reverse insertion order. The caller is responsible for
    /// seeding the gradients of the final product beforehand.
    pub fn run_backpropagate(&self, arena: &mut Arena) -> Result<()> {
        for state in self.states.iter().rev() {
            state.backward(arena)?;
        }

        Ok(())
    }

    /// Returns the final product of the equation.
    pub fn output(&self) -> Option<MatrixId> {
        self.states.last().map(|state| state.product)
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;

    fn push(arena: &mut Arena, rows: usize, columns: usize, weights: &[f32]) -> MatrixId {
        arena.push(Matrix::from_weights(rows, columns, weights.to_vec()).unwrap())
    }

    fn sum_of_product(left: &[f32], right: &[f32], m: usize, k: usize, n: usize) -> f32 {
        let mut arena = Arena::new();
        let l = push(&mut arena, m, k, left);
        let r = push(&mut arena, k, n, right);
        let mut eq = Equation::new();
        let p = eq.multiply(&mut arena, l, r).unwrap();
        arena.get(p).unwrap().weights().sum()
    }

    #[test]
    fn multiply_produces_m_by_n() {
        let mut arena = Arena::new();
        let l = push(&mut arena, 2, 3, &[1., 2., 3., 4., 5., 6.]);
        let r = push(&mut arena, 3, 1, &[1., 0., -1.]);
        let mut eq = Equation::new();
        let p = eq.multiply(&mut arena, l, r).unwrap();

        let product = arena.get(p).unwrap();
        assert_eq!(product.shape(), (2, 1));
        assert_eq!(product.to_weights_vec(), [-2., -2.]);
    }

    #[test]
    fn multiply_gradients_match_finite_differences() {
        const M: usize = 2;
        const K: usize = 3;
        const N: usize = 2;
        let left = [0.3, -0.7, 0.1, 0.5, 0.9, -0.2];
        let right = [0.4, -0.6, 0.8, 0.2, -0.5, 0.7];

        let mut arena = Arena::new();
        let l = push(&mut arena, M, K, &left);
        let r = push(&mut arena, K, N, &right);
        let mut eq = Equation::new();
        let p = eq.multiply(&mut arena, l, r).unwrap();

        arena.get_mut(p).unwrap().gradients_mut().fill(1.);
        eq.run_backpropagate(&mut arena).unwrap();

        let eps = 1e-2;
        let l_grad = arena.get(l).unwrap().gradients().to_owned();
        for i in 0..left.len() {
            let (mut plus, mut minus) = (left, left);
            plus[i] += eps;
            minus[i] -= eps;
            let fd = (sum_of_product(&plus, &right, M, K, N)
                - sum_of_product(&minus, &right, M, K, N))
                / (2. * eps);
            let analytic = l_grad.iter().nth(i).copied().unwrap();
            assert!((fd - analytic).abs() < 1e-4, "left[{i}]: {fd} vs {analytic}");
        }

        let r_grad = arena.get(r).unwrap().gradients().to_owned();
        for i in 0..right.len() {
            let (mut plus, mut minus) = (right, right);
            plus[i] += eps;
            minus[i] -= eps;
            let fd = (sum_of_product(&left, &plus, M, K, N)
                - sum_of_product(&left, &minus, M, K, N))
                / (2. * eps);
            let analytic = r_grad.iter().nth(i).copied().unwrap();
            assert!((fd - analytic).abs() < 1e-4, "right[{i}]: {fd} vs {analytic}");
        }
    }

    #[test]
    fn reused_parameter_sums_both_contributions() {
        let mut arena = Arena::new();
        let w = push(&mut arena, 2, 2, &[0.5, -1., 2., 0.25]);
        let a = push(&mut arena, 2, 1, &[1., 2.]);
        let b = push(&mut arena, 2, 1, &[-3., 0.5]);

        let mut eq = Equation::new();
        let wa = eq.multiply(&mut arena, w, a).unwrap();
        let wb = eq.multiply(&mut arena, w, b).unwrap();
        let out = eq.add(&mut arena, wa, wb).unwrap();

        arena.get_mut(out).unwrap().gradients_mut().fill(1.);
        eq.run_backpropagate(&mut arena).unwrap();

        // d/dW of ones·(W a) is ones × aᵀ, likewise for b.
        let ones = Array2::<f32>::ones((2, 1));
        let a_t = Array2::from_shape_vec((1, 2), vec![1., 2.]).unwrap();
        let b_t = Array2::from_shape_vec((1, 2), vec![-3., 0.5]).unwrap();
        let expected = ones.dot(&a_t) + ones.dot(&b_t);

        assert_eq!(arena.get(w).unwrap().gradients(), expected.view());
    }

    #[test]
    fn run_input_writes_the_input_slot_and_keeps_gradients() {
        let mut arena = Arena::new();
        let w = push(&mut arena, 1, 1, &[2.]);
        let slot = arena.push(Matrix::zeros(1, 1));

        let mut eq = Equation::new();
        let x = eq.input(slot);
        let wx = eq.multiply(&mut arena, w, x).unwrap();
        let out = eq.activate(&mut arena, ActFn::relu(), wx).unwrap();

        arena.get_mut(w).unwrap().gradients_mut().fill(9.);

        assert_eq!(eq.run_input(&mut arena, &[3.]).unwrap(), out);
        assert_eq!(arena.get(out).unwrap().to_weights_vec(), [6.]);
        assert_eq!(eq.run_input(&mut arena, &[-1.]).unwrap(), out);
        assert_eq!(arena.get(out).unwrap().to_weights_vec(), [0.]);
        assert_eq!(arena.get(w).unwrap().gradients()[[0, 0]], 9.);
    }

    #[test]
    fn wrong_input_length_fails() {
        let mut arena = Arena::new();
        let slot = arena.push(Matrix::zeros(2, 1));
        let mut eq = Equation::new();
        eq.input(slot);

        assert!(matches!(
            eq.run_input(&mut arena, &[1.]),
            Err(RnnErr::ShapeMismatch { op: "input", .. })
        ));
    }

    #[test]
    fn mismatched_operands_are_rejected_before_allocating() {
        let mut arena = Arena::new();
        let a = arena.push(Matrix::zeros(2, 3));
        let b = arena.push(Matrix::zeros(2, 3));
        let mut eq = Equation::new();

        assert!(eq.multiply(&mut arena, a, b).is_err());
        assert_eq!(arena.len(), 2);
        assert!(eq.is_empty());
    }
}
