use serde::{Deserialize, Serialize};

use crate::{
    Result,
    arch::activations::ActFn,
    graph::Equation,
    matrix::{Arena, MatrixId},
};

/// The trainable matrices of one recurrent depth.
///
/// Generic over what holds each matrix: owned matrices while building a model, arena ids once
/// the model owns them, serializable matrices when persisting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HiddenLayer<T = MatrixId> {
    pub weight: T,
    pub transition: T,
    pub bias: T,
}

impl<T> HiddenLayer<T> {
    /// Converts each matrix of the layer with `f`.
    pub fn try_map<U, F>(self, mut f: F) -> Result<HiddenLayer<U>>
    where
        F: FnMut(T) -> Result<U>,
    {
        Ok(HiddenLayer {
            weight: f(self.weight)?,
            transition: f(self.transition)?,
            bias: f(self.bias)?,
        })
    }
}

impl HiddenLayer<MatrixId> {
    /// Records `act_fn(weight × input + transition × previous + bias)` into `equation`.
    ///
    /// # Returns
    /// The id of the layer's hidden output.
    pub fn record(
        &self,
        equation: &mut Equation,
        arena: &mut Arena,
        act_fn: ActFn,
        input: MatrixId,
        previous: MatrixId,
    ) -> Result<MatrixId> {
        let weighted = equation.multiply(arena, self.weight, input)?;
        let carried = equation.multiply(arena, self.transition, previous)?;
        let sum = equation.add(arena, weighted, carried)?;
        let biased = equation.add(arena, sum, self.bias)?;
        equation.activate(arena, act_fn, biased)
    }
}
