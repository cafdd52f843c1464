use log::debug;
use rand::Rng;

use super::{HiddenLayer, Role};
use crate::{
    Result, RnnErr,
    arch::activations::ActFn,
    configs::RnnConfig,
    graph::Equation,
    matrix::{Arena, Matrix, MatrixId, RandMatrixGen},
};

/// The owned parameter matrices a `Model` is built from.
#[derive(Debug, Clone)]
pub struct ModelParams {
    pub input: Matrix,
    pub hidden_layers: Vec<HiddenLayer<Matrix>>,
    pub output_connector: Matrix,
    pub output: Matrix,
}

impl ModelParams {
    /// Samples the parameters of a network shaped after `config`.
    ///
    /// Weights, transitions and the output connector are uniform in `±init_range`, biases and the
    /// output start at zero.
    pub fn random<R: Rng + ?Sized>(config: &RnnConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let weight_gen = RandMatrixGen::symmetric(config.init_range)?;

        let mut prev_size = config.input_size;
        let mut hidden_layers = Vec::with_capacity(config.hidden_sizes.len());
        for &size in &config.hidden_sizes {
            hidden_layers.push(HiddenLayer {
                weight: weight_gen.matrix(rng, size, prev_size),
                transition: weight_gen.matrix(rng, size, size),
                bias: Matrix::zeros(size, 1),
            });
            prev_size = size;
        }

        Ok(Self {
            input: weight_gen.matrix(rng, 1, config.input_size),
            hidden_layers,
            output_connector: weight_gen.matrix(rng, config.output_size, prev_size),
            output: Matrix::zeros(config.output_size, 1),
        })
    }

    /// Checks that every matrix fits the ones around it.
    fn validate(&self) -> Result<()> {
        let mismatch = |role: Role, expected: (usize, usize), actual: (usize, usize)| {
            Err(RnnErr::Configuration(format!(
                "{role} should be {}x{} but is {}x{}",
                expected.0, expected.1, actual.0, actual.1
            )))
        };

        if self.hidden_layers.is_empty() {
            return Err(RnnErr::Configuration("hidden layers not set".into()));
        }

        let input_size = self.input.columns();
        if self.input.shape() != (1, input_size) || input_size == 0 {
            return mismatch(Role::Input, (1, input_size.max(1)), self.input.shape());
        }

        let mut prev_size = input_size;
        for (d, layer) in self.hidden_layers.iter().enumerate() {
            let size = layer.weight.rows();
            if size == 0 || layer.weight.shape() != (size, prev_size) {
                return mismatch(Role::HiddenWeight(d), (size, prev_size), layer.weight.shape());
            }
            if layer.transition.shape() != (size, size) {
                return mismatch(Role::HiddenTransition(d), (size, size), layer.transition.shape());
            }
            if layer.bias.shape() != (size, 1) {
                return mismatch(Role::HiddenBias(d), (size, 1), layer.bias.shape());
            }
            prev_size = size;
        }

        let output_size = self.output.rows();
        if output_size == 0 || self.output.shape() != (output_size, 1) {
            return mismatch(Role::Output, (output_size.max(1), 1), self.output.shape());
        }
        if self.output_connector.shape() != (output_size, prev_size) {
            return mismatch(
                Role::OutputConnector,
                (output_size, prev_size),
                self.output_connector.shape(),
            );
        }

        Ok(())
    }
}

/// The parameter store of a recurrent network together with its unrolled time steps.
///
/// Every parameter lives once in the arena, each bound equation refers to it by id. Equations are
/// only ever appended, step `i` reads the hidden outputs of step `i - 1`.
#[derive(Debug, Clone)]
pub struct Model {
    arena: Arena,
    act_fn: ActFn,
    input: MatrixId,
    hidden_layers: Vec<HiddenLayer>,
    output_connector: MatrixId,
    output: MatrixId,
    all_matrices: Vec<(Role, MatrixId)>,
    initial_state: Vec<MatrixId>,
    equations: Vec<Equation>,
    equation_connections: Vec<Vec<MatrixId>>,
    max_graphs: Option<usize>,
    /// Arena length right after the parameters and initial state, graphs live above it.
    base_len: usize,
}

impl Model {
    /// Creates a new `Model` that takes ownership of `params`.
    ///
    /// # Arguments
    /// * `params` - The trainable matrices.
    /// * `act_fn` - The nonlinearity of the hidden layers.
    /// * `max_graphs` - The maximum amount of unrolled time steps, if any.
    ///
    /// # Returns
    /// A `Configuration` error if the matrices don't fit together.
    pub fn new(params: ModelParams, act_fn: ActFn, max_graphs: Option<usize>) -> Result<Self> {
        params.validate()?;

        let mut arena = Arena::new();
        let mut all_matrices = Vec::new();
        let mut store = |arena: &mut Arena, role: Role, matrix: Matrix| {
            let id = arena.push(matrix);
            all_matrices.push((role, id));
            id
        };

        let input = store(&mut arena, Role::Input, params.input);
        let mut hidden_layers = Vec::with_capacity(params.hidden_layers.len());
        for (d, layer) in params.hidden_layers.into_iter().enumerate() {
            hidden_layers.push(HiddenLayer {
                weight: store(&mut arena, Role::HiddenWeight(d), layer.weight),
                transition: store(&mut arena, Role::HiddenTransition(d), layer.transition),
                bias: store(&mut arena, Role::HiddenBias(d), layer.bias),
            });
        }
        let output_connector = store(&mut arena, Role::OutputConnector, params.output_connector);
        let output = store(&mut arena, Role::Output, params.output);

        let initial_state = hidden_layers
            .iter()
            .map(|layer| -> Result<MatrixId> {
                let size = arena.get(layer.bias).map(Matrix::rows)?;
                Ok(arena.push(Matrix::zeros(size, 1)))
            })
            .collect::<Result<Vec<_>>>()?;

        let base_len = arena.len();

        Ok(Self {
            arena,
            act_fn,
            input,
            hidden_layers,
            output_connector,
            output,
            all_matrices,
            initial_state,
            equations: Vec::new(),
            equation_connections: Vec::new(),
            max_graphs,
            base_len,
        })
    }

    /// Unrolls one more time step.
    ///
    /// The new equation owns a fresh input slot, reads the previous step's hidden outputs (or the
    /// zero initial state) and shares every parameter with the other steps.
    pub fn bind_equation(&mut self) -> Result<()> {
        let requested = self.equations.len() + 1;
        if let Some(max) = self.max_graphs.filter(|&max| requested > max) {
            return Err(RnnErr::GraphLimitExceeded { requested, max });
        }

        let previous = self
            .equation_connections
            .last()
            .unwrap_or(&self.initial_state)
            .clone();

        let mut equation = Equation::new();
        let slot = self.arena.push(Matrix::zeros(self.input_size(), 1));
        let mut x = equation.input(slot);

        let mut outputs = Vec::with_capacity(self.hidden_layers.len());
        for (layer, &prev) in self.hidden_layers.iter().zip(&previous) {
            x = layer.record(&mut equation, &mut self.arena, self.act_fn, x, prev)?;
            outputs.push(x);
        }

        let connected = equation.multiply(&mut self.arena, self.output_connector, x)?;
        equation.add(&mut self.arena, connected, self.output)?;

        debug!(
            "bound equation {} with {} states, arena holds {} matrices",
            self.equations.len(),
            equation.len(),
            self.arena.len()
        );

        self.equation_connections.push(outputs);
        self.equations.push(equation);

        Ok(())
    }

    /// Binds equations until there are at least `target` of them.
    ///
    /// # Returns
    /// `GraphLimitExceeded` without binding anything if `target` is above the configured maximum.
    pub fn grow_to(&mut self, target: usize) -> Result<()> {
        if let Some(max) = self.max_graphs.filter(|&max| target > max) {
            return Err(RnnErr::GraphLimitExceeded {
                requested: target,
                max,
            });
        }

        while self.equations.len() < target {
            self.bind_equation()?;
        }

        Ok(())
    }

    /// Drops every bound equation and its intermediate matrices, the parameters are kept.
    pub fn reset_graphs(&mut self) {
        self.equations.clear();
        self.equation_connections.clear();
        self.arena.truncate(self.base_len);
    }

    /// Runs the equation of time step `step` forward.
    ///
    /// # Returns
    /// The id of the step's output.
    pub fn run_equation(&mut self, step: usize, input: &[f32]) -> Result<MatrixId> {
        let equation = self.equations.get(step).ok_or(RnnErr::NotReady)?;
        equation.run_input(&mut self.arena, input)
    }

    /// Runs the equation of time step `step` backward.
    pub fn backpropagate_equation(&mut self, step: usize) -> Result<()> {
        let equation = self.equations.get(step).ok_or(RnnErr::NotReady)?;
        equation.run_backpropagate(&mut self.arena)
    }

    /// Resets the gradients of every matrix, parameters and intermediates alike.
    pub fn zero_grad(&mut self) {
        self.arena.zero_grad();
    }

    /// Calls `f` with every trainable matrix and its role.
    pub fn for_each_param_mut<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(Role, &mut Matrix),
    {
        for &(role, id) in &self.all_matrices {
            f(role, self.arena.get_mut(id)?);
        }

        Ok(())
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub(crate) fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    pub fn matrix(&self, id: MatrixId) -> Result<&Matrix> {
        self.arena.get(id)
    }

    /// Returns every trainable matrix exactly once, tagged by its role.
    pub fn all_matrices(&self) -> &[(Role, MatrixId)] {
        &self.all_matrices
    }

    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    pub fn equation_count(&self) -> usize {
        self.equations.len()
    }

    /// Returns the hidden outputs of each time step, one id per layer.
    pub fn equation_connections(&self) -> &[Vec<MatrixId>] {
        &self.equation_connections
    }

    pub fn initial_state(&self) -> &[MatrixId] {
        &self.initial_state
    }

    pub fn input(&self) -> MatrixId {
        self.input
    }

    pub fn hidden_layers(&self) -> &[HiddenLayer] {
        &self.hidden_layers
    }

    pub fn output_connector(&self) -> MatrixId {
        self.output_connector
    }

    pub fn output(&self) -> MatrixId {
        self.output
    }

    pub fn act_fn(&self) -> ActFn {
        self.act_fn
    }

    pub fn max_graphs(&self) -> Option<usize> {
        self.max_graphs
    }

    pub fn input_size(&self) -> usize {
        self.arena.get(self.input).map_or(0, Matrix::columns)
    }

    pub fn output_size(&self) -> usize {
        self.arena.get(self.output).map_or(0, Matrix::rows)
    }

    pub fn hidden_sizes(&self) -> Vec<usize> {
        self.hidden_layers
            .iter()
            .map(|layer| self.arena.get(layer.bias).map_or(0, Matrix::rows))
            .collect()
    }
}
