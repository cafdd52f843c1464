use log::{debug, info, warn};
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{TrainingEvent, TrainingSummary};
use crate::{
    Result, RnnErr,
    arch::recurrent::{Model, ModelParams},
    codec::CharCodec,
    configs::{RnnConfig, TrainingConfig},
    decoding,
    optimization::{Optimizer, RmsProp, StepStats},
};

/// A recurrent network trained one time step at a time over integer token sequences.
///
/// The network predicts the next token of a sequence from the current one and the hidden state
/// carried over from the previous steps. Training unrolls one equation per position and
/// backpropagates through all of them before every parameter update.
#[derive(Debug)]
pub struct RnnTimeStep<R: Rng = StdRng> {
    config: RnnConfig,
    model: Model,
    optimizer: RmsProp,
    rng: R,
    /// Amount of equations used by the last `run_input`.
    last_run_len: usize,
    total_cost: f32,
    ratio_clipped: f32,
}

impl RnnTimeStep<StdRng> {
    /// Creates a new network with random weights.
    ///
    /// The random number generator is seeded from `config.seed` if present, from the OS
    /// otherwise.
    ///
    /// # Returns
    /// A `Configuration` error if `config` doesn't describe a valid network.
    pub fn new(config: RnnConfig) -> Result<Self> {
        let rng = generate_rng(config.seed);
        Self::with_rng(config, rng)
    }
}

impl<R: Rng> RnnTimeStep<R> {
    /// Creates a new network with random weights sampled from `rng`.
    pub fn with_rng(config: RnnConfig, mut rng: R) -> Result<Self> {
        let model = random_model(&config, &mut rng)?;
        Ok(Self::from_model(config, model, rng))
    }

    pub(crate) fn from_model(config: RnnConfig, model: Model, rng: R) -> Self {
        Self {
            optimizer: RmsProp::from(&config),
            config,
            model,
            rng,
            last_run_len: 0,
            total_cost: 0.,
            ratio_clipped: 0.,
        }
    }

    /// Samples new weights, dropping every bound equation and the optimizer state.
    pub fn initialize(&mut self) -> Result<()> {
        self.model = random_model(&self.config, &mut self.rng)?;
        self.last_run_len = 0;
        self.total_cost = 0.;
        self.ratio_clipped = 0.;
        Ok(())
    }

    /// Binds equations until there are at least `target` of them.
    pub fn grow_graphs(&mut self, target: usize) -> Result<()> {
        self.model.grow_to(target)
    }

    /// Drops every bound equation, the weights and the optimizer state are kept.
    pub fn reset_graphs(&mut self) {
        self.model.reset_graphs();
        self.last_run_len = 0;
    }

    /// Runs `sequence` forward, feeding the true token at every position, and seeds the output
    /// gradients.
    ///
    /// Every gradient of the model is zeroed first. Position `i` is fed `sequence[i]` and its
    /// first output is compared against `sequence[i + 1]`.
    ///
    /// # Returns
    /// The summed absolute error, or `InvalidSequence` if there are less than two tokens.
    pub fn run_input(&mut self, sequence: &[usize]) -> Result<f32> {
        if sequence.len() < 2 {
            return Err(RnnErr::InvalidSequence {
                len: sequence.len(),
            });
        }

        let steps = sequence.len() - 1;
        self.model.zero_grad();
        self.model.grow_to(steps)?;

        let mut error_sum = 0.;
        for (i, pair) in sequence.windows(2).enumerate() {
            let input = self.token_input(pair[0]);
            let output = self.model.run_equation(i, &input)?;

            let output = self.model.arena_mut().get_mut(output)?;
            let error = output.weights()[[0, 0]] - pair[1] as f32;
            output.gradients_mut()[[0, 0]] = error;

            error_sum += error.abs();
        }

        self.last_run_len = steps;
        self.total_cost = error_sum;
        Ok(error_sum)
    }

    /// Backpropagates through the equations of the last `run_input`, latest time step first.
    pub fn run_backpropagate(&mut self) -> Result<()> {
        for step in (0..self.last_run_len).rev() {
            self.model.backpropagate_equation(step)?;
        }

        Ok(())
    }

    /// Updates every parameter from its accumulated gradients.
    ///
    /// # Returns
    /// The clipping statistics of the update.
    pub fn step(&mut self, learning_rate: f32) -> Result<StepStats> {
        let mut stats = StepStats::default();
        let optimizer = &mut self.optimizer;
        self.model
            .for_each_param_mut(|_, matrix| stats += optimizer.update(learning_rate, matrix))?;

        self.ratio_clipped = stats.ratio();
        Ok(stats)
    }

    /// Trains the network on a single sequence.
    ///
    /// # Returns
    /// The summed absolute error of the forward pass.
    pub fn train_pattern(&mut self, sequence: &[usize], learning_rate: f32) -> Result<f32> {
        let error = self.run_input(sequence)?;
        self.run_backpropagate()?;
        self.step(learning_rate)?;
        Ok(error)
    }

    /// Trains the network on `data` until the error drops below the threshold or the iteration
    /// budget runs out.
    pub fn train(
        &mut self,
        data: &[Vec<usize>],
        options: &TrainingConfig,
    ) -> Result<TrainingSummary> {
        self.train_with(data, options, |_| {})
    }

    /// Same as `train`, calling `callback` every `callback_period` iterations and once more when
    /// training stops.
    ///
    /// # Returns
    /// `EmptyDataset` if there is nothing to train on, `Divergence` if the error becomes NaN.
    pub fn train_with<F>(
        &mut self,
        data: &[Vec<usize>],
        options: &TrainingConfig,
        mut callback: F,
    ) -> Result<TrainingSummary>
    where
        F: FnMut(&TrainingEvent),
    {
        if data.is_empty() {
            return Err(RnnErr::EmptyDataset);
        }

        if !options.keep_network_intact {
            self.initialize()?;
        }

        let learning_rate = options.learning_rate.unwrap_or(self.config.learning_rate);
        info!(
            "training on {} sequences for at most {} iterations with learning rate {learning_rate}",
            data.len(),
            options.iterations
        );

        let mut error = f32::INFINITY;
        let mut i = 0;
        while i < options.iterations && error > options.error_thresh {
            let mut sum = 0.;
            for sequence in data {
                sum += self.train_pattern(sequence, learning_rate)?;
            }
            error = sum / data.len() as f32;

            if error.is_nan() {
                return Err(RnnErr::Divergence { iteration: i });
            }
            if options.log && options.log_period > 0 && i % options.log_period == 0 {
                info!(
                    "iterations: {i}, training error: {error}, clipped: {:.4}",
                    self.ratio_clipped
                );
            }
            if options.callback_period > 0 && i % options.callback_period == 0 {
                callback(&TrainingEvent::Progress {
                    iteration: i,
                    error,
                });
            }

            i += 1;
        }

        let summary = TrainingSummary {
            error,
            iterations: i,
        };
        info!("training finished after {i} iterations with error {error}");
        callback(&TrainingEvent::Done(summary));

        Ok(summary)
    }

    /// Evaluates the network against `data`.
    pub fn test(&self, _data: &[Vec<usize>]) -> Result<TrainingSummary> {
        Err(RnnErr::Unsupported("test"))
    }

    /// Returns whether at least one equation is bound, so that the network can `run`.
    pub fn is_runnable(&self) -> bool {
        self.model.equation_count() > 0
    }

    /// Generates the continuation of `prefix`.
    ///
    /// The prefix warms up the hidden state, then the network's own predictions are fed back
    /// until it predicts the end token or the sequence reaches `max_length` tokens. An empty
    /// prefix is started with the end token.
    ///
    /// # Arguments
    /// * `prefix` - The start of the sequence.
    /// * `max_length` - The maximum length of prefix and continuation together.
    /// * `sample` - Whether to sample the next token instead of taking the most likely one.
    /// * `temperature` - Scales the output logits when sampling.
    ///
    /// A network with a single output rounds it to the nearest token, `sample` and
    /// `temperature` are ignored and no random number is drawn.
    ///
    /// # Returns
    /// The generated tokens without the prefix, `NotReady` if no equation was ever bound.
    pub fn run(
        &mut self,
        prefix: &[usize],
        max_length: usize,
        sample: bool,
        temperature: f32,
    ) -> Result<Vec<usize>> {
        if !self.is_runnable() {
            warn!("no equations bound, did you run train()?");
            return Err(RnnErr::NotReady);
        }

        let start = [0];
        let seeded = if prefix.is_empty() { &start[..] } else { prefix };
        self.model.grow_to(max_length.max(seeded.len()))?;

        let mut output = Vec::new();
        for (i, &token) in seeded.iter().enumerate() {
            output = self.forward_step(i, token)?;
        }

        let mut continuation = Vec::new();
        while prefix.len() + continuation.len() < max_length {
            let next = decoding::decode(&output, sample, temperature, &mut self.rng);
            if next == 0 {
                break;
            }
            continuation.push(next);

            if prefix.len() + continuation.len() < max_length {
                output = self.forward_step(seeded.len() + continuation.len() - 1, next)?;
            }
        }

        debug!("generated {continuation:?} from {prefix:?}");
        Ok(continuation)
    }

    /// Runs `sequence` through the network without touching any gradient.
    ///
    /// # Returns
    /// The output column of every position.
    pub fn forward_sequence(&mut self, sequence: &[usize]) -> Result<Vec<Vec<f32>>> {
        self.model.grow_to(sequence.len())?;

        sequence
            .iter()
            .enumerate()
            .map(|(i, &token)| self.forward_step(i, token))
            .collect()
    }

    fn forward_step(&mut self, step: usize, token: usize) -> Result<Vec<f32>> {
        let input = self.token_input(token);
        let output = self.model.run_equation(step, &input)?;
        Ok(self.model.matrix(output)?.to_weights_vec())
    }

    fn token_input(&self, token: usize) -> Vec<f32> {
        vec![token as f32; self.model.input_size()]
    }

    /// Returns the summed absolute error of the last `run_input`.
    pub fn total_cost(&self) -> f32 {
        self.total_cost
    }

    /// Returns the fraction of gradient entries clipped by the last `step`.
    pub fn ratio_clipped(&self) -> f32 {
        self.ratio_clipped
    }

    pub fn config(&self) -> &RnnConfig {
        &self.config
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn data_formatter(&self) -> Option<&CharCodec> {
        self.config.data_formatter.as_ref()
    }
}

fn random_model<R: Rng + ?Sized>(config: &RnnConfig, rng: &mut R) -> Result<Model> {
    let params = ModelParams::random(config, rng)?;
    Model::new(params, config.act_fn.into(), config.max_graphs)
}

/// Generates a random number generator, seeded if `seed` is present.
pub(crate) fn generate_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::recurrent::Role;

    fn network(hidden_sizes: Vec<usize>, output_size: usize) -> RnnTimeStep {
        RnnTimeStep::new(RnnConfig {
            hidden_sizes,
            output_size,
            seed: Some(5),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn run_input_needs_two_tokens() {
        let mut net = network(vec![3], 1);

        assert!(matches!(
            net.run_input(&[1]),
            Err(RnnErr::InvalidSequence { len: 1 })
        ));
    }

    #[test]
    fn run_input_binds_one_equation_per_transition() {
        let mut net = network(vec![3], 1);
        let error = net.run_input(&[0, 1, 2, 3]).unwrap();

        assert_eq!(net.model().equation_count(), 3);
        assert_eq!(net.total_cost(), error);
        assert!(error > 0.);
    }

    #[test]
    fn a_fresh_network_is_not_runnable() {
        let mut net = network(vec![3], 1);

        assert!(!net.is_runnable());
        assert!(matches!(net.run(&[1], 3, false, 1.), Err(RnnErr::NotReady)));
    }

    #[test]
    fn step_visits_every_parameter() {
        let mut net = network(vec![3], 2);
        net.run_input(&[0, 1]).unwrap();
        net.run_backpropagate().unwrap();
        let stats = net.step(0.01).unwrap();

        // input 1x1, weight 3x1, transition 3x3, bias 3x1, connector 2x3, output 2x1
        assert_eq!(stats.total(), 1 + 3 + 9 + 3 + 6 + 2);
    }

    #[test]
    fn backpropagation_reaches_the_first_layer() {
        let mut net = network(vec![3], 1);
        net.run_input(&[1, 2, 3]).unwrap();
        net.run_backpropagate().unwrap();

        let weight = net.model().hidden_layers()[0].weight;
        let gradients = net.model().matrix(weight).unwrap().gradients();
        assert!(gradients.iter().any(|&g| g != 0.));
    }

    /// Σ ½·err² over the transitions of `sequence`, whose gradient is the signed error seed.
    fn squared_loss(net: &mut RnnTimeStep, sequence: &[usize]) -> f32 {
        let outputs = net.forward_sequence(&sequence[..sequence.len() - 1]).unwrap();
        outputs
            .iter()
            .zip(&sequence[1..])
            .map(|(output, &target)| 0.5 * (output[0] - target as f32).powi(2))
            .sum()
    }

    #[test]
    fn gradients_sum_over_every_time_step() {
        const EPS: f32 = 1e-2;
        let sequence = [1, 2, 0, 3];
        let mut net = network(vec![3, 2], 2);

        net.run_input(&sequence).unwrap();
        net.run_backpropagate().unwrap();

        let params: Vec<_> = net.model().all_matrices().to_vec();
        for (role, id) in params {
            // no time step reads the input matrix
            if role == Role::Input {
                continue;
            }

            let analytic = net.model().matrix(id).unwrap().gradients().to_owned();
            for (index, &expected) in analytic.indexed_iter() {
                let original = net.model().matrix(id).unwrap().weights()[index];
                let mut loss_at = |value: f32| {
                    net.model.arena_mut().get_mut(id).unwrap().weights_mut()[index] = value;
                    squared_loss(&mut net, &sequence)
                };

                let numeric = (loss_at(original + EPS) - loss_at(original - EPS)) / (2. * EPS);
                loss_at(original);

                assert!(
                    (numeric - expected).abs() <= 1e-3 + 1e-2 * expected.abs(),
                    "{role} {index:?}: numeric {numeric} vs analytic {expected}"
                );
            }
        }
    }

    #[test]
    fn training_reduces_the_error() {
        let mut net = network(vec![6], 1);
        let data = vec![vec![0, 1, 2, 3, 0]];
        let options = TrainingConfig {
            iterations: 1,
            ..Default::default()
        };
        let first = net.train(&data, &options).unwrap();

        let options = TrainingConfig {
            iterations: 300,
            keep_network_intact: true,
            ..Default::default()
        };
        let last = net.train(&data, &options).unwrap();

        assert!(last.error < first.error);
    }

    #[test]
    fn run_never_exceeds_max_length() {
        let mut net = network(vec![4], 5);
        net.grow_graphs(1).unwrap();

        let continuation = net.run(&[1, 2], 6, false, 1.).unwrap();
        assert!(continuation.len() <= 4);
        assert!(continuation.iter().all(|&t| t != 0 && t < 5));

        assert!(net.run(&[1, 2, 3], 2, false, 1.).unwrap().is_empty());
    }

    #[test]
    fn callback_sees_progress_and_completion() {
        let mut net = network(vec![3], 1);
        let options = TrainingConfig {
            iterations: 5,
            callback_period: 2,
            ..Default::default()
        };
        let mut events = Vec::new();
        let summary = net
            .train_with(&[vec![0, 1, 0]], &options, |event| events.push(*event))
            .unwrap();

        let progress: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                TrainingEvent::Progress { iteration, .. } => Some(*iteration),
                TrainingEvent::Done(_) => None,
            })
            .collect();
        assert_eq!(progress, [0, 2, 4]);
        assert_eq!(events.last(), Some(&TrainingEvent::Done(summary)));
    }

    #[test]
    fn empty_datasets_are_rejected() {
        let mut net = network(vec![3], 1);

        assert!(matches!(
            net.train(&[], &TrainingConfig::default()),
            Err(RnnErr::EmptyDataset)
        ));
    }

    #[test]
    fn test_is_not_implemented() {
        let net = network(vec![3], 1);

        assert!(matches!(net.test(&[]), Err(RnnErr::Unsupported(_))));
    }
}
