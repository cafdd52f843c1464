use serde::{Deserialize, Serialize};

use crate::{Result, RnnErr, arch::activations::ActFnSpec, codec::CharCodec};

/// The hyperparameters of a recurrent time-step network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RnnConfig {
    pub input_size: usize,
    pub hidden_sizes: Vec<usize>,
    pub output_size: usize,
    pub learning_rate: f32,
    pub decay_rate: f32,
    pub smooth_eps: f32,
    pub regc: f32,
    pub clipval: f32,
    pub act_fn: ActFnSpec,
    /// Weights are initialized uniformly in `[-init_range, init_range)`.
    pub init_range: f32,
    /// The maximum amount of unrolled time steps, unbounded if `None`.
    pub max_graphs: Option<usize>,
    pub seed: Option<u64>,
    pub data_formatter: Option<CharCodec>,
}

impl Default for RnnConfig {
    fn default() -> Self {
        Self {
            input_size: 1,
            hidden_sizes: vec![20],
            output_size: 1,
            learning_rate: 0.01,
            decay_rate: 0.999,
            smooth_eps: 1e-8,
            regc: 0.000001,
            clipval: 5.,
            act_fn: ActFnSpec::default(),
            init_range: 0.08,
            max_graphs: None,
            seed: None,
            data_formatter: None,
        }
    }
}

impl RnnConfig {
    /// Checks that the network described by this configuration can be built.
    ///
    /// # Returns
    /// A `Configuration` error naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(RnnErr::Configuration(msg.into()));

        if self.input_size == 0 {
            return invalid("input_size must be positive");
        }
        if self.output_size == 0 {
            return invalid("output_size must be positive");
        }
        if self.hidden_sizes.is_empty() {
            return invalid("hidden_sizes must have at least one layer");
        }
        if self.hidden_sizes.contains(&0) {
            return invalid("every hidden layer must have a positive size");
        }
        if !(0. ..1.).contains(&self.decay_rate) {
            return invalid("decay_rate must be in [0, 1)");
        }
        if self.smooth_eps <= 0. {
            return invalid("smooth_eps must be positive");
        }
        if self.clipval <= 0. {
            return invalid("clipval must be positive");
        }
        if self.max_graphs == Some(0) {
            return invalid("max_graphs must allow at least one graph");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_the_defaults() {
        let config: RnnConfig = serde_json::from_str(r#"{"hidden_sizes":[5]}"#).unwrap();

        assert_eq!(config.hidden_sizes, [5]);
        assert_eq!(config.input_size, 1);
        assert_eq!(config.clipval, 5.);
        assert_eq!(config.act_fn, ActFnSpec::Sigmoid { amp: 1. });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_hidden_layers_are_rejected() {
        let config = RnnConfig {
            hidden_sizes: vec![],
            ..Default::default()
        };

        assert!(matches!(config.validate(), Err(RnnErr::Configuration(_))));
    }
}
