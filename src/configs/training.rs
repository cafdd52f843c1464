use serde::{Deserialize, Serialize};

/// The options of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub iterations: usize,
    pub error_thresh: f32,
    /// Whether to log the error every `log_period` iterations.
    pub log: bool,
    pub log_period: usize,
    /// Overrides the network's learning rate when set.
    pub learning_rate: Option<f32>,
    pub callback_period: usize,
    /// Keeps the current weights instead of reinitializing the network before training.
    pub keep_network_intact: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            iterations: 20000,
            error_thresh: 0.005,
            log: false,
            log_period: 10,
            learning_rate: None,
            callback_period: 10,
            keep_network_intact: false,
        }
    }
}
