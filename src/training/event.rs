/// The outcome of a training run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSummary {
    /// The mean loss per sequence of the last iteration.
    pub error: f32,
    pub iterations: usize,
}

/// A notification sent to the caller while training.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrainingEvent {
    /// Sent every `callback_period` iterations.
    Progress { iteration: usize, error: f32 },
    /// Sent once the training loop stops.
    Done(TrainingSummary),
}
