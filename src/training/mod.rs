mod event;
mod rnn_time_step;

pub use event::{TrainingEvent, TrainingSummary};
pub use rnn_time_step::RnnTimeStep;

pub(crate) use rnn_time_step::generate_rng;
