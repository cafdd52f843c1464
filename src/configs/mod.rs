mod network;
mod training;

pub use network::RnnConfig;
pub use training::TrainingConfig;
