pub mod arch;
pub mod codec;
pub mod compile;
pub mod configs;
pub mod decoding;
pub mod error;
pub mod graph;
pub mod matrix;
pub mod optimization;
pub mod persistence;
pub mod training;

pub use error::{Result, RnnErr};
pub use training::RnnTimeStep;
