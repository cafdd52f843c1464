pub mod activations;
pub mod recurrent;
