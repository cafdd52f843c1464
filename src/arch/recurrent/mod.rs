mod hidden_layer;
mod model;
mod role;

pub use hidden_layer::HiddenLayer;
pub use model::{Model, ModelParams};
pub use role::Role;
