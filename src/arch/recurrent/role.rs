use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// The part a trainable matrix plays in the recurrent network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Input,
    HiddenWeight(usize),
    HiddenTransition(usize),
    HiddenBias(usize),
    OutputConnector,
    Output,
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Input => write!(f, "input"),
            Role::HiddenWeight(layer) => write!(f, "hidden_layers[{layer}].weight"),
            Role::HiddenTransition(layer) => write!(f, "hidden_layers[{layer}].transition"),
            Role::HiddenBias(layer) => write!(f, "hidden_layers[{layer}].bias"),
            Role::OutputConnector => write!(f, "output_connector"),
            Role::Output => write!(f, "output"),
        }
    }
}
