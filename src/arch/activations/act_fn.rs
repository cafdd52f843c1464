use serde::{Deserialize, Serialize};

use super::{Relu, Sigmoid, Tanh};

/// The elementwise nonlinearity applied by the hidden layers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ActFn {
    Sigmoid(Sigmoid),
    Relu(Relu),
    Tanh(Tanh),
}

impl ActFn {
    pub fn sigmoid(amp: f32) -> Self {
        Self::Sigmoid(Sigmoid::new(amp))
    }

    pub fn relu() -> Self {
        Self::Relu(Relu::new())
    }

    pub fn tanh() -> Self {
        Self::Tanh(Tanh::new())
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.f(x),
            Self::Relu(a) => a.f(x),
            Self::Tanh(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.df(x),
            Self::Relu(a) => a.df(x),
            Self::Tanh(a) => a.df(x),
        }
    }

    /// Returns the serializable specification of this activation.
    pub fn spec(&self) -> ActFnSpec {
        match self {
            Self::Sigmoid(a) => ActFnSpec::Sigmoid { amp: a.amp() },
            Self::Relu(_) => ActFnSpec::Relu,
            Self::Tanh(_) => ActFnSpec::Tanh,
        }
    }
}

impl Default for ActFn {
    fn default() -> Self {
        Self::sigmoid(1.)
    }
}

/// The specification for the `ActFn` enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnSpec {
    Sigmoid { amp: f32 },
    Relu,
    Tanh,
}

impl Default for ActFnSpec {
    fn default() -> Self {
        Self::Sigmoid { amp: 1. }
    }
}

impl From<ActFnSpec> for ActFn {
    fn from(spec: ActFnSpec) -> Self {
        match spec {
            ActFnSpec::Sigmoid { amp } => ActFn::sigmoid(amp),
            ActFnSpec::Relu => ActFn::relu(),
            ActFnSpec::Tanh => ActFn::tanh(),
        }
    }
}
