use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The result type used in the entire crate.
pub type Result<T> = std::result::Result<T, RnnErr>;

/// The crate's error type.
#[derive(Debug)]
pub enum RnnErr {
    /// Required model matrices or hyperparameters are missing or invalid.
    Configuration(String),
    /// An operator was invoked on matrices with incompatible dimensions.
    ShapeMismatch {
        op: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },
    /// The mean training loss became not-a-number.
    Divergence { iteration: usize },
    /// Generation or compilation was requested before any graph was bound.
    NotReady,
    /// The requested feature is not implemented.
    Unsupported(&'static str),
    /// A training sequence needs at least two tokens.
    InvalidSequence { len: usize },
    EmptyDataset,
    GraphLimitExceeded { requested: usize, max: usize },
    UnknownToken(char),
    UnknownMatrix(usize),
    /// Failed to build a random distribution for the initial weights.
    Init(String),
    Json(serde_json::Error),
    Io(io::Error),
}

impl Display for RnnErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RnnErr::Configuration(msg) => write!(f, "invalid configuration: {msg}"),
            RnnErr::ShapeMismatch { op, left, right } => write!(
                f,
                "shape mismatch in {op}: left is {}x{} and right is {}x{}",
                left.0, left.1, right.0, right.1
            ),
            RnnErr::Divergence { iteration } => write!(
                f,
                "network error rate became NaN at iteration {iteration}, check the network configuration"
            ),
            RnnErr::NotReady => write!(f, "no equations bound, train or load the network first"),
            RnnErr::Unsupported(what) => write!(f, "{what} is not implemented"),
            RnnErr::InvalidSequence { len } => write!(
                f,
                "a training sequence needs at least 2 tokens, got {len}"
            ),
            RnnErr::EmptyDataset => write!(f, "the training dataset is empty"),
            RnnErr::GraphLimitExceeded { requested, max } => write!(
                f,
                "requested {requested} unrolled steps but the network allows at most {max}"
            ),
            RnnErr::UnknownToken(c) => write!(f, "the character {c:?} is not in the vocabulary"),
            RnnErr::UnknownMatrix(id) => write!(f, "there is no matrix with id {id}"),
            RnnErr::Init(msg) => write!(f, "failed to initialize weights: {msg}"),
            RnnErr::Json(e) => write!(f, "json error: {e}"),
            RnnErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for RnnErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RnnErr::Json(e) => Some(e),
            RnnErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RnnErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for RnnErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<rand_distr::uniform::Error> for RnnErr {
    fn from(value: rand_distr::uniform::Error) -> Self {
        Self::Init(value.to_string())
    }
}
