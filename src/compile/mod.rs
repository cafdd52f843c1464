mod predictor;
mod program;

pub use predictor::Predictor;
pub use program::{Program, ProgramOp, Slot, SlotKind};
