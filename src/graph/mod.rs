mod equation;
mod op;

pub use equation::Equation;
pub use op::{OpKind, State};
