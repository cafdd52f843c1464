mod optimizer;
mod rms_prop;
mod stats;

pub use optimizer::Optimizer;
pub use rms_prop::RmsProp;
pub use stats::StepStats;
