// A/B experiments between module variants
pub mod definition;
pub mod significance;

pub use definition::{Evaluation, Experiment, ExperimentStatus, NewExperiment, Variant};
pub use significance::{ExperimentResults, SignificanceMethod};
