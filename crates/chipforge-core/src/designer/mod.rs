//! Designer: initial architecture generation and the optimization loop.

pub mod generator;
pub mod optimizer;
pub mod perturb;

pub use generator::generate_initial;
pub use optimizer::{
    Designer, IterationRecord, OptimizationSession, SessionOutcome, SessionPhase,
    TerminationReason,
};
pub use perturb::{Perturbation, PerturbationAction};
