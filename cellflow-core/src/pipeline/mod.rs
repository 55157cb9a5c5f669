//! A pipeline consists of a series of process modules which are executed together.
//!
//! The pipeline orders modules so that every producer of a variable is executed before
//! any consumer of that variable, binds every module's inputs to the arrays produced by
//! earlier modules (or supplied from outside), and then drives one execution pass per
//! time step.
//!
//! All wiring is validated when the pipeline is built: unknown names, missing inputs,
//! duplicated producers, dependency cycles and inconsistent cell counts are reported
//! before any time step runs.

mod builder;
mod runtime;
mod validation;

pub use builder::PipelineBuilder;
pub use runtime::ModulePipeline;
