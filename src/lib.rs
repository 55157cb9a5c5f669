//! Cell based environmental process simulation.
//!
//! Independent process modules are wired together by variable name into a pipeline that
//! is executed once per time step over every cell of a grid. Selected variables are
//! aggregated over time and emitted on their own schedule.
//!
//! ```no_run
//! use cellflow::{Forcings, RunConfig, Simulation};
//!
//! let config = RunConfig::from_file("run.toml")?;
//! let forcings = Forcings::new().with("D_P", "mm", vec![0.0; 100]);
//! let mut simulation = Simulation::from_config(&config, forcings)?;
//! simulation.run(|_step, forcings| forcings.set("D_P", &[1.0; 100]))?;
//! # Ok::<(), cellflow::cellflow_core::errors::CellflowError>(())
//! ```

pub mod config;
pub mod simulation;

pub use cellflow_core;
pub use cellflow_modules;

pub use config::{RunConfig, RunSection};
pub use simulation::{Forcings, Simulation};
