//! Process modules for the cellflow simulator.
//!
//! Every module implements [`SimulationModule`](cellflow_core::module::SimulationModule)
//! and registers a [`ModuleConfig`](cellflow_core::module::ModuleConfig) under its
//! class tag, so a run configuration can select it with `type = "PI_MCS"`.

pub mod interception;
pub mod soil_temperature;
pub mod variables;

pub use interception::{Interception, InterceptionConfig, InterceptionMode};
pub use soil_temperature::{SoilTemperature, SoilTemperatureConfig};
