//! Module binding and output scheduling for cell based process models.
//!
//! Process modules implement [`module::SimulationModule`] and are wired together by
//! variable name with a [`pipeline::PipelineBuilder`]. The values of selected variables
//! are aggregated over time by [`output::SettingsOutput`].

pub mod context;
pub mod errors;
#[cfg(test)]
mod example_modules;
pub mod grid;
pub mod module;
pub mod output;
pub mod pipeline;
pub mod store;
pub mod time;
