//! Run configuration read from TOML.
//!
//! ```toml
//! [run]
//! start = "2010-01-01"
//! end = "2010-12-31"
//! time_step = 86400
//!
//! [parameters]
//! Pi_b = 1.0
//!
//! [[modules]]
//! type = "PI_MCS"
//! mode = "long_term"
//!
//! [[outputs]]
//! mod_cls = "PI_MCS"
//! output_id = "NEPR"
//! agg_type = "SUM"
//! interval = 1
//! interval_unit = "MONTH"
//! s_time = "2010-01-01"
//! e_time = "2010-12-31"
//! use = 1
//! ```

use cellflow_core::context::RunContext;
use cellflow_core::errors::{CellflowError, CellflowResult};
use cellflow_core::grid::FloatValue;
use cellflow_core::module::{ModuleConfig, SimulationModule};
use cellflow_core::output::OrgOutItem;
use cellflow_core::time::parse_time;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

fn default_one() -> u32 {
    1
}

/// Simulation period and subbasin partitioning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSection {
    /// Number of subbasins in the watershed
    #[serde(default = "default_one")]
    pub subbasin_count: u32,
    /// Subbasin containing the outlet
    #[serde(default = "default_one")]
    pub outlet_id: u32,
    /// Subbasin simulated by this process, 0 for every subbasin
    #[serde(default)]
    pub subbasin_id: u32,
    pub start: String,
    pub end: String,
    /// Length of a time step in seconds
    pub time_step: i64,
}

impl RunSection {
    pub fn context(&self) -> CellflowResult<RunContext> {
        let start = parse_time(&self.start).ok_or_else(|| {
            CellflowError::configuration(
                "run",
                format!("start '{}' is not a valid timestamp", self.start),
            )
        })?;
        let end = parse_time(&self.end).ok_or_else(|| {
            CellflowError::configuration(
                "run",
                format!("end '{}' is not a valid timestamp", self.end),
            )
        })?;
        let time_step = Duration::try_seconds(self.time_step).ok_or_else(|| {
            CellflowError::configuration(
                "run",
                format!("time step of {} seconds is out of range", self.time_step),
            )
        })?;
        RunContext::partitioned(
            self.subbasin_count,
            self.outlet_id,
            self.subbasin_id,
            start,
            end,
            time_step,
        )
    }
}

/// Everything needed to set up a run
#[derive(Debug, Serialize, Deserialize)]
pub struct RunConfig {
    pub run: RunSection,
    /// Scalar parameters, bound to every module that declares them
    #[serde(default)]
    pub parameters: BTreeMap<String, FloatValue>,
    #[serde(default)]
    pub modules: Vec<Box<dyn ModuleConfig>>,
    /// The output item table
    #[serde(default)]
    pub outputs: Vec<OrgOutItem>,
}

impl RunConfig {
    pub fn from_toml_str(content: &str) -> CellflowResult<Self> {
        toml::from_str(content)
            .map_err(|err| CellflowError::configuration("run configuration", err.to_string()))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> CellflowResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> CellflowResult<String> {
        toml::to_string(self)
            .map_err(|err| CellflowError::configuration("run configuration", err.to_string()))
    }

    /// Create a fresh instance of every configured module
    pub fn build_modules(&self) -> Vec<Box<dyn SimulationModule>> {
        self.modules.iter().map(|config| config.build()).collect()
    }
}
