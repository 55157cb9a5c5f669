//! The contract every process module satisfies.
//!
//! A module is one physical sub-process (interception, soil temperature, ...) evaluated
//! over every cell of the grid. Modules are wired together purely by variable name:
//! a module never knows which other module produced an input or consumes an output.
//!
//! The life of a module within a run is:
//!
//! 1. scalars are bound with [`SimulationModule::set_value`]
//! 2. input arrays are bound with [`SimulationModule::set_array`]
//! 3. output arrays are requested with [`SimulationModule::get_array`], allocating them
//! 4. [`SimulationModule::execute`] is called once per time step
//!
//! [`SimulationModule::definitions`] is the dispatch table of a module. The
//! [`ModulePipeline`](crate::pipeline::ModulePipeline) uses it to order modules and to
//! reject unknown variable names before any step is run.

use crate::errors::{CellflowError, CellflowResult};
use crate::grid::{FloatValue, OwnedGrid, SharedGrid};
use crate::time::StepContext;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequirementType {
    /// A scalar parameter, bound with `set_value`
    Parameter,
    /// An array read by the module, bound with `set_array`
    Input,
    /// An array owned and written by the module, read with `get_array`
    Output,
}

/// Declaration of one name a module accepts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequirementDefinition {
    pub name: String,
    pub unit: String,
    pub requirement_type: RequirementType,
}

impl RequirementDefinition {
    pub fn new(name: &str, unit: &str, requirement_type: RequirementType) -> Self {
        Self {
            name: name.to_string(),
            unit: unit.to_string(),
            requirement_type,
        }
    }

    pub fn parameter(name: &str, unit: &str) -> Self {
        Self::new(name, unit, RequirementType::Parameter)
    }

    pub fn input(name: &str, unit: &str) -> Self {
        Self::new(name, unit, RequirementType::Input)
    }

    pub fn output(name: &str, unit: &str) -> Self {
        Self::new(name, unit, RequirementType::Output)
    }
}

/// A process module evaluated over every cell of the grid
pub trait SimulationModule: Debug + Send + Sync {
    /// Module class tag, e.g. `PI_MCS`
    fn id(&self) -> &str;

    /// Every parameter, input and output name this module accepts
    fn definitions(&self) -> Vec<RequirementDefinition>;

    /// Bind one scalar parameter
    fn set_value(&mut self, key: &str, value: FloatValue) -> CellflowResult<()>;

    /// Bind one input array
    ///
    /// Implementations first check the size of `data` with [`CellCount::check`].
    fn set_array(&mut self, key: &str, data: SharedGrid) -> CellflowResult<()>;

    /// Get a handle to one of the arrays owned by this module
    ///
    /// Allocates any output that does not exist yet. Calling this more than once returns
    /// handles to the same storage.
    fn get_array(&mut self, key: &str) -> CellflowResult<SharedGrid>;

    /// Check that every required input is bound and every parameter is within range
    fn check_input_data(&self) -> CellflowResult<()>;

    /// Update every cell for one time step
    fn execute(&mut self, step: &StepContext) -> CellflowResult<()>;

    /// Names of the inputs
    fn input_names(&self) -> Vec<String> {
        self.names_of(RequirementType::Input)
    }

    /// Names of the outputs
    fn output_names(&self) -> Vec<String> {
        self.names_of(RequirementType::Output)
    }

    fn parameter_names(&self) -> Vec<String> {
        self.names_of(RequirementType::Parameter)
    }

    fn names_of(&self, requirement_type: RequirementType) -> Vec<String> {
        self.definitions()
            .into_iter()
            .filter(|d| d.requirement_type == requirement_type)
            .map(|d| d.name)
            .collect()
    }
}

/// Serializable settings that build a module
///
/// Implementations are registered under the module class tag, which lets a run
/// configuration list heterogeneous modules, e.g. `{ type = "PI_MCS", ... }`.
#[typetag::serde(tag = "type")]
pub trait ModuleConfig: Debug {
    fn build(&self) -> Box<dyn SimulationModule>;
}

/// The cell count of a module
///
/// Unset until the first array is bound, after which every array must match it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellCount(Option<usize>);

impl CellCount {
    pub fn get(&self) -> Option<usize> {
        self.0
    }

    /// Check the size of an array bound to `key`, adopting it if no size is established
    pub fn check(&mut self, module: &str, key: &str, n: usize) -> CellflowResult<usize> {
        if n == 0 {
            return Err(CellflowError::InvalidSize {
                module: module.to_string(),
                name: key.to_string(),
            });
        }
        match self.0 {
            None => {
                self.0 = Some(n);
                Ok(n)
            }
            Some(expected) if expected == n => Ok(n),
            Some(expected) => Err(CellflowError::InconsistentSize {
                module: module.to_string(),
                name: key.to_string(),
                expected,
                actual: n,
            }),
        }
    }

    /// The established cell count, failing if no array has been bound yet
    pub fn require(&self, module: &str) -> CellflowResult<usize> {
        self.0.ok_or_else(|| CellflowError::MissingInput {
            module: module.to_string(),
            name: "cell count".to_string(),
        })
    }
}

/// Allocate `grid` with `n_cells` copies of `value` if it does not exist yet
pub fn initialize_output(grid: &mut Option<OwnedGrid>, n_cells: usize, value: FloatValue) {
    if grid.is_none() {
        *grid = Some(OwnedGrid::filled(n_cells, value));
    }
}

/// Share an allocated output, or report that `key` has not been initialised
pub fn share_output(grid: &Option<OwnedGrid>, module: &str, key: &str) -> CellflowResult<SharedGrid> {
    grid.as_ref()
        .map(OwnedGrid::share)
        .ok_or_else(|| CellflowError::unknown_result(module, key))
}

/// Get an allocated output for writing
pub fn require_output<'a>(
    grid: &'a mut Option<OwnedGrid>,
    module: &str,
    key: &str,
) -> CellflowResult<&'a mut OwnedGrid> {
    grid.as_mut()
        .ok_or_else(|| CellflowError::unknown_result(module, key))
}

/// Get a bound input, failing with [`CellflowError::MissingInput`] if it is unset
pub fn require_input<'a>(
    input: &'a Option<SharedGrid>,
    module: &str,
    key: &str,
) -> CellflowResult<&'a SharedGrid> {
    input
        .as_ref()
        .ok_or_else(|| CellflowError::missing_input(module, key))
}

/// Get a bound scalar, failing with [`CellflowError::MissingInput`] if it is unset
pub fn require_value(value: Option<FloatValue>, module: &str, key: &str) -> CellflowResult<FloatValue> {
    value.ok_or_else(|| CellflowError::missing_input(module, key))
}

/// Check that `value` lies within `[min, max]`
pub fn check_range(
    module: &str,
    key: &str,
    value: FloatValue,
    min: FloatValue,
    max: FloatValue,
) -> CellflowResult<()> {
    if value.is_nan() || value < min || value > max {
        return Err(CellflowError::Range {
            module: module.to_string(),
            name: key.to_string(),
            value,
            min,
            max,
        });
    }
    Ok(())
}
