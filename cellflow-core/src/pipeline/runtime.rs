//! Pipeline runtime for executing modules.

use crate::errors::{CellflowError, CellflowResult};
use crate::grid::SharedGrid;
use crate::module::{RequirementDefinition, SimulationModule};
use crate::store::VariableStore;
use crate::time::StepContext;
use petgraph::dot::{Config, Dot};
use petgraph::Graph;
use tracing::error;

/// Module dependency graph, nodes are module ids and edges the variables passed between them
pub type ModuleGraph = Graph<String, RequirementDefinition>;

/// A set of bound modules that are executed in dependency order on every time step.
///
/// For example, an interception module produces net precipitation which a runoff module
/// consumes. The runoff module is executed after the interception module, reading the
/// array the interception module wrote earlier in the same step.
/// The pipeline holds no per-cell state, it only sequences the modules.
#[derive(Debug)]
pub struct ModulePipeline {
    modules: Vec<Box<dyn SimulationModule>>,
    store: VariableStore,
    graph: ModuleGraph,
}

impl ModulePipeline {
    pub(crate) fn new(
        modules: Vec<Box<dyn SimulationModule>>,
        store: VariableStore,
        graph: ModuleGraph,
    ) -> Self {
        Self {
            modules,
            store,
            graph,
        }
    }

    /// Execute every module once for the given time step
    ///
    /// Modules are executed in dependency order. The first failure aborts the step and is
    /// returned; the step is then incomplete and the run should not continue.
    pub fn step(&mut self, step: &StepContext) -> CellflowResult<()> {
        for module in self.modules.iter_mut() {
            if let Err(err) = module.execute(step) {
                error!(module = module.id(), time = %step.time, error = %err, "Module failed");
                return Err(err);
            }
        }
        Ok(())
    }

    /// All arrays bound in this pipeline
    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    /// Module ids in execution order
    pub fn module_ids(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Request an output array directly from the module that owns it
    pub fn get_array(&mut self, module_id: &str, name: &str) -> CellflowResult<SharedGrid> {
        let module = self
            .modules
            .iter_mut()
            .find(|m| m.id() == module_id)
            .ok_or_else(|| CellflowError::configuration(module_id, "no module with this id"))?;
        module.get_array(name)
    }

    /// Create a diagram that represents the module graph
    ///
    /// Useful for debugging
    pub fn as_dot(&self) -> Dot<'_, &ModuleGraph> {
        Dot::with_attr_getters(
            &self.graph,
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &|_, er| format!("label = {:?}", er.weight().name),
            &|_, (_, id)| format!("label = {:?}", id),
        )
    }
}
