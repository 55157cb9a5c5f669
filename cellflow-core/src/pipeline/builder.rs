//! Pipeline builder for wiring modules together.

use crate::errors::{CellflowError, CellflowResult};
use crate::grid::{FloatValue, SharedGrid};
use crate::module::{RequirementDefinition, RequirementType, SimulationModule};
use crate::store::{VariableStore, EXTERNAL_OWNER};
use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use petgraph::Graph;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

use super::runtime::{ModuleGraph, ModulePipeline};
use super::validation::verify_definition;

/// An array supplied from outside of the pipeline
#[derive(Debug)]
struct ExternalVariable {
    name: String,
    unit: String,
    grid: SharedGrid,
}

/// Build a new pipeline from a set of modules.
///
/// The builder generates a graph that defines the inter-module dependencies from the
/// names each module declares. Every input must either be produced by another module
/// or supplied with [`PipelineBuilder::with_external`].
/// The graph defines the order in which modules are executed.
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    modules: Vec<Box<dyn SimulationModule>>,
    externals: Vec<ExternalVariable>,
    parameters: BTreeMap<String, FloatValue>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module with the builder
    pub fn with_module(&mut self, module: Box<dyn SimulationModule>) -> &mut Self {
        self.modules.push(module);
        self
    }

    /// Supply an array that no module produces, such as climate forcing or a parameter grid
    pub fn with_external(&mut self, name: &str, unit: &str, grid: SharedGrid) -> &mut Self {
        self.externals.push(ExternalVariable {
            name: name.to_string(),
            unit: unit.to_string(),
            grid,
        });
        self
    }

    /// Supply a scalar parameter
    ///
    /// The value is bound to every module that declares a parameter with this name.
    pub fn with_parameter(&mut self, name: &str, value: FloatValue) -> &mut Self {
        self.parameters.insert(name.to_string(), value);
        self
    }

    pub fn with_parameters<I>(&mut self, parameters: I) -> &mut Self
    where
        I: IntoIterator<Item = (String, FloatValue)>,
    {
        self.parameters.extend(parameters);
        self
    }

    /// Builds the module graph, binds every module and creates a pipeline
    ///
    /// The registered modules are moved into the pipeline.
    /// Returns an error if the module definitions are inconsistent or any module fails to
    /// bind or validate its inputs.
    pub fn build(&mut self) -> CellflowResult<ModulePipeline> {
        let modules = std::mem::take(&mut self.modules);

        let mut store = VariableStore::new();
        let mut definitions = HashMap::new();
        for external in &self.externals {
            store.insert(
                &external.name,
                EXTERNAL_OWNER,
                &external.unit,
                external.grid.clone(),
            )?;
            verify_definition(
                &mut definitions,
                &RequirementDefinition::input(&external.name, &external.unit),
                EXTERNAL_OWNER,
            )?;
        }

        let module_definitions: Vec<Vec<RequirementDefinition>> =
            modules.iter().map(|m| m.definitions()).collect();

        let mut graph: ModuleGraph = Graph::new();
        let mut seen_ids = HashSet::new();
        let nodes: Vec<NodeIndex> = modules
            .iter()
            .map(|m| {
                if !seen_ids.insert(m.id().to_string()) {
                    return Err(CellflowError::configuration(
                        m.id(),
                        "module is registered more than once",
                    ));
                }
                Ok(graph.add_node(m.id().to_string()))
            })
            .collect::<CellflowResult<_>>()?;

        // Find the producer of every output
        let mut producers: HashMap<&str, usize> = HashMap::new();
        for (index, module_defs) in module_definitions.iter().enumerate() {
            let module_id = modules[index].id();
            for output in module_defs
                .iter()
                .filter(|d| d.requirement_type == RequirementType::Output)
            {
                if store.contains(&output.name) {
                    return Err(CellflowError::configuration(
                        &output.name,
                        format!(
                            "variable is produced by module '{}' but is also supplied externally",
                            module_id
                        ),
                    ));
                }
                if let Some(&other) = producers.get(output.name.as_str()) {
                    return Err(CellflowError::configuration(
                        &output.name,
                        format!(
                            "variable is produced by both '{}' and '{}'",
                            modules[other].id(),
                            module_id
                        ),
                    ));
                }
                verify_definition(&mut definitions, output, module_id)?;
                producers.insert(output.name.as_str(), index);
            }
        }

        // Link every consumer to its producer
        for (index, module_defs) in module_definitions.iter().enumerate() {
            let module_id = modules[index].id();
            for input in module_defs
                .iter()
                .filter(|d| d.requirement_type == RequirementType::Input)
            {
                verify_definition(&mut definitions, input, module_id)?;
                match producers.get(input.name.as_str()) {
                    Some(&producer) if producer == index => {
                        return Err(CellflowError::configuration(
                            module_id,
                            format!("module reads its own output '{}'", input.name),
                        ));
                    }
                    Some(&producer) => {
                        graph.add_edge(nodes[producer], nodes[index], input.clone());
                    }
                    None if store.contains(&input.name) => {}
                    None => return Err(CellflowError::missing_input(module_id, &input.name)),
                }
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| {
            CellflowError::configuration(
                &graph[cycle.node_id()],
                "module is part of a dependency cycle",
            )
        })?;

        let mut slots: Vec<Option<Box<dyn SimulationModule>>> =
            modules.into_iter().map(Some).collect();
        let mut ordered: Vec<Box<dyn SimulationModule>> = order
            .iter()
            .filter_map(|node| slots[node.index()].take())
            .collect();
        info!(
            order = ?ordered.iter().map(|m| m.id()).collect::<Vec<_>>(),
            "Resolved module execution order"
        );

        let mut declared_parameters = HashSet::new();
        for module in ordered.iter_mut() {
            self.bind_module(module.as_mut(), &mut store, &mut declared_parameters)?;
        }

        for name in self.parameters.keys() {
            if !declared_parameters.contains(name.as_str()) {
                warn!(parameter = %name, "Parameter is not used by any module");
            }
        }

        Ok(ModulePipeline::new(ordered, store, graph))
    }

    /// Bind the parameters and inputs of one module and publish its outputs
    fn bind_module(
        &self,
        module: &mut dyn SimulationModule,
        store: &mut VariableStore,
        declared_parameters: &mut HashSet<String>,
    ) -> CellflowResult<()> {
        let id = module.id().to_string();
        let module_defs = module.definitions();

        for parameter in module_defs
            .iter()
            .filter(|d| d.requirement_type == RequirementType::Parameter)
        {
            declared_parameters.insert(parameter.name.clone());
            if let Some(value) = self.parameters.get(&parameter.name) {
                module.set_value(&parameter.name, *value)?;
            }
        }

        for input in module_defs
            .iter()
            .filter(|d| d.requirement_type == RequirementType::Input)
        {
            let grid = store
                .get(&input.name)
                .cloned()
                .ok_or_else(|| CellflowError::missing_input(&id, &input.name))?;
            module.set_array(&input.name, grid)?;
        }

        for output in module_defs
            .iter()
            .filter(|d| d.requirement_type == RequirementType::Output)
        {
            let grid = module.get_array(&output.name)?;
            store.insert(&output.name, &id, &output.unit, grid)?;
        }

        module.check_input_data()?;
        debug!(module = %id, "Bound module");
        Ok(())
    }
}
