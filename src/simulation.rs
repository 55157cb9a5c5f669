//! The time stepping loop of a run.

use cellflow_core::context::RunContext;
use cellflow_core::errors::{CellflowError, CellflowResult};
use cellflow_core::grid::{FloatValue, OwnedGrid};
use cellflow_core::output::SettingsOutput;
use cellflow_core::pipeline::{ModulePipeline, PipelineBuilder};
use cellflow_core::store::EXTERNAL_OWNER;
use cellflow_core::time::{format_time, StepContext, Time};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::RunConfig;

#[derive(Debug)]
struct Forcing {
    unit: String,
    grid: OwnedGrid,
}

/// Arrays supplied to the pipeline from outside, such as climate data or cell properties
///
/// The simulation holds the only writable handle of each array. Values are replaced
/// before each step through [`Forcings::set`].
#[derive(Debug, Default)]
pub struct Forcings {
    arrays: BTreeMap<String, Forcing>,
}

impl Forcings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an array under `name`
    pub fn with(mut self, name: &str, unit: &str, values: Vec<FloatValue>) -> Self {
        self.insert(name, unit, values);
        self
    }

    /// Add or replace the array under `name`
    pub fn insert(&mut self, name: &str, unit: &str, values: Vec<FloatValue>) {
        self.arrays.insert(
            name.to_string(),
            Forcing {
                unit: unit.to_string(),
                grid: OwnedGrid::from_vec(values),
            },
        );
    }

    /// Overwrite the values of an existing array
    pub fn set(&mut self, name: &str, values: &[FloatValue]) -> CellflowResult<()> {
        let forcing = self.arrays.get_mut(name).ok_or_else(|| {
            CellflowError::configuration(name, "no forcing array with this name")
        })?;
        let expected = forcing.grid.len();
        if !forcing.grid.copy_from(values) {
            return Err(CellflowError::InconsistentSize {
                module: EXTERNAL_OWNER.to_string(),
                name: name.to_string(),
                expected,
                actual: values.len(),
            });
        }
        Ok(())
    }

    /// Writable handle of an array, for in-place updates
    pub fn get_mut(&mut self, name: &str) -> Option<&mut OwnedGrid> {
        self.arrays.get_mut(name).map(|forcing| &mut forcing.grid)
    }

    pub fn get(&self, name: &str) -> Option<&OwnedGrid> {
        self.arrays.get(name).map(|forcing| &forcing.grid)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(|name| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    fn register(&self, builder: &mut PipelineBuilder) {
        for (name, forcing) in &self.arrays {
            builder.with_external(name, &forcing.unit, forcing.grid.share());
        }
    }
}

/// A configured run: the module pipeline, its forcings and the output schedule
///
/// Each call to [`Simulation::step`] lets the caller update the forcings, executes every
/// module once and then updates the outputs. Flushed records stay in
/// [`Simulation::outputs`] until the caller takes them.
#[derive(Debug)]
pub struct Simulation {
    context: RunContext,
    pipeline: ModulePipeline,
    outputs: SettingsOutput,
    forcings: Forcings,
    next_time: Option<Time>,
}

impl Simulation {
    /// Assemble a run from its parts
    ///
    /// Checks every output window against the simulation period and binds each output
    /// to the variable it reports.
    pub fn new(
        context: RunContext,
        pipeline: ModulePipeline,
        mut outputs: SettingsOutput,
        forcings: Forcings,
    ) -> CellflowResult<Self> {
        outputs.check_date(context.start, context.end)?;
        outputs.bind(pipeline.store())?;
        let next_time = Some(context.start);
        Ok(Self {
            context,
            pipeline,
            outputs,
            forcings,
            next_time,
        })
    }

    /// Build the modules, pipeline and output schedule described by `config`
    pub fn from_config(config: &RunConfig, forcings: Forcings) -> CellflowResult<Self> {
        let context = config.run.context()?;

        let mut builder = PipelineBuilder::new();
        for module in config.build_modules() {
            builder.with_module(module);
        }
        forcings.register(&mut builder);
        builder.with_parameters(config.parameters.clone());
        let pipeline = builder.build()?;

        let outputs = SettingsOutput::new(&context, &config.outputs)?;
        Self::new(context, pipeline, outputs, forcings)
    }

    /// Advance the simulation by one step
    ///
    /// `update_forcings` is called with the step about to run. Returns the step that was
    /// run, or `None` once the end of the simulation period has been passed.
    pub fn step<F>(&mut self, mut update_forcings: F) -> CellflowResult<Option<StepContext>>
    where
        F: FnMut(&StepContext, &mut Forcings) -> CellflowResult<()>,
    {
        let time = match self.next_time {
            Some(time) if self.context.contains(&time) => time,
            _ => return Ok(None),
        };
        let step = StepContext::new(time, self.context.time_step);

        update_forcings(&step, &mut self.forcings)?;
        self.pipeline.step(&step)?;
        self.outputs.update(&step)?;

        debug!(time = %format_time(&time), "Completed step");
        self.next_time = time.checked_add_signed(self.context.time_step);
        Ok(Some(step))
    }

    /// Run every remaining step of the simulation period
    ///
    /// Returns the number of steps run.
    pub fn run<F>(&mut self, mut update_forcings: F) -> CellflowResult<usize>
    where
        F: FnMut(&StepContext, &mut Forcings) -> CellflowResult<()>,
    {
        info!(
            start = %format_time(&self.context.start),
            end = %format_time(&self.context.end),
            modules = ?self.pipeline.module_ids(),
            "Starting simulation"
        );
        let mut n_steps = 0;
        while self.step(&mut update_forcings)?.is_some() {
            n_steps += 1;
        }
        info!(steps = n_steps, "Simulation finished");
        Ok(n_steps)
    }

    /// Test if every step of the simulation period has been run
    pub fn is_finished(&self) -> bool {
        !matches!(self.next_time, Some(time) if self.context.contains(&time))
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    pub fn pipeline(&self) -> &ModulePipeline {
        &self.pipeline
    }

    pub fn outputs(&self) -> &SettingsOutput {
        &self.outputs
    }

    pub fn outputs_mut(&mut self) -> &mut SettingsOutput {
        &mut self.outputs
    }

    pub fn forcings(&self) -> &Forcings {
        &self.forcings
    }
}
