//! End to end tests of a pipeline feeding the output schedule.

use cellflow_core::context::RunContext;
use cellflow_core::errors::{CellflowError, CellflowResult};
use cellflow_core::grid::{FloatValue, OwnedGrid, SharedGrid};
use cellflow_core::module::{
    initialize_output, require_input, share_output, CellCount, RequirementDefinition,
    SimulationModule,
};
use cellflow_core::output::{OrgOutItem, SettingsOutput};
use cellflow_core::pipeline::PipelineBuilder;
use cellflow_core::time::{parse_time, StepContext};
use chrono::Duration;
use is_close::is_close;

/// Adds its input to a running total on every step
#[derive(Debug, Default)]
struct Reservoir {
    n_cells: CellCount,
    inflow: Option<SharedGrid>,
    storage: Option<OwnedGrid>,
}

impl SimulationModule for Reservoir {
    fn id(&self) -> &str {
        "RESERVOIR"
    }

    fn definitions(&self) -> Vec<RequirementDefinition> {
        vec![
            RequirementDefinition::input("inflow", "mm"),
            RequirementDefinition::output("storage", "mm"),
        ]
    }

    fn set_value(&mut self, key: &str, _value: FloatValue) -> CellflowResult<()> {
        Err(CellflowError::unknown_parameter(self.id(), key))
    }

    fn set_array(&mut self, key: &str, data: SharedGrid) -> CellflowResult<()> {
        self.n_cells.check("RESERVOIR", key, data.len())?;
        match key {
            "inflow" => self.inflow = Some(data),
            _ => return Err(CellflowError::unknown_parameter(self.id(), key)),
        }
        Ok(())
    }

    fn get_array(&mut self, key: &str) -> CellflowResult<SharedGrid> {
        let n = self.n_cells.require("RESERVOIR")?;
        initialize_output(&mut self.storage, n, 0.0);
        match key {
            "storage" => share_output(&self.storage, "RESERVOIR", key),
            _ => Err(CellflowError::unknown_result(self.id(), key)),
        }
    }

    fn check_input_data(&self) -> CellflowResult<()> {
        require_input(&self.inflow, "RESERVOIR", "inflow")?;
        Ok(())
    }

    fn execute(&mut self, _step: &StepContext) -> CellflowResult<()> {
        self.check_input_data()?;
        let n = self.n_cells.require("RESERVOIR")?;
        initialize_output(&mut self.storage, n, 0.0);
        let inflow = require_input(&self.inflow, "RESERVOIR", "inflow")?.read();
        if let Some(storage) = self.storage.as_mut() {
            storage
                .write()
                .iter_mut()
                .zip(inflow.iter())
                .for_each(|(s, i)| *s += i);
        }
        Ok(())
    }
}

fn output(output_id: &str, mod_cls: &str, agg_type: &str, interval: i32) -> OrgOutItem {
    OrgOutItem {
        mod_cls: mod_cls.to_string(),
        output_id: output_id.to_string(),
        agg_type: agg_type.to_string(),
        interval_unit: "DAY".to_string(),
        s_time: "2010-01-01".to_string(),
        e_time: "2010-01-10".to_string(),
        interval,
        use_flag: 1,
        ..OrgOutItem::default()
    }
}

fn context() -> RunContext {
    RunContext::new(
        parse_time("2010-01-01").unwrap(),
        parse_time("2010-01-10").unwrap(),
        Duration::days(1),
    )
    .unwrap()
}

#[test]
fn pipeline_values_are_aggregated() {
    let ctx = context();
    let mut inflow = OwnedGrid::filled(2, 0.0);
    let mut pipeline = PipelineBuilder::new()
        .with_module(Box::new(Reservoir::default()))
        .with_external("inflow", "mm", inflow.share())
        .build()
        .unwrap();

    let mut settings = SettingsOutput::new(
        &ctx,
        &[
            output("storage", "RESERVOIR", "INST", 5),
            output("inflow", "", "SUM", 3),
        ],
    )
    .unwrap();
    settings.bind(pipeline.store()).unwrap();

    for step in ctx.steps() {
        assert!(inflow.copy_from(&[1.0, 0.5]));
        pipeline.step(&step).unwrap();
        settings.update(&step).unwrap();
    }

    let storage = settings.get("storage").unwrap().records();
    assert_eq!(storage.len(), 2);
    assert!(is_close!(storage[0].values[0], 5.0));
    assert!(is_close!(storage[1].values[1], 5.0));

    let inflow_sum = settings.get("inflow").unwrap();
    assert_eq!(inflow_sum.records().len(), 3);
    assert!(inflow_sum
        .records()
        .iter()
        .all(|r| r.values == vec![3.0, 1.5]));
    assert_eq!(inflow_sum.pending_samples(), 1);
}

#[test]
fn output_of_wrong_module_is_rejected() {
    let ctx = context();
    let inflow = OwnedGrid::filled(2, 0.0);
    let pipeline = PipelineBuilder::new()
        .with_module(Box::new(Reservoir::default()))
        .with_external("inflow", "mm", inflow.share())
        .build()
        .unwrap();

    let mut settings =
        SettingsOutput::new(&ctx, &[output("storage", "PI_MCS", "SUM", 1)]).unwrap();
    assert!(matches!(
        settings.bind(pipeline.store()),
        Err(CellflowError::Configuration { .. })
    ));
}

#[test]
fn output_without_producer_is_rejected() {
    let ctx = context();
    let inflow = OwnedGrid::filled(2, 0.0);
    let pipeline = PipelineBuilder::new()
        .with_module(Box::new(Reservoir::default()))
        .with_external("inflow", "mm", inflow.share())
        .build()
        .unwrap();

    let mut settings = SettingsOutput::new(&ctx, &[output("runoff", "", "SUM", 1)]).unwrap();
    assert!(settings.bind(pipeline.store()).is_err());
}
