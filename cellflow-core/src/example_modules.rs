//! Modules used to exercise the pipeline in tests.

use crate::errors::{CellflowError, CellflowResult};
use crate::grid::{FloatValue, OwnedGrid, SharedGrid};
use crate::module::{
    check_range, initialize_output, require_input, require_output, require_value, share_output,
    CellCount, RequirementDefinition, SimulationModule,
};
use crate::time::StepContext;
use rayon::prelude::*;

pub(crate) const PARAM_FACTOR: &str = "factor";

/// Test module which multiplies one input array by a scalar factor
///
/// The input and output names are configurable so that tests can chain several
/// instances together. A result larger than the optional limit fails the step.
#[derive(Debug)]
pub(crate) struct ScaleModule {
    id: String,
    input_name: String,
    output_name: String,
    unit: String,
    n_cells: CellCount,
    factor: Option<FloatValue>,
    limit: FloatValue,
    input: Option<SharedGrid>,
    output: Option<OwnedGrid>,
}

impl ScaleModule {
    pub fn new(id: &str, input_name: &str, output_name: &str) -> Self {
        Self {
            id: id.to_string(),
            input_name: input_name.to_string(),
            output_name: output_name.to_string(),
            unit: "mm".to_string(),
            n_cells: CellCount::default(),
            factor: None,
            limit: FloatValue::INFINITY,
            input: None,
            output: None,
        }
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = unit.to_string();
        self
    }

    pub fn with_limit(mut self, limit: FloatValue) -> Self {
        self.limit = limit;
        self
    }

    fn initial_outputs(&mut self) -> CellflowResult<()> {
        let n = self.n_cells.require(&self.id)?;
        initialize_output(&mut self.output, n, 0.0);
        Ok(())
    }
}

impl SimulationModule for ScaleModule {
    fn id(&self) -> &str {
        &self.id
    }

    fn definitions(&self) -> Vec<RequirementDefinition> {
        vec![
            RequirementDefinition::parameter(PARAM_FACTOR, "-"),
            RequirementDefinition::input(&self.input_name, &self.unit),
            RequirementDefinition::output(&self.output_name, &self.unit),
        ]
    }

    fn set_value(&mut self, key: &str, value: FloatValue) -> CellflowResult<()> {
        match key {
            PARAM_FACTOR => self.factor = Some(value),
            _ => return Err(CellflowError::unknown_parameter(&self.id, key)),
        }
        Ok(())
    }

    fn set_array(&mut self, key: &str, data: SharedGrid) -> CellflowResult<()> {
        self.n_cells.check(&self.id, key, data.len())?;
        if key == self.input_name {
            self.input = Some(data);
            Ok(())
        } else {
            Err(CellflowError::unknown_parameter(&self.id, key))
        }
    }

    fn get_array(&mut self, key: &str) -> CellflowResult<SharedGrid> {
        if key != self.output_name {
            return Err(CellflowError::unknown_result(&self.id, key));
        }
        self.initial_outputs()?;
        share_output(&self.output, &self.id, key)
    }

    fn check_input_data(&self) -> CellflowResult<()> {
        self.n_cells.require(&self.id)?;
        require_input(&self.input, &self.id, &self.input_name)?;
        let factor = require_value(self.factor, &self.id, PARAM_FACTOR)?;
        check_range(&self.id, PARAM_FACTOR, factor, 0.0, 100.0)
    }

    fn execute(&mut self, _step: &StepContext) -> CellflowResult<()> {
        self.check_input_data()?;
        self.initial_outputs()?;

        let factor = self.factor.unwrap_or_default();
        let limit = self.limit;
        let id = self.id.as_str();
        let input = require_input(&self.input, id, &self.input_name)?.read();
        require_output(&mut self.output, id, &self.output_name)?
            .write()
            .par_iter_mut()
            .zip(input.par_iter())
            .enumerate()
            .try_for_each(|(cell, (out, x))| {
                let value = x * factor;
                if value.abs() > limit {
                    return Err(CellflowError::Numerical {
                        module: id.to_string(),
                        cell,
                        message: format!("{} exceeds the limit of {}", value, limit),
                    });
                }
                *out = value;
                Ok(())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_time;
    use chrono::Duration;

    fn step() -> StepContext {
        StepContext::new(parse_time("2010-01-01").unwrap(), Duration::days(1))
    }

    #[test]
    fn scales_input() {
        let input = OwnedGrid::from_vec(vec![1.0, 2.0, 3.0]);
        let mut module = ScaleModule::new("SCALE", "X", "Y");
        module.set_value(PARAM_FACTOR, 2.0).unwrap();
        module.set_array("X", input.share()).unwrap();

        module.execute(&step()).unwrap();
        assert_eq!(module.get_array("Y").unwrap().to_vec(), vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn limit_fails_the_step() {
        let input = OwnedGrid::from_vec(vec![1.0, 5.0]);
        let mut module = ScaleModule::new("SCALE", "X", "Y").with_limit(4.0);
        module.set_value(PARAM_FACTOR, 1.0).unwrap();
        module.set_array("X", input.share()).unwrap();

        assert!(matches!(
            module.execute(&step()),
            Err(CellflowError::Numerical { cell: 1, .. })
        ));
    }

    #[test]
    fn unknown_names() {
        let mut module = ScaleModule::new("SCALE", "X", "Y");
        assert!(matches!(
            module.set_value("nope", 1.0),
            Err(CellflowError::UnknownParameter { .. })
        ));
        assert!(matches!(
            module.get_array("nope"),
            Err(CellflowError::UnknownResult { .. })
        ));
    }
}
