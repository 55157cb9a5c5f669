//! Soil temperature with the Finn Plauborg method, `STP_FP`.
//!
//! The temperature at 10 cm depth is a regression on the mean air temperature of the
//! current and the two previous days plus a seasonal term:
//!
//! $$ T_{10} = a_0 + a_1 T_{d-2} + a_2 T_{d-1} + a_3 T_d + b_1 \sin w + d_1 \cos w + b_2 \sin 2w + d_2 \cos 2w $$
//!
//! With $w = 2\pi d / 365$. The soil temperature is then $T_{10} k_{soil10} + f_{10}$,
//! with $f_{10}$ the temperature of the soil relative to short grass.
//! Water bodies take the air temperature.

use cellflow_core::errors::{CellflowError, CellflowResult};
use cellflow_core::grid::{FloatValue, OwnedGrid, SharedGrid};
use cellflow_core::module::{
    initialize_output, require_input, require_output, require_value, share_output, CellCount,
    ModuleConfig, RequirementDefinition, SimulationModule,
};
use cellflow_core::time::StepContext;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

use crate::variables::*;

pub const MODULE_ID: &str = "STP_FP";

/// Plausible range of soil temperatures in degrees Celsius
const SOIL_TEMPERATURE_RANGE: (FloatValue, FloatValue) = (-90.0, 60.0);

const COEFFICIENT_NAMES: [&str; 9] = [
    VAR_SOIL_TA0,
    VAR_SOIL_TA1,
    VAR_SOIL_TA2,
    VAR_SOIL_TA3,
    VAR_SOIL_TB1,
    VAR_SOIL_TB2,
    VAR_SOIL_TD1,
    VAR_SOIL_TD2,
    VAR_K_SOIL10,
];

/// Coefficients of the Finn Plauborg regression
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinnPlauborg {
    pub a0: FloatValue,
    pub a1: FloatValue,
    pub a2: FloatValue,
    pub a3: FloatValue,
    pub b1: FloatValue,
    pub b2: FloatValue,
    pub d1: FloatValue,
    pub d2: FloatValue,
    /// Ratio between the temperature at 10 cm and the mean soil temperature
    pub k_soil10: FloatValue,
}

impl FinnPlauborg {
    /// Soil temperature at 10 cm from the air temperatures of today (`t`),
    /// yesterday (`t1`) and the day before (`t2`)
    pub fn temperature_10cm(
        &self,
        t: FloatValue,
        t1: FloatValue,
        t2: FloatValue,
        day_of_year: FloatValue,
    ) -> FloatValue {
        let w = 2.0 * PI / 365.0 * day_of_year;
        self.a0
            + self.a1 * t2
            + self.a2 * t1
            + self.a3 * t
            + self.b1 * w.sin()
            + self.d1 * w.cos()
            + self.b2 * (2.0 * w).sin()
            + self.d2 * (2.0 * w).cos()
    }

    pub fn soil_temperature(
        &self,
        t: FloatValue,
        t1: FloatValue,
        t2: FloatValue,
        relative_factor: FloatValue,
        day_of_year: FloatValue,
    ) -> FloatValue {
        self.temperature_10cm(t, t1, t2, day_of_year) * self.k_soil10 + relative_factor
    }
}

/// Finn Plauborg soil temperature module
#[derive(Debug, Default)]
pub struct SoilTemperature {
    n_cells: CellCount,
    coefficients: [Option<FloatValue>; 9],
    mean_temperature: Option<SharedGrid>,
    relative_factor: Option<SharedGrid>,
    landuse: Option<SharedGrid>,
    soil_temperature: Option<OwnedGrid>,
    previous_temperature: Option<OwnedGrid>,
    previous_temperature_2: Option<OwnedGrid>,
    seeded: bool,
}

impl SoilTemperature {
    pub fn new() -> Self {
        Self::default()
    }

    fn initial_outputs(&mut self) -> CellflowResult<()> {
        let n = self.n_cells.require(MODULE_ID)?;
        initialize_output(&mut self.soil_temperature, n, 0.0);
        initialize_output(&mut self.previous_temperature, n, 0.0);
        initialize_output(&mut self.previous_temperature_2, n, 0.0);
        Ok(())
    }

    fn regression(&self) -> CellflowResult<FinnPlauborg> {
        let c = |i: usize| require_value(self.coefficients[i], MODULE_ID, COEFFICIENT_NAMES[i]);
        Ok(FinnPlauborg {
            a0: c(0)?,
            a1: c(1)?,
            a2: c(2)?,
            a3: c(3)?,
            b1: c(4)?,
            b2: c(5)?,
            d1: c(6)?,
            d2: c(7)?,
            k_soil10: c(8)?,
        })
    }

    /// Start the temperature history from the current day
    fn seed_history(&mut self) -> CellflowResult<()> {
        let current = require_input(&self.mean_temperature, MODULE_ID, VAR_TMEAN)?.read();
        require_output(&mut self.previous_temperature, MODULE_ID, VAR_TMEAN1)?
            .write()
            .copy_from_slice(&current);
        require_output(&mut self.previous_temperature_2, MODULE_ID, VAR_TMEAN2)?
            .write()
            .copy_from_slice(&current);
        self.seeded = true;
        debug!(module = MODULE_ID, "Seeded air temperature history");
        Ok(())
    }
}

impl SimulationModule for SoilTemperature {
    fn id(&self) -> &str {
        MODULE_ID
    }

    fn definitions(&self) -> Vec<RequirementDefinition> {
        let mut definitions: Vec<RequirementDefinition> = COEFFICIENT_NAMES
            .iter()
            .map(|name| RequirementDefinition::parameter(name, UNIT_DIMENSIONLESS))
            .collect();
        definitions.extend([
            RequirementDefinition::input(VAR_TMEAN, UNIT_CELSIUS),
            RequirementDefinition::input(VAR_SOIL_T10, UNIT_CELSIUS),
            RequirementDefinition::input(VAR_LANDUSE, UNIT_DIMENSIONLESS),
            RequirementDefinition::output(VAR_SOTE, UNIT_CELSIUS),
            RequirementDefinition::output(VAR_TMEAN1, UNIT_CELSIUS),
            RequirementDefinition::output(VAR_TMEAN2, UNIT_CELSIUS),
        ]);
        definitions
    }

    fn set_value(&mut self, key: &str, value: FloatValue) -> CellflowResult<()> {
        let index = COEFFICIENT_NAMES
            .iter()
            .position(|name| *name == key)
            .ok_or_else(|| CellflowError::unknown_parameter(MODULE_ID, key))?;
        self.coefficients[index] = Some(value);
        Ok(())
    }

    fn set_array(&mut self, key: &str, data: SharedGrid) -> CellflowResult<()> {
        self.n_cells.check(MODULE_ID, key, data.len())?;
        match key {
            VAR_TMEAN => self.mean_temperature = Some(data),
            VAR_SOIL_T10 => self.relative_factor = Some(data),
            VAR_LANDUSE => self.landuse = Some(data),
            _ => return Err(CellflowError::unknown_parameter(MODULE_ID, key)),
        }
        Ok(())
    }

    fn get_array(&mut self, key: &str) -> CellflowResult<SharedGrid> {
        if !matches!(key, VAR_SOTE | VAR_TMEAN1 | VAR_TMEAN2) {
            return Err(CellflowError::unknown_result(MODULE_ID, key));
        }
        self.initial_outputs()?;
        match key {
            VAR_SOTE => share_output(&self.soil_temperature, MODULE_ID, key),
            VAR_TMEAN1 => share_output(&self.previous_temperature, MODULE_ID, key),
            VAR_TMEAN2 => share_output(&self.previous_temperature_2, MODULE_ID, key),
            _ => Err(CellflowError::unknown_result(MODULE_ID, key)),
        }
    }

    fn check_input_data(&self) -> CellflowResult<()> {
        self.n_cells.require(MODULE_ID)?;
        require_input(&self.mean_temperature, MODULE_ID, VAR_TMEAN)?;
        require_input(&self.relative_factor, MODULE_ID, VAR_SOIL_T10)?;
        require_input(&self.landuse, MODULE_ID, VAR_LANDUSE)?;
        self.regression()?;
        Ok(())
    }

    fn execute(&mut self, step: &StepContext) -> CellflowResult<()> {
        self.check_input_data()?;
        self.initial_outputs()?;
        if !self.seeded {
            self.seed_history()?;
        }

        let regression = self.regression()?;
        let day_of_year = step.day_of_year() as FloatValue;
        let (min, max) = SOIL_TEMPERATURE_RANGE;

        let air = require_input(&self.mean_temperature, MODULE_ID, VAR_TMEAN)?.read();
        let relative = require_input(&self.relative_factor, MODULE_ID, VAR_SOIL_T10)?.read();
        let landuse = require_input(&self.landuse, MODULE_ID, VAR_LANDUSE)?.read();
        let (air, relative, landuse): (&[FloatValue], &[FloatValue], &[FloatValue]) =
            (&air, &relative, &landuse);

        let mut soil = require_output(&mut self.soil_temperature, MODULE_ID, VAR_SOTE)?.write();
        let mut t1 = require_output(&mut self.previous_temperature, MODULE_ID, VAR_TMEAN1)?.write();
        let mut t2 =
            require_output(&mut self.previous_temperature_2, MODULE_ID, VAR_TMEAN2)?.write();

        soil.par_iter_mut()
            .zip(t1.par_iter_mut())
            .zip(t2.par_iter_mut())
            .enumerate()
            .try_for_each(|(i, ((soil, t1), t2))| {
                let t = air[i];
                *soil = if landuse_code(landuse[i]) == LANDUSE_ID_WATER {
                    t
                } else {
                    regression.soil_temperature(t, *t1, *t2, relative[i], day_of_year)
                };
                if soil.is_nan() || *soil < min || *soil > max {
                    return Err(CellflowError::Numerical {
                        module: MODULE_ID.to_string(),
                        cell: i,
                        message: format!(
                            "soil temperature {} is outside of [{}, {}], check the {} coefficients",
                            soil, min, max, MODULE_ID
                        ),
                    });
                }
                *t2 = *t1;
                *t1 = t;
                Ok(())
            })
    }
}

/// Settings of the `STP_FP` module in a run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoilTemperatureConfig {}

#[typetag::serde(name = "STP_FP")]
impl ModuleConfig for SoilTemperatureConfig {
    fn build(&self) -> Box<dyn SimulationModule> {
        Box::new(SoilTemperature::new())
    }
}
