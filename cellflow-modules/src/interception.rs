//! Precipitation interception by the canopy, `PI_MCS`.
//!
//! The storage capacity of every cell follows a seasonal curve between the minimum and
//! maximum capacity of its land cover:
//!
//! $$ S_{cap} = S_{min} + (S_{max} - S_{min}) \left(0.5 + 0.5 \sin\frac{2\pi (d - 87)}{365}\right)^{b} $$
//!
//! Where $d$ is the day of the year and $b$ the capacity exponent `Pi_b`.
//! Precipitation first fills the free capacity, the remainder reaches the ground as net
//! precipitation. In the long-term mode the storage then evaporates at the potential
//! rate. The storm mode works on hillslope time steps instead, rescales precipitation to
//! the step and the cell slope, and does not evaporate.

use cellflow_core::errors::{CellflowError, CellflowResult};
use cellflow_core::grid::{FloatValue, OwnedGrid, SharedGrid};
use cellflow_core::module::{
    check_range, initialize_output, require_input, require_output, require_value,
    share_output, CellCount, ModuleConfig, RequirementDefinition, SimulationModule,
};
use cellflow_core::time::StepContext;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::variables::*;

pub const MODULE_ID: &str = "PI_MCS";

const DEFAULT_PCP_TO_CANAL_FRACTION: FloatValue = 0.5;
const DEFAULT_EMBANKMENT_FRACTION: FloatValue = 0.15;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterceptionMode {
    /// Daily steps with evaporation from the storage
    #[default]
    LongTerm,
    /// Sub-daily hillslope steps for single storm events
    Storm,
}

/// Inputs and outputs that only exist in one of the modes
#[derive(Debug)]
enum ModeData {
    LongTerm {
        pet: Option<SharedGrid>,
        evaporation: Option<OwnedGrid>,
    },
    Storm {
        slope: Option<SharedGrid>,
        hillslope_dt: Option<FloatValue>,
    },
}

/// Interception storage capacity on a given day of the year
pub fn storage_capacity(
    min: FloatValue,
    max: FloatValue,
    day_of_year: FloatValue,
    exponent: FloatValue,
) -> FloatValue {
    let degree = 2.0 * PI * (day_of_year - 87.0) / 365.0;
    min + (max - min) * (0.5 + 0.5 * degree.sin()).powf(exponent)
}

/// State of one cell after intercepting precipitation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellInterception {
    pub loss: FloatValue,
    pub net: FloatValue,
    pub storage: FloatValue,
}

/// Intercept `pcp` into a storage currently holding `storage`
///
/// `diversion` is the fraction of the precipitation routed elsewhere once the
/// storage is full, e.g. into the canals of paddy fields.
pub fn intercept(
    pcp: FloatValue,
    storage: FloatValue,
    capacity: FloatValue,
    diversion: FloatValue,
) -> CellInterception {
    if pcp <= 0.0 {
        return CellInterception {
            loss: 0.0,
            net: 0.0,
            storage,
        };
    }
    let available = (capacity - storage).max(0.0);
    let (loss, net) = if available < pcp {
        (available, pcp - available - pcp * diversion)
    } else {
        (pcp, 0.0)
    };
    CellInterception {
        loss,
        net,
        storage: storage + loss,
    }
}

/// Evaporate from the storage at the potential rate
///
/// Returns the evaporated depth and the remaining storage.
pub fn evaporate(storage: FloatValue, pet: FloatValue) -> (FloatValue, FloatValue) {
    let evaporated = storage.min(pet);
    (evaporated, storage - evaporated)
}

/// Precipitation falling within one hillslope step of `hillslope_dt` seconds,
/// spread over a cell with the given slope gradient
pub fn storm_precipitation(
    pcp: FloatValue,
    hillslope_dt: FloatValue,
    slope: FloatValue,
) -> FloatValue {
    pcp * hillslope_dt / 3600.0 * slope.atan().cos()
}

/// Scalar parameters after validation
#[derive(Debug, Clone, Copy)]
struct Coefficients {
    exponent: FloatValue,
    paddy_diversion: FloatValue,
}

impl Coefficients {
    fn diversion(&self, landuse: FloatValue) -> FloatValue {
        if landuse_code(landuse) == LANDUSE_ID_PADDY {
            self.paddy_diversion
        } else {
            0.0
        }
    }
}

/// Canopy interception module
#[derive(Debug)]
pub struct Interception {
    n_cells: CellCount,
    capacity_exponent: Option<FloatValue>,
    initial_storage: FloatValue,
    pcp_to_canal_fraction: FloatValue,
    embankment_fraction: FloatValue,
    precipitation: Option<SharedGrid>,
    max_capacity: Option<SharedGrid>,
    min_capacity: Option<SharedGrid>,
    landuse: Option<SharedGrid>,
    mode: ModeData,
    loss: Option<OwnedGrid>,
    net_precipitation: Option<OwnedGrid>,
    storage: Option<OwnedGrid>,
}

impl Interception {
    pub fn new(mode: InterceptionMode) -> Self {
        let mode = match mode {
            InterceptionMode::LongTerm => ModeData::LongTerm {
                pet: None,
                evaporation: None,
            },
            InterceptionMode::Storm => ModeData::Storm {
                slope: None,
                hillslope_dt: None,
            },
        };
        Self {
            n_cells: CellCount::default(),
            capacity_exponent: None,
            initial_storage: 0.0,
            pcp_to_canal_fraction: DEFAULT_PCP_TO_CANAL_FRACTION,
            embankment_fraction: DEFAULT_EMBANKMENT_FRACTION,
            precipitation: None,
            max_capacity: None,
            min_capacity: None,
            landuse: None,
            mode,
            loss: None,
            net_precipitation: None,
            storage: None,
        }
    }

    pub fn mode(&self) -> InterceptionMode {
        match self.mode {
            ModeData::LongTerm { .. } => InterceptionMode::LongTerm,
            ModeData::Storm { .. } => InterceptionMode::Storm,
        }
    }

    fn initial_outputs(&mut self) -> CellflowResult<()> {
        let n = self.n_cells.require(MODULE_ID)?;
        initialize_output(&mut self.storage, n, self.initial_storage);
        initialize_output(&mut self.net_precipitation, n, 0.0);
        initialize_output(&mut self.loss, n, 0.0);
        if let ModeData::LongTerm { evaporation, .. } = &mut self.mode {
            initialize_output(evaporation, n, 0.0);
        }
        Ok(())
    }

    fn coefficients(&self) -> CellflowResult<Coefficients> {
        Ok(Coefficients {
            exponent: require_value(self.capacity_exponent, MODULE_ID, VAR_PI_B)?,
            paddy_diversion: self.pcp_to_canal_fraction * self.embankment_fraction,
        })
    }
}

impl SimulationModule for Interception {
    fn id(&self) -> &str {
        MODULE_ID
    }

    fn definitions(&self) -> Vec<RequirementDefinition> {
        let mut definitions = vec![
            RequirementDefinition::parameter(VAR_PI_B, UNIT_DIMENSIONLESS),
            RequirementDefinition::parameter(VAR_INIT_IS, UNIT_MM),
            RequirementDefinition::parameter(VAR_PCP2CANFR_PR, UNIT_DIMENSIONLESS),
            RequirementDefinition::parameter(VAR_EMBNKFR_PR, UNIT_DIMENSIONLESS),
            RequirementDefinition::input(VAR_PCP, UNIT_MM),
            RequirementDefinition::input(VAR_INTERC_MAX, UNIT_MM),
            RequirementDefinition::input(VAR_INTERC_MIN, UNIT_MM),
            RequirementDefinition::input(VAR_LANDUSE, UNIT_DIMENSIONLESS),
            RequirementDefinition::output(VAR_INLO, UNIT_MM),
            RequirementDefinition::output(VAR_NEPR, UNIT_MM),
            RequirementDefinition::output(VAR_CANSTOR, UNIT_MM),
        ];
        match self.mode {
            ModeData::LongTerm { .. } => {
                definitions.push(RequirementDefinition::input(VAR_PET, UNIT_MM));
                definitions.push(RequirementDefinition::output(VAR_INET, UNIT_MM));
            }
            ModeData::Storm { .. } => {
                definitions.push(RequirementDefinition::parameter(
                    VAR_HILLSLOPE_DT,
                    UNIT_SECONDS,
                ));
                definitions.push(RequirementDefinition::input(VAR_SLOPE, UNIT_DIMENSIONLESS));
            }
        }
        definitions
    }

    fn set_value(&mut self, key: &str, value: FloatValue) -> CellflowResult<()> {
        match (key, &mut self.mode) {
            (VAR_PI_B, _) => self.capacity_exponent = Some(value),
            (VAR_INIT_IS, _) => self.initial_storage = value,
            (VAR_PCP2CANFR_PR, _) => self.pcp_to_canal_fraction = value,
            (VAR_EMBNKFR_PR, _) => self.embankment_fraction = value,
            (VAR_HILLSLOPE_DT, ModeData::Storm { hillslope_dt, .. }) => {
                *hillslope_dt = Some(value)
            }
            _ => return Err(CellflowError::unknown_parameter(MODULE_ID, key)),
        }
        Ok(())
    }

    fn set_array(&mut self, key: &str, data: SharedGrid) -> CellflowResult<()> {
        self.n_cells.check(MODULE_ID, key, data.len())?;
        match (key, &mut self.mode) {
            (VAR_PCP, _) => self.precipitation = Some(data),
            (VAR_INTERC_MAX, _) => self.max_capacity = Some(data),
            (VAR_INTERC_MIN, _) => self.min_capacity = Some(data),
            (VAR_LANDUSE, _) => self.landuse = Some(data),
            (VAR_PET, ModeData::LongTerm { pet, .. }) => *pet = Some(data),
            (VAR_SLOPE, ModeData::Storm { slope, .. }) => *slope = Some(data),
            _ => return Err(CellflowError::unknown_parameter(MODULE_ID, key)),
        }
        Ok(())
    }

    fn get_array(&mut self, key: &str) -> CellflowResult<SharedGrid> {
        let known = matches!(
            (key, &self.mode),
            (VAR_INLO | VAR_NEPR | VAR_CANSTOR, _) | (VAR_INET, ModeData::LongTerm { .. })
        );
        if !known {
            return Err(CellflowError::unknown_result(MODULE_ID, key));
        }
        self.initial_outputs()?;
        match (key, &self.mode) {
            (VAR_INLO, _) => share_output(&self.loss, MODULE_ID, key),
            (VAR_NEPR, _) => share_output(&self.net_precipitation, MODULE_ID, key),
            (VAR_CANSTOR, _) => share_output(&self.storage, MODULE_ID, key),
            (VAR_INET, ModeData::LongTerm { evaporation, .. }) => {
                share_output(evaporation, MODULE_ID, key)
            }
            _ => Err(CellflowError::unknown_result(MODULE_ID, key)),
        }
    }

    fn check_input_data(&self) -> CellflowResult<()> {
        self.n_cells.require(MODULE_ID)?;
        require_input(&self.precipitation, MODULE_ID, VAR_PCP)?;
        require_input(&self.max_capacity, MODULE_ID, VAR_INTERC_MAX)?;
        require_input(&self.min_capacity, MODULE_ID, VAR_INTERC_MIN)?;
        require_input(&self.landuse, MODULE_ID, VAR_LANDUSE)?;
        match &self.mode {
            ModeData::LongTerm { pet, .. } => {
                require_input(pet, MODULE_ID, VAR_PET)?;
            }
            ModeData::Storm {
                slope,
                hillslope_dt,
            } => {
                require_input(slope, MODULE_ID, VAR_SLOPE)?;
                let dt = require_value(*hillslope_dt, MODULE_ID, VAR_HILLSLOPE_DT)?;
                if dt.is_nan() || dt <= 0.0 {
                    return Err(CellflowError::Range {
                        module: MODULE_ID.to_string(),
                        name: VAR_HILLSLOPE_DT.to_string(),
                        value: dt,
                        min: 0.0,
                        max: f64::INFINITY,
                    });
                }
            }
        }

        let exponent = require_value(self.capacity_exponent, MODULE_ID, VAR_PI_B)?;
        check_range(MODULE_ID, VAR_PI_B, exponent, 0.5, 1.5)?;
        check_range(MODULE_ID, VAR_INIT_IS, self.initial_storage, 0.0, 1.0)?;
        check_range(
            MODULE_ID,
            VAR_PCP2CANFR_PR,
            self.pcp_to_canal_fraction,
            0.0,
            1.0,
        )?;
        check_range(MODULE_ID, VAR_EMBNKFR_PR, self.embankment_fraction, 0.0, 1.0)
    }

    fn execute(&mut self, step: &StepContext) -> CellflowResult<()> {
        self.check_input_data()?;
        self.initial_outputs()?;

        let coefficients = self.coefficients()?;
        let day_of_year = step.day_of_year() as FloatValue;

        let pcp = require_input(&self.precipitation, MODULE_ID, VAR_PCP)?.read();
        let max = require_input(&self.max_capacity, MODULE_ID, VAR_INTERC_MAX)?.read();
        let min = require_input(&self.min_capacity, MODULE_ID, VAR_INTERC_MIN)?.read();
        let landuse = require_input(&self.landuse, MODULE_ID, VAR_LANDUSE)?.read();
        let (pcp, max, min, landuse): (&[FloatValue], &[FloatValue], &[FloatValue], &[FloatValue]) =
            (&pcp, &max, &min, &landuse);

        let mut loss = require_output(&mut self.loss, MODULE_ID, VAR_INLO)?.write();
        let mut net = require_output(&mut self.net_precipitation, MODULE_ID, VAR_NEPR)?.write();
        let mut storage = require_output(&mut self.storage, MODULE_ID, VAR_CANSTOR)?.write();

        let cells = loss
            .par_iter_mut()
            .zip(net.par_iter_mut())
            .zip(storage.par_iter_mut())
            .enumerate();

        match &mut self.mode {
            ModeData::LongTerm { pet, evaporation } => {
                let pet = require_input(pet, MODULE_ID, VAR_PET)?.read();
                let pet: &[FloatValue] = &pet;
                let mut evaporation = require_output(evaporation, MODULE_ID, VAR_INET)?.write();
                cells.zip(evaporation.par_iter_mut()).for_each(
                    |((i, ((loss, net), storage)), evaporated)| {
                        let capacity =
                            storage_capacity(min[i], max[i], day_of_year, coefficients.exponent);
                        let cell = intercept(
                            pcp[i],
                            *storage,
                            capacity,
                            coefficients.diversion(landuse[i]),
                        );
                        let (et, remaining) = evaporate(cell.storage, pet[i]);
                        *loss = cell.loss;
                        *net = cell.net;
                        *evaporated = et;
                        *storage = remaining;
                    },
                );
            }
            ModeData::Storm {
                slope,
                hillslope_dt,
            } => {
                let dt = require_value(*hillslope_dt, MODULE_ID, VAR_HILLSLOPE_DT)?;
                let slope = require_input(slope, MODULE_ID, VAR_SLOPE)?.read();
                let slope: &[FloatValue] = &slope;
                cells.for_each(|(i, ((loss, net), storage))| {
                    let capacity =
                        storage_capacity(min[i], max[i], day_of_year, coefficients.exponent);
                    let cell = intercept(
                        storm_precipitation(pcp[i], dt, slope[i]),
                        *storage,
                        capacity,
                        coefficients.diversion(landuse[i]),
                    );
                    *loss = cell.loss;
                    *net = cell.net;
                    *storage = cell.storage;
                });
            }
        }
        Ok(())
    }
}

/// Settings of the `PI_MCS` module in a run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterceptionConfig {
    #[serde(default)]
    pub mode: InterceptionMode,
}

#[typetag::serde(name = "PI_MCS")]
impl ModuleConfig for InterceptionConfig {
    fn build(&self) -> Box<dyn SimulationModule> {
        Box::new(Interception::new(self.mode))
    }
}
