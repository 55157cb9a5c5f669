//! Names and units of the variables exchanged between modules.
//!
//! Modules are wired together by these names, so a producer and its consumers must
//! use the same constant.

/// Precipitation
pub const VAR_PCP: &str = "D_P";
/// Potential evapotranspiration
pub const VAR_PET: &str = "D_PET";
/// Maximum interception storage capacity
pub const VAR_INTERC_MAX: &str = "Interc_max";
/// Minimum interception storage capacity
pub const VAR_INTERC_MIN: &str = "Interc_min";
pub const VAR_LANDUSE: &str = "landuse";
/// Slope gradient, rise over run
pub const VAR_SLOPE: &str = "slope";
/// Daily mean air temperature
pub const VAR_TMEAN: &str = "TMEAN";
/// Soil temperature relative to short grass at 10 cm
pub const VAR_SOIL_T10: &str = "soil_t10";

/// Interception loss
pub const VAR_INLO: &str = "INLO";
/// Net precipitation reaching the ground
pub const VAR_NEPR: &str = "NEPR";
/// Canopy interception storage
pub const VAR_CANSTOR: &str = "canstor";
/// Evaporation from the interception storage
pub const VAR_INET: &str = "INET";
/// Soil temperature
pub const VAR_SOTE: &str = "SOTE";
/// Mean air temperature of the previous day
pub const VAR_TMEAN1: &str = "TMEAN1";
/// Mean air temperature of two days ago
pub const VAR_TMEAN2: &str = "TMEAN2";

/// Exponent of the interception storage capacity curve
pub const VAR_PI_B: &str = "Pi_b";
/// Initial interception storage
pub const VAR_INIT_IS: &str = "Init_IS";
/// Fraction of paddy precipitation that falls on the embankment
pub const VAR_PCP2CANFR_PR: &str = "pcp2canfr_pr";
/// Fraction of the embankment water that drains to the canal
pub const VAR_EMBNKFR_PR: &str = "embnkfr_pr";
/// Hillslope time step in seconds
pub const VAR_HILLSLOPE_DT: &str = "DT_HS";

pub const VAR_SOIL_TA0: &str = "soil_ta0";
pub const VAR_SOIL_TA1: &str = "soil_ta1";
pub const VAR_SOIL_TA2: &str = "soil_ta2";
pub const VAR_SOIL_TA3: &str = "soil_ta3";
pub const VAR_SOIL_TB1: &str = "soil_tb1";
pub const VAR_SOIL_TB2: &str = "soil_tb2";
pub const VAR_SOIL_TD1: &str = "soil_td1";
pub const VAR_SOIL_TD2: &str = "soil_td2";
/// Ratio between the soil temperature at 10 cm and the mean
pub const VAR_K_SOIL10: &str = "k_soil10";

pub const UNIT_MM: &str = "mm";
pub const UNIT_CELSIUS: &str = "deg C";
pub const UNIT_DIMENSIONLESS: &str = "-";
pub const UNIT_SECONDS: &str = "s";

/// Land use code of paddy fields
pub const LANDUSE_ID_PADDY: i32 = 33;
/// Land use code of water bodies
pub const LANDUSE_ID_WATER: i32 = 18;

/// Land use code stored in a cell value
pub fn landuse_code(value: f64) -> i32 {
    value.round() as i32
}
