//! Running the process modules together in one pipeline.

use cellflow_core::context::RunContext;
use cellflow_core::errors::CellflowError;
use cellflow_core::grid::{FloatValue, OwnedGrid};
use cellflow_core::output::{OrgOutItem, SettingsOutput};
use cellflow_core::pipeline::{ModulePipeline, PipelineBuilder};
use cellflow_core::store::EXTERNAL_OWNER;
use cellflow_core::time::parse_time;
use cellflow_modules::interception::{Interception, InterceptionMode};
use cellflow_modules::soil_temperature::SoilTemperature;
use cellflow_modules::variables::*;
use chrono::Duration;
use is_close::is_close;

const N_CELLS: usize = 3;

struct Forcings {
    pcp: OwnedGrid,
    pet: OwnedGrid,
    max: OwnedGrid,
    min: OwnedGrid,
    landuse: OwnedGrid,
    tmean: OwnedGrid,
    soil_t10: OwnedGrid,
}

impl Forcings {
    fn new() -> Self {
        Self {
            pcp: OwnedGrid::filled(N_CELLS, 0.0),
            pet: OwnedGrid::filled(N_CELLS, 0.0),
            max: OwnedGrid::filled(N_CELLS, 2.0),
            min: OwnedGrid::filled(N_CELLS, 0.0),
            landuse: OwnedGrid::from_vec(vec![1.0, LANDUSE_ID_PADDY as FloatValue, 1.0]),
            tmean: OwnedGrid::filled(N_CELLS, 5.0),
            soil_t10: OwnedGrid::filled(N_CELLS, 0.0),
        }
    }

    fn builder(&self) -> PipelineBuilder {
        let mut builder = PipelineBuilder::new();
        builder
            .with_external(VAR_PCP, UNIT_MM, self.pcp.share())
            .with_external(VAR_PET, UNIT_MM, self.pet.share())
            .with_external(VAR_INTERC_MAX, UNIT_MM, self.max.share())
            .with_external(VAR_INTERC_MIN, UNIT_MM, self.min.share())
            .with_external(VAR_LANDUSE, UNIT_DIMENSIONLESS, self.landuse.share())
            .with_external(VAR_TMEAN, UNIT_CELSIUS, self.tmean.share())
            .with_external(VAR_SOIL_T10, UNIT_CELSIUS, self.soil_t10.share())
            .with_parameters(
                [
                    (VAR_PI_B, 1.0),
                    (VAR_SOIL_TA0, 0.0),
                    (VAR_SOIL_TA1, 0.0),
                    (VAR_SOIL_TA2, 0.0),
                    (VAR_SOIL_TA3, 1.0),
                    (VAR_SOIL_TB1, 0.0),
                    (VAR_SOIL_TB2, 0.0),
                    (VAR_SOIL_TD1, 0.0),
                    (VAR_SOIL_TD2, 0.0),
                    (VAR_K_SOIL10, 1.0),
                ]
                .map(|(name, value)| (name.to_string(), value)),
            );
        builder
    }
}

fn build(forcings: &Forcings) -> ModulePipeline {
    forcings
        .builder()
        .with_module(Box::new(SoilTemperature::new()))
        .with_module(Box::new(Interception::new(InterceptionMode::LongTerm)))
        .build()
        .unwrap()
}

fn output(output_id: &str, mod_cls: &str, agg_type: &str) -> OrgOutItem {
    OrgOutItem {
        mod_cls: mod_cls.to_string(),
        output_id: output_id.to_string(),
        agg_type: agg_type.to_string(),
        interval_unit: "DAY".to_string(),
        s_time: "2010-06-01".to_string(),
        e_time: "2010-06-30".to_string(),
        interval: 3,
        use_flag: 1,
        ..OrgOutItem::default()
    }
}

#[test]
fn modules_publish_their_outputs() {
    let forcings = Forcings::new();
    let pipeline = build(&forcings);

    let store = pipeline.store();
    assert_eq!(store.n_cells(), Some(N_CELLS));
    for name in [VAR_INLO, VAR_NEPR, VAR_CANSTOR, VAR_INET] {
        assert_eq!(store.owner(name), Some("PI_MCS"), "{}", name);
    }
    for name in [VAR_SOTE, VAR_TMEAN1, VAR_TMEAN2] {
        assert_eq!(store.owner(name), Some("STP_FP"), "{}", name);
    }
    assert_eq!(store.owner(VAR_PCP), Some(EXTERNAL_OWNER));
}

#[test]
fn daily_run_with_outputs() {
    let mut forcings = Forcings::new();
    let mut pipeline = build(&forcings);
    let context = RunContext::new(
        parse_time("2010-06-01").unwrap(),
        parse_time("2010-06-30").unwrap(),
        Duration::days(1),
    )
    .unwrap();
    let mut settings = SettingsOutput::new(
        &context,
        &[
            output(VAR_NEPR, "PI_MCS", "SUM"),
            output(VAR_CANSTOR, "PI_MCS", "MAX"),
            output(VAR_SOTE, "STP_FP", "AVE"),
        ],
    )
    .unwrap();
    settings.bind(pipeline.store()).unwrap();

    for step in context.steps() {
        assert!(forcings.pcp.copy_from(&[10.0, 10.0, 0.0]));
        assert!(forcings.pet.copy_from(&[2.0, 2.0, 2.0]));
        pipeline.step(&step).unwrap();
        settings.update(&step).unwrap();
    }

    // 30 days in 3 day intervals
    let net = settings.get(VAR_NEPR).unwrap().records();
    assert_eq!(net.len(), 10);
    // The storage is emptied every day, so each day intercepts a full capacity
    let first = &net[0].values;
    assert!(first[0] > 0.0 && first[0] < 30.0);
    // The paddy cell loses an extra share to the canals
    assert!(is_close!(first[0] - first[1], 3.0 * 10.0 * 0.5 * 0.15));
    assert_eq!(first[2], 0.0);

    let storage = settings.get(VAR_CANSTOR).unwrap().records();
    assert!(storage.iter().all(|r| r.values[2] == 0.0));

    let soil = settings.get(VAR_SOTE).unwrap().records();
    assert!(soil.iter().all(|r| is_close!(r.values[0], 5.0)));
}

#[test]
fn missing_forcing_is_reported() {
    let forcings = Forcings::new();
    let res = PipelineBuilder::new()
        .with_module(Box::new(Interception::new(InterceptionMode::LongTerm)))
        .with_external(VAR_PCP, UNIT_MM, forcings.pcp.share())
        .with_parameter(VAR_PI_B, 1.0)
        .build();
    assert!(matches!(res, Err(CellflowError::MissingInput { .. })));
}

#[test]
fn storm_mode_has_no_evaporation_output() {
    let forcings = Forcings::new();
    let slope = OwnedGrid::filled(N_CELLS, 0.1);
    let pipeline = forcings
        .builder()
        .with_module(Box::new(Interception::new(InterceptionMode::Storm)))
        .with_external(VAR_SLOPE, UNIT_DIMENSIONLESS, slope.share())
        .with_parameter(VAR_HILLSLOPE_DT, 60.0)
        .build()
        .unwrap();

    assert!(pipeline.store().contains(VAR_NEPR));
    assert!(!pipeline.store().contains(VAR_INET));
}
