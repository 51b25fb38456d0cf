/// Shared test fixtures.
use crate::params::{
    CellParams, DemandSplit, GeneralParams, GroundwaterParams, IrrigationParams, PavementParams,
    PerviousParams, RaintankParams, ReuseParams, ReuseSettings, RoofParams, SeepageModel,
    SoilChoice, StormwaterParams, VadoseParams, WastewaterParams,
};

/// A mid-density residential cell with every component present and all
/// reuse routes switched off. Tests flip individual fields from here.
pub fn test_cell_params() -> CellParams {
    CellParams {
        general: GeneralParams {
            time_step: 1.0,
            number_houses: 10.0,
            indoor_water_use: 5000.0,
        },
        roof: RoofParams {
            area: 100.0,
            max_storage: 1.0,
            effective_area: 80.0,
        },
        raintank: RaintankParams {
            is_open: false,
            area: 1.0,
            capacity: 2000.0,
            first_flush: 5.0,
            effective_area: 100.0,
            install_ratio: 50.0,
        },
        pavement: PavementParams {
            area: 150.0,
            max_storage: 1.5,
            effective_area: 90.0,
            infiltration_capacity: 2.0,
        },
        pervious: PerviousParams {
            area: 250.0,
            max_storage: 4.0,
            infiltration_capacity: 40.0,
        },
        vadose: VadoseParams { area: 250.0 },
        groundwater: GroundwaterParams {
            area: 500.0,
            initial_level: 1.5,
            leakage_rate: 5.0,
            seepage_model: SeepageModel::Constant,
            drainage_resistance: 200.0,
            seepage_resistance: 500.0,
            infiltration_recession: 0.0,
            hydraulic_head: 2.0,
            downward_seepage: 0.1,
        },
        stormwater: StormwaterParams {
            is_open: false,
            area: 20.0,
            capacity: 10_000.0,
            first_flush: 100.0,
            wastewater_runoff: 10.0,
        },
        wastewater: WastewaterParams {
            area: 10.0,
            capacity: 20_000.0,
        },
        reuse: ReuseParams {
            area: 0.5,
            capacity: 500.0,
        },
        soil: SoilChoice {
            soil_type: 1,
            crop_type: 1,
        },
        irrigation: IrrigationParams {
            block_water_demand: 0.0,
        },
        demand: DemandSplit {
            kitchen: 15.0,
            bathroom: 30.0,
            laundry: 25.0,
            toilet: 30.0,
        },
        reuse_settings: ReuseSettings {
            kitchen_to_ssg: 0.0,
            bathroom_to_ssg: 0.0,
            laundry_to_ssg: 0.0,
            raintank_for_kitchen: 0.0,
            raintank_for_bathroom: 0.0,
            raintank_for_laundry: 0.0,
            wws_for_toilet: 0.0,
            wws_for_irrigation: 0.0,
            raintank_for_toilet: 0.0,
            raintank_for_irrigation: 0.0,
            cluster_for_toilet: 0.0,
            cluster_for_irrigation: 0.0,
            stormwater_for_toilet: 0.0,
            stormwater_for_irrigation: 0.0,
        },
    }
}
