/// Benchmark urbanwb: repeated 10-year daily runs of a 9-cell drainage grid.
use std::collections::BTreeMap;
use std::time::Instant;

use chrono::NaiveDate;
use smallvec::SmallVec;

use urbanwb::params::{
    CellParams, DemandSplit, GeneralParams, GroundwaterParams, IrrigationParams, PavementParams,
    PerviousParams, RaintankParams, ReuseParams, ReuseSettings, RoofParams, SeepageModel,
    SoilChoice, StormwaterParams, VadoseParams, WastewaterParams,
};
use urbanwb::{
    run, CellId, FlowPath, ForcingData, NeighbourScheme, RunOptions, SoilLibrary, Topology,
    UrbanWaterModel,
};

fn path(id: CellId, down: Option<CellId>, up: &[CellId]) -> FlowPath {
    FlowPath {
        id,
        down,
        up: SmallVec::from_slice(up),
    }
}

fn bench_cell() -> CellParams {
    CellParams {
        general: GeneralParams {
            time_step: 1.0,
            number_houses: 30.0,
            indoor_water_use: 14_400.0,
        },
        roof: RoofParams {
            area: 1_800.0,
            max_storage: 1.0,
            effective_area: 80.0,
        },
        raintank: RaintankParams {
            is_open: false,
            area: 1.0,
            capacity: 2_000.0,
            first_flush: 5.0,
            effective_area: 100.0,
            install_ratio: 50.0,
        },
        pavement: PavementParams {
            area: 1_400.0,
            max_storage: 1.5,
            effective_area: 90.0,
            infiltration_capacity: 2.0,
        },
        pervious: PerviousParams {
            area: 2_400.0,
            max_storage: 4.0,
            infiltration_capacity: 40.0,
        },
        vadose: VadoseParams { area: 2_400.0 },
        groundwater: GroundwaterParams {
            area: 5_600.0,
            initial_level: 1.4,
            leakage_rate: 4.0,
            seepage_model: SeepageModel::Constant,
            drainage_resistance: 220.0,
            seepage_resistance: 600.0,
            infiltration_recession: 0.0,
            hydraulic_head: 2.2,
            downward_seepage: 0.3,
        },
        stormwater: StormwaterParams {
            is_open: false,
            area: 40.0,
            capacity: 25_000.0,
            first_flush: 200.0,
            wastewater_runoff: 5.0,
        },
        wastewater: WastewaterParams {
            area: 15.0,
            capacity: 40_000.0,
        },
        reuse: ReuseParams {
            area: 0.5,
            capacity: 300.0,
        },
        soil: SoilChoice {
            soil_type: 1,
            crop_type: 1,
        },
        irrigation: IrrigationParams {
            block_water_demand: 180.0,
        },
        demand: DemandSplit {
            kitchen: 15.0,
            bathroom: 30.0,
            laundry: 25.0,
            toilet: 30.0,
        },
        reuse_settings: ReuseSettings {
            kitchen_to_ssg: 0.0,
            bathroom_to_ssg: 1.0,
            laundry_to_ssg: 0.0,
            raintank_for_kitchen: 0.0,
            raintank_for_bathroom: 0.0,
            raintank_for_laundry: 1.0,
            wws_for_toilet: 1.0,
            wws_for_irrigation: 0.0,
            raintank_for_toilet: 1.0,
            raintank_for_irrigation: 0.0,
            cluster_for_toilet: 1.0,
            cluster_for_irrigation: 1.0,
            stormwater_for_toilet: 0.0,
            stormwater_for_irrigation: 1.0,
        },
    }
}

fn main() {
    // 10 years of daily data
    let n = 3650;
    let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
    let dates: Vec<NaiveDate> = (0..n)
        .map(|d| start + chrono::Duration::days(d as i64))
        .collect();
    // Simple deterministic "random" data in a realistic daily range
    let precip: Vec<f64> = (0..n)
        .map(|i| ((i as f64 * 7.13).sin() * 12.0).max(0.0))
        .collect();
    let pet: Vec<f64> = (0..n)
        .map(|i| 1.5 + (i as f64 * 3.77).sin().abs() * 2.0)
        .collect();
    let forcing = ForcingData::new(dates, precip, pet).unwrap();

    // 3x3 grid, two parallel branches joining at the outlet corner:
    // 1 -> 2 -> 3 -> 6 -> 9, 4 -> 7 -> 8 -> 9, 5 -> 8
    let topology = Topology::new(
        vec![
            path(1, Some(2), &[]),
            path(2, Some(3), &[1]),
            path(3, Some(6), &[2]),
            path(4, Some(7), &[]),
            path(5, Some(8), &[]),
            path(6, Some(9), &[3]),
            path(7, Some(8), &[4]),
            path(8, Some(9), &[5, 7]),
            path(9, None, &[6, 8]),
        ],
        NeighbourScheme::D8,
    )
    .unwrap();

    let params: BTreeMap<CellId, CellParams> =
        (1..=9).map(|id| (id, bench_cell())).collect();
    let library = SoilLibrary::loam_grass();

    // Warmup
    let mut model = UrbanWaterModel::new(topology.clone(), params.clone(), &library).unwrap();
    let _ = run(&mut model, &forcing, &RunOptions::default()).unwrap();

    // Benchmark
    let n_iters = 20;
    let options = RunOptions::default();
    let start_time = Instant::now();
    for _ in 0..n_iters {
        let mut model =
            UrbanWaterModel::new(topology.clone(), params.clone(), &library).unwrap();
        let _ = run(&mut model, &forcing, &options).unwrap();
    }
    let elapsed = start_time.elapsed();

    let total_timesteps = n * 9 * n_iters;
    let secs = elapsed.as_secs_f64();
    println!(
        "urbanwb:        {} runs x {} days x 9 cells = {} cell-steps",
        n_iters, n, total_timesteps
    );
    println!("  Total time:  {:.3}s", secs);
    println!("  Per run:     {:.3}ms", secs / n_iters as f64 * 1000.0);
    println!(
        "  Throughput:  {:.0} cell-steps/sec",
        total_timesteps as f64 / secs
    );
}
