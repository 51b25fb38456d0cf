/// Timestep orchestration.
///
/// Each timestep: the previous step's sewer discharges are staged into the
/// upstream slots, every cell solves its component pipeline in the resolved
/// order, the cluster stores distribute to unmet demand, the reuse draw is
/// written back into the rain tanks, outputs are recorded, the balance is
/// validated, and all state advances.
use std::collections::BTreeMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::check::{storage_change, ValidationReport, DEFAULT_TOLERANCE};
use crate::error::Result;
use crate::flows::ComponentId;
use crate::forcing::ForcingData;
use crate::model::{Cell, UrbanWaterModel};
use crate::outputs::{
    AggregateRecord, AggregatedTimeseries, CellRecord, CellTimeseries, SimulationResults,
};
use crate::topology::CellId;
use crate::units::Unit;

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Validate the per-cell water balance and storage bounds every step.
    pub check: bool,
    /// Balance and bounds tolerance [m3].
    pub tolerance: f64,
    /// Seed of the distribution draws.
    pub seed: u64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            check: true,
            tolerance: DEFAULT_TOLERANCE,
            seed: 0,
        }
    }
}

/// Sewer discharges [m3] waiting to be routed downstream next timestep.
pub(crate) type RoutedOutflows = BTreeMap<CellId, (f64, f64)>;

pub(crate) fn empty_routing(model: &UrbanWaterModel) -> RoutedOutflows {
    model.cells().map(|(id, _)| (id, (0.0, 0.0))).collect()
}

/// Solve one timestep for every cell, including distribution and routing.
///
/// State is left un-advanced so the caller can record and validate first;
/// `commit` finishes the step.
pub(crate) fn advance_timestep(
    model: &mut UrbanWaterModel,
    forcing: &ForcingData,
    t: usize,
    routed: &mut RoutedOutflows,
    rng: &mut ChaCha8Rng,
) -> Result<()> {
    let order = model.order().to_vec();

    // Stage last step's discharges into the upstream slots.
    for &id in &order {
        let upstream = model.topology().upstream(id).to_vec();
        if upstream.is_empty() {
            continue;
        }
        let staged: Vec<(CellId, f64, f64)> = upstream
            .iter()
            .map(|u| {
                let &(storm, waste) = routed.get(u).unwrap_or(&(0.0, 0.0));
                (*u, storm, waste)
            })
            .collect();
        let cell = model.cell_mut(id)?;
        for (u, storm, waste) in staged {
            cell.state
                .flows
                .set_of_mut(ComponentId::Stormwater)
                .multi_mut("from_upstream")?
                .set_source(u, storm)?;
            cell.state
                .flows
                .set_of_mut(ComponentId::Wastewater)
                .multi_mut("from_upstream")?
                .set_source(u, waste)?;
        }
    }

    for &id in &order {
        let cell = model.cell_mut(id)?;
        let mut f = forcing.step(t);
        f.pervious_irrigation = cell.pervious_irrigation_depth(forcing.irrigation_index[t]);
        cell.solve_step(&f)?;
    }

    model.distribute_wastewater(rng)?;
    model.distribute_stormwater(rng)?;

    for &id in &order {
        model.cell_mut(id)?.state.carry_raintank_from_reuse()?;
    }

    // This step's discharges route downstream with a one-timestep lag.
    for &id in &order {
        let cell = model.cell(id)?;
        let storm = cell
            .state
            .flows
            .set_of(ComponentId::Stormwater)
            .get("to_downstream", Unit::M3)?;
        let waste = cell
            .state
            .flows
            .set_of(ComponentId::Wastewater)
            .get("to_downstream", Unit::M3)?;
        routed.insert(id, (storm, waste));
    }
    Ok(())
}

/// Advance state and clear the flow network after a recorded timestep.
pub(crate) fn commit(model: &mut UrbanWaterModel) -> Result<()> {
    let order = model.order().to_vec();
    for &id in &order {
        let cell = model.cell_mut(id)?;
        cell.state.advance();
        cell.state.reset_flows();
    }
    Ok(())
}

fn cell_record(cell: &Cell) -> Result<CellRecord> {
    let flows = &cell.state.flows;
    let get = |c: ComponentId, name: &'static str| flows.set_of(c).get(name, Unit::M3);

    use ComponentId::*;
    Ok(CellRecord {
        precipitation: get(Roof, "precipitation")?
            + get(Raintank, "precipitation")?
            + get(Pavement, "precipitation")?
            + get(Pervious, "precipitation")?
            + get(Stormwater, "precipitation")?,
        imported_water: get(Reuse, "imported_water")?,
        reuse_supply: get(Reuse, "supply")?,
        reuse_use: get(Reuse, "use")? + get(Reuse, "distributed")?,
        evaporation: get(Roof, "evaporation")?
            + get(Raintank, "evaporation")?
            + get(Pavement, "evaporation")?
            + get(Pervious, "evaporation")?
            + get(Stormwater, "evaporation")?,
        transpiration: get(Vadose, "transpiration")?,
        seepage: get(Groundwater, "seepage")?,
        baseflow: get(Groundwater, "baseflow")?,
        storm_sewer: get(Stormwater, "to_downstream")?,
        waste_sewer: get(Wastewater, "to_downstream")?,
        upstream_inflow: get(Stormwater, "from_upstream")? + get(Wastewater, "from_upstream")?,
        distributed: get(Reuse, "distributed")?,
        storage_change: storage_change(cell)?,
        roof_storage: cell.state.roof.amount(Unit::M3)?,
        raintank_storage: cell.state.raintank.amount(Unit::M3)?,
        pavement_storage: cell.state.pavement.amount(Unit::M3)?,
        pervious_storage: cell.state.pervious.amount(Unit::M3)?,
        vadose_moisture: cell.state.vadose.amount(Unit::M3)?,
        stormwater_storage: cell.state.stormwater.amount(Unit::M3)?,
        reuse_storage: cell.state.reuse.storage.amount(Unit::M3)?,
        wastewater_storage: cell.state.wastewater.amount(Unit::M3)?,
        groundwater_level: cell.state.groundwater.water_level,
        surface_water_level: cell.state.groundwater.surface_water_level,
    })
}

/// Run the model over the full forcing period.
pub fn run(
    model: &mut UrbanWaterModel,
    forcing: &ForcingData,
    options: &RunOptions,
) -> Result<SimulationResults> {
    let steps = forcing.len();
    let outlets = model.topology().outlets();
    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
    let mut routed = empty_routing(model);
    let mut aggregated = AggregatedTimeseries::with_capacity(steps);
    let mut cells: BTreeMap<CellId, CellTimeseries> = model
        .cells()
        .map(|(id, _)| (id, CellTimeseries::with_capacity(steps)))
        .collect();
    let mut report = ValidationReport::new(options.tolerance);

    info!(
        steps,
        cells = cells.len(),
        outlets = outlets.len(),
        "starting simulation"
    );

    for t in 0..steps {
        advance_timestep(model, forcing, t, &mut routed, &mut rng)?;

        let mut agg = AggregateRecord::default();
        for (id, cell) in model.cells() {
            let record = cell_record(cell)?;
            agg.baseflow += record.baseflow;
            agg.seepage += record.seepage;
            agg.imported_water += record.imported_water;
            agg.evapotranspiration += record.transpiration;
            agg.evaporation += record.evaporation + record.transpiration;
            if outlets.contains(&id) {
                agg.runoff += record.storm_sewer;
                agg.wastewater += record.waste_sewer;
            }
            if let Some(series) = cells.get_mut(&id) {
                series.push(record);
            }
        }
        aggregated.push(agg);

        if options.check {
            report.steps_checked += 1;
            let order = model.order().to_vec();
            for &id in &order {
                report.inspect(id, t, model.cell(id)?)?;
            }
        }

        commit(model)?;
    }

    info!(
        runoff = aggregated.runoff.iter().sum::<f64>(),
        wastewater = aggregated.wastewater.iter().sum::<f64>(),
        imported = aggregated.imported_water.iter().sum::<f64>(),
        balance_issues = report.balance_issues.len(),
        "simulation finished"
    );

    Ok(SimulationResults {
        aggregated,
        cells,
        report,
    })
}
