/// Water balance validation.
///
/// Two surfaces: a per-timestep pass over the live flow network ([`check`] /
/// [`ValidationReport::inspect`]) collecting balance, flow-link and
/// storage-bound violations, and a whole-run pass ([`check_results`]) that
/// derives per-cell and system closure tables from recorded results.
/// Violations are collected as data, not raised as errors, so a run always
/// finishes and the report can be inspected afterwards.
use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::error::{ModelError, Result};
use crate::flows::ComponentId;
use crate::model::{Cell, UrbanWaterModel};
use crate::outputs::{CellTimeseries, SimulationResults};
use crate::storage::Storage;
use crate::topology::CellId;
use crate::units::Unit;

/// Default balance and bounds tolerance [m3].
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// Boundary inflow minus boundary outflow minus total storage change [m3].
///
/// Boundary inflows: precipitation on every receiving surface, imported
/// water (which already covers mains leakage and residual demands), supply
/// received from other cells' stores, and the upstream sewer inflows.
/// Boundary outflows: evaporation and transpiration, deep seepage, baseflow
/// to open water, the sewer discharges and water distributed to other
/// cells. Everything else moves between stores inside the cell and cancels.
pub fn cell_balance(cell: &Cell) -> Result<f64> {
    let flows = &cell.state.flows;
    let get = |c: ComponentId, name: &'static str| flows.set_of(c).get(name, Unit::M3);

    use ComponentId::*;
    let inflow = get(Roof, "precipitation")?
        + get(Raintank, "precipitation")?
        + get(Pavement, "precipitation")?
        + get(Pervious, "precipitation")?
        + get(Stormwater, "precipitation")?
        + get(Reuse, "imported_water")?
        + get(Reuse, "supply")?
        + get(Stormwater, "from_upstream")?
        + get(Wastewater, "from_upstream")?;

    let outflow = get(Roof, "evaporation")?
        + get(Raintank, "evaporation")?
        + get(Pavement, "evaporation")?
        + get(Pervious, "evaporation")?
        + get(Stormwater, "evaporation")?
        + get(Vadose, "transpiration")?
        + get(Groundwater, "seepage")?
        + get(Groundwater, "baseflow")?
        + get(Stormwater, "to_downstream")?
        + get(Wastewater, "to_downstream")?
        + get(Reuse, "distributed")?;

    Ok(inflow - outflow - storage_change(cell)?)
}

/// Total storage change of the step [m3], groundwater head change included.
pub fn storage_change(cell: &Cell) -> Result<f64> {
    let mut change = cell
        .state
        .groundwater
        .storage_change_m3(cell.params.groundwater.area);
    for storage in cell.state.storages() {
        change += storage.change(Unit::M3)?;
    }
    Ok(change)
}

/// Validate every cell of a solved, not yet advanced timestep.
pub fn check(model: &UrbanWaterModel, step: usize, tolerance: f64) -> Result<ValidationReport> {
    let mut report = ValidationReport::new(tolerance);
    report.steps_checked = 1;
    for (id, cell) in model.cells() {
        report.inspect(id, step, cell)?;
    }
    Ok(report)
}

/// A cell whose balance residual exceeded the tolerance.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceIssue {
    pub cell: CellId,
    pub step: usize,
    /// Residual [m3], positive when water appeared from nowhere.
    pub balance: f64,
}

/// Linked flow pair whose mirrored amounts disagree.
#[derive(Debug, Clone, Serialize)]
pub struct FlowLinkIssue {
    pub cell: CellId,
    pub step: usize,
    /// `component.flow <-> component.flow`
    pub link: String,
    pub lhs: f64,
    pub rhs: f64,
}

/// A store driven outside [0, capacity].
#[derive(Debug, Clone, Serialize)]
pub struct BoundsIssue {
    pub cell: CellId,
    pub step: usize,
    pub storage: &'static str,
    pub amount: f64,
    pub capacity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Tolerance applied to balances, links and bounds [m3].
    pub tolerance: f64,
    pub steps_checked: usize,
    pub balance_issues: Vec<BalanceIssue>,
    pub flow_link_issues: Vec<FlowLinkIssue>,
    pub bounds_issues: Vec<BoundsIssue>,
}

impl ValidationReport {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            steps_checked: 0,
            balance_issues: Vec::new(),
            flow_link_issues: Vec::new(),
            bounds_issues: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.balance_issues.is_empty()
            && self.flow_link_issues.is_empty()
            && self.bounds_issues.is_empty()
    }

    pub fn issues(&self) -> usize {
        self.balance_issues.len() + self.flow_link_issues.len() + self.bounds_issues.len()
    }

    /// Validate one cell after a solved timestep, before state advances.
    pub fn inspect(&mut self, id: CellId, step: usize, cell: &Cell) -> Result<()> {
        let balance = cell_balance(cell)?;
        if balance.abs() > self.tolerance {
            warn!(cell = id, step, balance, "water balance violation");
            self.balance_issues.push(BalanceIssue {
                cell: id,
                step,
                balance,
            });
        }
        for &(a, b) in cell.state.flows.links() {
            let lhs = cell.state.flows.get(a, Unit::M3)?;
            let rhs = cell.state.flows.get(b, Unit::M3)?;
            if (lhs - rhs).abs() > self.tolerance {
                let link = format!(
                    "{}.{} <-> {}.{}",
                    a.component.name(),
                    a.flow,
                    b.component.name(),
                    b.flow
                );
                warn!(cell = id, step, link = %link, lhs, rhs, "linked flows disagree");
                self.flow_link_issues.push(FlowLinkIssue {
                    cell: id,
                    step,
                    link,
                    lhs,
                    rhs,
                });
            }
        }
        for storage in cell.state.storages() {
            self.record_bounds(id, step, storage);
        }
        Ok(())
    }

    fn record_bounds(&mut self, id: CellId, step: usize, storage: &Storage) {
        if let Err(ModelError::StorageBounds {
            storage,
            amount,
            capacity,
        }) = storage.validate_bounds(self.tolerance)
        {
            warn!(cell = id, step, storage, amount, "storage out of bounds");
            self.bounds_issues.push(BoundsIssue {
                cell: id,
                step,
                storage,
                amount,
                capacity,
            });
        }
    }
}

// -- whole-run closure tables --

/// Per-timestep boundary closure series of one cell, or of the system [m3].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClosureTable {
    pub inflow: Vec<f64>,
    pub outflow: Vec<f64>,
    pub storage_change: Vec<f64>,
    /// `inflow - outflow - storage_change` per step.
    pub residual: Vec<f64>,
}

impl ClosureTable {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            inflow: Vec::with_capacity(capacity),
            outflow: Vec::with_capacity(capacity),
            storage_change: Vec::with_capacity(capacity),
            residual: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, inflow: f64, outflow: f64, storage_change: f64) {
        self.inflow.push(inflow);
        self.outflow.push(outflow);
        self.storage_change.push(storage_change);
        self.residual.push(inflow - outflow - storage_change);
    }

    pub fn len(&self) -> usize {
        self.residual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residual.is_empty()
    }

    pub fn max_residual(&self) -> f64 {
        self.residual.iter().fold(0.0, |m, r| m.max(r.abs()))
    }
}

/// Whole-run closure report: one table per cell plus the system-wide sum.
#[derive(Debug, Clone, Serialize)]
pub struct ClosureReport {
    pub tolerance: f64,
    pub system: ClosureTable,
    pub cells: BTreeMap<CellId, ClosureTable>,
}

impl ClosureReport {
    /// Every residual of every table within the tolerance.
    pub fn is_closed(&self) -> bool {
        self.system.max_residual() <= self.tolerance
            && self.cells.values().all(|t| t.max_residual() <= self.tolerance)
    }
}

fn cell_closure(series: &CellTimeseries) -> ClosureTable {
    let mut table = ClosureTable::with_capacity(series.len());
    for t in 0..series.len() {
        let inflow = series.precipitation[t]
            + series.imported_water[t]
            + series.reuse_supply[t]
            + series.upstream_inflow[t];
        let outflow = series.evaporation[t]
            + series.transpiration[t]
            + series.seepage[t]
            + series.baseflow[t]
            + series.storm_sewer[t]
            + series.waste_sewer[t]
            + series.distributed[t];
        table.push(inflow, outflow, series.storage_change[t]);
    }
    table
}

/// Build the per-cell and system-wide closure tables from recorded results.
///
/// The system table sums the cell rows; water exchanged between cells
/// (sewer routing, cluster supplies) appears on both sides and cancels over
/// the run up to the one-timestep routing lag.
pub fn check_results(results: &SimulationResults, tolerance: f64) -> ClosureReport {
    let steps = results.aggregated.len();
    let mut system = ClosureTable::with_capacity(steps);
    let cells: BTreeMap<CellId, ClosureTable> = results
        .cells
        .iter()
        .map(|(&id, series)| (id, cell_closure(series)))
        .collect();

    for t in 0..steps {
        let mut inflow = 0.0;
        let mut outflow = 0.0;
        let mut change = 0.0;
        for table in cells.values() {
            inflow += table.inflow[t];
            outflow += table.outflow[t];
            change += table.storage_change[t];
        }
        system.push(inflow, outflow, change);
    }

    ClosureReport {
        tolerance,
        system,
        cells,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forcing::{ForcingData, ForcingStep};
    use crate::run::{run, RunOptions};
    use crate::soil::SoilLibrary;
    use crate::testutil::test_cell_params;
    use crate::topology::{FlowPath, NeighbourScheme, Topology};
    use chrono::NaiveDate;
    use smallvec::SmallVec;

    fn assert_approx(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected} ± {tol}, got {actual}"
        );
    }

    fn single_cell_model() -> UrbanWaterModel {
        let topology = Topology::new(
            vec![FlowPath {
                id: 1,
                down: None,
                up: SmallVec::new(),
            }],
            NeighbourScheme::D4,
        )
        .unwrap();
        let mut params = BTreeMap::new();
        params.insert(1, test_cell_params());
        UrbanWaterModel::new(topology, params, &SoilLibrary::loam_grass()).unwrap()
    }

    #[test]
    fn solved_step_balance_closes() {
        let mut model = single_cell_model();
        let f = ForcingStep {
            precipitation: 12.0,
            potential_evaporation: 2.5,
            ..Default::default()
        };
        model.cell_mut(1).unwrap().solve_step(&f).unwrap();
        let balance = cell_balance(model.cell(1).unwrap()).unwrap();
        assert!(
            balance.abs() < 1e-9,
            "expected closed balance, residual {balance} m3"
        );
    }

    #[test]
    fn dry_step_balance_closes() {
        let mut model = single_cell_model();
        let f = ForcingStep {
            potential_evaporation: 3.0,
            ..Default::default()
        };
        model.cell_mut(1).unwrap().solve_step(&f).unwrap();
        let balance = cell_balance(model.cell(1).unwrap()).unwrap();
        assert!(
            balance.abs() < 1e-9,
            "expected closed balance, residual {balance} m3"
        );
    }

    #[test]
    fn report_collects_violations() {
        let mut model = single_cell_model();
        let f = ForcingStep {
            precipitation: 5.0,
            ..Default::default()
        };
        model.cell_mut(1).unwrap().solve_step(&f).unwrap();
        // Corrupt a store after the solve: the report must notice.
        model
            .cell_mut(1)
            .unwrap()
            .state
            .stormwater
            .add(1.0, Unit::M3)
            .unwrap();

        let mut report = ValidationReport::new(DEFAULT_TOLERANCE);
        report
            .inspect(1, 0, model.cell(1).unwrap())
            .unwrap();
        assert!(!report.is_clean());
        assert_eq!(report.balance_issues.len(), 1);
    }

    #[test]
    fn bounds_violation_reported() {
        let mut model = single_cell_model();
        model
            .cell_mut(1)
            .unwrap()
            .state
            .stormwater
            .set_amount(11_000.0, Unit::L)
            .unwrap();
        let mut report = ValidationReport::new(DEFAULT_TOLERANCE);
        report
            .inspect(1, 0, model.cell(1).unwrap())
            .unwrap();
        assert_eq!(report.bounds_issues.len(), 1);
        assert_eq!(report.bounds_issues[0].storage, "stormwater_detention");
    }

    #[test]
    fn broken_link_mirror_is_reported() {
        let mut model = single_cell_model();
        let f = ForcingStep {
            precipitation: 8.0,
            ..Default::default()
        };
        model.cell_mut(1).unwrap().solve_step(&f).unwrap();
        // Bypass the cell-level setter so only one side of the pair moves.
        model
            .cell_mut(1)
            .unwrap()
            .state
            .flows
            .set_of_mut(ComponentId::Roof)
            .set("to_raintank", 99.0, Unit::M3)
            .unwrap();

        let mut report = ValidationReport::new(DEFAULT_TOLERANCE);
        report.inspect(1, 0, model.cell(1).unwrap()).unwrap();
        assert_eq!(report.flow_link_issues.len(), 1);
        let issue = &report.flow_link_issues[0];
        assert!(issue.link.contains("roof.to_raintank"));
        assert_approx(issue.lhs, 99.0, 1e-9);
        assert!(!report.is_clean());
    }

    #[test]
    fn check_covers_a_solved_timestep() {
        let mut model = single_cell_model();
        let f = ForcingStep {
            precipitation: 5.0,
            potential_evaporation: 1.0,
            ..Default::default()
        };
        model.cell_mut(1).unwrap().solve_step(&f).unwrap();
        let report = check(&model, 0, DEFAULT_TOLERANCE).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.steps_checked, 1);
        assert_eq!(report.issues(), 0);
    }

    // -- closure tables --

    fn chain_model() -> UrbanWaterModel {
        let topology = Topology::new(
            vec![
                FlowPath {
                    id: 1,
                    down: Some(2),
                    up: SmallVec::new(),
                },
                FlowPath {
                    id: 2,
                    down: None,
                    up: SmallVec::from_slice(&[1]),
                },
            ],
            NeighbourScheme::D4,
        )
        .unwrap();
        let mut params = BTreeMap::new();
        params.insert(1, test_cell_params());
        params.insert(2, test_cell_params());
        UrbanWaterModel::new(topology, params, &SoilLibrary::loam_grass()).unwrap()
    }

    fn day1() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
    }

    #[test]
    fn closure_tables_close_over_a_run() {
        let mut model = chain_model();
        let forcing = ForcingData::constant(day1(), 12, 6.0, 1.5).unwrap();
        let results = run(&mut model, &forcing, &RunOptions::default()).unwrap();

        let closure = check_results(&results, DEFAULT_TOLERANCE);
        assert!(
            closure.is_closed(),
            "max residual {}",
            closure.system.max_residual()
        );
        assert_eq!(closure.system.len(), 12);
        assert_eq!(closure.cells[&1].len(), 12);
        // System rows are the sum of the cell rows.
        let summed: f64 = closure.cells.values().map(|t| t.inflow[0]).sum();
        assert_approx(closure.system.inflow[0], summed, 1e-12);
    }

    #[test]
    fn doctored_results_break_closure() {
        let mut model = chain_model();
        let forcing = ForcingData::constant(day1(), 5, 6.0, 1.5).unwrap();
        let mut results = run(&mut model, &forcing, &RunOptions::default()).unwrap();
        if let Some(series) = results.cells.get_mut(&1) {
            series.storage_change[2] += 1.0;
        }

        let closure = check_results(&results, DEFAULT_TOLERANCE);
        assert!(!closure.is_closed());
        assert_approx(closure.cells[&1].residual[2], -1.0, 1e-9);
        assert_approx(closure.system.residual[2], -1.0, 1e-9);
    }
}
