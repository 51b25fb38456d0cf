/// The assembled model: validated cells on a flow topology, the resolved
/// computation order, and the cluster distribution passes.
///
/// Distribution runs after every cell has solved a timestep. Cells with a
/// cluster wastewater store hand out their content first, then cells with
/// stormwater detention; each store serves randomly picked cells that still
/// have unmet toilet or irrigation demand, replacing imported water
/// one-to-one.
use std::collections::BTreeMap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::components::{
    Groundwater, Pavement, Pervious, Raintank, Reuse, Roof, Stormwater, Vadose, Wastewater,
};
use crate::error::{ModelError, Result};
use crate::flows::ComponentId;
use crate::forcing::ForcingStep;
use crate::params::{CellParams, ReuseSettings};
use crate::soil::SoilLibrary;
use crate::state::CellState;
use crate::topology::{CellId, Topology};
use crate::units::Unit;

/// One grid cell: its parameters, component pipeline and state.
#[derive(Debug, Clone)]
pub struct Cell {
    pub params: CellParams,
    pub state: CellState,
    roof: Roof,
    raintank: Raintank,
    pavement: Pavement,
    pervious: Pervious,
    vadose: Vadose,
    groundwater: Groundwater,
    stormwater: Stormwater,
    reuse: Reuse,
    wastewater: Wastewater,
}

impl Cell {
    fn new(id: CellId, params: CellParams, library: &SoilLibrary) -> Result<Self> {
        params.validate(id)?;
        let state = CellState::new(&params, library)?;
        Ok(Self {
            roof: Roof::new(&params),
            raintank: Raintank::new(&params),
            pavement: Pavement::new(&params),
            pervious: Pervious::new(&params, library)?,
            vadose: Vadose::new(&params, library)?,
            groundwater: Groundwater::new(&params, library)?,
            stormwater: Stormwater::new(&params),
            reuse: Reuse::new(&params),
            wastewater: Wastewater::new(&params),
            params,
            state,
        })
    }

    /// Solve all nine components for one timestep, in pipeline order.
    pub fn solve_step(&mut self, f: &ForcingStep) -> Result<()> {
        self.roof.solve(f, &mut self.state)?;
        self.raintank.solve(f, &mut self.state)?;
        self.pavement.solve(f, &mut self.state)?;
        self.pervious.solve(f, &mut self.state)?;
        self.vadose.solve(f, &mut self.state)?;
        self.groundwater.solve(f, &mut self.state)?;
        self.stormwater.solve(f, &mut self.state)?;
        self.reuse.solve(f, &mut self.state)?;
        self.wastewater.solve(f, &mut self.state)
    }

    /// Pervious irrigation depth [mm] for one timestep: the cell's yearly
    /// irrigation block spread by the normalised irrigation index.
    pub fn pervious_irrigation_depth(&self, irrigation_index: f64) -> f64 {
        if self.params.pervious.area > 0.0 {
            irrigation_index * 1000.0 * self.params.irrigation.block_water_demand
                / self.params.pervious.area
        } else {
            0.0
        }
    }
}

/// Which route factors apply when a cluster store serves a cell's demand.
fn route_factors(source: ComponentId, settings: &ReuseSettings) -> (f64, f64) {
    match source {
        ComponentId::Wastewater => (settings.cluster_for_toilet, settings.cluster_for_irrigation),
        _ => (
            settings.stormwater_for_toilet,
            settings.stormwater_for_irrigation,
        ),
    }
}

#[derive(Debug, Clone)]
pub struct UrbanWaterModel {
    topology: Topology,
    order: Vec<CellId>,
    cells: BTreeMap<CellId, Cell>,
    /// Cells with a cluster wastewater store, in id order.
    wastewater_cells: Vec<CellId>,
    /// Cells with stormwater detention, in id order.
    stormwater_cells: Vec<CellId>,
}

impl UrbanWaterModel {
    pub fn new(
        topology: Topology,
        params: BTreeMap<CellId, CellParams>,
        library: &SoilLibrary,
    ) -> Result<Self> {
        for &id in params.keys() {
            if !topology.contains(id) {
                return Err(ModelError::UnknownCell(id));
            }
        }

        let mut cells = BTreeMap::new();
        for id in topology.cells() {
            let cell_params = params.get(&id).cloned().ok_or_else(|| {
                ModelError::invalid_param(id, "params", "no parameter set for this cell")
            })?;
            let mut cell = Cell::new(id, cell_params, library)?;
            for &up in topology.upstream(id) {
                cell.state.register_upstream(up)?;
            }
            cells.insert(id, cell);
        }

        let order = topology.resolve_order()?;
        let wastewater_cells = cells
            .iter()
            .filter(|(_, c)| c.params.wastewater.capacity > 0.0)
            .map(|(&id, _)| id)
            .collect();
        let stormwater_cells = cells
            .iter()
            .filter(|(_, c)| c.params.stormwater.capacity > 0.0)
            .map(|(&id, _)| id)
            .collect();

        debug!(
            cells = cells.len(),
            outlets = topology.outlets().len(),
            "model assembled"
        );
        Ok(Self {
            topology,
            order,
            cells,
            wastewater_cells,
            stormwater_cells,
        })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Computation order: every cell after all of its upstream neighbours.
    pub fn order(&self) -> &[CellId] {
        &self.order
    }

    pub fn cells(&self) -> impl Iterator<Item = (CellId, &Cell)> {
        self.cells.iter().map(|(&id, c)| (id, c))
    }

    pub fn cell(&self, id: CellId) -> Result<&Cell> {
        self.cells.get(&id).ok_or(ModelError::UnknownCell(id))
    }

    pub fn cell_mut(&mut self, id: CellId) -> Result<&mut Cell> {
        self.cells.get_mut(&id).ok_or(ModelError::UnknownCell(id))
    }

    /// Serve residual demands from the cluster wastewater stores.
    pub fn distribute_wastewater(&mut self, rng: &mut ChaCha8Rng) -> Result<()> {
        let sources = self.wastewater_cells.clone();
        self.distribute(ComponentId::Wastewater, &sources, rng)
    }

    /// Serve residual demands from the stormwater detention stores.
    pub fn distribute_stormwater(&mut self, rng: &mut ChaCha8Rng) -> Result<()> {
        let sources = self.stormwater_cells.clone();
        self.distribute(ComponentId::Stormwater, &sources, rng)
    }

    /// One distribution pass: every source store serves randomly picked
    /// cells with unmet demand until it runs dry or no takers remain. Each
    /// candidate is offered once per source; a served litre replaces an
    /// imported litre in the receiving cell.
    fn distribute(
        &mut self,
        source_kind: ComponentId,
        sources: &[CellId],
        rng: &mut ChaCha8Rng,
    ) -> Result<()> {
        for &src in sources {
            let mut storage = {
                let cell = self.cell(src)?;
                match source_kind {
                    ComponentId::Wastewater => cell.state.wastewater.amount(Unit::L)?,
                    _ => cell.state.stormwater.amount(Unit::L)?,
                }
            };
            if storage <= 0.0 {
                continue;
            }

            let mut candidates = Vec::new();
            for (&id, cell) in &self.cells {
                let (for_toilet, for_irrigation) =
                    route_factors(source_kind, &cell.params.reuse_settings);
                let set = cell.state.flows.set_of(ComponentId::Reuse);
                let demand = for_toilet * set.get("toilet_demand", Unit::L)?
                    + for_irrigation * set.get("irrigation_demand", Unit::L)?;
                if demand > 0.0 {
                    candidates.push(id);
                }
            }

            let mut used = 0.0;
            while storage > 0.0 && !candidates.is_empty() {
                let pick = rng.gen_range(0..candidates.len());
                let receiver_id = candidates.swap_remove(pick);
                let receiver = self
                    .cells
                    .get_mut(&receiver_id)
                    .ok_or(ModelError::UnknownCell(receiver_id))?;
                let (for_toilet, for_irrigation) =
                    route_factors(source_kind, &receiver.params.reuse_settings);

                let set = receiver.state.flows.set_of(ComponentId::Reuse);
                let toilet = set.get("toilet_demand", Unit::L)?;
                let irrigation = set.get("irrigation_demand", Unit::L)?;
                let toilet_draw = storage.min(toilet * for_toilet);
                let irrigation_draw = (storage - toilet_draw).min(irrigation * for_irrigation);
                let total = toilet_draw + irrigation_draw;
                if total <= 0.0 {
                    continue;
                }
                storage -= total;
                used += total;

                let set = receiver.state.flows.set_of_mut(ComponentId::Reuse);
                set.set("toilet_demand", toilet - toilet_draw, Unit::L)?;
                set.set("irrigation_demand", irrigation - irrigation_draw, Unit::L)?;
                set.add("supply", total, Unit::L)?;
                set.add("imported_water", -total, Unit::L)?;
            }

            if used > 0.0 {
                let cell = self
                    .cells
                    .get_mut(&src)
                    .ok_or(ModelError::UnknownCell(src))?;
                match source_kind {
                    ComponentId::Wastewater => cell.state.wastewater.set_amount(storage, Unit::L)?,
                    _ => cell.state.stormwater.set_amount(storage, Unit::L)?,
                }
                cell.state
                    .flows
                    .set_of_mut(ComponentId::Reuse)
                    .add("distributed", used, Unit::L)?;
                debug!(
                    source = src,
                    kind = source_kind.name(),
                    litres = used,
                    "cluster store served demand"
                );
            }
        }
        Ok(())
    }
}
