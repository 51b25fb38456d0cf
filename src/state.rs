/// Per-cell state: the component storages, the groundwater head, and the
/// declared flow network.
///
/// `CellState::new` wires the whole cell up front: every component declares
/// its named flows and the intra-cell links are registered, so a write to
/// one side of a shared flow (say the roof's rain-tank discharge) shows up
/// on the other side immediately.
use crate::error::Result;
use crate::flows::{CellFlows, ComponentId, FlowAddr, FlowDir, FlowSet};
use crate::params::CellParams;
use crate::soil::SoilLibrary;
use crate::storage::Storage;
use crate::topology::CellId;
use crate::units::Unit;

/// Groundwater head state, kept as scalars rather than a volume store.
///
/// Levels are in metres below the surface; smaller is wetter. When the
/// water table reaches the surface the excess is carried as a (negative)
/// surface water level so the effective head
/// `water_level + surface_water_level / storage_coefficient`
/// stays continuous across the transition.
#[derive(Debug, Clone)]
pub struct GroundwaterState {
    /// Water table depth [m below surface], never negative.
    pub water_level: f64,
    pub previous_water_level: f64,
    /// Ponded water expressed as a level [m], zero or negative.
    pub surface_water_level: f64,
    pub previous_surface_water_level: f64,
    /// Storage coefficient used this timestep [-].
    pub storage_coefficient: f64,
}

impl GroundwaterState {
    pub fn new(initial_level: f64, storage_coefficient: f64) -> Self {
        let level = initial_level.max(0.0);
        Self {
            water_level: level,
            previous_water_level: level,
            surface_water_level: (initial_level * storage_coefficient).min(0.0),
            previous_surface_water_level: (initial_level * storage_coefficient).min(0.0),
            storage_coefficient,
        }
    }

    /// Effective head [m below surface] combining water table and ponding.
    pub fn effective_head(&self) -> f64 {
        self.water_level + self.surface_water_level / self.storage_coefficient
    }

    pub fn previous_effective_head(&self) -> f64 {
        self.previous_water_level + self.previous_surface_water_level / self.storage_coefficient
    }

    /// Stored-water change over the timestep [m3], positive for a gain.
    /// A falling depth means the aquifer gained water.
    pub fn storage_change_m3(&self, area: f64) -> f64 {
        self.storage_coefficient * area * (self.previous_effective_head() - self.effective_head())
    }

    pub fn advance(&mut self) {
        self.previous_water_level = self.water_level;
        self.previous_surface_water_level = self.surface_water_level;
    }
}

/// On-site reuse state: the treated-wastewater store plus the rain tank
/// content as seen after reuse draws from it. The rain tank component owns
/// the tank during the hydraulic pass; the reuse draw is written back at the
/// end of the timestep.
#[derive(Debug, Clone)]
pub struct ReuseState {
    /// Treated wastewater storage (per cell).
    pub storage: Storage,
    /// Rain tank content after reuse [m3].
    pub rt_storage: f64,
}

#[derive(Debug, Clone)]
pub struct CellState {
    pub flows: CellFlows,
    pub roof: Storage,
    pub raintank: Storage,
    pub pavement: Storage,
    pub pervious: Storage,
    pub vadose: Storage,
    pub groundwater: GroundwaterState,
    pub stormwater: Storage,
    pub reuse: ReuseState,
    pub wastewater: Storage,
}

/// Interception-style storage: capacity in mm over the area, or an empty
/// store when the surface does not exist in this cell.
fn depth_storage(name: &'static str, area: f64, capacity_mm: f64) -> Result<Storage> {
    if area > 0.0 {
        Storage::new(name, area, capacity_mm, Unit::Mm)
    } else {
        Storage::new(name, area, 0.0, Unit::M3)
    }
}

impl CellState {
    pub fn new(params: &CellParams, library: &SoilLibrary) -> Result<Self> {
        let installed = params.general.number_houses * params.raintank.install_ratio / 100.0;

        let roof = depth_storage("roof_interception", params.roof.area, params.roof.max_storage)?;
        let raintank = Storage::new(
            "raintank",
            params.raintank.area * installed,
            params.raintank.capacity * installed,
            Unit::L,
        )?;
        let pavement = depth_storage(
            "pavement_interception",
            params.pavement.area,
            params.pavement.max_storage,
        )?;
        let pervious = depth_storage(
            "pervious_interception",
            params.pervious.area,
            params.pervious.max_storage,
        )?;

        let mut vadose = Storage::unbounded("vadose_moisture", params.vadose.area);
        let profile = library.profile(params.soil.soil_type, params.soil.crop_type)?;
        if params.vadose.area > 0.0 {
            let (eq_moisture, _) = profile.moisture_properties(params.groundwater.initial_level);
            vadose.set_amount(eq_moisture, Unit::Mm)?;
            vadose.set_previous(eq_moisture, Unit::Mm)?;
        }

        let groundwater = GroundwaterState::new(
            params.groundwater.initial_level,
            profile.storage_coefficient(params.groundwater.initial_level.max(0.0)),
        );

        let stormwater = Storage::new(
            "stormwater_detention",
            params.stormwater.area,
            params.stormwater.capacity,
            Unit::L,
        )?;
        let reuse = ReuseState {
            storage: Storage::new(
                "reuse_storage",
                params.reuse.area * params.general.number_houses,
                params.reuse.capacity * params.general.number_houses,
                Unit::L,
            )?,
            rt_storage: 0.0,
        };
        let wastewater = Storage::new(
            "wastewater_cluster",
            params.wastewater.area,
            params.wastewater.capacity,
            Unit::L,
        )?;

        let flows = Self::build_flows(params, raintank.area())?;

        Ok(Self {
            flows,
            roof,
            raintank,
            pavement,
            pervious,
            vadose,
            groundwater,
            stormwater,
            reuse,
            wastewater,
        })
    }

    fn build_flows(params: &CellParams, raintank_area: f64) -> Result<CellFlows> {
        use ComponentId::*;
        use FlowDir::*;

        let mut sets = Vec::with_capacity(ComponentId::ALL.len());
        for component in ComponentId::ALL {
            let area = match component {
                Roof => params.roof.area,
                Raintank => raintank_area,
                Pavement => params.pavement.area,
                Pervious => params.pervious.area,
                Vadose => params.vadose.area,
                Groundwater => params.groundwater.area,
                Stormwater => params.stormwater.area,
                Reuse => 0.0,
                Wastewater => params.wastewater.area,
            };
            let mut set = FlowSet::new(component, area);
            match component {
                Roof => {
                    set.declare("precipitation", In)
                        .declare("from_demand", In)
                        .declare("evaporation", Out)
                        .declare("to_raintank", Out)
                        .declare("to_pervious", Out)
                        .declare("to_groundwater", Out);
                }
                Raintank => {
                    set.declare("precipitation", In)
                        .declare("from_roof", In)
                        .declare("evaporation", Out)
                        .declare("to_stormwater", Out)
                        .declare("to_pavement", Out);
                }
                Pavement => {
                    set.declare("precipitation", In)
                        .declare("from_demand", In)
                        .declare("from_raintank", In)
                        .declare("evaporation", Out)
                        .declare("to_groundwater", Out)
                        .declare("to_stormwater", Out)
                        .declare("to_pervious", Out);
                }
                Pervious => {
                    set.declare("precipitation", In)
                        .declare("from_demand", In)
                        .declare("from_roof", In)
                        .declare("from_pavement", In)
                        .declare("evaporation", Out)
                        .declare("to_vadose", Out)
                        .declare("to_groundwater", Out)
                        .declare("to_stormwater", Out);
                }
                Vadose => {
                    set.declare("from_pervious", In)
                        .declare("transpiration", Out)
                        .declare("to_groundwater", Out);
                }
                Groundwater => {
                    set.declare("from_vadose", In)
                        .declare("from_roof", In)
                        .declare("from_pavement", In)
                        .declare("from_pervious", In)
                        .declare("from_demand", In)
                        .declare("seepage", Out)
                        .declare("baseflow", Out)
                        .declare("to_wastewater", Out);
                }
                Stormwater => {
                    set.declare("precipitation", In)
                        .declare("from_raintank", In)
                        .declare("from_pavement", In)
                        .declare("from_pervious", In)
                        .declare_multi("from_upstream", In)
                        .declare("evaporation", Out)
                        .declare("to_wastewater", Out)
                        .declare("to_downstream", Out);
                }
                Reuse => {
                    set.declare("imported_water", In)
                        .declare("supply", In)
                        .declare("use", Out)
                        .declare("distributed", Out)
                        .declare("to_wastewater", Out)
                        .declare("toilet_demand", Internal)
                        .declare("irrigation_demand", Internal);
                }
                Wastewater => {
                    set.declare("from_reuse", In)
                        .declare("from_groundwater", In)
                        .declare("from_stormwater", In)
                        .declare_multi("from_upstream", In)
                        .declare("to_downstream", Out);
                }
            }
            sets.push(set);
        }

        let mut flows = CellFlows::new(sets);
        let pairs = [
            ((Roof, "to_raintank"), (Raintank, "from_roof")),
            ((Roof, "to_pervious"), (Pervious, "from_roof")),
            ((Roof, "to_groundwater"), (Groundwater, "from_roof")),
            ((Raintank, "to_stormwater"), (Stormwater, "from_raintank")),
            ((Raintank, "to_pavement"), (Pavement, "from_raintank")),
            ((Pavement, "to_pervious"), (Pervious, "from_pavement")),
            ((Pavement, "to_groundwater"), (Groundwater, "from_pavement")),
            ((Pavement, "to_stormwater"), (Stormwater, "from_pavement")),
            ((Pervious, "to_vadose"), (Vadose, "from_pervious")),
            ((Pervious, "to_groundwater"), (Groundwater, "from_pervious")),
            ((Pervious, "to_stormwater"), (Stormwater, "from_pervious")),
            ((Vadose, "to_groundwater"), (Groundwater, "from_vadose")),
            ((Groundwater, "to_wastewater"), (Wastewater, "from_groundwater")),
            ((Stormwater, "to_wastewater"), (Wastewater, "from_stormwater")),
            ((Reuse, "to_wastewater"), (Wastewater, "from_reuse")),
        ];
        for ((ca, fa), (cb, fb)) in pairs {
            flows.link(FlowAddr::new(ca, fa), FlowAddr::new(cb, fb))?;
        }
        Ok(flows)
    }

    /// Register an upstream neighbour feeding this cell's stormwater and
    /// wastewater systems.
    pub fn register_upstream(&mut self, cell: CellId) -> Result<()> {
        self.flows
            .set_of_mut(ComponentId::Stormwater)
            .multi_mut("from_upstream")?
            .add_source(cell);
        self.flows
            .set_of_mut(ComponentId::Wastewater)
            .multi_mut("from_upstream")?
            .add_source(cell);
        Ok(())
    }

    /// The bounded storages of the cell, for bounds validation and balance
    /// accounting. Groundwater is scalar state and handled separately.
    pub fn storages(&self) -> [&Storage; 8] {
        [
            &self.roof,
            &self.raintank,
            &self.pavement,
            &self.pervious,
            &self.vadose,
            &self.stormwater,
            &self.reuse.storage,
            &self.wastewater,
        ]
    }

    /// Write the post-reuse rain tank content back into the tank store.
    /// Runs after the reuse component has drawn from the tank.
    pub fn carry_raintank_from_reuse(&mut self) -> Result<()> {
        self.raintank.set_amount(self.reuse.rt_storage, Unit::M3)
    }

    /// Commit all current amounts as the next timestep's previous amounts.
    pub fn advance(&mut self) {
        self.roof.advance();
        self.raintank.advance();
        self.pavement.advance();
        self.pervious.advance();
        self.vadose.advance();
        self.groundwater.advance();
        self.stormwater.advance();
        self.reuse.storage.advance();
        self.wastewater.advance();
    }

    /// Zero all flows. Declarations, links and upstream sources survive.
    pub fn reset_flows(&mut self) {
        self.flows.reset();
    }
}
