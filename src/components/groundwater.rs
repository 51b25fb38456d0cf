/// Shallow groundwater: head dynamics, seepage, baseflow and pipe
/// infiltration.
///
/// The head follows the analytic solution of a linear reservoir over the
/// timestep, under either a constant downward seepage flux or a dynamic
/// flux driven by the deep aquifer head. Baseflow closes the component's
/// water balance exactly against the head change, so it can run negative
/// (open water infiltrating) in dry spells.
///
/// Levels are metres below the surface throughout.
use crate::error::Result;
use crate::flows::{ComponentId, FlowAddr};
use crate::forcing::ForcingStep;
use crate::params::{CellParams, SeepageModel};
use crate::soil::{SoilLibrary, SoilProfile};
use crate::state::CellState;
use crate::units::Unit;

/// Depth of the wastewater pipes [m below surface].
const PIPE_DEPTH: f64 = 3.0;

const fn addr(flow: &'static str) -> FlowAddr {
    FlowAddr::new(ComponentId::Groundwater, flow)
}

#[derive(Debug, Clone)]
pub struct Groundwater {
    area: f64,
    leakage_rate: f64,
    seepage_model: SeepageModel,
    /// Resistance towards open water [d].
    drainage_resistance: f64,
    /// Resistance towards the deep aquifer [d].
    seepage_resistance: f64,
    /// Pipe infiltration recession constant [1/d].
    infiltration_recession: f64,
    /// Deep aquifer head [m below surface].
    hydraulic_head: f64,
    /// Constant downward seepage [m/d].
    downward_seepage: f64,
    /// Indoor water use [L per timestep], source of mains leakage.
    indoor_water_use: f64,
    time_step: f64,
    profile: SoilProfile,
}

impl Groundwater {
    pub fn new(params: &CellParams, library: &SoilLibrary) -> Result<Self> {
        let profile = library
            .profile(params.soil.soil_type, params.soil.crop_type)?
            .clone();
        Ok(Self {
            area: params.groundwater.area,
            leakage_rate: params.groundwater.leakage_rate / 100.0,
            seepage_model: params.groundwater.seepage_model,
            drainage_resistance: params.groundwater.drainage_resistance,
            seepage_resistance: params.groundwater.seepage_resistance,
            infiltration_recession: params.groundwater.infiltration_recession,
            hydraulic_head: params.groundwater.hydraulic_head,
            downward_seepage: params.groundwater.downward_seepage / 1000.0,
            indoor_water_use: params.general.indoor_water_use,
            time_step: params.general.time_step,
            profile,
        })
    }

    pub fn solve(&self, f: &ForcingStep, state: &mut CellState) -> Result<()> {
        if self.area == 0.0 {
            state.groundwater.water_level = state.groundwater.previous_water_level;
            state.groundwater.surface_water_level = state.groundwater.previous_surface_water_level;
            return Ok(());
        }

        // Mains leakage scales the delivered volume, not the demand.
        state.flows.set(
            addr("from_demand"),
            self.indoor_water_use * self.leakage_rate / (1.0 - self.leakage_rate),
            Unit::L,
        )?;

        let inflow = state
            .flows
            .set_of(ComponentId::Groundwater)
            .total_inflow(Unit::M)?;

        let gw = &mut state.groundwater;
        gw.storage_coefficient = self.profile.storage_coefficient(gw.previous_water_level);
        let effective_previous_head = gw.previous_effective_head();

        let level = match self.seepage_model {
            SeepageModel::Dynamic => {
                self.dynamic_flux(inflow, f.open_water_level, gw.storage_coefficient, effective_previous_head)
            }
            SeepageModel::Constant => {
                self.constant_flux(inflow, f.open_water_level, gw.storage_coefficient, effective_previous_head)
            }
        };
        let average_level = 0.5 * (level + effective_previous_head);

        let seepage = match self.seepage_model {
            SeepageModel::Dynamic => {
                (self.hydraulic_head - average_level) * self.time_step / self.seepage_resistance
            }
            SeepageModel::Constant => self.downward_seepage * self.time_step,
        };
        let pipe_infiltration =
            ((average_level - PIPE_DEPTH) * self.infiltration_recession * self.time_step).max(0.0);

        // Baseflow closes the balance against the head change exactly.
        let baseflow = inflow
            - seepage
            - pipe_infiltration
            - gw.storage_coefficient * (effective_previous_head - level);

        gw.water_level = level.max(0.0);
        gw.surface_water_level = (level * gw.storage_coefficient).min(0.0);

        let flows = &mut state.flows;
        flows.set(addr("seepage"), seepage, Unit::M)?;
        flows.set(addr("baseflow"), baseflow, Unit::M)?;
        flows.set(addr("to_wastewater"), pipe_infiltration, Unit::M)?;
        Ok(())
    }

    /// Total mains and irrigation leakage reaching groundwater [m3], read
    /// back by the reuse component when sizing the water import.
    pub fn leakage_m3(state: &CellState) -> Result<f64> {
        let set = state.flows.set_of(ComponentId::Groundwater);
        Ok(set.get("from_roof", Unit::M3)?
            + set.get("from_pervious", Unit::M3)?
            + set.get("from_demand", Unit::M3)?)
    }

    fn dynamic_flux(
        &self,
        inflow: f64,
        open_water_level: f64,
        storage_coefficient: f64,
        effective_previous_head: f64,
    ) -> f64 {
        let numerator = inflow * self.drainage_resistance * self.seepage_resistance
            - self.hydraulic_head * self.drainage_resistance
            - open_water_level * self.seepage_resistance
            - PIPE_DEPTH
                * self.infiltration_recession
                * self.drainage_resistance
                * self.seepage_resistance;
        let denominator = self.drainage_resistance
            + self.seepage_resistance
            + self.infiltration_recession * self.drainage_resistance * self.seepage_resistance;

        let exp_term = (-self.time_step * denominator
            / (storage_coefficient * self.drainage_resistance * self.seepage_resistance))
            .exp();

        (effective_previous_head + numerator / denominator) * exp_term - numerator / denominator
    }

    fn constant_flux(
        &self,
        inflow: f64,
        open_water_level: f64,
        storage_coefficient: f64,
        effective_previous_head: f64,
    ) -> f64 {
        let numerator = (inflow - self.downward_seepage) * self.drainage_resistance
            - PIPE_DEPTH * self.infiltration_recession * self.drainage_resistance
            - open_water_level;
        let denominator = 1.0 + self.infiltration_recession * self.drainage_resistance;

        let exp_term = (-self.time_step * denominator
            / (storage_coefficient * self.drainage_resistance))
            .exp();

        (effective_previous_head + numerator / denominator) * exp_term - numerator / denominator
    }
}
