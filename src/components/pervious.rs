/// Pervious surface: interception, infiltration into the root zone and
/// overflow.
///
/// Evaporation and infiltration compete for the intercepted water through a
/// shared time factor, so a thin water film cannot sustain both at their
/// potential rates. Infiltration is limited by the space left in the root
/// zone plus what can percolate onwards within the timestep.
use crate::error::Result;
use crate::flows::{ComponentId, FlowAddr};
use crate::forcing::ForcingStep;
use crate::params::CellParams;
use crate::soil::SoilLibrary;
use crate::state::CellState;
use crate::units::Unit;

/// Multiplier turning saturated conductivity [cm/d] into a percolation
/// limit [mm/d].
const SATURATED_PERMEABILITY_FACTOR: f64 = 10.0;

const fn addr(flow: &'static str) -> FlowAddr {
    FlowAddr::new(ComponentId::Pervious, flow)
}

#[derive(Debug, Clone)]
pub struct Pervious {
    area: f64,
    /// Surface infiltration capacity [mm/d].
    infiltration_capacity: f64,
    /// Root zone moisture at saturation [mm].
    moisture_root_capacity: f64,
    /// Percolation limit [mm/d].
    saturated_permeability: f64,
    leakage_rate: f64,
    time_step: f64,
}

impl Pervious {
    pub fn new(params: &CellParams, library: &SoilLibrary) -> Result<Self> {
        let profile = library.profile(params.soil.soil_type, params.soil.crop_type)?;
        Ok(Self {
            area: params.pervious.area,
            infiltration_capacity: params.pervious.infiltration_capacity,
            moisture_root_capacity: profile.level(0).eq_moisture,
            saturated_permeability: SATURATED_PERMEABILITY_FACTOR * profile.k_sat,
            leakage_rate: params.groundwater.leakage_rate / 100.0,
            time_step: params.general.time_step,
        })
    }

    pub fn solve(&self, f: &ForcingStep, state: &mut CellState) -> Result<()> {
        if self.area == 0.0 {
            return Ok(());
        }

        let irrigation = f.pervious_irrigation;
        let irrigation_leakage = irrigation * self.leakage_rate / (1.0 - self.leakage_rate);

        let set = state.flows.set_of(ComponentId::Pervious);
        let total_inflow = f.precipitation
            + irrigation
            + set.get("from_roof", Unit::Mm)?
            + set.get("from_pavement", Unit::Mm)?;

        let previous = state.pervious.previous(Unit::Mm)?;
        let intercepted = (previous + total_inflow).max(0.0);

        // Infiltration limited by the space left in the root zone plus what
        // can percolate onwards this timestep.
        let available_space =
            (self.moisture_root_capacity - state.vadose.previous(Unit::Mm)?).max(0.0);
        let max_percolation = self.time_step * self.saturated_permeability;
        let infiltration_capacity = (self.time_step * self.infiltration_capacity)
            .min(available_space + available_space.min(max_percolation));

        let denominator = f.potential_evaporation + infiltration_capacity;
        let time_factor = if denominator <= 0.0 {
            0.0
        } else {
            (intercepted / denominator).min(1.0)
        };
        let evaporation = time_factor * f.potential_evaporation;
        let to_vadose = time_factor * infiltration_capacity;

        let capacity = state.pervious.capacity(Unit::Mm)?;
        let final_storage = capacity.min((intercepted - evaporation - to_vadose).max(0.0));
        state.pervious.set_amount(final_storage, Unit::Mm)?;

        let overflow =
            (total_inflow - evaporation - to_vadose - (final_storage - previous)).max(0.0);

        let flows = &mut state.flows;
        flows.set(addr("precipitation"), f.precipitation, Unit::Mm)?;
        flows.set(
            addr("from_demand"),
            irrigation + irrigation_leakage,
            Unit::Mm,
        )?;
        flows.set(addr("evaporation"), evaporation, Unit::Mm)?;
        flows.set(addr("to_vadose"), to_vadose, Unit::Mm)?;
        flows.set(addr("to_stormwater"), overflow, Unit::Mm)?;
        flows.set(addr("to_groundwater"), irrigation_leakage, Unit::Mm)?;
        Ok(())
    }
}
