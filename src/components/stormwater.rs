/// Stormwater system: runoff collection, detention storage and sewer
/// discharge.
///
/// A fixed share of the collected runoff is diverted into the wastewater
/// system before detention. The first flush and detention overflow leave
/// through the storm sewer towards the downstream cell. Arithmetic is in
/// litres.
use crate::error::Result;
use crate::flows::{ComponentId, FlowAddr};
use crate::forcing::ForcingStep;
use crate::params::CellParams;
use crate::state::CellState;
use crate::units::Unit;

const fn addr(flow: &'static str) -> FlowAddr {
    FlowAddr::new(ComponentId::Stormwater, flow)
}

#[derive(Debug, Clone)]
pub struct Stormwater {
    is_open: bool,
    /// Detention surface area [m2].
    area: f64,
    /// First flush [L].
    first_flush: f64,
    /// Share of runoff diverted to the wastewater system [-].
    wastewater_runoff_ratio: f64,
}

impl Stormwater {
    pub fn new(params: &CellParams) -> Self {
        Self {
            is_open: params.stormwater.is_open,
            area: params.stormwater.area,
            first_flush: params.stormwater.first_flush,
            wastewater_runoff_ratio: params.stormwater.wastewater_runoff / 100.0,
        }
    }

    pub fn solve(&self, f: &ForcingStep, state: &mut CellState) -> Result<()> {
        let set = state.flows.set_of(ComponentId::Stormwater);
        let total_runoff = set.get("from_raintank", Unit::L)?
            + set.get("from_pavement", Unit::L)?
            + set.get("from_pervious", Unit::L)?
            + set.get("from_upstream", Unit::L)?;

        let wastewater_inflow = self.wastewater_runoff_ratio * total_runoff;
        let runoff = total_runoff - wastewater_inflow;
        state
            .flows
            .set(addr("to_wastewater"), wastewater_inflow, Unit::L)?;

        let capacity = state.stormwater.capacity(Unit::L)?;
        if capacity == 0.0 {
            return state.flows.set(addr("to_downstream"), runoff, Unit::L);
        }

        let open = if self.is_open { 1.0 } else { 0.0 };
        let precipitation = open * f.precipitation * self.area;
        let potential_evaporation = open * f.potential_evaporation * self.area;

        let first_flush = runoff.min(self.first_flush);
        let inflow = runoff - first_flush + precipitation;

        let previous = state.stormwater.previous(Unit::L)?;
        let filled = capacity.min((previous + inflow).max(0.0));
        let evaporation = potential_evaporation.min(filled);
        let final_storage = filled - evaporation;
        state.stormwater.set_amount(final_storage, Unit::L)?;

        let overflow = (previous + inflow - filled).max(0.0);
        let sewer_inflow = first_flush + overflow;

        let flows = &mut state.flows;
        if self.is_open {
            flows.set(addr("precipitation"), precipitation, Unit::L)?;
        }
        flows.set(addr("evaporation"), evaporation, Unit::L)?;
        flows.set(addr("to_downstream"), sewer_inflow, Unit::L)?;
        Ok(())
    }
}
