/// Paved surface: interception, infiltration to groundwater and runoff.
///
/// Infiltration only happens once the interception store would spill, and
/// is capped by the pavement's infiltration capacity. The remaining excess
/// splits between the stormwater system and the pervious area.
use crate::error::Result;
use crate::flows::{ComponentId, FlowAddr};
use crate::forcing::ForcingStep;
use crate::params::CellParams;
use crate::state::CellState;
use crate::units::Unit;

const fn addr(flow: &'static str) -> FlowAddr {
    FlowAddr::new(ComponentId::Pavement, flow)
}

#[derive(Debug, Clone)]
pub struct Pavement {
    area: f64,
    /// Share of runoff routed to stormwater; 1 when there is no pervious
    /// area to spill onto.
    effective_outflow: f64,
    /// Infiltration capacity towards groundwater [mm/d].
    infiltration_capacity: f64,
    time_step: f64,
}

impl Pavement {
    pub fn new(params: &CellParams) -> Self {
        Self {
            area: params.pavement.area,
            effective_outflow: if params.pervious.area == 0.0 {
                1.0
            } else {
                params.pavement.effective_area / 100.0
            },
            infiltration_capacity: params.pavement.infiltration_capacity,
            time_step: params.general.time_step,
        }
    }

    pub fn solve(&self, f: &ForcingStep, state: &mut CellState) -> Result<()> {
        if self.area == 0.0 {
            return Ok(());
        }

        let raintank_inflow = state
            .flows
            .set_of(ComponentId::Pavement)
            .get("from_raintank", Unit::Mm)?;
        let total_inflow = f.precipitation + f.pavement_irrigation + raintank_inflow;

        let previous = state.pavement.previous(Unit::Mm)?;
        let capacity = state.pavement.capacity(Unit::Mm)?;
        let intercepted = capacity.min((previous + total_inflow).max(0.0));
        let evaporation = f.potential_evaporation.min(intercepted);
        let final_storage = intercepted - evaporation;

        let infiltration = (total_inflow - (capacity - previous))
            .min(self.infiltration_capacity * self.time_step)
            .max(0.0);

        let excess =
            total_inflow - evaporation - infiltration - (final_storage - previous);
        let effective_runoff = self.effective_outflow * excess.max(0.0);
        let non_effective_runoff = (excess - effective_runoff).max(0.0);

        state.pavement.set_amount(final_storage, Unit::Mm)?;

        let flows = &mut state.flows;
        flows.set(addr("precipitation"), f.precipitation, Unit::Mm)?;
        flows.set(addr("from_demand"), f.pavement_irrigation, Unit::Mm)?;
        flows.set(addr("evaporation"), evaporation, Unit::Mm)?;
        flows.set(addr("to_groundwater"), infiltration, Unit::Mm)?;
        flows.set(addr("to_stormwater"), effective_runoff, Unit::Mm)?;
        flows.set(addr("to_pervious"), non_effective_runoff, Unit::Mm)?;
        Ok(())
    }
}
