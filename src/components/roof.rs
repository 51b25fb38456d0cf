/// Roof surface: interception, evaporation and runoff splitting.
///
/// Excess water leaves through the gutter towards the rain tank
/// (effective share) or spills onto the pervious area. Irrigation applied
/// to the roof carries a mains-leakage supplement that recharges
/// groundwater directly.
use crate::error::Result;
use crate::flows::{ComponentId, FlowAddr};
use crate::forcing::ForcingStep;
use crate::params::CellParams;
use crate::state::CellState;
use crate::units::Unit;

const fn addr(flow: &'static str) -> FlowAddr {
    FlowAddr::new(ComponentId::Roof, flow)
}

#[derive(Debug, Clone)]
pub struct Roof {
    area: f64,
    /// Share of excess routed to the gutter; 1 when there is no pervious
    /// area to spill onto.
    effective_outflow: f64,
    /// Mains leakage rate [-].
    leakage_rate: f64,
}

impl Roof {
    pub fn new(params: &CellParams) -> Self {
        Self {
            area: params.roof.area,
            effective_outflow: if params.pervious.area == 0.0 {
                1.0
            } else {
                params.roof.effective_area / 100.0
            },
            leakage_rate: params.groundwater.leakage_rate / 100.0,
        }
    }

    pub fn solve(&self, f: &ForcingStep, state: &mut CellState) -> Result<()> {
        if self.area == 0.0 {
            return Ok(());
        }

        let irrigation = f.roof_irrigation;
        let irrigation_leakage = irrigation * self.leakage_rate / (1.0 - self.leakage_rate);
        let total_inflow = f.precipitation + irrigation;

        let previous = state.roof.previous(Unit::Mm)?;
        let capacity = state.roof.capacity(Unit::Mm)?;
        let intercepted = capacity.min((previous + total_inflow).max(0.0));
        let evaporation = f.potential_evaporation.min(intercepted);
        let final_storage = intercepted - evaporation;

        let excess = total_inflow - evaporation - (final_storage - previous);
        let effective_runoff = self.effective_outflow * excess.max(0.0);
        let non_effective_runoff = (excess - effective_runoff).max(0.0);

        state.roof.set_amount(final_storage, Unit::Mm)?;

        let flows = &mut state.flows;
        flows.set(addr("precipitation"), f.precipitation, Unit::Mm)?;
        // Delivered irrigation including the leaked share, so the component
        // balance closes against the leakage outflow.
        flows.set(
            addr("from_demand"),
            irrigation + irrigation_leakage,
            Unit::Mm,
        )?;
        flows.set(addr("evaporation"), evaporation, Unit::Mm)?;
        flows.set(addr("to_raintank"), effective_runoff, Unit::Mm)?;
        flows.set(addr("to_pervious"), non_effective_runoff, Unit::Mm)?;
        flows.set(addr("to_groundwater"), irrigation_leakage, Unit::Mm)?;
        Ok(())
    }
}
