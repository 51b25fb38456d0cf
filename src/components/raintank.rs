/// Rain tank: first-flush diversion, tank storage and overflow splitting.
///
/// Only the installed share of roofs drains into tanks; the rest of the
/// roof runoff bypasses the tank entirely. Tank overflow and bypass split
/// between the stormwater system and the pavement. All arithmetic is in
/// litres, the tank's native unit.
use crate::error::Result;
use crate::flows::{ComponentId, FlowAddr};
use crate::forcing::ForcingStep;
use crate::params::CellParams;
use crate::state::CellState;
use crate::units::Unit;

const fn addr(flow: &'static str) -> FlowAddr {
    FlowAddr::new(ComponentId::Raintank, flow)
}

#[derive(Debug, Clone)]
pub struct Raintank {
    is_open: bool,
    /// Installed share of roofs [-].
    install_ratio: f64,
    /// Total tank surface area [m2], all installed tanks combined.
    area: f64,
    /// Total first flush [L].
    first_flush: f64,
    /// Share of system outflow routed to stormwater; 1 when there is no
    /// pavement to spill onto.
    effective_outflow: f64,
}

impl Raintank {
    pub fn new(params: &CellParams) -> Self {
        let installed = params.general.number_houses * params.raintank.install_ratio / 100.0;
        Self {
            is_open: params.raintank.is_open,
            install_ratio: params.raintank.install_ratio / 100.0,
            area: params.raintank.area * installed,
            first_flush: params.raintank.first_flush * installed,
            effective_outflow: if params.pavement.area == 0.0 {
                1.0
            } else {
                params.raintank.effective_area / 100.0
            },
        }
    }

    pub fn solve(&self, f: &ForcingStep, state: &mut CellState) -> Result<()> {
        let roof_inflow = state
            .flows
            .set_of(ComponentId::Raintank)
            .get("from_roof", Unit::L)?;
        let capacity = state.raintank.capacity(Unit::L)?;

        if capacity == 0.0 {
            let system_outflow = roof_inflow;
            let to_stormwater = self.effective_outflow * system_outflow;
            state
                .flows
                .set(addr("to_stormwater"), to_stormwater, Unit::L)?;
            state
                .flows
                .set(addr("to_pavement"), system_outflow - to_stormwater, Unit::L)?;
            return Ok(());
        }

        // mm over the tank surface is litres per m2.
        let precipitation = f.precipitation * self.area;
        let potential_evaporation = f.potential_evaporation * self.area;

        let first_flush = (roof_inflow * self.install_ratio).min(self.first_flush);
        let open = if self.is_open { 1.0 } else { 0.0 };
        let inflow = roof_inflow * self.install_ratio - first_flush + open * precipitation;

        let previous = state.raintank.previous(Unit::L)?;
        let filled = capacity.min((previous + inflow).max(0.0));
        let evaporation = open * potential_evaporation.min(filled);
        let final_storage = filled - evaporation;
        state.raintank.set_amount(final_storage, Unit::L)?;

        let overflow = (inflow - evaporation - (final_storage - previous)).max(0.0);
        let system_outflow = first_flush + overflow + roof_inflow * (1.0 - self.install_ratio);
        let to_stormwater = self.effective_outflow * system_outflow;

        let flows = &mut state.flows;
        if self.is_open {
            flows.set(addr("precipitation"), precipitation, Unit::L)?;
        }
        flows.set(addr("evaporation"), evaporation, Unit::L)?;
        flows.set(addr("to_stormwater"), to_stormwater, Unit::L)?;
        flows.set(addr("to_pavement"), system_outflow - to_stormwater, Unit::L)?;
        Ok(())
    }
}
