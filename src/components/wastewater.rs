/// Cluster wastewater storage: collects the cell's wastewater streams and
/// discharges the excess into the sewer towards the downstream cell.
use crate::error::Result;
use crate::flows::{ComponentId, FlowAddr};
use crate::forcing::ForcingStep;
use crate::params::CellParams;
use crate::state::CellState;
use crate::units::Unit;

const fn addr(flow: &'static str) -> FlowAddr {
    FlowAddr::new(ComponentId::Wastewater, flow)
}

#[derive(Debug, Clone)]
pub struct Wastewater {
    /// Cluster storage capacity [L].
    capacity: f64,
}

impl Wastewater {
    pub fn new(params: &CellParams) -> Self {
        Self {
            capacity: params.wastewater.capacity,
        }
    }

    pub fn solve(&self, _f: &ForcingStep, state: &mut CellState) -> Result<()> {
        let set = state.flows.set_of(ComponentId::Wastewater);
        let total_inflow = set.get("from_reuse", Unit::L)?
            + set.get("from_groundwater", Unit::L)?
            + set.get("from_stormwater", Unit::L)?
            + set.get("from_upstream", Unit::L)?;

        if self.capacity == 0.0 {
            return state.flows.set(addr("to_downstream"), total_inflow, Unit::L);
        }

        let previous = state.wastewater.previous(Unit::L)?;
        let final_storage = self.capacity.min(previous + total_inflow);
        let sewer_inflow = (total_inflow - (final_storage - previous)).max(0.0);
        state.wastewater.set_amount(final_storage, Unit::L)?;
        state.flows.set(addr("to_downstream"), sewer_inflow, Unit::L)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soil::SoilLibrary;
    use crate::testutil::test_cell_params;

    fn assert_approx(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected} ± {tol}, got {actual}"
        );
    }

    fn setup(params: &CellParams) -> (Wastewater, CellState) {
        let state = CellState::new(params, &SoilLibrary::loam_grass()).unwrap();
        (Wastewater::new(params), state)
    }

    fn feed_reuse(state: &mut CellState, litres: f64) {
        state
            .flows
            .set(
                FlowAddr::new(ComponentId::Reuse, "to_wastewater"),
                litres,
                Unit::L,
            )
            .unwrap();
    }

    #[test]
    fn inflow_is_stored_until_capacity() {
        let params = test_cell_params();
        let (waste, mut state) = setup(&params);
        feed_reuse(&mut state, 5_000.0);
        waste.solve(&ForcingStep::default(), &mut state).unwrap();
        assert_approx(state.wastewater.amount(Unit::L).unwrap(), 5_000.0, 1e-9);
        assert_approx(
            state.flows.get(addr("to_downstream"), Unit::L).unwrap(),
            0.0,
            1e-12,
        );
    }

    #[test]
    fn excess_discharges_to_the_sewer() {
        let params = test_cell_params();
        let (waste, mut state) = setup(&params);
        state.wastewater.set_previous(19_000.0, Unit::L).unwrap();
        feed_reuse(&mut state, 5_000.0);
        waste.solve(&ForcingStep::default(), &mut state).unwrap();
        assert_approx(state.wastewater.amount(Unit::L).unwrap(), 20_000.0, 1e-9);
        assert_approx(
            state.flows.get(addr("to_downstream"), Unit::L).unwrap(),
            4_000.0,
            1e-9,
        );
    }

    #[test]
    fn zero_capacity_cluster_passes_straight_through() {
        let mut params = test_cell_params();
        params.wastewater.capacity = 0.0;
        let (waste, mut state) = setup(&params);
        feed_reuse(&mut state, 3_000.0);
        state.register_upstream(4).unwrap();
        state
            .flows
            .set_of_mut(ComponentId::Wastewater)
            .multi_mut("from_upstream")
            .unwrap()
            .set_source(4, 1.0)
            .unwrap();
        waste.solve(&ForcingStep::default(), &mut state).unwrap();
        assert_approx(
            state.flows.get(addr("to_downstream"), Unit::L).unwrap(),
            4_000.0,
            1e-9,
        );
    }

    #[test]
    fn component_balance_closes() {
        let params = test_cell_params();
        let (waste, mut state) = setup(&params);
        state.wastewater.set_previous(18_000.0, Unit::L).unwrap();
        feed_reuse(&mut state, 6_000.0);
        waste.solve(&ForcingStep::default(), &mut state).unwrap();
        let set = state.flows.set_of(ComponentId::Wastewater);
        let balance = set.total_inflow(Unit::L).unwrap()
            - set.total_outflow(Unit::L).unwrap()
            - state.wastewater.change(Unit::L).unwrap();
        assert_approx(balance, 0.0, 1e-9);
    }
}
