/// Vadose zone: root-zone moisture, transpiration and percolation.
///
/// Transpiration is the potential rate scaled by a reduction factor that
/// shuts down both in saturated and in near-wilting soil. The root zone then
/// relaxes towards the equilibrium moisture for the current groundwater
/// depth: downward as percolation, upward as capillary rise.
use crate::error::Result;
use crate::flows::{ComponentId, FlowAddr};
use crate::forcing::ForcingStep;
use crate::params::CellParams;
use crate::soil::SoilLibrary;
use crate::state::CellState;
use crate::units::Unit;

const SATURATED_CONDUCTIVITY_FACTOR: f64 = 10.0;
/// Potential evaporation [mm/d] below which the low-evaporation
/// transpiration threshold applies.
const MIN_REFERENCE_EVAPORATION: f64 = 1.0;
/// Potential evaporation [mm/d] above which the high-evaporation
/// transpiration threshold applies.
const MAX_REFERENCE_EVAPORATION: f64 = 5.0;

const fn addr(flow: &'static str) -> FlowAddr {
    FlowAddr::new(ComponentId::Vadose, flow)
}

#[derive(Debug, Clone)]
pub struct Vadose {
    area: f64,
    /// Percolation limit [mm/d].
    saturated_conductivity: f64,
    /// Transpiration thresholds [mm], from the evapotranspiration table.
    moisture_low_evaporation: f64,
    moisture_high_evaporation: f64,
    moisture_saturated: f64,
    moisture_field_capacity: f64,
    moisture_wilting_point: f64,
    /// Table lookup state for equilibrium moisture and capillary rise.
    eq_table: EqTable,
    time_step: f64,
}

/// Interpolation table of (equilibrium moisture, max capillary rise) rows.
#[derive(Debug, Clone)]
struct EqTable {
    rows: Vec<(f64, f64)>,
}

impl EqTable {
    fn lookup(&self, groundwater_level: f64) -> (f64, f64) {
        use crate::soil::{gw_bracket, MAX_SOIL_DEPTH, MAX_SOIL_INDEX};
        if groundwater_level >= MAX_SOIL_DEPTH {
            return self.rows[MAX_SOIL_INDEX];
        }
        let bracket = gw_bracket(groundwater_level);
        let f = bracket.factor(groundwater_level.max(0.0));
        let (eq_up, cap_up) = self.rows[bracket.upper_index];
        let (eq_low, cap_low) = self.rows[bracket.lower_index];
        (eq_up + f * (eq_low - eq_up), cap_up + f * (cap_low - cap_up))
    }
}

impl Vadose {
    pub fn new(params: &CellParams, library: &SoilLibrary) -> Result<Self> {
        let profile = library.profile(params.soil.soil_type, params.soil.crop_type)?;
        let et = library.et_row(params.soil.soil_type, params.soil.crop_type)?;
        Ok(Self {
            area: params.vadose.area,
            saturated_conductivity: SATURATED_CONDUCTIVITY_FACTOR * profile.k_sat,
            moisture_low_evaporation: et.theta_h3l,
            moisture_high_evaporation: et.theta_h3h,
            moisture_saturated: et.theta_h1,
            moisture_field_capacity: et.theta_h2,
            moisture_wilting_point: et.theta_h4,
            eq_table: EqTable {
                rows: profile
                    .levels
                    .iter()
                    .map(|l| (l.eq_moisture, l.max_capillary_rise))
                    .collect(),
            },
            time_step: params.general.time_step,
        })
    }

    pub fn solve(&self, f: &ForcingStep, state: &mut CellState) -> Result<()> {
        if self.area == 0.0 {
            // Moisture carries over unchanged.
            let previous = state.vadose.previous(Unit::M3)?;
            state.vadose.set_amount(previous, Unit::M3)?;
            return Ok(());
        }

        let infiltration = state
            .flows
            .set_of(ComponentId::Vadose)
            .get("from_pervious", Unit::Mm)?;
        let initial_moisture = state.vadose.previous(Unit::Mm)?;
        let groundwater_level = state.groundwater.previous_water_level;

        let threshold = self.transpiration_threshold(f.potential_evaporation);
        let factor = self.transpiration_factor(infiltration, threshold, initial_moisture);
        let transpiration = factor * f.potential_evaporation;

        let (equilibrium_moisture, max_capillary) = self.eq_table.lookup(groundwater_level);

        let current_moisture = initial_moisture + infiltration - transpiration;
        let percolation = if current_moisture > equilibrium_moisture {
            (current_moisture - equilibrium_moisture)
                .min(self.time_step * self.saturated_conductivity)
        } else {
            -(equilibrium_moisture - current_moisture).min(self.time_step * max_capillary)
        };

        state
            .vadose
            .set_amount(current_moisture - percolation, Unit::Mm)?;

        let flows = &mut state.flows;
        flows.set(addr("transpiration"), transpiration, Unit::Mm)?;
        flows.set(addr("to_groundwater"), percolation, Unit::Mm)?;
        Ok(())
    }

    /// Moisture below which transpiration reduction starts, interpolated
    /// between the low- and high-evaporation thresholds.
    fn transpiration_threshold(&self, reference_evaporation: f64) -> f64 {
        if reference_evaporation < MIN_REFERENCE_EVAPORATION {
            return self.moisture_low_evaporation;
        }
        if reference_evaporation > MAX_REFERENCE_EVAPORATION {
            return self.moisture_high_evaporation;
        }
        (reference_evaporation - MIN_REFERENCE_EVAPORATION)
            / (MAX_REFERENCE_EVAPORATION - MIN_REFERENCE_EVAPORATION)
            * (self.moisture_high_evaporation - self.moisture_low_evaporation)
            + self.moisture_low_evaporation
    }

    fn transpiration_factor(&self, infiltration: f64, threshold: f64, initial_moisture: f64) -> f64 {
        let total_moisture = initial_moisture + infiltration;
        if total_moisture > self.moisture_saturated {
            return 0.0;
        }
        if total_moisture > self.moisture_field_capacity {
            return 1.0
                - (total_moisture - self.moisture_field_capacity)
                    / (self.moisture_saturated - self.moisture_field_capacity);
        }
        if total_moisture > threshold {
            return 1.0;
        }
        if total_moisture > self.moisture_wilting_point {
            return (total_moisture - self.moisture_wilting_point)
                / (threshold - self.moisture_wilting_point);
        }
        0.0
    }
}
